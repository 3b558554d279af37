use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::error::SocietyError;

/// Failure body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub message: String,
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError(pub SocietyError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SocietyError::UnknownTable(_) => StatusCode::NOT_FOUND,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SocietyError> for ApiError {
    fn from(err: SocietyError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match status.is_server_error() {
            true => error!("Request failed: {}", self.0),
            false => warn!("Rejected request: {}", self.0),
        }

        let body = ErrorBody {
            message: self.0.to_string(),
            error: self.0.kind().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (SocietyError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                SocietyError::UnknownField {
                    table: "payments".into(),
                    field: "x".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                SocietyError::UnknownRelation {
                    table: "payments".into(),
                    relation: "x".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (SocietyError::UnknownTable("villas".into()), StatusCode::NOT_FOUND),
            (SocietyError::Cancelled, StatusCode::INTERNAL_SERVER_ERROR),
            (
                SocietyError::DatabaseError(rusqlite::Error::InvalidQuery),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = ApiError(SocietyError::UnknownTable("villas".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            ErrorBody {
                message: "Unknown table 'villas'".into(),
                error: "UnknownTableError".into(),
            }
        );
    }
}
