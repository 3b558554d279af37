use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::database::Database;

/// Response structure for app information
#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub schema_version: String,
    pub entities: Vec<String>,
}

/// GET /api/app-info
///
/// Returns application version, schema version and the listable entities
pub async fn get_app_info(State(state): State<AppState>) -> Result<Json<AppInfo>, ApiError> {
    let schema_version = Database::run_blocking(state.paginator.pool(), |conn| {
        Database::schema_version(conn)
    })
    .await?
    .unwrap_or_else(|| "unknown".to_string());

    let entities = state
        .paginator
        .catalog()
        .tables()
        .map(|table| table.name.to_string())
        .collect();

    Ok(Json(AppInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version,
        entities,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PORTAL_CATALOG;
    use crate::query::Paginator;
    use crate::schema::SCHEMA_VERSION;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_app_info() {
        let dir = TempDir::new().unwrap();
        let pool = Database::open_pool(&dir.path().join("info.db"), 2).unwrap();
        let state = AppState::new(Paginator::new(pool, PORTAL_CATALOG, 10));

        let Json(info) = get_app_info(State(state)).await.unwrap();
        assert_eq!(info.name, "societydb");
        assert_eq!(info.schema_version, SCHEMA_VERSION);
        assert_eq!(info.entities, vec!["flats", "residents", "payments", "expenses"]);
    }
}
