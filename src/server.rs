use std::net::SocketAddr;

use axum::{
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;

use crate::api;
use crate::api::AppState;
use crate::database::DbPool;
use crate::entities::PORTAL_CATALOG;
use crate::error::SocietyError;
use crate::query::Paginator;

pub struct WebServer {
    host: String,
    port: u16,
    pool: DbPool,
    max_limit: i64,
}

impl WebServer {
    pub fn new(host: String, port: u16, pool: DbPool, max_limit: i64) -> Self {
        Self {
            host,
            port,
            pool,
            max_limit,
        }
    }

    pub async fn start(&self) -> Result<(), SocietyError> {
        let app = self.create_router();

        let addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| SocietyError::Error(format!("Invalid address: {}", e)))?;

        println!("societydb server starting on http://{}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SocietyError::Error(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("Server ready to handle requests");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_signal().await;
                log::info!("Shutdown signal received, stopping server");
                println!("\nShutdown signal received - stopping server gracefully...");
            })
            .await
            .map_err(|e| SocietyError::Error(format!("Server error: {}", e)))?;

        log::info!("Server shutdown complete");
        Ok(())
    }

    fn create_router(&self) -> Router {
        let paginator = Paginator::new(self.pool.clone(), PORTAL_CATALOG, self.max_limit);
        build_router(AppState::new(paginator))
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // App info
        .route("/api/app-info", get(api::app::get_app_info))
        // Listing endpoints
        .route("/api/{entity}/list", post(api::listing::list_entity))
        .route("/api/{entity}/metadata", get(api::listing::get_metadata))
        .with_state(app_state)
}

async fn health_check() -> (StatusCode, Html<String>) {
    (
        StatusCode::OK,
        Html("<h1>societydb</h1><p>Server is running</p>".to_string()),
    )
}

/// Waits for a shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received SIGINT (Ctrl+C)");
        },
        _ = terminate => {
            log::info!("Received SIGTERM");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_router(dir: &TempDir) -> Router {
        let pool = Database::open_pool(&dir.path().join("server.db"), 2).unwrap();
        pool.get()
            .unwrap()
            .execute_batch(
                "INSERT INTO flats (number, owner_name, maintenance_fee) VALUES ('A-101', 'Émile Durand', 250000);
                 INSERT INTO flats (number, owner_name, maintenance_fee) VALUES ('B-202', 'Asha Rao', 250000);",
            )
            .unwrap();
        build_router(AppState::new(Paginator::new(pool, PORTAL_CATALOG, 20)))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_health_and_unknown_entity() {
        let dir = TempDir::new().unwrap();
        let app = test_router(&dir);

        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("Server is running"));

        let request = Request::get("/api/villas/metadata").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], json!("UnknownTableError"));
    }

    #[tokio::test]
    async fn test_list_route() {
        let dir = TempDir::new().unwrap();
        let app = test_router(&dir);

        let criteria = json!({
            "searchCriterias": [{"field": "ownerName", "operator": "contains", "value": "ÉMILE"}]
        });
        let request = Request::post("/api/flats/list")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(criteria.to_string()))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["meta"]["totalCount"], json!(1));
        assert_eq!(body["data"][0]["number"], json!("A-101"));

        let request = Request::post("/api/flats/list")
            .body(Body::from(r#"{"limit": 500}"#))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
