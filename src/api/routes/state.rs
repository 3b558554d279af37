use std::sync::Arc;

use crate::query::Paginator;

/// Shared application state passed to all Axum handlers via `.with_state()`.
#[derive(Clone)]
pub struct AppState {
    pub paginator: Arc<Paginator>,
}

impl AppState {
    pub fn new(paginator: Paginator) -> Self {
        Self {
            paginator: Arc::new(paginator),
        }
    }
}
