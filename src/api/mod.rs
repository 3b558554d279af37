pub mod error;
pub mod routes;

pub use routes::app;
pub use routes::listing;
pub use routes::state::AppState;
