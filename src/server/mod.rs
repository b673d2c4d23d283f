pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;

pub use state::AppState;
