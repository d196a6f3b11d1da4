//! Loyalty HTTP API
//!
//! Thin axum layer over [`loyalty_engine::GamificationEngine`]. Handlers
//! translate between DTOs and engine calls; all domain rules live below.

pub mod dto;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use server::{create_server, run_server, start_background_server};
pub use state::{ApiConfig, AppState};
