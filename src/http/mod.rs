//! HTTP surface: plain JSON records over axum, no custom wire protocol.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
