//! Router configuration: all routes plus CORS and request tracing.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Permissive CORS for development; restrict in production deployments.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        .route(
            "/fields",
            get(handlers::list_fields).post(handlers::create_field),
        )
        .route(
            "/fields/{id}",
            get(handlers::get_field)
                .patch(handlers::update_field)
                .delete(handlers::delete_field),
        )
        .route("/fields/{id}/availability", get(handlers::get_availability))
        .route("/fields/{id}/bookings", get(handlers::list_bookings))
        .route("/fields/{id}/block-dates", post(handlers::block_dates))
        .route("/fields/{id}/unblock-dates", post(handlers::unblock_dates))
        .route("/fields/{id}/block-slots", post(handlers::block_slots))
        .route("/fields/{id}/unblock-slots", post(handlers::unblock_slots))
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings/{id}", get(handlers::get_booking))
        .route("/bookings/{id}/status", post(handlers::set_booking_status));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
