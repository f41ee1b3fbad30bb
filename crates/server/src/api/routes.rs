use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    bookings, credentials, handlers, middleware::metrics_middleware, passengers, runs, ws,
};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Bookings
        .route("/bookings/validate", post(bookings::validate))
        .route("/bookings/schedule", post(bookings::schedule))
        .route("/bookings/scheduled", get(bookings::list_scheduled))
        .route(
            "/bookings/scheduled/{id}",
            get(bookings::get_scheduled).delete(bookings::cancel_scheduled),
        )
        .route(
            "/bookings/queue",
            post(bookings::enqueue).get(bookings::queue_status),
        )
        .route("/bookings/start", post(bookings::start))
        // Saved passengers and sealed logins
        .route(
            "/passengers",
            get(passengers::load_passengers).put(passengers::save_passengers),
        )
        .route("/credentials/seal", post(credentials::seal))
        // Runs
        .route("/runs", get(runs::list_runs))
        .route("/runs/{id}", get(runs::get_run))
        .route("/runs/{id}/stop", post(runs::stop_run))
        .route("/runs/{id}/input", post(runs::submit_input))
        .route("/results", get(runs::list_results))
        // Live updates
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
