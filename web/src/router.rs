use crate::controller::{health_check_controller, ws_stats_controller};
use crate::ws::handler::ws_handler;
use crate::AppState;
use axum::{routing::get, Router};

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(ws_routes(app_state))
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn ws_routes(app_state: AppState) -> Router {
    Router::new()
        // Static segment wins over the `:client_type` capture.
        .route("/ws/stats", get(ws_stats_controller::stats))
        .route("/ws/:client_type", get(ws_handler))
        .with_state(app_state)
}
