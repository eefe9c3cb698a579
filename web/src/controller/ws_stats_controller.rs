use axum::extract::State;
use axum::Json;
use realtime::manager::ConnectionStats;
use service::AppState;

/// GET connection counts by client type plus the number of active rooms.
pub async fn stats(State(app_state): State<AppState>) -> Json<ConnectionStats> {
    Json(app_state.realtime_manager.stats())
}
