//! `/monitoring` handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::json;

use warden_alerts::Alert;
use warden_store::ConnectionLogEntry;

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;
use crate::types::{AlertsQuery, LogsQuery, SuppressAlertRequest};

/// Default log page size.
const DEFAULT_LOG_LIMIT: usize = 50;

/// `GET /monitoring/metrics`
///
/// Returns the monitor's latest snapshot, taking an immediate sample
/// when the background task has not produced one yet.
pub async fn metrics(State(state): State<ApiState>) -> ApiResult<Json<serde_json::Value>> {
    let snapshot = match state.monitor.get_metrics() {
        Some(snapshot) => snapshot,
        None => state.monitor.sample_now().await,
    };
    Ok(Json(
        serde_json::to_value(snapshot).map_err(|e| ApiError::Internal(e.to_string()))?,
    ))
}

/// `GET /monitoring/alerts[?since=RFC3339]`
///
/// Active alerts by default; `since` widens the answer to everything
/// (resolved and suppressed included) updated at or after that time.
pub async fn alerts(
    State(state): State<ApiState>,
    Query(query): Query<AlertsQuery>,
) -> Json<serde_json::Value> {
    let manager = state.monitor.alerts();
    match query.since {
        Some(since) => Json(json!({"alerts": manager.all_alerts(since)})),
        None => Json(json!({"alerts": manager.active_alerts()})),
    }
}

/// `POST /monitoring/alerts/{id}/resolve`
pub async fn resolve_alert(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Alert>> {
    let alert = state.monitor.alerts().resolve(&id)?;
    Ok(Json(alert))
}

/// `POST /monitoring/alerts/{id}/suppress`
pub async fn suppress_alert(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<SuppressAlertRequest>,
) -> ApiResult<Json<Alert>> {
    if req.duration_secs == 0 {
        return Err(ApiError::Validation(
            "Suppression duration must be positive".to_string(),
        ));
    }
    let window = chrono::Duration::seconds(req.duration_secs as i64);
    let alert = state.monitor.alerts().suppress(&id, window)?;
    Ok(Json(alert))
}

/// `GET /monitoring/logs?limit=N`
pub async fn logs(
    State(state): State<ApiState>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<ConnectionLogEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    Json(state.store.recent_connections(limit))
}
