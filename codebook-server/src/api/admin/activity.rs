//! Audit log viewer

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use shared::error::AppError;
use shared::models::ActivityLogEntry;

use crate::api::ApiResult;
use crate::audit::AuditQuery;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityParams {
    pub entity_type: Option<String>,
    pub action: Option<String>,
    pub limit: Option<usize>,
}

/// Parse a snake_case enum value from a query string
fn parse_filter<T: DeserializeOwned>(name: &str, raw: Option<String>) -> Result<Option<T>, AppError> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    serde_json::from_value(serde_json::Value::String(raw.trim().to_ascii_lowercase()))
        .map(Some)
        .map_err(|_| AppError::validation(format!("Unknown {name}: {raw}")))
}

/// GET /admin/activity-logs?entityType=&action=&limit=
pub async fn list_activity(
    State(state): State<AppState>,
    Query(params): Query<ActivityParams>,
) -> ApiResult<Vec<ActivityLogEntry>> {
    let query = AuditQuery {
        entity_type: parse_filter("entityType", params.entity_type)?,
        action: parse_filter("action", params.action)?,
        limit: params.limit,
    };
    Ok(Json(state.audit.query(query).await?))
}
