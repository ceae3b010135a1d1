//! Admin-only maintenance endpoints.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    pub deleted: u64,
}

/// POST /api/v1/admin/sessions/cleanup
///
/// Run the expired-session sweep now instead of waiting for the background job.
pub async fn cleanup_sessions(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> AppResult<Json<DataResponse<CleanupResult>>> {
    let deleted = state.sessions.cleanup_expired().await?;
    tracing::info!(admin_id = admin.user_id, deleted, "Manual session cleanup");
    Ok(Json(DataResponse {
        data: CleanupResult { deleted },
    }))
}
