//! Handlers for the caller's own sessions (`/auth/sessions`).

use agora_core::error::CoreError;
use agora_core::types::Timestamp;
use agora_db::models::session::Session;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::handlers::auth::RevokedCount;
use crate::middleware::auth::AuthUser;
use crate::response::{DataResponse, MessageBody};
use crate::state::AppState;

/// A session as shown to its owner.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: Timestamp,
    pub last_used_at: Timestamp,
    pub expires_at: Timestamp,
    /// `true` for the session behind the caller's access token.
    pub current: bool,
}

impl SessionInfo {
    fn new(session: Session, current_session_id: &str) -> Self {
        Self {
            current: session.session_id == current_session_id,
            session_id: session.session_id,
            user_agent: session.user_agent,
            ip_address: session.ip_address,
            created_at: session.created_at,
            last_used_at: session.last_used_at,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeSessionsRequest {
    pub session_ids: Vec<String>,
}

/// GET /api/v1/auth/sessions
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<Vec<SessionInfo>>>> {
    let sessions = state.auth.list_sessions(user.user_id).await?;
    let data = sessions
        .into_iter()
        .map(|s| SessionInfo::new(s, &user.session_id))
        .collect();
    Ok(Json(DataResponse { data }))
}

/// DELETE /api/v1/auth/sessions/{session_id}
///
/// 404 unless the session belongs to the caller and is still active.
pub async fn revoke_one(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<String>,
) -> AppResult<Json<DataResponse<MessageBody>>> {
    let revoked = state
        .auth
        .revoke_sessions(user.user_id, std::slice::from_ref(&session_id))
        .await?;
    if revoked == 0 {
        return Err(CoreError::NotFound {
            entity: "Session",
            id: session_id,
        }
        .into());
    }
    Ok(Json(DataResponse::message("Session revoked")))
}

/// POST /api/v1/auth/sessions/revoke
pub async fn revoke_many(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<RevokeSessionsRequest>,
) -> AppResult<Json<DataResponse<RevokedCount>>> {
    let revoked = state
        .auth
        .revoke_sessions(user.user_id, &input.session_ids)
        .await?;
    Ok(Json(DataResponse {
        data: RevokedCount { revoked },
    }))
}
