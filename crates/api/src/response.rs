//! Shared response envelope types for API handlers.
//!
//! Successful responses use a `{ "data": ... }` envelope. Errors use
//! `{ "error": ..., "code": ... }` (see [`AppError`](crate::error::AppError)).

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "data": { "message": ... } }` for endpoints with nothing else to return.
#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl DataResponse<MessageBody> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            data: MessageBody {
                message: message.into(),
            },
        }
    }
}
