//! Request handlers.
//!
//! Handlers translate HTTP into calls on [`AuthService`](crate::auth::service::AuthService)
//! or [`SessionManager`](crate::auth::session_manager::SessionManager) and map
//! failures via [`AppError`](crate::error::AppError).

pub mod admin;
pub mod auth;
pub mod health;
pub mod oauth;
pub mod sessions;
