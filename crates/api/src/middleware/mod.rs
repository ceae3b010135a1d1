//! Request extractors.
//!
//! - [`client::ClientContext`] -- client type, user agent and IP of the caller.
//! - [`auth::AuthUser`] -- the authenticated user, from cookie or Bearer token.
//! - [`rbac::RequireAdmin`] -- requires the `admin` role.

pub mod auth;
pub mod client;
pub mod rbac;
