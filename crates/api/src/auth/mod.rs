//! Authentication and session management.
//!
//! - [`codec`] -- JWT access tokens and opaque refresh-token blobs.
//! - [`store`] -- persistence contracts with PostgreSQL and in-memory backends.
//! - [`session_manager`] -- session state machine: create, verify, rotate, revoke.
//! - [`denylist`] -- revoked session ids consulted by the access-token extractor.
//! - [`credentials`] -- password login with account lockout.
//! - [`service`] -- [`AuthService`](service::AuthService), the façade used by handlers.
//! - [`password`], [`secrets`], [`cookies`], [`mailer`], [`oauth`] -- supporting pieces.

pub mod codec;
pub mod cookies;
pub mod credentials;
pub mod denylist;
pub mod error;
pub mod mailer;
pub mod oauth;
pub mod password;
pub mod secrets;
pub mod service;
pub mod session_manager;
pub mod store;
