//! Domain building blocks shared by the persistence and HTTP layers.
//!
//! Nothing in this crate performs I/O.

pub mod client;
pub mod error;
pub mod lifetime;
pub mod roles;
pub mod session_state;
pub mod types;
