//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod session_repo;
pub mod user_repo;
pub mod verification_token_repo;

pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
pub use verification_token_repo::VerificationTokenRepo;
