/// Domain errors shared across crates.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// `id` is whatever identifies the entity to its owner, e.g. an opaque session id.
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),
}
