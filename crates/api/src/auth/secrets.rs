//! Random identifiers and one-way token digests.
//!
//! Session ids and email tokens are 256-bit values from the thread-local
//! CSPRNG, encoded as unpadded base64url. Email tokens are only ever stored
//! as their SHA-256 digest so a database leak does not expose usable links.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Bytes of entropy in every generated identifier.
const SECRET_BYTES: usize = 32;

/// Generate a 256-bit opaque value encoded as base64url (43 chars).
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a new externally-visible session identifier.
///
/// Independent of the row's surrogate key, so it cannot be derived from it.
pub fn generate_session_id() -> String {
    generate_opaque_token()
}

/// Compute the SHA-256 hex digest of a token.
pub fn hash_token(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    format!("{hash:x}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn session_ids_are_unique_and_url_safe() {
        let ids: HashSet<String> = (0..256).map(|_| generate_session_id()).collect();
        assert_eq!(ids.len(), 256);
        for id in &ids {
            assert_eq!(id.len(), 43);
            assert!(id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn hash_is_stable_hex() {
        let token = generate_opaque_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_eq!(hash_token(&token).len(), 64);
        assert_ne!(hash_token("a"), hash_token("b"));
    }
}
