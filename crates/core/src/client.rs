//! Client-type discrimination for token delivery.
//!
//! Browsers receive tokens as HTTP-only cookies; every other client (mobile
//! apps, CLIs, server-to-server) receives them in the JSON body and sends
//! the access token as a bearer header.

/// Request header carrying the client type.
pub const CLIENT_TYPE_HEADER: &str = "x-client-type";

/// Query parameter accepted when the header cannot be set (e.g. redirects).
pub const CLIENT_TYPE_QUERY_PARAM: &str = "client_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    /// Browser client: cookie delivery and extraction.
    Web,
    /// Anything else: bearer header and JSON body delivery.
    #[default]
    Other,
}

impl ClientType {
    /// Only the exact value `web` (case-insensitive, trimmed) selects cookies.
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("web") => ClientType::Web,
            _ => ClientType::Other,
        }
    }

    pub fn uses_cookies(self) -> bool {
        self == ClientType::Web
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_selects_cookies() {
        assert_eq!(ClientType::from_value(Some("web")), ClientType::Web);
        assert_eq!(ClientType::from_value(Some(" WEB ")), ClientType::Web);
        assert!(ClientType::Web.uses_cookies());
    }

    #[test]
    fn anything_else_is_bearer() {
        for value in [None, Some(""), Some("mobile"), Some("ios"), Some("webview")] {
            assert_eq!(ClientType::from_value(value), ClientType::Other);
        }
        assert!(!ClientType::Other.uses_cookies());
    }
}
