//! Token cookies for browser clients.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};

pub const ACCESS_COOKIE_NAME: &str = "access_token";
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
/// Short-lived CSRF state for the Google OAuth round trip.
pub const OAUTH_STATE_COOKIE_NAME: &str = "oauth_state";

/// Lifetime of the `oauth_state` cookie.
pub const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

/// Attributes shared by every cookie this service sets.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    /// Production: `Secure; SameSite=None`. Otherwise `SameSite=Lax`.
    pub secure: bool,
}

impl CookiePolicy {
    pub fn build(&self, name: &str, value: &str, max_age_secs: i64) -> String {
        let mut cookie = format!("{name}={value}; HttpOnly; Path=/; Max-Age={max_age_secs}");
        if self.secure {
            cookie.push_str("; Secure; SameSite=None");
        } else {
            cookie.push_str("; SameSite=Lax");
        }
        cookie
    }

    /// An expired, empty cookie that makes the browser drop `name`.
    pub fn clear(&self, name: &str) -> String {
        self.build(name, "", 0)
    }

    /// Append `Set-Cookie` for both token cookies.
    pub fn set_tokens(
        &self,
        headers: &mut HeaderMap,
        access_token: &str,
        access_max_age: i64,
        refresh_token: &str,
        refresh_max_age: i64,
    ) {
        append(headers, self.build(ACCESS_COOKIE_NAME, access_token, access_max_age));
        append(headers, self.build(REFRESH_COOKIE_NAME, refresh_token, refresh_max_age));
    }

    /// Append `Set-Cookie` headers clearing both token cookies.
    pub fn clear_tokens(&self, headers: &mut HeaderMap) {
        append(headers, self.clear(ACCESS_COOKIE_NAME));
        append(headers, self.clear(REFRESH_COOKIE_NAME));
    }
}

pub fn append(headers: &mut HeaderMap, cookie: String) {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "Refusing to emit invalid Set-Cookie header"),
    }
}

/// Read a cookie value from the request's `Cookie` headers.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_cookies_are_lax() {
        let cookie = CookiePolicy { secure: false }.build(ACCESS_COOKIE_NAME, "abc", 900);
        assert_eq!(cookie, "access_token=abc; HttpOnly; Path=/; Max-Age=900; SameSite=Lax");
    }

    #[test]
    fn production_cookies_are_secure_cross_site() {
        let cookie = CookiePolicy { secure: true }.build(REFRESH_COOKIE_NAME, "r", 604800);
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("Max-Age=604800"));
    }

    #[test]
    fn clearing_sets_zero_max_age() {
        let mut headers = HeaderMap::new();
        CookiePolicy { secure: false }.clear_tokens(&mut headers);
        let values: Vec<_> = headers.get_all(SET_COOKIE).iter().collect();
        assert_eq!(values.len(), 2);
        assert!(values
            .iter()
            .all(|v| v.to_str().unwrap().contains("Max-Age=0")));
    }

    #[test]
    fn reads_cookie_among_several() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; refresh_token=tok.en; access_token=a"),
        );
        assert_eq!(get_cookie(&headers, REFRESH_COOKIE_NAME), Some("tok.en"));
        assert_eq!(get_cookie(&headers, ACCESS_COOKIE_NAME), Some("a"));
        assert_eq!(get_cookie(&headers, OAUTH_STATE_COOKIE_NAME), None);
    }

    #[test]
    fn empty_cookie_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("refresh_token="));
        assert_eq!(get_cookie(&headers, REFRESH_COOKIE_NAME), None);
    }
}
