//! Parsing of human-written lifetimes such as `"7d"`, `"24h"` or `"15m"`.
//!
//! Token lifetimes come from configuration as short strings. A value that
//! cannot be parsed never aborts startup: the caller-supplied fallback is
//! used instead, so a typo in `REFRESH_TOKEN_EXPIRES_IN` yields the 7-day
//! default rather than sessions that never expire or expire immediately.

use chrono::Duration;

/// Refresh-token (session) lifetime used when the configured value is unusable.
pub const DEFAULT_REFRESH_LIFETIME_DAYS: i64 = 7;

/// Access-token lifetime used when the configured value is unusable.
pub const DEFAULT_ACCESS_TTL_MINS: i64 = 15;

/// The 7-day refresh lifetime fallback.
pub fn default_refresh_lifetime() -> Duration {
    Duration::days(DEFAULT_REFRESH_LIFETIME_DAYS)
}

/// The 15-minute access-token fallback.
pub fn default_access_ttl() -> Duration {
    Duration::minutes(DEFAULT_ACCESS_TTL_MINS)
}

/// Parse `<n>d`, `<n>h` or `<n>m` into a [`Duration`].
///
/// Surrounding whitespace is ignored and the unit is case-insensitive.
/// Anything else (no digits, unknown unit, zero, overflow) returns `fallback`.
pub fn parse_lifetime(input: &str, fallback: Duration) -> Duration {
    let trimmed = input.trim();
    let Some(unit) = trimmed.chars().last() else {
        return fallback;
    };
    let digits = &trimmed[..trimmed.len() - unit.len_utf8()];

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return fallback;
    }
    let Ok(amount) = digits.parse::<i64>() else {
        return fallback;
    };
    if amount == 0 {
        return fallback;
    }

    let parsed = match unit.to_ascii_lowercase() {
        'd' => Duration::try_days(amount),
        'h' => Duration::try_hours(amount),
        'm' => Duration::try_minutes(amount),
        _ => None,
    };
    parsed.unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_days() {
        assert_eq!(
            parse_lifetime("7d", default_access_ttl()),
            Duration::days(7)
        );
        assert_eq!(
            parse_lifetime("30d", default_access_ttl()),
            Duration::days(30)
        );
    }

    #[test]
    fn parses_hours_and_minutes() {
        assert_eq!(
            parse_lifetime("24h", default_refresh_lifetime()),
            Duration::hours(24)
        );
        assert_eq!(
            parse_lifetime("15m", default_refresh_lifetime()),
            Duration::minutes(15)
        );
    }

    #[test]
    fn trims_and_ignores_unit_case() {
        assert_eq!(
            parse_lifetime("  12H ", default_refresh_lifetime()),
            Duration::hours(12)
        );
    }

    #[test]
    fn unrecognized_formats_fall_back() {
        let fallback = default_refresh_lifetime();
        for input in ["", "d", "7", "7w", "seven days", "-1d", "1.5h", "0d", "7 d"] {
            assert_eq!(
                parse_lifetime(input, fallback),
                fallback,
                "{input:?} should fall back"
            );
        }
    }

    #[test]
    fn overflowing_amount_falls_back() {
        let fallback = default_refresh_lifetime();
        assert_eq!(parse_lifetime("99999999999999999d", fallback), fallback);
    }
}
