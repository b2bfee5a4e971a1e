//! `Retry-After` header parsing.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc2822;

/// Parse a `Retry-After` hint: delta seconds (fractions allowed) or an HTTP-date.
///
/// Dates in the past yield a zero delay. Unparsable or unrepresentable values
/// yield `None`.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).ok();
    }

    let at = OffsetDateTime::parse(value, &Rfc2822).ok()?;
    let delta = at - OffsetDateTime::now_utc();
    Some(delta.try_into().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn with_retry_after(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_seconds() {
        assert_eq!(
            parse_retry_after(&with_retry_after("5")),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            parse_retry_after(&with_retry_after(" 1.5 ")),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_missing_and_invalid() {
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
        assert_eq!(parse_retry_after(&with_retry_after("soon")), None);
        assert_eq!(parse_retry_after(&with_retry_after("-3")), None);
        assert_eq!(parse_retry_after(&with_retry_after("NaN")), None);
    }

    #[test]
    fn test_out_of_range_seconds_ignored() {
        assert_eq!(parse_retry_after(&with_retry_after("1e20")), None);
        assert_eq!(parse_retry_after(&with_retry_after("inf")), None);
    }

    #[test]
    fn test_http_date_in_future() {
        let delay = parse_retry_after(&with_retry_after("Wed, 21 Oct 2099 07:28:00 GMT")).unwrap();
        assert!(delay > Duration::from_secs(60 * 60 * 24 * 365 * 50));
    }

    #[test]
    fn test_http_date_relative_to_now() {
        let at = OffsetDateTime::now_utc() + time::Duration::seconds(120);
        let value = at.format(&Rfc2822).unwrap();

        let delay = parse_retry_after(&with_retry_after(&value)).unwrap();
        assert!(delay <= Duration::from_secs(120));
        assert!(delay >= Duration::from_secs(115));
    }

    #[test]
    fn test_http_date_in_past_is_zero() {
        assert_eq!(
            parse_retry_after(&with_retry_after("Sun, 06 Nov 1994 08:49:37 GMT")),
            Some(Duration::ZERO)
        );
    }
}
