use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Suspends the calling thread between rate-limited attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Reads the `retry-after` header as a (possibly fractional) number of seconds.
///
/// HTTP-date values are not understood and yield `None`, as do zero,
/// negative and non-finite values.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    parse_seconds(raw)
}

fn parse_seconds(raw: &str) -> Option<Duration> {
    let seconds: f64 = raw.trim().parse().ok()?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}

/// Delay to wait before retrying the same model, or `None` to move on.
pub fn retry_delay(retry_after: Option<Duration>, max_wait: Duration) -> Option<Duration> {
    let delay = retry_after?.min(max_wait);
    (!delay.is_zero()).then_some(delay)
}

#[cfg(test)]
mod tests {
    use super::{parse_retry_after, parse_seconds, retry_delay};
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
    use std::time::Duration;

    #[test]
    fn retry_after_accepts_whole_and_fractional_seconds() {
        assert_eq!(parse_seconds("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_seconds(" 7.5 "), Some(Duration::from_millis(7_500)));
    }

    #[test]
    fn retry_after_rejects_zero_and_garbage() {
        assert_eq!(parse_seconds("0"), None);
        assert_eq!(parse_seconds("-3"), None);
        assert_eq!(parse_seconds("NaN"), None);
        assert_eq!(parse_seconds("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn retry_after_reads_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));
    }

    #[test]
    fn delay_is_capped_by_max_wait() {
        let max_wait = Duration::from_secs(45);
        assert_eq!(
            retry_delay(Some(Duration::from_secs(5)), max_wait),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            retry_delay(Some(Duration::from_secs(120)), max_wait),
            Some(max_wait)
        );
    }

    #[test]
    fn missing_or_zero_delay_means_no_retry() {
        assert_eq!(retry_delay(None, Duration::from_secs(45)), None);
        assert_eq!(retry_delay(Some(Duration::ZERO), Duration::from_secs(45)), None);
        assert_eq!(retry_delay(Some(Duration::from_secs(5)), Duration::ZERO), None);
    }
}
