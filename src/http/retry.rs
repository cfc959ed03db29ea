//! Backoff timing for rate-limited requests.

use std::time::Duration;

use async_trait::async_trait;

use super::response::ResponseResult;

/// Added on top of `Retry-After` so the retry lands after the server's
/// window has rolled over.
pub const RATE_LIMIT_MARGIN_SECS: u64 = 3;

/// Pauses the current task. Abstracted so backoff can be observed in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Reads `Retry-After` as whole seconds. A missing or non-numeric value
/// counts as zero.
pub fn retry_after_secs(response: &ResponseResult) -> u64 {
    response
        .header("retry-after")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

/// How long to wait before re-issuing a rate-limited request. Saturates at
/// `u64::MAX` seconds.
pub fn rate_limit_delay(response: &ResponseResult) -> Duration {
    Duration::from_secs(retry_after_secs(response).saturating_add(RATE_LIMIT_MARGIN_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn limited(retry_after: Option<&str>) -> ResponseResult {
        let mut headers = BTreeMap::new();
        if let Some(value) = retry_after {
            headers.insert("retry-after".to_string(), value.to_string());
        }
        ResponseResult::from_parts(429, String::new(), headers)
    }

    #[test]
    fn test_rate_limit_delay_adds_margin() {
        assert_eq!(rate_limit_delay(&limited(Some("5"))), Duration::from_secs(8));
    }

    #[test]
    fn test_rate_limit_delay_trims_whitespace() {
        assert_eq!(rate_limit_delay(&limited(Some(" 2 "))), Duration::from_secs(5));
    }

    #[test]
    fn test_rate_limit_delay_without_header() {
        assert_eq!(rate_limit_delay(&limited(None)), Duration::from_secs(3));
    }

    #[test]
    fn test_rate_limit_delay_with_http_date() {
        let response = limited(Some("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after_secs(&response), 0);
        assert_eq!(rate_limit_delay(&response), Duration::from_secs(3));
    }

    #[test]
    fn test_rate_limit_delay_saturates() {
        let max = u64::MAX.to_string();
        let response = limited(Some(max.as_str()));
        assert_eq!(retry_after_secs(&response), u64::MAX);
        assert_eq!(rate_limit_delay(&response), Duration::from_secs(u64::MAX));

        let near_max = (u64::MAX - 1).to_string();
        let response = limited(Some(near_max.as_str()));
        assert_eq!(rate_limit_delay(&response), Duration::from_secs(u64::MAX));
    }
}
