use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

const MAX_ATTEMPTS: usize = 5;
const BASE_DELAY: Duration = Duration::from_secs(2);
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Error reasons Google APIs use for throttling, usually on a 403.
const THROTTLE_REASONS: &[&str] = &[
    "ratelimitexceeded",
    "userratelimitexceeded",
    "dailylimitexceeded",
    "quotaexceeded",
    "resource_exhausted",
];

/// Retry budget and delay for one request against a rate-limited service.
#[derive(Debug)]
pub(crate) struct Backoff {
    service: &'static str,
    attempt: usize,
    delay: Duration,
}

impl Backoff {
    pub(crate) fn new(service: &'static str) -> Self {
        Self {
            service,
            attempt: 0,
            delay: BASE_DELAY,
        }
    }

    pub(crate) fn start_attempt(&mut self) -> usize {
        self.attempt += 1;
        self.attempt
    }

    pub(crate) fn can_retry(&self) -> bool {
        self.attempt < MAX_ATTEMPTS
    }

    /// The longer of the current delay and the server's `Retry-After`,
    /// never more than the cap.
    fn wait_time(&self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) if hint > self.delay => hint.min(MAX_DELAY),
            _ => self.delay,
        }
    }

    pub(crate) async fn wait(&mut self, retry_after: Option<Duration>) {
        let wait = self.wait_time(retry_after);
        warn!(
            "{} rate limited; retrying in {:.1}s (attempt {}/{})",
            self.service,
            wait.as_secs_f32(),
            self.attempt,
            MAX_ATTEMPTS
        );
        sleep(wait).await;
        self.advance();
    }

    fn advance(&mut self) {
        self.delay = self.delay.saturating_mul(2).clamp(BASE_DELAY, MAX_DELAY);
    }
}

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => true,
        StatusCode::FORBIDDEN => {
            let lower = body.to_lowercase();
            THROTTLE_REASONS.iter().any(|reason| lower.contains(reason))
        }
        _ => false,
    }
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn detects_throttling() {
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_rate_limited(StatusCode::SERVICE_UNAVAILABLE, ""));
        assert!(is_rate_limited(
            StatusCode::FORBIDDEN,
            r#"{"error":{"errors":[{"reason":"rateLimitExceeded"}]}}"#
        ));
        assert!(!is_rate_limited(
            StatusCode::FORBIDDEN,
            r#"{"error":{"errors":[{"reason":"accessNotConfigured"}]}}"#
        ));
        assert!(!is_rate_limited(StatusCode::BAD_REQUEST, "quotaExceeded"));
    }

    #[test]
    fn budget_allows_five_attempts() {
        let mut backoff = Backoff::new("test");
        for _ in 0..4 {
            backoff.start_attempt();
            assert!(backoff.can_retry());
        }
        assert_eq!(backoff.start_attempt(), 5);
        assert!(!backoff.can_retry());
    }

    #[test]
    fn wait_honours_longer_retry_after_up_to_cap() {
        let backoff = Backoff::new("test");
        assert_eq!(backoff.wait_time(None), BASE_DELAY);
        assert_eq!(backoff.wait_time(Some(Duration::from_secs(1))), BASE_DELAY);
        assert_eq!(
            backoff.wait_time(Some(Duration::from_secs(9))),
            Duration::from_secs(9)
        );
        assert_eq!(backoff.wait_time(Some(Duration::from_secs(600))), MAX_DELAY);
    }

    #[test]
    fn delay_doubles_and_caps() {
        let mut backoff = Backoff::new("test");
        let mut seen = Vec::new();
        for _ in 0..6 {
            backoff.advance();
            seen.push(backoff.delay.as_secs());
        }
        assert_eq!(seen, vec![4, 8, 16, 32, 60, 60]);
    }

    #[test]
    fn parses_numeric_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }
}
