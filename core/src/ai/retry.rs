use super::TranslationError;
use log::warn;
use reqwest::StatusCode;
use std::future::Future;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

/// Policy parameters for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay used before the second attempt; doubles for each later one.
    pub base_delay: Duration,
    /// Upper bound for any single delay, server hints included.
    pub max_delay: Duration,
    /// Total attempts, the first one included.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(60), 3)
    }
}

/// Decision made by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub delay_ms: u64,
    pub used_hint: bool,
}

impl RetryDecision {
    const fn no_retry() -> Self {
        Self {
            should_retry: false,
            delay_ms: 0,
            used_hint: false,
        }
    }

    fn retry_with(delay: Duration, used_hint: bool, max_delay: Duration) -> Self {
        let capped = delay.min(max_delay);
        Self {
            should_retry: true,
            delay_ms: u64::try_from(capped.as_millis()).unwrap_or(u64::MAX),
            used_hint,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Decide whether to try again after `attempts_made` failed attempts.
pub fn evaluate_retry(
    error: &TranslationError,
    policy: &RetryPolicy,
    attempts_made: u32,
) -> RetryDecision {
    if attempts_made >= policy.max_attempts || !error.is_transient() {
        return RetryDecision::no_retry();
    }

    let backoff = compute_exponential_backoff(
        policy.base_delay,
        policy.max_delay,
        attempts_made.saturating_sub(1),
    );
    match error.retry_hint() {
        Some(hint) if hint > backoff => RetryDecision::retry_with(hint, true, policy.max_delay),
        _ => RetryDecision::retry_with(backoff, false, policy.max_delay),
    }
}

fn compute_exponential_backoff(base: Duration, max_delay: Duration, retries: u32) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }

    let multiplier = 1u32.checked_shl(retries).unwrap_or(u32::MAX);
    base.saturating_mul(multiplier).min(max_delay)
}

/// Run `operation` until it succeeds, fails permanently, runs out of
/// attempts, or `cancel` fires.
///
/// Each attempt receives a child of `cancel` that is also cancelled when the
/// attempt exceeds `attempt_timeout`. The timeout bounds a single attempt,
/// never the whole loop.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    attempt_timeout: Option<Duration>,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, TranslationError>
where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, TranslationError>>,
{
    let mut attempts = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(TranslationError::Cancelled);
        }
        attempts += 1;

        let attempt_token = cancel.child_token();
        let outcome = run_attempt(
            operation(attempt_token.clone()),
            attempt_timeout,
            &attempt_token,
        )
        .await;

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(_) if cancel.is_cancelled() => return Err(TranslationError::Cancelled),
            Err(err) => err,
        };

        let decision = evaluate_retry(&err, policy, attempts);
        if !decision.should_retry {
            return Err(if err.is_transient() {
                TranslationError::RetriesExhausted {
                    attempts,
                    source: Box::new(err),
                }
            } else {
                err
            });
        }

        warn!(
            "translation attempt {attempts}/{} failed, retrying in {}ms{}: {err}",
            policy.max_attempts,
            decision.delay_ms,
            if decision.used_hint { " (server hint)" } else { "" }
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
            _ = tokio::time::sleep(decision.delay()) => {}
        }
    }
}

async fn run_attempt<T, Fut>(
    attempt: Fut,
    timeout: Option<Duration>,
    token: &CancellationToken,
) -> Result<T, TranslationError>
where
    Fut: Future<Output = Result<T, TranslationError>>,
{
    let bounded = async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(result) => result,
                Err(_) => {
                    token.cancel();
                    Err(TranslationError::Timeout(limit))
                }
            },
            None => attempt.await,
        }
    };

    // A finished attempt wins over a cancellation that raced it.
    tokio::select! {
        biased;
        result = bounded => result,
        _ = token.cancelled() => Err(TranslationError::Cancelled),
    }
}

/// Parses the value of an HTTP `Retry-After` header.
///
/// Returns `None` when parsing fails.
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(instant) = httpdate::parse_http_date(trimmed) {
        return Some(instant.duration_since(now).unwrap_or(Duration::ZERO));
    }

    None
}

/// Parses the `retryDelay` string of Gemini's `RetryInfo` error detail, e.g. `"1.5s"`.
pub fn parse_gemini_retry_delay(value: &str) -> Option<Duration> {
    let seconds = value.trim().strip_suffix('s')?.parse::<f64>().ok()?;
    if !seconds.is_finite() || seconds.is_sign_negative() {
        return None;
    }
    Some(Duration::from_secs_f64(seconds))
}
