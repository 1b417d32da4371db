// ai
//! 🔁 Retry: the "have you tried turning it off and on again" of HTTP.
//!
//! 🎬 *[a request leaves the building. a 503 comes back. the request leaves again.]*
//!
//! [`RetryPolicy`] is a small, reusable policy object: how many attempts, how long to
//! wait between them, and (per call) which errors deserve another shot. It wraps ONE
//! async operation via [`RetryPolicy::run`], so no call site hand-rolls its own loop.
//!
//! 🧠 Knowledge graph:
//! - Backoff curve: `multiplier * 2^(attempt-1)`, floored at `min_delay`, capped at `max_delay`.
//!   With the defaults (1s, 4s, 10s) the waits are 4s, 4s, 4s, 8s across 5 attempts.
//! - Used by: `api_client::ApiClient::request`
//! - Configured by: [`RetryConfig`] (lives here because configs live near the thing they configure)

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// 🔧 Retry knobs as they appear in config. Milliseconds, because TOML has no Duration type
/// and we refuse to parse "4s" by hand.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_multiplier_ms")]
    pub multiplier_ms: u64,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_multiplier_ms() -> u64 {
    1_000
}

fn default_min_delay_ms() -> u64 {
    4_000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            multiplier_ms: default_multiplier_ms(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// 🔁 Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Zero is treated as one.
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            multiplier: Duration::from_millis(config.multiplier_ms),
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// ⏱️ How long to wait after `attempt` (1-based) failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let raw = self.multiplier.saturating_mul(1u32 << exponent);
        // -- floor first, ceiling second: a misconfigured min > max ends up at max
        raw.max(self.min_delay).min(self.max_delay)
    }

    /// 🚀 Run `op` until it succeeds, hits a non-retryable error, or runs out of attempts.
    ///
    /// `op` receives the 1-based attempt number. The last error is returned unchanged on
    /// exhaustion, so the caller decides whether that's fatal or just "no data today".
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && is_retryable(&err) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "⚠️ Attempt {attempt}/{max_attempts} failed: {err}. Retrying in {delay:?}..."
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
