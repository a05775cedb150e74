//! Retry classification and exponential backoff.
//!
//! The executor owns no policy of its own: it asks a [`RetryStrategy`] whether an attempt's
//! outcome is worth repeating and how long to wait, and tracks progress in a
//! [`BackoffState`].

// self
use crate::_prelude::*;

/// Outcome of one attempt, as seen by a [`RetryStrategy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryInput {
	/// The platform answered with this HTTP status.
	Status(u16),
	/// The request failed below HTTP (connect, TLS, timeout) without a status.
	Transport,
}

/// Policy deciding which failures are retried and how far apart.
pub trait RetryStrategy
where
	Self: Send + Sync,
{
	/// Total attempts allowed, including the first one.
	fn max_attempts(&self) -> u32;

	/// Returns `true` if `input` may be retried.
	fn should_retry(&self, input: RetryInput) -> bool;

	/// Delay before retry number `retry` (1 for the first retry).
	fn delay_for(&self, retry: u32) -> Duration;
}

/// Returns `true` for 5xx, 429 (rate limited), and 408 (request timeout).
pub const fn is_retryable_status(status: u16) -> bool {
	status >= 500 || status == 429 || status == 408
}

/// Exponential backoff over the retryable status classes.
#[derive(Clone, Debug, PartialEq)]
pub struct ExponentialBackoff {
	/// Attempt ceiling, including the first attempt.
	pub max_attempts: u32,
	/// Delay before the first retry.
	pub base_delay: Duration,
	/// Growth factor applied per retry.
	pub multiplier: f64,
	/// Upper bound for any single delay.
	pub max_delay: Duration,
	/// Retry connection-level failures that never produced a status.
	pub retry_transport_errors: bool,
}
impl ExponentialBackoff {
	const DEFAULT_BASE_DELAY: Duration = Duration::seconds(1);
	const DEFAULT_MAX_ATTEMPTS: u32 = 3;
	const DEFAULT_MAX_DELAY: Duration = Duration::seconds(30);
	const DEFAULT_MULTIPLIER: f64 = 2.0;

	/// Overrides the attempt ceiling; zero is treated as one.
	pub fn with_max_attempts(mut self, attempts: u32) -> Self {
		self.max_attempts = attempts.max(1);

		self
	}

	/// Overrides the first retry delay.
	pub fn with_base_delay(mut self, delay: Duration) -> Self {
		self.base_delay = if delay.is_negative() { Duration::ZERO } else { delay };

		self
	}

	/// Overrides the growth factor; values below one are clamped to one.
	pub fn with_multiplier(mut self, multiplier: f64) -> Self {
		self.multiplier = multiplier.max(1.0);

		self
	}

	/// Overrides the per-delay cap.
	pub fn with_max_delay(mut self, delay: Duration) -> Self {
		self.max_delay = delay;

		self
	}

	/// Opts into retrying connection-level failures.
	pub fn with_transport_retries(mut self, enabled: bool) -> Self {
		self.retry_transport_errors = enabled;

		self
	}
}
impl Default for ExponentialBackoff {
	fn default() -> Self {
		Self {
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			base_delay: Self::DEFAULT_BASE_DELAY,
			multiplier: Self::DEFAULT_MULTIPLIER,
			max_delay: Self::DEFAULT_MAX_DELAY,
			retry_transport_errors: false,
		}
	}
}
impl RetryStrategy for ExponentialBackoff {
	fn max_attempts(&self) -> u32 {
		self.max_attempts.max(1)
	}

	fn should_retry(&self, input: RetryInput) -> bool {
		match input {
			RetryInput::Status(status) => is_retryable_status(status),
			RetryInput::Transport => self.retry_transport_errors,
		}
	}

	fn delay_for(&self, retry: u32) -> Duration {
		let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
		let cap = self.max_delay.as_seconds_f64().max(0.0);
		let secs = self.base_delay.as_seconds_f64() * self.multiplier.max(1.0).powi(exponent);

		Duration::saturating_seconds_f64(secs.min(cap).max(0.0))
	}
}

/// `{attempt, delay}` progress of one logical request.
#[derive(Debug)]
pub struct BackoffState<'a, S>
where
	S: ?Sized + RetryStrategy,
{
	strategy: &'a S,
	attempt: u32,
	delay: Duration,
}
impl<'a, S> BackoffState<'a, S>
where
	S: ?Sized + RetryStrategy,
{
	/// Starts before the first attempt.
	pub fn new(strategy: &'a S) -> Self {
		Self { strategy, attempt: 0, delay: Duration::ZERO }
	}

	/// Records the start of another attempt and returns its 1-based number.
	pub fn begin_attempt(&mut self) -> u32 {
		self.attempt += 1;

		self.attempt
	}

	/// Attempts started so far.
	pub fn attempt(&self) -> u32 {
		self.attempt
	}

	/// Delay scheduled before the current attempt.
	pub fn delay(&self) -> Duration {
		self.delay
	}

	/// Schedules the next retry, or returns `None` once the attempt ceiling is reached.
	pub fn next_delay(&mut self) -> Option<Duration> {
		if self.attempt >= self.strategy.max_attempts() {
			return None;
		}

		self.delay = self.strategy.delay_for(self.attempt);

		Some(self.delay)
	}
}
