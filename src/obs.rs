//! Optional observability helpers for broker operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `github_app_broker.op` with the `op`
//!   (operation) and `stage` (call site) fields, plus a `debug` event before every retry.
//! - Enable `metrics` to increment the `github_app_broker_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`, and `github_app_broker_retry_total`
//!   for every scheduled retry, labeled by `status`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

pub use crate::error::Operation;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a broker operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

