// self
use crate::{
	_prelude::*,
	obs::{OpOutcome, Operation},
};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(operation: Operation, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"github_app_broker_op_total",
			"op" => operation.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, outcome);
	}
}

/// Records a scheduled retry.
///
/// `status` is `None` when the failed attempt never produced a response.
pub fn record_retry(method: &str, attempt: u32, status: Option<u16>, delay: Duration) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			target: "github_app_broker::http",
			method,
			attempt,
			status,
			delay_ms = u64::try_from(delay.whole_milliseconds()).unwrap_or(u64::MAX),
			"Retrying platform request."
		);
	}
	#[cfg(feature = "metrics")]
	{
		let label = status.map_or_else(|| "transport".to_owned(), |code| code.to_string());

		metrics::counter!("github_app_broker_retry_total", "status" => label).increment(1);
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (method, attempt, status, delay);
	}
}
