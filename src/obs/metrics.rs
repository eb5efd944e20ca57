// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"refresh_gate_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records how many queued requests a settled refresh released.
pub fn record_released_queue(len: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("refresh_gate_released_requests").record(len as f64);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = len;
	}
}
