//! Optional observability helpers for coordinator flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `refresh_gate.flow` with the `flow` and
//!   `stage` fields, plus `warn` events when credential storage misbehaves.
//! - Enable `metrics` to increment the `refresh_gate_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and to record how many requests
//!   each refresh released from the queue.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Coordinator flows observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Bearer token attachment.
	Decorate,
	/// Credential refresh led by the first caller to observe a 401.
	Refresh,
	/// Wait of a caller queued behind an in-flight refresh.
	Queued,
	/// Re-dispatch of requests once a refresh succeeded.
	Replay,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Decorate => "decorate",
			FlowKind::Refresh => "refresh",
			FlowKind::Queued => "queued",
			FlowKind::Replay => "replay",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
