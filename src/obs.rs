//! Observability helpers for broker flows.
//!
//! Every flow runs inside a span named `calendar_broker.flow` carrying the `flow` and `stage`
//! fields. With the `metrics` feature enabled, each attempt/success/failure also increments the
//! `calendar_broker_flow_total` counter labeled by `flow` + `outcome`.

mod metrics;
mod span;
mod subscriber;

pub use self::{metrics::*, span::*, subscriber::*};

// self
use crate::_prelude::*;

/// Broker flows that emit spans and outcome counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Building the consent redirect.
	Authorize,
	/// Validating the callback and exchanging the code.
	Callback,
	/// Creating a calendar event for a bearer.
	Calendar,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Authorize => "authorize",
			FlowKind::Callback => "callback",
			FlowKind::Calendar => "calendar",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
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
