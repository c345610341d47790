// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	tracing::debug!(flow = kind.as_str(), outcome = outcome.as_str(), "flow outcome");

	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"calendar_broker_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_flow_outcome_without_recorder() {
		record_flow_outcome(FlowKind::Calendar, FlowOutcome::Failure);
	}
}
