// self
use crate::{
	obs::{FlowKind, FlowOutcome},
	session::SignOutReason,
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bearer_refresh_flow_total",
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

/// Records a forced sign-out via the global metrics recorder (when enabled).
pub fn record_sign_out(reason: SignOutReason) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("bearer_refresh_sign_out_total", "reason" => reason.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = reason;
	}
}
