//! Session-lifecycle capability invoked when the client can no longer authenticate.

// self
use crate::{
	_prelude::*,
	obs::{self, flow_warn},
	refresh::RefreshMetrics,
};

/// Tears down the active session.
///
/// Invoked at most once per terminal event: a non-expiry authorization failure, a missing
/// refresh token, or a failed renewal (once for the whole batch of parked requests).
/// Implementations must not block; hand work off to the owning session layer instead.
pub trait SignOutTrigger
where
	Self: Send + Sync,
{
	/// Ends the active session.
	fn sign_out(&self);
}
impl<F> SignOutTrigger for F
where
	F: Fn() + Send + Sync,
{
	fn sign_out(&self) {
		self()
	}
}

/// Why the client forced a sign-out. Used for logs and metrics only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignOutReason {
	/// A request was rejected as unauthorized for a reason other than token expiry.
	Unauthorized,
	/// No refresh token was stored when renewal was needed.
	MissingRefreshToken,
	/// The renewal call failed.
	RefreshFailed,
}
impl SignOutReason {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Unauthorized => "unauthorized",
			Self::MissingRefreshToken => "missing_refresh_token",
			Self::RefreshFailed => "refresh_failed",
		}
	}
}
impl Display for SignOutReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Invokes `trigger` and records the sign-out. The only path through which the client ends a
/// session.
pub(crate) fn force_sign_out(
	trigger: &dyn SignOutTrigger,
	reason: SignOutReason,
	metrics: &RefreshMetrics,
) {
	flow_warn!(reason = reason.as_str(), "Forcing sign-out.");

	metrics.record_sign_out();
	obs::record_sign_out(reason);
	trigger.sign_out();
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[test]
	fn closures_are_sign_out_triggers() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let trigger: Arc<dyn SignOutTrigger> = Arc::new(move || {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		trigger.sign_out();
		trigger.sign_out();

		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn force_sign_out_counts_each_invocation() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let trigger = move || {
			counter.fetch_add(1, Ordering::SeqCst);
		};
		let metrics = RefreshMetrics::default();

		force_sign_out(&trigger, SignOutReason::Unauthorized, &metrics);

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(metrics.sign_outs(), 1);
	}
}
