//! Renewal counters shared by the coordinator and the client.

// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for renewal attempts and their effects.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	joined: AtomicU64,
	sign_outs: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of renewal network calls issued.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful renewals.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed renewals (including timeouts).
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that joined a renewal already in flight.
	pub fn joined(&self) -> u64 {
		self.joined.load(Ordering::Relaxed)
	}

	/// Returns the number of forced sign-outs.
	pub fn sign_outs(&self) -> u64 {
		self.sign_outs.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_joined(&self) {
		self.joined.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_sign_out(&self) {
		self.sign_outs.fetch_add(1, Ordering::Relaxed);
	}
}
