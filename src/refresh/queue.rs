//! Ordered parking lot for requests waiting on an in-flight renewal.

// crates.io
use tokio::sync::oneshot;
// self
use crate::{_prelude::*, auth::AccessToken, transport::ApiRequest};

/// Value a parked request is released with: its descriptor carrying the renewed bearer
/// credential, or the shared renewal failure.
pub type Release = Result<ApiRequest, Arc<Error>>;

/// One caller's request that failed on an expired token while a renewal was in flight.
#[derive(Debug)]
pub struct PendingRequest {
	/// Enqueue order, unique per coordinator.
	pub ticket: u64,
	/// Descriptor of the original request, replayed once released.
	pub request: ApiRequest,
	completion: oneshot::Sender<Release>,
}
impl PendingRequest {
	/// Parks `request` and returns the receiver its caller awaits.
	pub fn new(ticket: u64, request: ApiRequest) -> (Self, oneshot::Receiver<Release>) {
		let (completion, receiver) = oneshot::channel();

		(Self { ticket, request, completion }, receiver)
	}

	/// Releases the caller with its request re-credentialed for `token`.
	pub fn resolve(self, token: &AccessToken) {
		let Self { mut request, completion, .. } = self;
		let release = match request.set_bearer(token) {
			Ok(()) => Ok(request),
			Err(e) => Err(Arc::new(Error::from(e))),
		};

		// The caller may have stopped waiting.
		let _ = completion.send(release);
	}

	/// Releases the caller with the shared renewal failure.
	pub fn reject(self, error: Arc<Error>) {
		let _ = self.completion.send(Err(error));
	}
}

/// FIFO collection of [`PendingRequest`]s, drained exactly once per renewal attempt.
#[derive(Debug, Default)]
pub struct RequestQueue {
	pending: VecDeque<PendingRequest>,
}
impl RequestQueue {
	/// Appends a parked request.
	pub fn push(&mut self, pending: PendingRequest) {
		self.pending.push_back(pending);
	}

	/// Number of parked requests.
	pub fn len(&self) -> usize {
		self.pending.len()
	}

	/// Returns `true` when nothing is parked.
	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	/// Releases every parked request with `token`, in enqueue order, and returns their tickets.
	pub fn resolve_all(&mut self, token: &AccessToken) -> Vec<u64> {
		self.pending
			.drain(..)
			.map(|pending| {
				let ticket = pending.ticket;

				pending.resolve(token);

				ticket
			})
			.collect()
	}

	/// Rejects every parked request with `error`, in enqueue order, and returns their tickets.
	pub fn reject_all(&mut self, error: &Arc<Error>) -> Vec<u64> {
		self.pending
			.drain(..)
			.map(|pending| {
				let ticket = pending.ticket;

				pending.reject(error.clone());

				ticket
			})
			.collect()
	}

	/// Drops every parked request without a result; their callers observe abandonment.
	pub fn abandon(&mut self) -> usize {
		let count = self.pending.len();

		self.pending.clear();

		count
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::header::AUTHORIZATION;
	// self
	use super::*;
	use crate::error::AuthDeniedReason;

	fn park(queue: &mut RequestQueue, ticket: u64, path: &str) -> oneshot::Receiver<Release> {
		let (pending, receiver) = PendingRequest::new(ticket, ApiRequest::get(path));

		queue.push(pending);

		receiver
	}

	#[test]
	fn resolve_drains_in_enqueue_order_with_fresh_bearer() {
		let mut queue = RequestQueue::default();
		let mut receivers = vec![
			park(&mut queue, 7, "/exercises"),
			park(&mut queue, 8, "/history"),
			park(&mut queue, 9, "/users/me"),
		];
		let token = AccessToken::new("fresh").expect("Access token fixture should be valid.");

		assert_eq!(queue.resolve_all(&token), vec![7, 8, 9]);
		assert!(queue.is_empty());

		let paths = receivers
			.iter_mut()
			.map(|receiver| {
				let request = receiver
					.try_recv()
					.expect("Every parked request must be released.")
					.expect("Successful renewal must release the request.");

				assert_eq!(
					request.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
					Some("Bearer fresh")
				);

				request.path
			})
			.collect::<Vec<_>>();

		assert_eq!(paths, ["/exercises", "/history", "/users/me"]);
	}

	#[test]
	fn reject_shares_one_error_across_waiters() {
		let mut queue = RequestQueue::default();
		let mut first = park(&mut queue, 1, "/a");
		let mut second = park(&mut queue, 2, "/b");
		let error = Arc::new(Error::AuthDenied {
			reason: AuthDeniedReason::RefreshRejected,
			message: None,
		});

		assert_eq!(queue.reject_all(&error), vec![1, 2]);

		let first = first.try_recv().expect("First waiter must be released.").expect_err("Rejected.");
		let second =
			second.try_recv().expect("Second waiter must be released.").expect_err("Rejected.");

		assert!(Arc::ptr_eq(&first, &second));
		assert!(Arc::ptr_eq(&first, &error));
	}

	#[test]
	fn abandon_closes_every_channel() {
		let mut queue = RequestQueue::default();
		let mut receiver = park(&mut queue, 1, "/a");

		assert_eq!(queue.abandon(), 1);
		assert!(matches!(receiver.try_recv(), Err(oneshot::error::TryRecvError::Closed)));
	}

	#[test]
	fn release_to_a_dropped_caller_is_ignored() {
		let mut queue = RequestQueue::default();

		drop(park(&mut queue, 1, "/a"));

		let token = AccessToken::new("fresh").expect("Access token fixture should be valid.");

		assert_eq!(queue.resolve_all(&token), vec![1]);
	}
}
