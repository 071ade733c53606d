//! Single-flight access-token renewal.
//!
//! [`RefreshCoordinator`] owns the `refreshing` flag and the queue of parked requests. The
//! first request that fails on an expired token leads the renewal; every request failing
//! while that call is outstanding is parked and released, in arrival order, with the same
//! outcome.

pub mod metrics;
pub mod queue;

pub use metrics::RefreshMetrics;
pub use queue::*;

// crates.io
use serde_json::{Map, Value};
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, CredentialCell, RefreshToken},
	classify::{self, Failure},
	config::ClientConfig,
	error::AuthDeniedReason,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, flow_debug, flow_warn},
	session::{self, SignOutReason, SignOutTrigger},
	store::TokenStore,
	transport::{ApiRequest, ApiResponse, HttpTransport},
};

/// Mutable renewal state. The queue is non-empty only while `refreshing` is set.
#[derive(Debug, Default)]
pub struct RefreshState {
	refreshing: bool,
	queue: RequestQueue,
	next_ticket: u64,
	last_drain: Vec<u64>,
}
impl RefreshState {
	/// Returns `true` while a renewal call is outstanding.
	pub fn is_refreshing(&self) -> bool {
		self.refreshing
	}

	/// Number of requests parked behind the outstanding renewal.
	pub fn queued(&self) -> usize {
		self.queue.len()
	}

	/// Tickets released by the most recent drain, in release order.
	pub fn last_drain(&self) -> &[u64] {
		&self.last_drain
	}

	fn park(&mut self, request: ApiRequest) -> oneshot::Receiver<Release> {
		let ticket = self.next_ticket;
		let (pending, receiver) = PendingRequest::new(ticket, request);

		self.next_ticket += 1;
		self.queue.push(pending);

		receiver
	}
}

enum Role {
	Leader(ApiRequest),
	Follower(oneshot::Receiver<Release>),
}

/// Owns the renewal protocol for one client.
pub struct RefreshCoordinator {
	config: Arc<ClientConfig>,
	transport: Arc<dyn HttpTransport>,
	store: Arc<dyn TokenStore>,
	credential: Arc<CredentialCell>,
	state: Mutex<RefreshState>,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator.
	pub fn new(
		config: Arc<ClientConfig>,
		transport: Arc<dyn HttpTransport>,
		store: Arc<dyn TokenStore>,
		credential: Arc<CredentialCell>,
	) -> Self {
		Self {
			config,
			transport,
			store,
			credential,
			state: Mutex::new(RefreshState::default()),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Renewal counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns `true` while a renewal call is outstanding.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().is_refreshing()
	}

	/// Number of requests parked behind the outstanding renewal.
	pub fn queued(&self) -> usize {
		self.state.lock().queued()
	}

	/// Tickets released by the most recent drain, in release order.
	pub fn last_drain(&self) -> Vec<u64> {
		self.state.lock().last_drain().to_vec()
	}

	/// Obtains a renewed credential for `request`, which failed because its access token
	/// expired.
	///
	/// Returns the request with its bearer header overwritten, ready for a single replay.
	/// Starts the renewal call when none is outstanding and joins it otherwise. `sign_out`
	/// fires when no refresh token is stored, and once per failed renewal.
	pub async fn renew(
		&self,
		request: ApiRequest,
		sign_out: &dyn SignOutTrigger,
	) -> Result<ApiRequest> {
		let Some(refresh_token) = self.store.get_refresh_token().await? else {
			session::force_sign_out(sign_out, SignOutReason::MissingRefreshToken, &self.metrics);

			return Err(Error::AuthDenied {
				reason: AuthDeniedReason::MissingRefreshToken,
				message: None,
			});
		};

		match self.join_or_lead(request) {
			Role::Follower(receiver) => match receiver.await {
				Ok(Ok(request)) => Ok(request),
				Ok(Err(e)) => Err(Error::RefreshFailed(e)),
				Err(_) => Err(Error::RefreshAbandoned),
			},
			Role::Leader(request) => {
				let span = FlowSpan::new(FlowKind::Refresh, "refresh.lead");

				span.instrument(self.lead(request, refresh_token, sign_out)).await
			},
		}
	}

	fn join_or_lead(&self, request: ApiRequest) -> Role {
		let mut state = self.state.lock();

		if state.refreshing {
			let receiver = state.park(request);

			flow_debug!(queued = state.queued(), "Joined the outstanding renewal.");

			self.metrics.record_joined();
			obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Queued);

			return Role::Follower(receiver);
		}

		state.refreshing = true;

		Role::Leader(request)
	}

	async fn lead(
		&self,
		mut request: ApiRequest,
		refresh_token: RefreshToken,
		sign_out: &dyn SignOutTrigger,
	) -> Result<ApiRequest> {
		let mut guard = SettleGuard { state: &self.state, armed: true };

		self.metrics.record_attempt();
		obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Attempt);

		let outcome = match self.exchange(&refresh_token).await {
			Ok(token) => self.install(token).await,
			Err(e) => Err(e),
		};

		match outcome {
			Ok(token) => {
				guard.resolve(&token);

				flow_debug!(token = %token.fingerprint(), "Access token renewed.");

				self.metrics.record_success();
				obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Success);
				request.set_bearer(&token)?;

				Ok(request)
			},
			Err(e) => {
				let error = Arc::new(e);

				guard.reject(&error);

				flow_warn!(error = %error, "Access token renewal failed.");

				self.metrics.record_failure();
				obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Failure);
				session::force_sign_out(sign_out, SignOutReason::RefreshFailed, &self.metrics);

				Err(Error::RefreshFailed(error))
			},
		}
	}

	async fn exchange(&self, refresh_token: &RefreshToken) -> Result<AccessToken> {
		let timeout = self.config.refresh.timeout;

		tokio::time::timeout(timeout.unsigned_abs(), self.call_endpoint(refresh_token))
			.await
			.map_err(|_| Error::RefreshTimeout { after: timeout })?
	}

	// Issued straight on the transport so a renewal failure never re-enters the interceptor.
	async fn call_endpoint(&self, refresh_token: &RefreshToken) -> Result<AccessToken> {
		let endpoint = &self.config.refresh;
		let mut body = Map::new();

		body.insert(endpoint.request_field.clone(), Value::String(refresh_token.expose().into()));

		let request = ApiRequest::post(endpoint.path.as_str())
			.with_json(&body)?
			.resolve(&self.config.base_url)?;
		let response = self.transport.execute(request).await?;

		if let Some(failure) = classify::classify(&self.config, &response) {
			return Err(match failure {
				Failure::AuthExpired { reason } => Error::AuthDenied {
					reason: AuthDeniedReason::RefreshRejected,
					message: Some(reason),
				},
				Failure::AuthDenied { message } =>
					Error::AuthDenied { reason: AuthDeniedReason::RefreshRejected, message },
				other => other.into_error(),
			});
		}

		issued_token(&endpoint.response_field, &response)
	}

	async fn install(&self, token: AccessToken) -> Result<AccessToken> {
		self.store.save_access_token(token.clone()).await?;
		self.credential.replace(Some(token.clone()));

		Ok(token)
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("base_url", &self.config.base_url.as_str())
			.field("state", &*self.state.lock())
			.field("metrics", &self.metrics)
			.finish()
	}
}

fn issued_token(field: &str, response: &ApiResponse) -> Result<AccessToken> {
	let status = response.status.as_u16();
	let body = response.json::<Map<String, Value>>()?;
	let value = match body.get(field) {
		Some(Value::String(value)) => value,
		Some(_) =>
			return Err(Error::UnexpectedBody { status, detail: format!("`{field}` is not a string") }),
		None => return Err(Error::UnexpectedBody { status, detail: format!("`{field}` is missing") }),
	};

	AccessToken::new(value.as_str())
		.map_err(|e| Error::UnexpectedBody { status, detail: e.to_string() })
}

/// Settles the renewal state exactly once. Dropping it while armed (the leading future was
/// cancelled) clears the flag and closes every parked channel.
struct SettleGuard<'a> {
	state: &'a Mutex<RefreshState>,
	armed: bool,
}
impl SettleGuard<'_> {
	fn resolve(&mut self, token: &AccessToken) {
		self.armed = false;

		let mut state = self.state.lock();

		state.refreshing = false;
		state.last_drain = state.queue.resolve_all(token);

		flow_debug!(released = state.last_drain.len(), "Released parked requests.");
	}

	fn reject(&mut self, error: &Arc<Error>) {
		self.armed = false;

		let mut state = self.state.lock();

		state.refreshing = false;
		state.last_drain = state.queue.reject_all(error);

		flow_debug!(rejected = state.last_drain.len(), "Rejected parked requests.");
	}
}
impl Drop for SettleGuard<'_> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}

		let mut state = self.state.lock();

		flow_warn!(abandoned = state.queue.len(), "Access token renewal abandoned.");

		state.refreshing = false;
		state.last_drain.clear();
		state.queue.abandon();
	}
}
