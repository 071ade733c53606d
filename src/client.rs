//! Public client surface: bearer attachment, interceptor registration, and session helpers.

// std
use std::sync::{
	Weak,
	atomic::{AtomicU64, Ordering},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, CredentialCell, RefreshToken},
	classify,
	config::ClientConfig,
	error::ConfigError,
	interceptor::Interceptor,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, flow_debug},
	refresh::{RefreshCoordinator, RefreshMetrics},
	session::SignOutTrigger,
	store::TokenStore,
	transport::{ApiRequest, ApiResponse, HttpTransport},
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;

/// HTTP client that attaches the current access token to every request and, once an
/// interceptor is registered, renews it transparently.
///
/// Cloning is cheap; clones share the credential, the renewal state, and the interceptor.
#[derive(Clone)]
pub struct ApiClient {
	inner: Arc<ClientInner>,
}
impl ApiClient {
	/// Creates a client over `transport` backed by `store`. The credential starts empty; call
	/// [`ApiClient::restore_session`] or [`ApiClient::install_session`] to populate it.
	///
	/// `config` is validated first, so hand-built configurations get the same checks as
	/// [`ClientConfig::builder`].
	pub fn new(
		config: ClientConfig,
		transport: Arc<dyn HttpTransport>,
		store: Arc<dyn TokenStore>,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let config = Arc::new(config);
		let credential = Arc::new(CredentialCell::default());
		let coordinator = RefreshCoordinator::new(
			config.clone(),
			transport.clone(),
			store.clone(),
			credential.clone(),
		);

		Ok(Self {
			inner: Arc::new(ClientInner {
				config,
				transport,
				store,
				credential,
				coordinator,
				interceptor: RwLock::new(None),
				generations: AtomicU64::new(0),
			}),
		})
	}

	/// Creates a client over a default reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn reqwest(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().build().map_err(ConfigError::http_client_build)?;

		Self::new(config, Arc::new(ReqwestTransport::with_client(client)), store)
	}

	/// Sends `request`, attaching the current credential unless the request already carries
	/// an `Authorization` header.
	///
	/// Transport errors are returned unchanged. Failed responses are classified into
	/// [`Error`]; with an interceptor registered, expired-token failures are renewed and
	/// replayed before the caller sees them.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let span = FlowSpan::new(FlowKind::Request, "client.send");

		span.instrument(self.inner.send(request)).await
	}

	/// Sends a `GET` request to `path`.
	pub async fn get(&self, path: impl Into<String>) -> Result<ApiResponse> {
		self.send(ApiRequest::get(path)).await
	}

	/// Sends a `POST` request to `path` with a JSON body.
	pub async fn post_json<T>(&self, path: impl Into<String>, body: &T) -> Result<ApiResponse>
	where
		T: ?Sized + Serialize,
	{
		self.send(ApiRequest::post(path).with_json(body)?).await
	}

	/// Installs the renewal interceptor, bound to `sign_out`.
	///
	/// Replaces any interceptor registered earlier. The returned handle detaches this
	/// registration only.
	pub fn register_interceptor(&self, sign_out: Arc<dyn SignOutTrigger>) -> InterceptorHandle {
		let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
		let previous = self
			.inner
			.interceptor
			.write()
			.replace(Arc::new(Interceptor::new(sign_out, generation)));

		flow_debug!(
			generation = generation,
			replaced = previous.is_some(),
			"Registered the renewal interceptor."
		);

		drop(previous);

		InterceptorHandle { client: Arc::downgrade(&self.inner), generation }
	}

	/// Returns `true` while an interceptor is registered.
	pub fn has_interceptor(&self) -> bool {
		self.inner.interceptor.read().is_some()
	}

	/// Persists both tokens and makes `access` the current credential.
	pub async fn install_session(&self, access: AccessToken, refresh: RefreshToken) -> Result<()> {
		self.inner.store.save_access_token(access.clone()).await?;
		self.inner.store.save_refresh_token(refresh).await?;
		self.inner.credential.replace(Some(access));

		Ok(())
	}

	/// Loads the stored access token into the credential cell and returns it.
	pub async fn restore_session(&self) -> Result<Option<AccessToken>> {
		let access = self.inner.store.get_access_token().await?;

		self.inner.credential.replace(access.clone());

		Ok(access)
	}

	/// Removes both stored tokens and clears the credential.
	pub async fn clear_session(&self) -> Result<()> {
		self.inner.store.clear().await?;
		self.inner.credential.replace(None);

		Ok(())
	}

	/// Returns the current credential.
	pub fn credential(&self) -> Option<AccessToken> {
		self.inner.credential.get()
	}

	/// Replaces the current credential without touching the store.
	pub fn set_credential(&self, token: Option<AccessToken>) {
		self.inner.credential.replace(token);
	}

	/// Renewal counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		self.inner.coordinator.metrics()
	}

	/// Returns `true` while a renewal call is outstanding.
	pub fn is_refreshing(&self) -> bool {
		self.inner.coordinator.is_refreshing()
	}

	/// Number of requests parked behind the outstanding renewal.
	pub fn queued(&self) -> usize {
		self.inner.coordinator.queued()
	}

	/// Tickets released by the most recent drain, in release order.
	pub fn last_drain(&self) -> Vec<u64> {
		self.inner.coordinator.last_drain()
	}

	/// Client configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}
}
impl Debug for ApiClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.inner.config.base_url.as_str())
			.field("interceptor", &*self.inner.interceptor.read())
			.field("coordinator", &self.inner.coordinator)
			.finish()
	}
}

/// Reverse capability returned by [`ApiClient::register_interceptor`].
#[must_use = "Dropping the handle leaves the interceptor installed with no way to detach it."]
#[derive(Debug)]
pub struct InterceptorHandle {
	client: Weak<ClientInner>,
	generation: u64,
}
impl InterceptorHandle {
	/// Registration generation this handle controls.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Removes the interceptor if it is still the one this handle registered.
	///
	/// Returns `false` when a newer registration replaced it or the client is gone.
	pub fn detach(self) -> bool {
		let Some(client) = self.client.upgrade() else {
			return false;
		};
		let mut slot = client.interceptor.write();

		if slot.as_ref().is_some_and(|current| current.generation() == self.generation) {
			*slot = None;

			flow_debug!(generation = self.generation, "Detached the renewal interceptor.");

			return true;
		}

		false
	}
}

pub(crate) struct ClientInner {
	pub(crate) config: Arc<ClientConfig>,
	pub(crate) credential: Arc<CredentialCell>,
	pub(crate) coordinator: RefreshCoordinator,
	transport: Arc<dyn HttpTransport>,
	store: Arc<dyn TokenStore>,
	interceptor: RwLock<Option<Arc<Interceptor>>>,
	generations: AtomicU64,
}
impl ClientInner {
	/// Resolves and executes `request` once, without classification.
	pub(crate) async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
		let request = request.resolve(&self.config.base_url)?;

		Ok(self.transport.execute(request).await?)
	}

	async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		let credential =
			if request.has_authorization() { None } else { self.credential.stamped() };
		let sent_with = match credential {
			Some((token, generation)) => {
				request.set_bearer(&token)?;

				Some(generation)
			},
			None => None,
		};

		obs::record_flow_outcome(FlowKind::Request, FlowOutcome::Attempt);

		let outcome = self.dispatch(request, sent_with).await;

		obs::record_flow_outcome(
			FlowKind::Request,
			if outcome.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
		);

		outcome
	}

	// `sent_with` is the credential generation attached by `send`, if any.
	async fn dispatch(&self, request: ApiRequest, sent_with: Option<u64>) -> Result<ApiResponse> {
		let response = self.execute(&request).await?;
		let interceptor = self.interceptor.read().clone();

		match interceptor {
			Some(interceptor) =>
				interceptor.on_response(self, request, response, sent_with).await,
			None => match classify::classify(&self.config, &response) {
				None => Ok(response),
				Some(failure) => Err(failure.into_error()),
			},
		}
	}
}
