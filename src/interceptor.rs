//! Response hook that turns expired-token failures into a renewal plus a single replay.

// self
use crate::{
	_prelude::*,
	classify::{self, Failure},
	client::ClientInner,
	error::AuthDeniedReason,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, flow_debug},
	session::{self, SignOutReason, SignOutTrigger},
	transport::{ApiRequest, ApiResponse},
};

/// Interceptor bound to the [`SignOutTrigger`] of the active session.
///
/// At most one is installed per client; see
/// [`ApiClient::register_interceptor`](crate::client::ApiClient::register_interceptor).
pub struct Interceptor {
	sign_out: Arc<dyn SignOutTrigger>,
	generation: u64,
}
impl Interceptor {
	pub(crate) fn new(sign_out: Arc<dyn SignOutTrigger>, generation: u64) -> Self {
		Self { sign_out, generation }
	}

	/// Registration generation this interceptor was installed under.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub(crate) async fn on_response(
		&self,
		client: &ClientInner,
		request: ApiRequest,
		response: ApiResponse,
		sent_with: Option<u64>,
	) -> Result<ApiResponse> {
		let Some(failure) = classify::classify(&client.config, &response) else {
			return Ok(response);
		};

		match failure {
			Failure::AuthExpired { .. } => self.recover(client, request, sent_with).await,
			Failure::AuthDenied { message } => {
				session::force_sign_out(
					self.sign_out.as_ref(),
					SignOutReason::Unauthorized,
					client.coordinator.metrics(),
				);

				Err(Error::AuthDenied { reason: AuthDeniedReason::Unauthorized, message })
			},
			other => Err(other.into_error()),
		}
	}

	async fn recover(
		&self,
		client: &ClientInner,
		request: ApiRequest,
		sent_with: Option<u64>,
	) -> Result<ApiResponse> {
		// The client's own credential rotated while this request was in flight. Requests that
		// carried a caller-set header, or no credential at all, always renew.
		let rotated = sent_with.and_then(|generation| client.credential.rotated_since(generation));
		let request = match rotated {
			Some(token) => {
				flow_debug!(token = %token.fingerprint(), "Replaying with the rotated credential.");

				let mut request = request;

				request.set_bearer(&token)?;

				request
			},
			None => client.coordinator.renew(request, self.sign_out.as_ref()).await?,
		};

		replay(client, request).await
	}
}
impl Debug for Interceptor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Interceptor").field("generation", &self.generation).finish()
	}
}

/// Resubmits `request` once. Failures are classified but never renewed again.
async fn replay(client: &ClientInner, request: ApiRequest) -> Result<ApiResponse> {
	let span = FlowSpan::new(FlowKind::Replay, "interceptor.replay");

	span.instrument(async move {
		obs::record_flow_outcome(FlowKind::Replay, FlowOutcome::Attempt);

		let outcome = client.execute(&request).await.and_then(|response| {
			match classify::classify(&client.config, &response) {
				None => Ok(response),
				Some(failure) => Err(failure.into_error()),
			}
		});

		obs::record_flow_outcome(
			FlowKind::Replay,
			if outcome.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
		);

		outcome
	})
	.await
}
