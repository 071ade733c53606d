//! Boundary decode step mapping failed responses into the client's closed error taxonomy.
//!
//! Nothing past this module inspects raw error bodies. The interceptor and the refresh
//! coordinator branch on [`Failure`] only.

// crates.io
use http::StatusCode;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	error::AuthDeniedReason,
	transport::ApiResponse,
};

/// Classification of a response that did not succeed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Failure {
	/// Unauthorized because the access token expired or is invalid; recoverable by renewal.
	AuthExpired {
		/// Reason code reported by the server.
		reason: String,
	},
	/// Unauthorized for any other reason; terminal for the session.
	AuthDenied {
		/// Reason code or message reported by the server, when present.
		message: Option<String>,
	},
	/// Structured error body with a human-readable message.
	Domain {
		/// HTTP status code.
		status: u16,
		/// Server-supplied message.
		message: String,
	},
	/// Anything else: non-success status without a usable message.
	Status {
		/// HTTP status code.
		status: u16,
		/// Truncated body text.
		body_preview: Option<String>,
	},
}
impl Failure {
	/// Returns `true` if renewing the access token could recover the request.
	pub fn is_auth_expired(&self) -> bool {
		matches!(self, Self::AuthExpired { .. })
	}

	/// Converts the classification into the caller-facing [`Error`].
	pub fn into_error(self) -> Error {
		match self {
			Self::AuthExpired { reason } => Error::AuthExpired { message: Some(reason) },
			Self::AuthDenied { message } =>
				Error::AuthDenied { reason: AuthDeniedReason::Unauthorized, message },
			Self::Domain { status, message } => Error::Domain { status, message },
			Self::Status { status, body_preview } => Error::Status { status, body_preview },
		}
	}
}

/// Classifies a non-success response. Returns `None` for 2xx responses.
pub fn classify(config: &ClientConfig, response: &ApiResponse) -> Option<Failure> {
	if response.is_success() {
		return None;
	}

	let message = reason_field(&config.reason_field, &response.body);

	if response.status == StatusCode::UNAUTHORIZED {
		return Some(match message {
			Some(reason) if config.is_expired_reason(&reason) => Failure::AuthExpired { reason },
			message => Failure::AuthDenied { message },
		});
	}

	let status = response.status.as_u16();

	Some(match message {
		Some(message) => Failure::Domain { status, message },
		None => Failure::Status { status, body_preview: response.body_preview() },
	})
}

fn reason_field(field: &str, body: &[u8]) -> Option<String> {
	if body.is_empty() {
		return None;
	}

	match serde_json::from_slice::<Value>(body).ok()?.get(field)? {
		Value::String(message) if !message.is_empty() => Some(message.to_owned()),
		_ => None,
	}
}
