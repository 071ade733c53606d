//! Client-level error types shared by the transport, interceptor, and refresh coordinator.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error surfaced to callers of [`ApiClient`](crate::client::ApiClient).
///
/// Sign-out is never encoded here. Callers observe it through the
/// [`SignOutTrigger`](crate::session::SignOutTrigger) they registered.
#[derive(Debug, ThisError)]
pub enum Error {
	/// No response was received (DNS, TCP, TLS, body read).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The server answered with a structured error body carrying a message.
	#[error("{message}")]
	Domain {
		/// HTTP status code of the failed response.
		status: u16,
		/// Human-readable message supplied by the server.
		message: String,
	},
	/// The server answered with a non-success status and no usable message.
	#[error("Request failed with status {status}.")]
	Status {
		/// HTTP status code of the failed response.
		status: u16,
		/// Preview of the response body, if any.
		body_preview: Option<String>,
	},
	/// The access token expired or was rejected as invalid.
	#[error("Access token expired or invalid.")]
	AuthExpired {
		/// Reason code reported by the server.
		message: Option<String>,
	},
	/// Authorization failed for a reason the client cannot recover from.
	#[error("Authorization denied: {reason}.")]
	AuthDenied {
		/// Why the session cannot continue.
		reason: AuthDeniedReason,
		/// Reason code or message reported by the server, when available.
		message: Option<String>,
	},
	/// The shared renewal attempt failed; every request waiting on it receives this error.
	#[error("Access token renewal failed: {0}")]
	RefreshFailed(#[source] Arc<Error>),
	/// The renewal call did not settle within the configured bound.
	#[error("Access token renewal timed out after {after}.")]
	RefreshTimeout {
		/// Configured timeout that elapsed.
		after: Duration,
	},
	/// The task driving the renewal was dropped before it settled.
	#[error("Access token renewal was abandoned before it completed.")]
	RefreshAbandoned,
	/// A response body could not be decoded.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Path-aware decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
	/// A successful response did not carry the expected payload.
	#[error("Response with status {status} has an unexpected body: {detail}.")]
	UnexpectedBody {
		/// HTTP status code of the response.
		status: u16,
		/// What was wrong with the body.
		detail: String,
	},
	/// Token storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns `true` when this error ended (or must end) the active session.
	pub fn is_auth_denied(&self) -> bool {
		match self {
			Self::AuthDenied { .. } => true,
			Self::RefreshFailed(inner) => inner.is_auth_denied(),
			_ => false,
		}
	}

	/// HTTP status code carried by the error, when a response was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Domain { status, .. } | Self::Status { status, .. } => Some(*status),
			Self::Decode { status, .. } | Self::UnexpectedBody { status, .. } => Some(*status),
			Self::AuthExpired { .. }
			| Self::AuthDenied { reason: AuthDeniedReason::Unauthorized, .. } => Some(401),
			Self::RefreshFailed(inner) => inner.status(),
			_ => None,
		}
	}
}

/// Terminal authorization failures that force a sign-out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthDeniedReason {
	/// The server rejected the request for a reason other than token expiry.
	Unauthorized,
	/// The token store holds no refresh token.
	MissingRefreshToken,
	/// The renewal endpoint rejected the refresh token.
	RefreshRejected,
}
impl AuthDeniedReason {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Unauthorized => "unauthorized",
			Self::MissingRefreshToken => "missing_refresh_token",
			Self::RefreshRejected => "refresh_rejected",
		}
	}
}
impl Display for AuthDeniedReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot carry relative request paths.
	#[error("Base URL must be an absolute http(s) URL: {url}.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Request path could not be joined onto the base URL.
	#[error("Request path `{path}` is invalid.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A header value contains characters HTTP does not allow.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeader {
		/// Header name.
		name: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialize(#[source] serde_json::Error),
	/// Configuration document could not be parsed.
	#[error("Configuration document is invalid.")]
	InvalidDocument {
		/// Path-aware parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Renewal timeout must be positive.
	#[error("The refresh timeout must be positive.")]
	NonPositiveTimeout,
	/// A configured JSON field name is empty.
	#[error("The {field} field name cannot be empty.")]
	EmptyFieldName {
		/// Which configuration entry was empty.
		field: &'static str,
	},
	/// No reason code marks a token as expired.
	#[error("At least one expired-token reason code is required.")]
	NoExpiredReasons,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Transport-level failures.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Target URL of the failed call.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: &Url, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { url: url.to_string(), source: Box::new(src) }
	}
}
