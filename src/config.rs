//! Client configuration: base URL, renewal endpoint wire shape, and error reason codes.

// self
use crate::{_prelude::*, error::ConfigError};

/// Validated client configuration.
///
/// Construct it through [`ClientConfig::builder`]. Deserialized values should be passed
/// through [`ClientConfig::validate`] before use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Base URL every relative request path is appended to.
	pub base_url: Url,
	/// Renewal endpoint description.
	#[serde(default)]
	pub refresh: RefreshEndpoint,
	/// Reason codes marking an authorization failure as an expired/invalid access token.
	#[serde(default = "default_expired_reasons")]
	pub expired_reasons: Vec<String>,
	/// JSON field of an error body carrying the reason code or human-readable message.
	#[serde(default = "default_reason_field")]
	pub reason_field: String,
}
impl ClientConfig {
	/// Returns a builder seeded with defaults for `base_url`.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Parses and validates a JSON document.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::InvalidDocument { source })?;

		config.validate()?;

		Ok(config)
	}

	/// Returns `true` if `reason` marks the access token as expired or invalid.
	pub fn is_expired_reason(&self, reason: &str) -> bool {
		self.expired_reasons.iter().any(|candidate| candidate == reason)
	}

	/// Validates invariants for the configuration.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") || self.base_url.cannot_be_a_base()
		{
			return Err(ConfigError::InvalidBaseUrl { url: self.base_url.to_string() });
		}
		if self.expired_reasons.is_empty() {
			return Err(ConfigError::NoExpiredReasons);
		}

		validate_field("reason", &self.reason_field)?;
		validate_field("refresh path", &self.refresh.path)?;
		validate_field("refresh request", &self.refresh.request_field)?;
		validate_field("refresh response", &self.refresh.response_field)?;

		if !self.refresh.timeout.is_positive() {
			return Err(ConfigError::NonPositiveTimeout);
		}

		Ok(())
	}
}

/// Wire description of the renewal endpoint.
///
/// The client `POST`s `{"<request_field>": "<refresh token>"}` to `path` and reads the new
/// access token from `<response_field>` of a successful JSON response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshEndpoint {
	/// Path relative to the base URL.
	pub path: String,
	/// JSON field carrying the refresh token in the request body.
	pub request_field: String,
	/// JSON field carrying the new access token in the response body.
	pub response_field: String,
	/// Upper bound for the renewal call; expiry counts as a renewal failure.
	pub timeout: Duration,
}
impl RefreshEndpoint {
	const DEFAULT_PATH: &'static str = "/sessions/refresh-token";
	const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);
}
impl Default for RefreshEndpoint {
	fn default() -> Self {
		Self {
			path: Self::DEFAULT_PATH.into(),
			request_field: "token".into(),
			response_field: "token".into(),
			timeout: Self::DEFAULT_TIMEOUT,
		}
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	config: ClientConfig,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with defaults.
	pub fn new(base_url: Url) -> Self {
		Self {
			config: ClientConfig {
				base_url,
				refresh: RefreshEndpoint::default(),
				expired_reasons: default_expired_reasons(),
				reason_field: default_reason_field(),
			},
		}
	}

	/// Overrides the renewal endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.config.refresh.path = path.into();

		self
	}

	/// Overrides the JSON field names used by the renewal endpoint.
	pub fn refresh_fields(
		mut self,
		request_field: impl Into<String>,
		response_field: impl Into<String>,
	) -> Self {
		self.config.refresh.request_field = request_field.into();
		self.config.refresh.response_field = response_field.into();

		self
	}

	/// Overrides the renewal timeout (defaults to 30 seconds).
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.config.refresh.timeout = timeout;

		self
	}

	/// Replaces the reason codes that mark an access token as expired or invalid.
	pub fn expired_reasons<I, S>(mut self, reasons: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.config.expired_reasons = reasons.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the error body field carrying the reason code/message.
	pub fn reason_field(mut self, field: impl Into<String>) -> Self {
		self.config.reason_field = field.into();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

fn default_expired_reasons() -> Vec<String> {
	vec!["token.expired".into(), "token.invalid".into()]
}

fn default_reason_field() -> String {
	"message".into()
}

fn validate_field(field: &'static str, value: &str) -> Result<(), ConfigError> {
	if value.trim().is_empty() { Err(ConfigError::EmptyFieldName { field }) } else { Ok(()) }
}
