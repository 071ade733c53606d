//! Transport primitives: the replayable request descriptor, buffered responses, and the
//! [`HttpTransport`] seam that lets callers plug in any HTTP stack.
//!
//! The client never interprets a response status at this layer. Transports return every
//! response that arrived, successful or not, and only report [`TransportError`] when no
//! response was received at all.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

const BODY_PREVIEW_LIMIT: usize = 256;

/// Abstraction over HTTP stacks capable of executing a fully resolved request.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by the
/// client, the refresh coordinator, and every replay.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes the request and buffers the whole response.
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_>;
}

/// Caller-side request descriptor.
///
/// Paths are resolved against the configured base URL at send time. The descriptor is kept
/// intact so a failed request can be replayed with a different bearer credential.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the base URL, or an absolute http(s) URL.
	pub path: String,
	/// Request headers.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a bodiless request.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), headers: HeaderMap::new(), body: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `body` as JSON and sets the matching content type.
	pub fn with_json<T>(mut self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body).map_err(ConfigError::BodySerialize)?;

		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(bytes);

		Ok(self)
	}

	/// Returns `true` if the caller set an explicit `Authorization` header.
	pub fn has_authorization(&self) -> bool {
		self.headers.contains_key(AUTHORIZATION)
	}

	/// Overwrites the `Authorization` header with `token`.
	pub fn set_bearer(&mut self, token: &AccessToken) -> Result<(), ConfigError> {
		let mut value = HeaderValue::from_str(&token.bearer())
			.map_err(|_| ConfigError::InvalidHeader { name: AUTHORIZATION.to_string() })?;

		value.set_sensitive(true);
		self.headers.insert(AUTHORIZATION, value);

		Ok(())
	}

	/// Resolves the descriptor against `base` into a transport-ready request.
	pub fn resolve(&self, base: &Url) -> Result<TransportRequest, ConfigError> {
		Ok(TransportRequest {
			method: self.method.clone(),
			url: resolve_url(base, &self.path)?,
			headers: self.headers.clone(),
			body: self.body.clone(),
		})
	}
}

/// Fully resolved request handed to an [`HttpTransport`].
#[derive(Clone, Debug)]
pub struct TransportRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Request headers, including the bearer credential.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
}

/// Buffered HTTP response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// Response status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Decodes the body as JSON, reporting the failing field path on error.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| Error::Decode { source, status: self.status.as_u16() })
	}

	/// Lossy UTF-8 view of the body.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Truncated body text used in error values, or `None` for an empty body.
	pub fn body_preview(&self) -> Option<String> {
		if self.body.is_empty() {
			return None;
		}

		let text = self.text();

		if text.chars().count() <= BODY_PREVIEW_LIMIT {
			return Some(text);
		}

		let mut preview = text.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

		preview.push('…');

		Some(preview)
	}
}

/// Thin wrapper around [`ReqwestClient`] implementing [`HttpTransport`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let url = request.url.clone();
			let mut builder =
				self.0.request(request.method, request.url).headers(request.headers);

			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response =
				builder.send().await.map_err(|e| TransportError::network(&url, e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(|e| TransportError::network(&url, e))?;

			Ok(ApiResponse { status, headers, body: body.to_vec() })
		})
	}
}

fn resolve_url(base: &Url, path: &str) -> Result<Url, ConfigError> {
	if let Some(absolute) =
		Url::parse(path).ok().filter(|url| matches!(url.scheme(), "http" | "https"))
	{
		return Ok(absolute);
	}

	let joined =
		format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'));

	Url::parse(&joined).map_err(|source| ConfigError::InvalidPath { path: path.into(), source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base(value: &str) -> Url {
		Url::parse(value).expect("Base URL fixture should parse.")
	}

	#[test]
	fn paths_append_to_base_prefix() {
		let request = ApiRequest::get("/users/me");

		assert_eq!(
			request.resolve(&base("http://api.test/v1/")).expect("Path should resolve.").url.as_str(),
			"http://api.test/v1/users/me"
		);
		assert_eq!(
			request.resolve(&base("http://api.test")).expect("Path should resolve.").url.as_str(),
			"http://api.test/users/me"
		);

		let absolute = ApiRequest::get("https://cdn.test/avatar.png");

		assert_eq!(
			absolute.resolve(&base("http://api.test")).expect("URL should resolve.").url.as_str(),
			"https://cdn.test/avatar.png"
		);
	}

	#[test]
	fn set_bearer_overwrites_existing_header() {
		let mut request = ApiRequest::get("/history")
			.with_header(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));

		request
			.set_bearer(&AccessToken::new("fresh").expect("Access token fixture should be valid."))
			.expect("Bearer header should be valid.");

		assert_eq!(
			request.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
			Some("Bearer fresh")
		);
		assert_eq!(request.headers.get_all(AUTHORIZATION).iter().count(), 1);
	}

	#[test]
	fn json_decode_reports_field_path() {
		#[derive(Debug, Deserialize)]
		struct Body {
			#[allow(dead_code)]
			token: String,
		}

		let response = ApiResponse {
			status: StatusCode::OK,
			headers: HeaderMap::new(),
			body: br#"{"token": 42}"#.to_vec(),
		};
		let err = response.json::<Body>().expect_err("Numeric token must fail to decode.");

		match err {
			Error::Decode { source, status } => {
				assert_eq!(status, 200);
				assert_eq!(source.path().to_string(), "token");
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn body_preview_truncates_long_bodies() {
		let response = ApiResponse {
			status: StatusCode::BAD_GATEWAY,
			headers: HeaderMap::new(),
			body: "x".repeat(BODY_PREVIEW_LIMIT * 2).into_bytes(),
		};
		let preview = response.body_preview().expect("Non-empty body should have a preview.");

		assert_eq!(preview.chars().count(), BODY_PREVIEW_LIMIT + 1);
		assert!(
			ApiResponse { body: Vec::new(), ..response }.body_preview().is_none(),
			"Empty bodies have no preview."
		);
	}
}
