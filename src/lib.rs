//! Bearer-authenticated HTTP client with transparent access-token renewal.
//!
//! [`ApiClient`](client::ApiClient) attaches the current access token to every outgoing
//! request. Once an [`Interceptor`](interceptor::Interceptor) is registered, responses that
//! fail because the access token expired are parked while a single renewal call runs; every
//! parked request is then replayed with the fresh token, or rejected together with a forced
//! sign-out when renewal is impossible.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod obs;
pub mod refresh;
pub mod session;
pub mod store;
pub mod transport;
#[cfg(test)]
mod _preludet {
	//! Convenience re-exports and a scripted transport shared by unit tests.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use http::{HeaderMap, Method, StatusCode, header::AUTHORIZATION};
	use tokio::sync::Notify;
	// self
	use crate::{
		auth::{AccessToken, RefreshToken},
		client::ApiClient,
		config::ClientConfig,
		session::SignOutTrigger,
		store::MemoryStore,
		transport::{ApiResponse, HttpTransport, TransportFuture, TransportRequest},
	};

	/// Refresh path used by [`test_config`].
	pub const REFRESH_PATH: &str = "/sessions/refresh-token";

	/// How the scripted transport answers the renewal endpoint.
	#[derive(Clone, Debug)]
	pub enum RefreshScript {
		/// Respond `200 {"token": <value>}`.
		Issue(String),
		/// Respond with the provided status and JSON body.
		Fail(u16, String),
		/// Never respond.
		Hang,
	}

	/// In-process transport that accepts exactly one bearer token and scripts the renewal
	/// endpoint. Renewal calls wait on [`ScriptedTransport::release_refresh`] when gated.
	pub struct ScriptedTransport {
		pub valid_token: Mutex<String>,
		pub refresh: Mutex<RefreshScript>,
		pub gate: Option<Arc<Notify>>,
		pub refresh_calls: AtomicUsize,
		pub log: Mutex<Vec<(Method, String, Option<String>)>>,
	}
	impl ScriptedTransport {
		pub fn new(valid_token: &str, refresh: RefreshScript) -> Self {
			Self {
				valid_token: Mutex::new(valid_token.into()),
				refresh: Mutex::new(refresh),
				gate: None,
				refresh_calls: AtomicUsize::new(0),
				log: Mutex::new(Vec::new()),
			}
		}

		pub fn gated(mut self) -> Self {
			self.gate = Some(Arc::new(Notify::new()));

			self
		}

		pub fn release_refresh(&self) {
			if let Some(gate) = &self.gate {
				gate.notify_one();
			}
		}

		pub fn refresh_calls(&self) -> usize {
			self.refresh_calls.load(Ordering::SeqCst)
		}

		/// Bearer values sent to `path`, in call order.
		pub fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
			self.log
				.lock()
				.iter()
				.filter(|(_, p, _)| p == path)
				.map(|(_, _, bearer)| bearer.clone())
				.collect()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				let path = request.url.path().to_owned();
				let bearer = request
					.headers
					.get(AUTHORIZATION)
					.and_then(|value| value.to_str().ok())
					.map(ToOwned::to_owned);

				self.log.lock().push((request.method.clone(), path.clone(), bearer.clone()));

				if path == REFRESH_PATH {
					self.refresh_calls.fetch_add(1, Ordering::SeqCst);

					if let Some(gate) = &self.gate {
						gate.notified().await;
					}

					let script = self.refresh.lock().clone();

					return match script {
						RefreshScript::Issue(token) => {
							*self.valid_token.lock() = token.clone();

							Ok(json_response(200, &format!("{{\"token\":\"{token}\"}}")))
						},
						RefreshScript::Fail(status, body) => Ok(json_response(status, &body)),
						RefreshScript::Hang => std::future::pending().await,
					};
				}

				let expected = format!("Bearer {}", self.valid_token.lock());

				if bearer.as_deref() == Some(expected.as_str()) {
					Ok(json_response(200, &format!("{{\"path\":\"{path}\"}}")))
				} else {
					Ok(json_response(401, "{\"message\":\"token.expired\"}"))
				}
			})
		}
	}

	pub fn json_response(status: u16, body: &str) -> ApiResponse {
		let mut headers = HeaderMap::new();

		headers.insert(
			http::header::CONTENT_TYPE,
			http::HeaderValue::from_static("application/json"),
		);

		ApiResponse {
			status: StatusCode::from_u16(status).expect("Scripted status should be valid."),
			headers,
			body: body.as_bytes().to_vec(),
		}
	}

	/// Sign-out trigger that counts its invocations.
	pub fn sign_out_counter() -> (Arc<dyn SignOutTrigger>, Arc<AtomicUsize>) {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let trigger: Arc<dyn SignOutTrigger> = Arc::new(move || {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		(trigger, calls)
	}

	pub fn test_config() -> ClientConfig {
		ClientConfig::builder(
			Url::parse("http://api.test").expect("Test base URL should parse successfully."),
		)
		.build()
		.expect("Default test configuration should be valid.")
	}

	/// Builds a client whose store holds `access`/`refresh` and whose credential cell holds
	/// `access`.
	pub async fn build_test_client(
		transport: Arc<ScriptedTransport>,
		access: &str,
		refresh: Option<&str>,
	) -> (ApiClient, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());
		let client = ApiClient::new(test_config(), transport, store.clone())
			.expect("Test configuration should be valid.");
		let access = AccessToken::new(access).expect("Access token fixture should be valid.");

		match refresh {
			Some(refresh) => {
				let refresh =
					RefreshToken::new(refresh).expect("Refresh token fixture should be valid.");

				client
					.install_session(access, refresh)
					.await
					.expect("Installing the fixture session should succeed.");
			},
			None => {
				crate::store::TokenStore::save_access_token(store.as_ref(), access.clone())
					.await
					.expect("Seeding the access token should succeed.");
				client.set_credential(Some(access));
			},
		}

		(client, store)
	}
}

mod _prelude {
	pub use std::{
		collections::VecDeque,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::Client as ReqwestClient;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::Duration;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
