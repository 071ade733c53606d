//! Demonstrates transparent access-token renewal against a mock session API: two requests
//! fail on an expired token, share one renewal call, and are replayed with the new token.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use bearer_refresh::{
	auth::{AccessToken, RefreshToken},
	client::ApiClient,
	config::ClientConfig,
	store::FileStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).header("authorization", "Bearer demo-expired");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"status\":\"error\",\"message\":\"token.expired\"}");
		})
		.await;
	let renewal = server
		.mock_async(|when, then| {
			when.method(POST).path("/sessions/refresh-token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"token\":\"demo-renewed\"}")
				.delay(std::time::Duration::from_millis(200));
		})
		.await;
	let history = server
		.mock_async(|when, then| {
			when.method(GET).path("/history").header("authorization", "Bearer demo-renewed");
			then.status(200)
				.header("content-type", "application/json")
				.body("[{\"title\":\"Pull-ups\",\"group\":\"back\"}]");
		})
		.await;
	let profile = server
		.mock_async(|when, then| {
			when.method(GET).path("/users/me").header("authorization", "Bearer demo-renewed");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"name\":\"Demo\",\"email\":\"demo@example.com\"}");
		})
		.await;
	let path = std::env::temp_dir().join("bearer-refresh-demo").join("session.json");
	let store = Arc::new(FileStore::open(&path)?);
	let config = ClientConfig::builder(Url::parse(&server.base_url())?).build()?;
	let client = ApiClient::reqwest(config, store)?;

	client
		.install_session(AccessToken::new("demo-expired")?, RefreshToken::new("demo-refresh")?)
		.await?;

	let handle = client.register_interceptor(Arc::new(|| println!("Session ended.")));
	let (history_response, profile_response) =
		tokio::join!(client.get("/history"), client.get("/users/me"));

	println!("History: {}", history_response?.text());
	println!("Profile: {}", profile_response?.text());
	println!("Renewal calls: {}.", client.metrics().attempts());
	println!("Session persisted at {}.", path.display());

	expired.assert_calls_async(2).await;
	renewal.assert_calls_async(1).await;
	history.assert_async().await;
	profile.assert_async().await;

	handle.detach();
	client.clear_session().await?;

	Ok(())
}
