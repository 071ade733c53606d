//! Token storage capability consumed by the client, plus built-in backends.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, RefreshToken},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable key-value capability holding the session's tokens.
///
/// The client reads the refresh token once per renewal attempt and writes the access
/// token once per successful renewal. Implementations synchronize themselves.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the stored access token, if any.
	fn get_access_token(&self) -> StoreFuture<'_, Option<AccessToken>>;

	/// Persists or replaces the access token.
	fn save_access_token(&self, token: AccessToken) -> StoreFuture<'_, ()>;

	/// Removes the access token.
	fn remove_access_token(&self) -> StoreFuture<'_, ()>;

	/// Returns the stored refresh token, if any.
	fn get_refresh_token(&self) -> StoreFuture<'_, Option<RefreshToken>>;

	/// Persists or replaces the refresh token.
	fn save_refresh_token(&self, token: RefreshToken) -> StoreFuture<'_, ()>;

	/// Removes the refresh token.
	fn remove_refresh_token(&self) -> StoreFuture<'_, ()>;

	/// Removes every stored token.
	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.remove_access_token().await?;
			self.remove_refresh_token().await
		})
	}
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Snapshot of every token a store holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
	/// Current access token.
	pub access_token: Option<AccessToken>,
	/// Current refresh token.
	pub refresh_token: Option<RefreshToken>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "keychain locked".into() };
		let client_error: Error = store_error.clone().into();

		assert!(matches!(client_error, Error::Storage(_)));
		assert!(client_error.to_string().contains("keychain locked"));

		let source = StdError::source(&client_error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[tokio::test]
	async fn clear_removes_both_tokens() {
		let store = MemoryStore::default();

		store
			.save_access_token(AccessToken::new("a").expect("Access token fixture should be valid."))
			.await
			.expect("Saving the access token should succeed.");
		store
			.save_refresh_token(
				RefreshToken::new("r").expect("Refresh token fixture should be valid."),
			)
			.await
			.expect("Saving the refresh token should succeed.");
		store.clear().await.expect("Clearing the store should succeed.");

		assert_eq!(store.snapshot(), StoredTokens::default());
	}
}
