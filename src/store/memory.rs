//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, RefreshToken},
	store::{StoreError, StoreFuture, StoredTokens, TokenStore},
};

type StoreCell = Arc<RwLock<StoredTokens>>;

/// Storage backend that keeps tokens in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreCell);
impl MemoryStore {
	/// Creates a store pre-populated with the provided tokens.
	pub fn with_tokens(access: Option<AccessToken>, refresh: Option<RefreshToken>) -> Self {
		Self(Arc::new(RwLock::new(StoredTokens { access_token: access, refresh_token: refresh })))
	}

	/// Returns a copy of everything currently stored.
	pub fn snapshot(&self) -> StoredTokens {
		self.0.read().clone()
	}

	fn update_now(cell: &StoreCell, f: impl FnOnce(&mut StoredTokens)) -> Result<(), StoreError> {
		f(&mut cell.write());

		Ok(())
	}
}
impl TokenStore for MemoryStore {
	fn get_access_token(&self) -> StoreFuture<'_, Option<AccessToken>> {
		let cell = self.0.clone();

		Box::pin(async move { Ok(cell.read().access_token.clone()) })
	}

	fn save_access_token(&self, token: AccessToken) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move { Self::update_now(&cell, |tokens| tokens.access_token = Some(token)) })
	}

	fn remove_access_token(&self) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move { Self::update_now(&cell, |tokens| tokens.access_token = None) })
	}

	fn get_refresh_token(&self) -> StoreFuture<'_, Option<RefreshToken>> {
		let cell = self.0.clone();

		Box::pin(async move { Ok(cell.read().refresh_token.clone()) })
	}

	fn save_refresh_token(&self, token: RefreshToken) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move { Self::update_now(&cell, |tokens| tokens.refresh_token = Some(token)) })
	}

	fn remove_refresh_token(&self) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move { Self::update_now(&cell, |tokens| tokens.refresh_token = None) })
	}
}
