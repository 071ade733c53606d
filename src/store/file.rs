//! Simple file-backed [`TokenStore`] for CLIs and desktop clients.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, RefreshToken},
	store::{StoreError, StoreFuture, StoredTokens, TokenStore},
};

/// Persists tokens to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<StoredTokens>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<StoredTokens, StoreError> {
		if !path.exists() {
			return Ok(StoredTokens::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(StoredTokens::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &StoredTokens) -> Result<(), StoreError> {
		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize token snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn update(&self, f: impl FnOnce(&mut StoredTokens)) -> Result<(), StoreError> {
		let mut guard = self.inner.write();
		let mut next = guard.clone();

		f(&mut next);
		self.persist_locked(&next)?;

		*guard = next;

		Ok(())
	}
}
impl TokenStore for FileStore {
	fn get_access_token(&self) -> StoreFuture<'_, Option<AccessToken>> {
		Box::pin(async move { Ok(self.inner.read().access_token.clone()) })
	}

	fn save_access_token(&self, token: AccessToken) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.update(|tokens| tokens.access_token = Some(token)) })
	}

	fn remove_access_token(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.update(|tokens| tokens.access_token = None) })
	}

	fn get_refresh_token(&self) -> StoreFuture<'_, Option<RefreshToken>> {
		Box::pin(async move { Ok(self.inner.read().refresh_token.clone()) })
	}

	fn save_refresh_token(&self, token: RefreshToken) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.update(|tokens| tokens.refresh_token = Some(token)) })
	}

	fn remove_refresh_token(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.update(|tokens| tokens.refresh_token = None) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use time::OffsetDateTime;
	// self
	use super::*;

	fn temp_path(tag: &str) -> PathBuf {
		let unique = format!(
			"bearer_refresh_file_store_{tag}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[tokio::test]
	async fn save_and_reload_round_trip() {
		let path = temp_path("reload");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");

		store
			.save_access_token(AccessToken::new("access-1").expect("Fixture should be valid."))
			.await
			.expect("Failed to save access token to file store.");
		store
			.save_refresh_token(RefreshToken::new("refresh-1").expect("Fixture should be valid."))
			.await
			.expect("Failed to save refresh token to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let access = reopened
			.get_access_token()
			.await
			.expect("Failed to read access token from file store.")
			.expect("File store lost access token after reopen.");
		let refresh = reopened
			.get_refresh_token()
			.await
			.expect("Failed to read refresh token from file store.")
			.expect("File store lost refresh token after reopen.");

		assert_eq!(access.expose(), "access-1");
		assert_eq!(refresh.expose(), "refresh-1");

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[tokio::test]
	async fn clear_persists_empty_snapshot() {
		let path = temp_path("clear");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");

		store
			.save_access_token(AccessToken::new("access-2").expect("Fixture should be valid."))
			.await
			.expect("Failed to save access token to file store.");
		store.clear().await.expect("Failed to clear file store.");

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");

		assert!(
			reopened.get_access_token().await.expect("Reading should succeed.").is_none(),
			"Cleared store must not resurrect tokens after reopen."
		);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
