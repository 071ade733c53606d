//! Single source of truth for the bearer credential attached to outgoing requests.

// self
use crate::{_prelude::*, auth::AccessToken};

/// The client's current access token.
///
/// Every outgoing request reads it when composing headers; only session helpers and the
/// refresh coordinator write it. Each write that changes the token bumps a generation, so a
/// request can later tell whether the credential it was sent with has since rotated.
#[derive(Debug, Default)]
pub struct CredentialCell(RwLock<Slot>);
impl CredentialCell {
	/// Creates a cell holding `token`.
	pub fn new(token: Option<AccessToken>) -> Self {
		Self(RwLock::new(Slot { token, generation: 0 }))
	}

	/// Returns the current access token.
	pub fn get(&self) -> Option<AccessToken> {
		self.0.read().token.clone()
	}

	/// Returns the current access token together with its generation.
	pub fn stamped(&self) -> Option<(AccessToken, u64)> {
		let slot = self.0.read();

		slot.token.clone().map(|token| (token, slot.generation))
	}

	/// Generation of the current token.
	pub fn generation(&self) -> u64 {
		self.0.read().generation
	}

	/// Returns the current token if it replaced the one issued under `generation`.
	pub fn rotated_since(&self, generation: u64) -> Option<AccessToken> {
		let slot = self.0.read();

		if slot.generation == generation {
			return None;
		}

		slot.token.clone()
	}

	/// Replaces the current access token, returning the previous one.
	///
	/// Writing the token already held leaves the generation unchanged.
	pub fn replace(&self, token: Option<AccessToken>) -> Option<AccessToken> {
		let mut slot = self.0.write();

		if slot.token != token {
			slot.generation += 1;
		}

		std::mem::replace(&mut slot.token, token)
	}

	/// Returns `true` if `header` is the bearer value of the current token.
	pub fn is_current_bearer(&self, header: &str) -> bool {
		self.0.read().token.as_ref().is_some_and(|token| token.bearer() == header)
	}
}

#[derive(Debug, Default)]
struct Slot {
	token: Option<AccessToken>,
	generation: u64,
}
