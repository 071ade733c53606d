//! Redacted access/refresh token wrappers that keep secrets out of logs.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

macro_rules! def_secret {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Wraps a token after validation.
			pub fn new(value: impl Into<String>) -> Result<Self, TokenError> {
				let value = value.into();

				validate($kind, &value)?;

				Ok(Self(value))
			}

			/// Returns the raw token value. Callers must avoid logging this string.
			pub fn expose(&self) -> &str {
				&self.0
			}

			/// Short, non-reversible identifier safe to log.
			pub fn fingerprint(&self) -> String {
				fingerprint(&self.0)
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				self.expose()
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = TokenError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.debug_tuple(stringify!($name)).field(&"<redacted>").finish()
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str("<redacted>")
			}
		}
	};
}

const FINGERPRINT_LEN: usize = 8;

/// Error returned when a token value is unusable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum TokenError {
	/// The token was empty.
	#[error("{kind} token cannot be empty.")]
	Empty {
		/// Kind of token (access, refresh).
		kind: &'static str,
	},
	/// The token contains whitespace and cannot be sent as a bearer credential.
	#[error("{kind} token contains whitespace.")]
	ContainsWhitespace {
		/// Kind of token (access, refresh).
		kind: &'static str,
	},
}

def_secret! { AccessToken, "Short-lived credential attached to requests as a bearer token.", "Access" }
def_secret! { RefreshToken, "Long-lived credential used solely to mint a new access token.", "Refresh" }

impl AccessToken {
	/// Formats the `Authorization` header value for this token.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}

fn validate(kind: &'static str, value: &str) -> Result<(), TokenError> {
	if value.is_empty() {
		return Err(TokenError::Empty { kind });
	}
	if value.chars().any(char::is_whitespace) {
		return Err(TokenError::ContainsWhitespace { kind });
	}

	Ok(())
}

fn fingerprint(value: &str) -> String {
	let digest = Sha256::digest(value.as_bytes());
	let mut encoded = URL_SAFE_NO_PAD.encode(digest);

	encoded.truncate(FINGERPRINT_LEN);

	encoded
}
