use thiserror::Error;

use crate::{account::Account, registry};

#[derive(Debug, Error)]
pub enum Error {
	#[error("key format error: {0}; re-paste or regenerate the key")]
	KeyFormat(String),

	#[error("plaintext too large: {len} bytes, at most {max} fit under this key")]
	PlaintextTooLarge { len: usize, max: usize },

	#[error("decryption failed ({0})")]
	DecryptionFailed(String),

	#[error("blob {uri} unavailable: {reason}")]
	BlobUnavailable { uri: String, reason: String },

	#[error("integrity check failed for {uri}: expected {expected}, got {actual}")]
	IntegrityCheckFailed {
		uri: String,
		expected: String,
		actual: String,
	},

	#[error("empty input after removing whitespace")]
	EmptyInput,

	#[error("the local private key does not match public key {key_id:016x}")]
	KeyMismatch { key_id: u64 },

	#[error("no private key stored for {0}")]
	MissingPrivateKey(Account),

	#[error("key generation failed: {0}")]
	KeyGeneration(String),

	#[error(transparent)]
	Registry(#[from] registry::Error),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("invalid config: {0}")]
	Config(String),
}

impl Error {
	// prefixes a decryption failure with the field it happened on
	pub fn within(self, field: &str) -> Self {
		match self {
			Error::DecryptionFailed(reason) => Error::DecryptionFailed(format!("{field}: {reason}")),
			other => other,
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
