use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// Registry ids are counters; 0 is never handed out
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(u64);

impl Uid {
	pub const fn new(id: u64) -> Self {
		Self(id)
	}

	pub fn value(&self) -> u64 {
		self.0
	}
}

impl From<u64> for Uid {
	fn from(value: u64) -> Self {
		Self(value)
	}
}

impl fmt::Display for Uid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

pub fn from_bytes(bytes: &[u8]) -> u64 {
	let digest = Sha256::digest(bytes);
	let mut prefix = [0u8; 8];

	prefix.copy_from_slice(&digest[..8]);

	u64::from_be_bytes(prefix)
}

pub fn generate() -> u64 {
	let mut rng = OsRng;
	rng.gen()
}
