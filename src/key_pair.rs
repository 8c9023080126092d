use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
	error::{Error, Result},
	private_key::PrivateKey,
	public_key::PublicKey,
};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct KeyPair {
	pub private: PrivateKey,
	pub public: PublicKey,
}

impl KeyPair {
	pub const DEFAULT_BITS: usize = 2048;
	pub const MIN_BITS: usize = 1024;

	pub fn new(private: PrivateKey, public: PublicKey) -> Self {
		Self { private, public }
	}

	pub fn generate() -> Result<Self> {
		Self::generate_with_bits(Self::DEFAULT_BITS)
	}

	pub fn generate_with_bits(bits: usize) -> Result<Self> {
		if bits < Self::MIN_BITS {
			return Err(Error::KeyGeneration(format!(
				"{bits}-bit keys are too small, use at least {}",
				Self::MIN_BITS
			)));
		}

		let rsa = RsaPrivateKey::new(&mut OsRng, bits)
			.map_err(|e| Error::KeyGeneration(e.to_string()))?;
		let private = PrivateKey::from_rsa(rsa)?;
		let public = private.public_key()?;

		debug!(key_id = public.id(), bits, "generated key pair");

		Ok(Self::new(private, public))
	}

	pub fn public_key(&self) -> &PublicKey {
		&self.public
	}

	pub fn private_key(&self) -> &PrivateKey {
		&self.private
	}

	pub fn id(&self) -> u64 {
		self.public_key().id()
	}

	pub fn export_public(&self) -> String {
		self.public.to_base64()
	}

	pub fn export_private(&self) -> String {
		self.private.to_base64()
	}
}

pub fn import_public(text: &str) -> Result<PublicKey> {
	PublicKey::from_base64(text)
}

pub fn import_private(text: &str) -> Result<PrivateKey> {
	PrivateKey::from_base64(text)
}
