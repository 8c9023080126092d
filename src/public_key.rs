use rand::rngs::OsRng;
use rsa::{
	pkcs8::{DecodePublicKey, EncodePublicKey},
	traits::PublicKeyParts,
	Oaep, RsaPublicKey,
};
use sha2::Sha256;
use std::fmt;

use crate::{
	base64_blobs,
	error::{Error, Result},
	id,
};

// oaep with sha-256: two digests plus two bytes of framing
const OAEP_OVERHEAD: usize = 2 * 32 + 2;

// An rsa public key; travels as base64 of its SPKI DER encoding
#[derive(Clone)]
pub struct PublicKey {
	key: RsaPublicKey,
	der: Vec<u8>,
}

impl PublicKey {
	pub fn from_rsa(key: RsaPublicKey) -> Result<Self> {
		let der = key
			.to_public_key_der()
			.map_err(|e| Error::KeyFormat(e.to_string()))?
			.as_bytes()
			.to_vec();

		Ok(Self { key, der })
	}

	// accepts bare base64 as well as a pasted PEM block
	pub fn from_base64(text: &str) -> Result<Self> {
		let key = if text.trim_start().starts_with("-----BEGIN") {
			RsaPublicKey::from_public_key_pem(text.trim())
				.map_err(|e| Error::KeyFormat(format!("public key: {e}")))?
		} else {
			let der = base64_blobs::decode(text)
				.map_err(|e| e.or_else(|r| Error::KeyFormat(format!("public key: {r}"))))?;

			RsaPublicKey::from_public_key_der(&der)
				.map_err(|e| Error::KeyFormat(format!("public key: {e}")))?
		};

		Self::from_rsa(key)
	}

	pub fn to_base64(&self) -> String {
		base64_blobs::encode(&self.der)
	}

	pub fn as_der(&self) -> &[u8] {
		&self.der
	}

	pub fn id(&self) -> u64 {
		id::from_bytes(&self.der)
	}

	pub fn bits(&self) -> usize {
		self.key.size() * 8
	}

	pub fn max_plaintext_len(&self) -> usize {
		self.key.size().saturating_sub(OAEP_OVERHEAD)
	}

	pub fn encrypt(&self, pt: &[u8]) -> Result<Vec<u8>> {
		let max = self.max_plaintext_len();

		if pt.len() > max {
			return Err(Error::PlaintextTooLarge { len: pt.len(), max });
		}

		self.key
			.encrypt(&mut OsRng, Oaep::new::<Sha256>(), pt)
			.map_err(|e| match e {
				rsa::Error::MessageTooLong => Error::PlaintextTooLarge { len: pt.len(), max },
				other => Error::KeyFormat(format!("public key {:016x}: {other}", self.id())),
			})
	}
}

impl PartialEq for PublicKey {
	fn eq(&self, other: &Self) -> bool {
		self.der == other.der
	}
}

impl fmt::Debug for PublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "PublicKey({:016x}, {} bits)", self.id(), self.bits())
	}
}

impl serde::Serialize for PublicKey {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_base64())
	}
}

impl<'de> serde::Deserialize<'de> for PublicKey {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let text = String::deserialize(deserializer)?;

		Self::from_base64(&text).map_err(serde::de::Error::custom)
	}
}
