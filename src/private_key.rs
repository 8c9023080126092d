use rsa::{
	pkcs8::{DecodePrivateKey, EncodePrivateKey},
	traits::PublicKeyParts,
	Oaep, RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;
use std::fmt;

use crate::{
	base64_blobs,
	error::{Error, Result},
	public_key::PublicKey,
};

// An rsa private key; travels as base64 of its PKCS#8 DER encoding and never leaves the client
#[derive(Clone)]
pub struct PrivateKey {
	key: RsaPrivateKey,
	der: Vec<u8>,
}

impl PrivateKey {
	pub fn from_rsa(key: RsaPrivateKey) -> Result<Self> {
		let der = key
			.to_pkcs8_der()
			.map_err(|e| Error::KeyFormat(e.to_string()))?
			.as_bytes()
			.to_vec();

		Ok(Self { key, der })
	}

	pub fn from_base64(text: &str) -> Result<Self> {
		let key = if text.trim_start().starts_with("-----BEGIN") {
			RsaPrivateKey::from_pkcs8_pem(text.trim())
				.map_err(|e| Error::KeyFormat(format!("private key: {e}")))?
		} else {
			let der = base64_blobs::decode(text)
				.map_err(|e| e.or_else(|r| Error::KeyFormat(format!("private key: {r}"))))?;

			RsaPrivateKey::from_pkcs8_der(&der)
				.map_err(|e| Error::KeyFormat(format!("private key: {e}")))?
		};

		Self::from_rsa(key)
	}

	pub fn to_base64(&self) -> String {
		base64_blobs::encode(&self.der)
	}

	pub fn public_key(&self) -> Result<PublicKey> {
		PublicKey::from_rsa(RsaPublicKey::from(&self.key))
	}

	pub fn decrypt(&self, ct: &[u8]) -> Result<Vec<u8>> {
		let size = self.key.size();

		if ct.len() != size {
			return Err(Error::DecryptionFailed(format!(
				"ciphertext is {} bytes, a {}-bit key expects {}",
				ct.len(),
				size * 8,
				size
			)));
		}

		self.key.decrypt(Oaep::new::<Sha256>(), ct).map_err(|_| {
			Error::DecryptionFailed("wrong private key or corrupted ciphertext".to_string())
		})
	}
}

impl PartialEq for PrivateKey {
	fn eq(&self, other: &Self) -> bool {
		self.der == other.der
	}
}

impl fmt::Debug for PrivateKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "PrivateKey({} bits)", self.key.size() * 8)
	}
}

impl serde::Serialize for PrivateKey {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_base64())
	}
}

impl<'de> serde::Deserialize<'de> for PrivateKey {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let text = String::deserialize(deserializer)?;

		Self::from_base64(&text).map_err(serde::de::Error::custom)
	}
}
