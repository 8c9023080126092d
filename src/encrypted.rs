use serde::{Deserialize, Serialize};

use crate::{
	aes_gcm::{Aes, Key},
	base64_blobs::{self, deserialize_vec_base64, serialize_vec_base64},
	error::{Error, Result},
	salt::Salt,
};

// Symmetrically encrypted content; carries its own salt, so the key alone opens it
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Encrypted {
	#[serde(
		serialize_with = "serialize_vec_base64",
		deserialize_with = "deserialize_vec_base64"
	)]
	pub ct: Vec<u8>,
	pub salt: Salt,
}

impl Encrypted {
	pub fn seal(pt: &[u8], key: &Key) -> Result<Self> {
		let salt = Salt::generate();
		let ct = Aes::derive(key, &salt)?.encrypt(pt)?;

		Ok(Self { ct, salt })
	}

	pub fn open(&self, key: &Key) -> Result<Vec<u8>> {
		Aes::derive(key, &self.salt)?.decrypt(&self.ct)
	}

	// base64(salt || ct)
	pub fn to_base64(&self) -> String {
		base64_blobs::encode(&[self.salt.bytes.as_slice(), self.ct.as_slice()].concat())
	}

	pub fn from_base64(text: &str) -> Result<Self> {
		let bytes = base64_blobs::decode(text).map_err(|e| {
			e.or_else(|reason| Error::DecryptionFailed(format!("malformed ciphertext: {reason}")))
		})?;
		let (salt, ct) = Salt::split_prefix(&bytes).ok_or_else(|| {
			Error::DecryptionFailed(format!("truncated ciphertext: {} bytes", bytes.len()))
		})?;

		Ok(Self {
			ct: ct.to_vec(),
			salt,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_seal_open() {
		let key = Key::generate();
		let encrypted = Encrypted::seal(b"some file", &key).unwrap();

		assert_eq!(encrypted.open(&key).unwrap(), b"some file");
	}

	#[test]
	fn test_same_input_differs() {
		let key = Key::generate();
		let a = Encrypted::seal(b"same", &key).unwrap();
		let b = Encrypted::seal(b"same", &key).unwrap();

		assert_ne!(a.to_base64(), b.to_base64());
	}

	#[test]
	fn test_base64_form() {
		let key = Key::generate();
		let encrypted = Encrypted::seal(&[1, 2, 3], &key).unwrap();
		let text = encrypted.to_base64();

		assert_eq!(Encrypted::from_base64(&text).unwrap(), encrypted);
	}

	#[test]
	fn test_truncated() {
		let text = base64_blobs::encode(&[0u8; 10]);

		assert!(matches!(
			Encrypted::from_base64(&text),
			Err(Error::DecryptionFailed(_))
		));
		assert!(matches!(
			Encrypted::from_base64("%%%"),
			Err(Error::DecryptionFailed(_))
		));
	}

	#[test]
	fn test_serialize_deserialize() {
		let encrypted = Encrypted::seal(b"payload", &Key::generate()).unwrap();
		let serialized = serde_json::to_string(&encrypted).unwrap();
		let deserialized: Encrypted = serde_json::from_str(&serialized).unwrap();

		assert_eq!(encrypted, deserialized);
	}
}
