use crate::{
	base64_blobs,
	error::{Error, Result},
	salt::Salt,
};
use ::aes_gcm::{
	aead::{Aead, KeyInit},
	Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use std::fmt;

const KEY_SIZE: usize = 32;
const IV_SIZE: usize = 12;
// aes-gcm refuses anything above 2^36 - 32 bytes
const MAX_PLAINTEXT: u64 = (1 << 36) - 32;
const KDF_INFO: &[u8] = b"coursevault file key";

// Only ever leaves this process wrapped with a public key
#[derive(Clone, Copy, PartialEq)]
pub struct Key {
	pub bytes: [u8; Self::SIZE],
}

impl Key {
	pub const SIZE: usize = KEY_SIZE;

	pub fn generate() -> Self {
		let mut bytes = [0u8; Self::SIZE];
		OsRng.fill_bytes(&mut bytes);

		Self { bytes }
	}

	pub fn to_base64(&self) -> String {
		base64_blobs::encode(&self.bytes)
	}

	pub fn from_base64(text: &str) -> Result<Self> {
		let decoded = base64_blobs::decode(text).map_err(|e| e.or_else(Error::KeyFormat))?;
		let bytes = decoded.try_into().map_err(|v: Vec<u8>| {
			Error::KeyFormat(format!(
				"symmetric key must be {} bytes, got {}",
				Self::SIZE,
				v.len()
			))
		})?;

		Ok(Self { bytes })
	}
}

impl fmt::Debug for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Key(<redacted>)")
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Iv {
	pub bytes: [u8; Self::SIZE],
}

impl Iv {
	pub const SIZE: usize = IV_SIZE;
}

#[derive(Clone, PartialEq, Debug)]
pub struct Aes {
	pub key: Key,
	pub iv: Iv,
}

impl From<&[u8; KEY_SIZE + IV_SIZE]> for Aes {
	fn from(key_iv: &[u8; KEY_SIZE + IV_SIZE]) -> Self {
		let mut key = [0u8; KEY_SIZE];
		let mut iv = [0u8; IV_SIZE];

		key.copy_from_slice(&key_iv[..KEY_SIZE]);
		iv.copy_from_slice(&key_iv[KEY_SIZE..]);

		Self {
			key: Key { bytes: key },
			iv: Iv { bytes: iv },
		}
	}
}

impl Aes {
	// hkdf-sha256(ikm = key, salt) -> aes key || iv
	pub fn derive(key: &Key, salt: &Salt) -> Result<Self> {
		let hk = Hkdf::<Sha256>::new(Some(&salt.bytes[..]), &key.bytes);
		let mut key_iv = [0u8; KEY_SIZE + IV_SIZE];

		hk.expand(KDF_INFO, &mut key_iv)
			.map_err(|e| Error::KeyGeneration(e.to_string()))?;

		Ok(Self::from(&key_iv))
	}

	fn cipher(&self) -> Aes256Gcm {
		Aes256Gcm::new(::aes_gcm::Key::<Aes256Gcm>::from_slice(&self.key.bytes))
	}

	pub fn encrypt(&self, pt: &[u8]) -> Result<Vec<u8>> {
		if pt.len() as u64 > MAX_PLAINTEXT {
			return Err(Error::PlaintextTooLarge {
				len: pt.len(),
				max: MAX_PLAINTEXT as usize,
			});
		}

		self.cipher()
			.encrypt(Nonce::from_slice(&self.iv.bytes), pt)
			.map_err(|_| Error::PlaintextTooLarge {
				len: pt.len(),
				max: MAX_PLAINTEXT as usize,
			})
	}

	pub fn decrypt(&self, ct: &[u8]) -> Result<Vec<u8>> {
		self.cipher()
			.decrypt(Nonce::from_slice(&self.iv.bytes), ct)
			.map_err(|_| {
				Error::DecryptionFailed(
					"wrong symmetric key or corrupted ciphertext (tag mismatch)".to_string(),
				)
			})
	}
}
