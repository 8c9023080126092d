//! Hybrid encryption engine: rsa-oaep for short text and wrapped keys, aes-256-gcm for
//! everything of unbounded length, sha-256 for content hashes.
//!
//! Every ciphertext crossing this module is base64 text.
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
	aes_gcm::Key,
	base64_blobs,
	encrypted::Encrypted,
	error::{Error, Result},
	lock::Lock,
	private_key::PrivateKey,
	public_key::PublicKey,
};

// Direct rsa-oaep; meant for keys and probes, not for user text of arbitrary length
pub fn asymmetric_encrypt(message: &str, public: &PublicKey) -> Result<String> {
	let ct = public.encrypt(message.as_bytes())?;

	Ok(base64_blobs::encode(&ct))
}

pub fn asymmetric_decrypt(ct: &str, private: &PrivateKey) -> Result<String> {
	let ct = base64_blobs::decode(ct).map_err(|e| {
		e.or_else(|r| Error::DecryptionFailed(format!("malformed rsa ciphertext: {r}")))
	})?;
	let pt = private.decrypt(&ct)?;

	String::from_utf8(pt)
		.map_err(|_| Error::DecryptionFailed("plaintext is not valid utf-8".to_string()))
}

pub fn generate_symmetric_key() -> Key {
	Key::generate()
}

pub fn symmetric_encrypt_file(bytes: &[u8], key: &Key) -> Result<String> {
	Ok(Encrypted::seal(bytes, key)?.to_base64())
}

pub fn symmetric_decrypt_file(ct: &str, key: &Key) -> Result<Vec<u8>> {
	Encrypted::from_base64(ct)?.open(key)
}

// lowercase hex sha-256
pub fn hash(bytes: &[u8]) -> String {
	hex::encode(Sha256::digest(bytes))
}

pub fn wrap_key(key: &Key, public: &PublicKey) -> Result<String> {
	debug!(key_id = public.id(), "wrapping symmetric key");

	asymmetric_encrypt(&key.to_base64(), public)
}

pub fn unwrap_key(wrapped: &str, private: &PrivateKey) -> Result<Key> {
	let text = asymmetric_decrypt(wrapped, private)?;

	Key::from_base64(&text).map_err(|_| {
		Error::DecryptionFailed("unwrapped data is not a symmetric key".to_string())
	})
}

// Text of any length, sealed for the holder of `public`'s private half
pub fn seal_text(text: &str, public: &PublicKey) -> Result<String> {
	Lock::seal(text.as_bytes(), public)?.to_text()
}

pub fn open_text(sealed: &str, private: &PrivateKey) -> Result<String> {
	let pt = Lock::from_text(sealed)?.open(private)?;

	String::from_utf8(pt)
		.map_err(|_| Error::DecryptionFailed("plaintext is not valid utf-8".to_string()))
}
