use serde::{Deserialize, Serialize};

use crate::{
	encrypted::Encrypted,
	error::{Error, Result},
	hybrid,
	private_key::PrivateKey,
	public_key::PublicKey,
};

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Lock {
	// a fresh symmetric key, wrapped with the recipient's public key
	pub key: String,
	// pt encrypted with that key
	pub body: Encrypted,
}

impl Lock {
	pub fn seal(pt: &[u8], public: &PublicKey) -> Result<Self> {
		let key = hybrid::generate_symmetric_key();
		let body = Encrypted::seal(pt, &key)?;

		Ok(Self {
			key: hybrid::wrap_key(&key, public)?,
			body,
		})
	}

	pub fn open(&self, private: &PrivateKey) -> Result<Vec<u8>> {
		let key = hybrid::unwrap_key(&self.key, private).map_err(|e| e.within("wrapped key"))?;

		self.body.open(&key)
	}

	pub fn to_text(&self) -> Result<String> {
		Ok(serde_json::to_string(self)?)
	}

	pub fn from_text(text: &str) -> Result<Self> {
		serde_json::from_str(text.trim())
			.map_err(|e| Error::DecryptionFailed(format!("not a sealed payload: {e}")))
	}
}
