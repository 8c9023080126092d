use std::{
	collections::BTreeMap,
	path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::{
	account::Account,
	error::Result,
	key_pair::{self, KeyPair},
	private_key::PrivateKey,
};

// Private keys kept on the owner's machine: { account, base64 pkcs#8 }
pub struct KeyStore {
	path: PathBuf,
	keys: BTreeMap<Account, String>,
}

impl KeyStore {
	// a missing file is an empty store
	pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref().to_path_buf();
		let keys = match tokio::fs::read_to_string(&path).await {
			Ok(json) if json.trim().is_empty() => BTreeMap::new(),
			Ok(json) => serde_json::from_str(&json)?,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
			Err(e) => return Err(e.into()),
		};

		debug!(path = %path.display(), accounts = keys.len(), "opened key store");

		Ok(Self { path, keys })
	}

	pub fn contains(&self, account: &Account) -> bool {
		self.keys.contains_key(account)
	}

	pub fn get(&self, account: &Account) -> Result<Option<PrivateKey>> {
		self.keys
			.get(account)
			.map(|text| key_pair::import_private(text))
			.transpose()
	}

	// the key becomes visible only once it is on disk
	pub async fn put(&mut self, account: &Account, private: &PrivateKey) -> Result<()> {
		let mut keys = self.keys.clone();

		keys.insert(account.clone(), private.to_base64());
		self.persist(&keys).await?;
		self.keys = keys;

		info!(%account, "stored private key");

		Ok(())
	}

	// the stored private key with its public half
	pub fn key_pair(&self, account: &Account) -> Result<Option<KeyPair>> {
		match self.get(account)? {
			Some(private) => {
				let public = private.public_key()?;

				Ok(Some(KeyPair::new(private, public)))
			}
			None => Ok(None),
		}
	}

	async fn persist(&self, keys: &BTreeMap<Account, String>) -> Result<()> {
		if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(dir).await?;
		}

		let json = serde_json::to_string_pretty(keys)?;
		let tmp = self.path.with_extension("tmp");

		tokio::fs::write(&tmp, json).await?;
		tokio::fs::rename(&tmp, &self.path).await?;

		Ok(())
	}
}
