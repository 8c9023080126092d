use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{
	error::{Error, Result},
	key_pair::KeyPair,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	// modulus size of generated teacher keys
	pub rsa_bits: usize,
	// pairs strictly above this cosine similarity get flagged
	pub similarity_threshold: f64,
	// shorter words are ignored by the plagiarism detector
	pub min_token_len: usize,
	pub uploads_dir: PathBuf,
	pub public_url: String,
	pub keystore_path: PathBuf,
	// used when RUST_LOG is not set
	pub log_filter: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			rsa_bits: KeyPair::DEFAULT_BITS,
			similarity_threshold: 0.75,
			min_token_len: 3,
			uploads_dir: PathBuf::from("uploads"),
			public_url: "http://localhost:5001/files".to_string(),
			keystore_path: PathBuf::from("keys.json"),
			log_filter: "info".to_string(),
		}
	}
}

impl Config {
	pub fn from_json(json: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(json)?;

		config.validate()
	}

	pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
		let json = tokio::fs::read_to_string(path).await?;

		Self::from_json(&json)
	}

	fn validate(self) -> Result<Self> {
		if self.rsa_bits < KeyPair::MIN_BITS {
			return Err(Error::Config(format!(
				"rsa_bits must be at least {}, got {}",
				KeyPair::MIN_BITS,
				self.rsa_bits
			)));
		}

		if !(0.0..=1.0).contains(&self.similarity_threshold) {
			return Err(Error::Config(format!(
				"similarity_threshold must be within [0, 1], got {}",
				self.similarity_threshold
			)));
		}

		if self.min_token_len == 0 {
			return Err(Error::Config("min_token_len must be positive".to_string()));
		}

		Ok(self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = Config::default();

		assert_eq!(config.rsa_bits, 2048);
		assert_eq!(config.similarity_threshold, 0.75);
		assert_eq!(config.min_token_len, 3);
	}

	#[test]
	fn test_partial_json() {
		let config = Config::from_json(r#"{"similarity_threshold": 0.9, "uploads_dir": "/tmp/up"}"#)
			.unwrap();

		assert_eq!(config.similarity_threshold, 0.9);
		assert_eq!(config.uploads_dir, PathBuf::from("/tmp/up"));
		assert_eq!(config.rsa_bits, 2048);
	}

	#[test]
	fn test_invalid() {
		assert!(matches!(
			Config::from_json(r#"{"rsa_bits": 512}"#),
			Err(Error::Config(_))
		));
		assert!(matches!(
			Config::from_json(r#"{"similarity_threshold": 1.5}"#),
			Err(Error::Config(_))
		));
		assert!(matches!(
			Config::from_json(r#"{"min_token_len": 0}"#),
			Err(Error::Config(_))
		));
		assert!(matches!(
			Config::from_json("not json"),
			Err(Error::Serialization(_))
		));
	}

	#[tokio::test]
	async fn test_load() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("config.json");

		tokio::fs::write(&path, r#"{"min_token_len": 4}"#).await.unwrap();

		assert_eq!(Config::load(&path).await.unwrap().min_token_len, 4);
		assert!(matches!(
			Config::load(tmp.path().join("missing.json")).await,
			Err(Error::Io(_))
		));
	}
}
