use async_trait::async_trait;
use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, info};

use crate::{
	config::Config,
	error::{Error, Result},
	id,
};

// Stores opaque bytes and hands back an address they can be fetched from
#[async_trait]
pub trait BlobStore: Send + Sync {
	// `name` is a hint only; the returned uri is opaque
	async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<String>;
	async fn fetch(&self, uri: &str) -> Result<Vec<u8>>;
}

fn unavailable(uri: &str, reason: impl ToString) -> Error {
	Error::BlobUnavailable {
		uri: uri.to_string(),
		reason: reason.to_string(),
	}
}

pub struct MemoryBlobStore {
	blobs: Mutex<HashMap<String, Vec<u8>>>,
	next: AtomicU64,
}

impl MemoryBlobStore {
	pub fn new() -> Self {
		Self {
			blobs: Mutex::new(HashMap::new()),
			next: AtomicU64::new(1),
		}
	}

	pub async fn len(&self) -> usize {
		self.blobs.lock().await.len()
	}

	// overwrites a stored blob; lets tests play a tampering store
	pub async fn replace(&self, uri: &str, bytes: Vec<u8>) -> Result<()> {
		match self.blobs.lock().await.get_mut(uri) {
			Some(blob) => {
				*blob = bytes;
				Ok(())
			}
			None => Err(unavailable(uri, "no such blob")),
		}
	}

	pub async fn remove(&self, uri: &str) -> Option<Vec<u8>> {
		self.blobs.lock().await.remove(uri)
	}
}

impl Default for MemoryBlobStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
	async fn store(&self, _name: &str, bytes: Vec<u8>) -> Result<String> {
		let uri = format!("mem://{}", self.next.fetch_add(1, Ordering::Relaxed));

		self.blobs.lock().await.insert(uri.clone(), bytes);

		Ok(uri)
	}

	async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
		self.blobs
			.lock()
			.await
			.get(uri)
			.cloned()
			.ok_or_else(|| unavailable(uri, "no such blob"))
	}
}

// Files under a directory, served from `public_url`
pub struct DirBlobStore {
	dir: PathBuf,
	public_url: String,
}

impl DirBlobStore {
	pub async fn open(dir: impl AsRef<Path>, public_url: &str) -> Result<Self> {
		let dir = dir.as_ref().to_path_buf();

		tokio::fs::create_dir_all(&dir).await?;
		info!(dir = %dir.display(), public_url, "blob directory ready");

		Ok(Self {
			dir,
			public_url: public_url.trim_end_matches('/').to_string(),
		})
	}

	pub async fn from_config(config: &Config) -> Result<Self> {
		Self::open(&config.uploads_dir, &config.public_url).await
	}

	fn file_name_of<'a>(&self, uri: &'a str) -> Option<&'a str> {
		let name = uri
			.strip_prefix(self.public_url.as_str())?
			.strip_prefix('/')?;

		if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
			None
		} else {
			Some(name)
		}
	}
}

// anything outside [A-Za-z0-9._-] becomes '_'
pub fn sanitize(name: &str) -> String {
	name.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
				c
			} else {
				'_'
			}
		})
		.collect()
}

fn millis() -> u128 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis())
		.unwrap_or_default()
}

#[async_trait]
impl BlobStore for DirBlobStore {
	async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<String> {
		let file_name = format!("{}_{:016x}_{}", millis(), id::generate(), sanitize(name));
		let path = self.dir.join(&file_name);

		let mut file = OpenOptions::new()
			.create_new(true)
			.write(true)
			.open(&path)
			.await?;

		file.write_all(&bytes).await?;
		file.flush().await?;

		debug!(path = %path.display(), size = bytes.len(), "stored blob");

		Ok(format!("{}/{}", self.public_url, file_name))
	}

	async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
		let name = self
			.file_name_of(uri)
			.ok_or_else(|| unavailable(uri, "not an address of this store"))?;

		tokio::fs::read(self.dir.join(name))
			.await
			.map_err(|e| unavailable(uri, e))
	}
}
