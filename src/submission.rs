use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
	blob_store::BlobStore,
	error::Result,
	hybrid,
	public_key::PublicKey,
};

// A file as picked by the user, before any encryption
#[derive(Clone, Debug, PartialEq)]
pub struct RawFile {
	pub name: String,
	pub mime_type: String,
	pub bytes: Vec<u8>,
}

impl RawFile {
	pub fn new(name: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
		Self {
			name: name.to_string(),
			mime_type: mime_type.to_string(),
			bytes,
		}
	}
}

// An encrypted attachment of a submission; either every field is set or there's no attachment at all
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FileAttachment {
	// sha-256 of the stored ciphertext, not of the original file
	pub hash: String,
	pub name: String,
	pub mime_type: String,
	pub uri: String,
	// the file's symmetric key, wrapped with the same public key as the answer
	pub wrapped_key: String,
}

impl FileAttachment {
	pub fn is_complete(&self) -> bool {
		[
			&self.hash,
			&self.name,
			&self.mime_type,
			&self.uri,
			&self.wrapped_key,
		]
		.iter()
		.all(|field| !field.is_empty())
	}
}

// A file stored as-is, referenced by hash (assignment attachments, corrections)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoredFile {
	// sha-256 of the plaintext bytes
	pub hash: String,
	pub name: String,
	pub mime_type: String,
	pub uri: String,
}

impl StoredFile {
	pub fn is_complete(&self) -> bool {
		!self.hash.is_empty() && !self.name.is_empty() && !self.uri.is_empty()
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SubmissionPayload {
	// sealed for the assignment's public key
	pub answer: String,
	pub identity: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file: Option<FileAttachment>,
}

// A payload whose attachment ciphertext still has to reach the blob store
#[derive(Debug)]
pub struct SubmissionDraft {
	pub payload: SubmissionPayload,
	pub blob: Option<Vec<u8>>,
}

impl SubmissionDraft {
	// stores the ciphertext and fills in the attachment's uri
	pub async fn store_blob<B>(self, store: &B) -> Result<SubmissionPayload>
	where
		B: BlobStore + ?Sized,
	{
		let SubmissionDraft { mut payload, blob } = self;

		if let (Some(file), Some(blob)) = (payload.file.as_mut(), blob) {
			file.uri = store.store(&file.name, blob).await?;
			debug!(uri = %file.uri, "stored submission blob");
		}

		Ok(payload)
	}
}

pub fn build_submission(
	answer: &str,
	identity: &str,
	recipient: &PublicKey,
	file: Option<&RawFile>,
) -> Result<SubmissionDraft> {
	let answer = hybrid::seal_text(answer, recipient)?;
	let identity = hybrid::seal_text(identity, recipient)?;

	let (file, blob) = match file {
		Some(raw) => {
			let key = hybrid::generate_symmetric_key();
			let ct = hybrid::symmetric_encrypt_file(&raw.bytes, &key)?;
			let attachment = FileAttachment {
				hash: hybrid::hash(ct.as_bytes()),
				name: raw.name.clone(),
				mime_type: raw.mime_type.clone(),
				uri: String::new(),
				wrapped_key: hybrid::wrap_key(&key, recipient)?,
			};

			(Some(attachment), Some(ct.into_bytes()))
		}
		None => (None, None),
	};

	debug!(
		key_id = recipient.id(),
		with_file = file.is_some(),
		"built submission"
	);

	Ok(SubmissionDraft {
		payload: SubmissionPayload {
			answer,
			identity,
			file,
		},
		blob,
	})
}

// Plain files are hashed and stored without encryption
pub async fn store_plain_file<B>(file: &RawFile, store: &B) -> Result<StoredFile>
where
	B: BlobStore + ?Sized,
{
	let hash = hybrid::hash(&file.bytes);
	let uri = store.store(&file.name, file.bytes.clone()).await?;

	Ok(StoredFile {
		hash,
		name: file.name.clone(),
		mime_type: file.mime_type.clone(),
		uri,
	})
}
