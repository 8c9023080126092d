use futures_util::future::join_all;
use rand::{rngs::OsRng, RngCore};
use tracing::{debug, warn};

use crate::{
	base64_blobs,
	blob_store::BlobStore,
	coursework::SubmissionRecord,
	error::{Error, Result},
	hybrid,
	key_pair,
	private_key::PrivateKey,
};

#[derive(Clone, Debug, PartialEq)]
pub struct DecryptedFile {
	pub bytes: Vec<u8>,
	pub name: String,
	pub mime_type: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecryptedSubmission {
	pub answer: String,
	pub identity: String,
	pub file: Option<DecryptedFile>,
}

// True only if `private` opens what gets encrypted for `public_text`
pub fn verify_key_pair_against_public(private: &PrivateKey, public_text: &str) -> bool {
	let Ok(public) = key_pair::import_public(public_text) else {
		return false;
	};

	let mut probe = [0u8; 32];
	OsRng.fill_bytes(&mut probe);
	let probe = base64_blobs::encode(&probe);

	let matches = hybrid::asymmetric_encrypt(&probe, &public)
		.and_then(|ct| hybrid::asymmetric_decrypt(&ct, private))
		.is_ok_and(|pt| pt == probe);

	debug!(key_id = public.id(), matches, "verified key pair");

	matches
}

// Downloads `uri` and checks its sha-256 before anything else touches it
pub async fn fetch_verified<B>(store: &B, uri: &str, hash: &str) -> Result<Vec<u8>>
where
	B: BlobStore + ?Sized,
{
	let bytes = store.fetch(uri).await?;
	let actual = hybrid::hash(&bytes);

	if !actual.eq_ignore_ascii_case(hash) {
		return Err(Error::IntegrityCheckFailed {
			uri: uri.to_string(),
			expected: hash.to_string(),
			actual,
		});
	}

	Ok(bytes)
}

pub async fn decrypt_submission<B>(
	record: &SubmissionRecord,
	private: &PrivateKey,
	store: &B,
) -> Result<DecryptedSubmission>
where
	B: BlobStore + ?Sized,
{
	let answer = hybrid::open_text(&record.answer, private).map_err(|e| e.within("answer"))?;
	let identity =
		hybrid::open_text(&record.identity, private).map_err(|e| e.within("identity"))?;

	let file = match &record.file {
		Some(attachment) => {
			let key = hybrid::unwrap_key(&attachment.wrapped_key, private)
				.map_err(|e| e.within("file key"))?;
			let blob = fetch_verified(store, &attachment.uri, &attachment.hash).await?;
			let ct = String::from_utf8(blob).map_err(|_| {
				Error::DecryptionFailed("file: stored ciphertext is not base64 text".to_string())
			})?;
			let bytes = hybrid::symmetric_decrypt_file(&ct, &key).map_err(|e| e.within("file"))?;

			Some(DecryptedFile {
				bytes,
				name: attachment.name.clone(),
				mime_type: attachment.mime_type.clone(),
			})
		}
		None => None,
	};

	debug!(submission = %record.id, with_file = file.is_some(), "decrypted submission");

	Ok(DecryptedSubmission {
		answer,
		identity,
		file,
	})
}

// Answers only, in record order; an unreadable answer becomes an empty string
pub async fn decrypt_answers(records: &[SubmissionRecord], private: &PrivateKey) -> Vec<String> {
	join_all(records.iter().map(|record| async move {
		hybrid::open_text(&record.answer, private).unwrap_or_else(|e| {
			warn!(submission = %record.id, error = %e, "could not decrypt answer");
			String::new()
		})
	}))
	.await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		account::Account,
		blob_store::MemoryBlobStore,
		id::Uid,
		key_pair::KeyPair,
		submission::{build_submission, RawFile, SubmissionPayload},
		test_keys,
	};
	use chrono::Utc;

	fn record(id: u64, payload: SubmissionPayload) -> SubmissionRecord {
		SubmissionRecord {
			id: Uid::new(id),
			assignment: Uid::new(1),
			module: Uid::new(1),
			student: Account::new("0xS1"),
			answer: payload.answer,
			identity: payload.identity,
			file: payload.file,
			submitted_at: Utc::now(),
			correction: None,
		}
	}

	async fn submitted(store: &MemoryBlobStore, file: Option<&RawFile>) -> SubmissionRecord {
		let public = test_keys::teacher_a().public_key();
		let draft = build_submission(
			"La validite est garantie par consensus",
			"Alice Martin, E001",
			public,
			file,
		)
		.unwrap();

		record(1, draft.store_blob(store).await.unwrap())
	}

	#[tokio::test]
	async fn test_happy_path() {
		let store = MemoryBlobStore::new();
		let raw = RawFile::new("a.bin", "application/octet-stream", vec![1, 2, 3]);
		let record = submitted(&store, Some(&raw)).await;
		let private = test_keys::teacher_a().private_key();
		let public_text = test_keys::teacher_a().export_public();

		assert!(verify_key_pair_against_public(private, &public_text));

		let opened = decrypt_submission(&record, private, &store).await.unwrap();
		let file = opened.file.unwrap();

		assert_eq!(opened.answer, "La validite est garantie par consensus");
		assert_eq!(opened.identity, "Alice Martin, E001");
		assert_eq!(file.bytes, vec![1, 2, 3]);
		assert_eq!(file.name, "a.bin");
		assert_eq!(file.mime_type, "application/octet-stream");
	}

	#[tokio::test]
	async fn test_wrong_key_is_rejected() {
		let store = MemoryBlobStore::new();
		let record = submitted(&store, None).await;
		let stranger = test_keys::teacher_b().private_key();

		assert!(!verify_key_pair_against_public(
			stranger,
			&test_keys::teacher_a().export_public()
		));

		let err = decrypt_submission(&record, stranger, &store).await.unwrap_err();

		assert!(matches!(err, Error::DecryptionFailed(ref reason) if reason.starts_with("answer")));
	}

	#[test]
	fn test_verify_unparsable_public_key() {
		let private = test_keys::teacher_a().private_key();

		assert!(!verify_key_pair_against_public(private, "not a key"));
		assert!(!verify_key_pair_against_public(private, ""));
	}

	#[test]
	fn test_key_mismatch_pairwise() {
		let pairs: Vec<KeyPair> = (0..20)
			.map(|_| KeyPair::generate_with_bits(KeyPair::MIN_BITS).unwrap())
			.collect();
		let publics: Vec<String> = pairs.iter().map(KeyPair::export_public).collect();

		for (i, pair) in pairs.iter().enumerate() {
			for (j, public) in publics.iter().enumerate() {
				assert_eq!(
					verify_key_pair_against_public(pair.private_key(), public),
					i == j,
					"pair {i} against public key {j}"
				);
			}
		}
	}

	#[tokio::test]
	async fn test_tampered_blob() {
		let store = MemoryBlobStore::new();
		let raw = RawFile::new("a.bin", "application/octet-stream", vec![1, 2, 3]);
		let record = submitted(&store, Some(&raw)).await;
		let uri = record.file.as_ref().unwrap().uri.clone();
		let mut blob = store.fetch(&uri).await.unwrap();

		blob[0] ^= 1;
		store.replace(&uri, blob).await.unwrap();

		let res = decrypt_submission(&record, test_keys::teacher_a().private_key(), &store).await;

		assert!(matches!(res, Err(Error::IntegrityCheckFailed { .. })));
	}

	#[tokio::test]
	async fn test_missing_blob() {
		let store = MemoryBlobStore::new();
		let raw = RawFile::new("a.bin", "application/octet-stream", vec![1, 2, 3]);
		let record = submitted(&store, Some(&raw)).await;

		store.remove(&record.file.as_ref().unwrap().uri).await;

		let res = decrypt_submission(&record, test_keys::teacher_a().private_key(), &store).await;

		assert!(matches!(res, Err(Error::BlobUnavailable { .. })));
	}

	#[tokio::test]
	async fn test_fetch_verified() {
		let store = MemoryBlobStore::new();
		let uri = store.store("c.pdf", b"correction".to_vec()).await.unwrap();

		assert_eq!(
			fetch_verified(&store, &uri, &hybrid::hash(b"correction")).await.unwrap(),
			b"correction"
		);
		assert!(matches!(
			fetch_verified(&store, &uri, &hybrid::hash(b"other")).await,
			Err(Error::IntegrityCheckFailed { .. })
		));
	}

	#[tokio::test]
	async fn test_decrypt_answers_tolerates_failures() {
		let public = test_keys::teacher_a().public_key();
		let sealed = |answer: &str| build_submission(answer, "id", public, None).unwrap().payload;
		let mut broken = sealed("lost");

		broken.answer = "CONTENU_CHIFFRE".to_string();

		let records = vec![
			record(1, sealed("premiere reponse")),
			record(2, broken),
			record(3, sealed("troisieme reponse")),
		];
		let answers = decrypt_answers(&records, test_keys::teacher_a().private_key()).await;

		assert_eq!(answers, vec!["premiere reponse", "", "troisieme reponse"]);
	}
}
