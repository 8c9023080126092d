use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
	account::Account,
	blob_store::BlobStore,
	config::Config,
	coursework::{Assignment, Correction, NewAssignment, SubmissionRecord},
	decryption::{self, DecryptedFile, DecryptedSubmission},
	error::{Error, Result},
	id::Uid,
	key_pair::{self, KeyPair},
	keystore::KeyStore,
	plagiarism::{Detector, Similarity},
	private_key::PrivateKey,
	public_key::PublicKey,
	registry::{self, Registry, Report},
	session::Session,
	submission::{self, RawFile, StoredFile},
	users::Role,
};

// One submission as the teacher sees it; a failure here doesn't stop the others
#[derive(Debug)]
pub struct OpenedSubmission {
	pub record: SubmissionRecord,
	pub result: Result<DecryptedSubmission>,
}

// Everything a user does, from key setup to grade reports
pub struct Desk<R, B> {
	config: Config,
	registry: R,
	store: B,
	keys: Mutex<KeyStore>,
}

impl<R, B> Desk<R, B>
where
	R: Registry,
	B: BlobStore,
{
	pub fn new(config: Config, registry: R, store: B, keys: KeyStore) -> Self {
		Self {
			config,
			registry,
			store,
			keys: Mutex::new(keys),
		}
	}

	pub async fn open(config: Config, registry: R, store: B) -> Result<Self> {
		let keys = KeyStore::open(&config.keystore_path).await?;

		Ok(Self::new(config, registry, store, keys))
	}

	pub fn registry(&self) -> &R {
		&self.registry
	}

	pub fn store(&self) -> &B {
		&self.store
	}

	pub async fn connect(&self, account: Account) -> Session {
		let session = Session::new(account);

		self.refresh(&session).await
	}

	pub async fn refresh(&self, session: &Session) -> Session {
		let role = self.registry.role_of(&session.account).await;
		let assignments = self.registry.assignments_of(&session.account).await;

		debug!(account = %session.account, ?role, assignments = assignments.len(), "session refreshed");

		session.with_role(role).with_assignments(assignments)
	}

	// Loads the local pair or makes a new one, and makes sure the registry has its public half
	pub async fn ensure_teacher_keys(&self, session: &Session) -> Result<PublicKey> {
		session.require(Role::Teacher)?;

		let account = &session.account;
		let mut keys = self.keys.lock().await;

		let pair = match keys.key_pair(account)? {
			Some(pair) => pair,
			None => {
				let bits = self.config.rsa_bits;
				let pair = tokio::task::spawn_blocking(move || KeyPair::generate_with_bits(bits))
					.await
					.map_err(|e| Error::KeyGeneration(e.to_string()))??;

				keys.put(account, pair.private_key()).await?;
				info!(%account, key_id = pair.id(), "generated teacher keys");

				pair
			}
		};

		let exported = pair.export_public();

		if self.registry.teacher_key(account).await.as_deref() != Some(exported.as_str()) {
			self.registry.set_teacher_key(account, &exported).await?;
		}

		Ok(pair.public)
	}

	pub async fn create_assignment(
		&self,
		session: &Session,
		module: Uid,
		title: &str,
		description: &str,
		attachment: Option<&RawFile>,
		deadline: DateTime<Utc>,
	) -> Result<Uid> {
		let public = self.ensure_teacher_keys(session).await?;
		let now = Utc::now();

		if deadline <= now {
			return Err(registry::Error::InvalidDeadline.into());
		}

		let attachment = match attachment {
			Some(file) => Some(submission::store_plain_file(file, &self.store).await?),
			None => None,
		};

		let new = NewAssignment {
			module,
			title: title.to_string(),
			description: description.to_string(),
			attachment,
			public_key: public.to_base64(),
			deadline,
		};

		self.registry
			.create_assignment(&session.account, new, now)
			.await
	}

	pub async fn submit(
		&self,
		session: &Session,
		assignment: Uid,
		answer: &str,
		identity: &str,
		file: Option<&RawFile>,
	) -> Result<Uid> {
		session.require(Role::Student)?;

		let now = Utc::now();

		// nothing gets uploaded for a submission the registry would turn down
		self.registry
			.can_submit(&session.account, assignment, now)
			.await?;

		let recipient = key_pair::import_public(&self.registry.public_key_for(assignment).await?)?;
		let payload = submission::build_submission(answer, identity, &recipient, file)?
			.store_blob(&self.store)
			.await?;

		self.registry
			.push_submission(&session.account, assignment, payload, now)
			.await
	}

	// The teacher's local key, checked against the one submissions were sealed for
	async fn verified_key(&self, session: &Session, assignment: Uid) -> Result<PrivateKey> {
		session.require(Role::Teacher)?;

		let private = self
			.keys
			.lock()
			.await
			.get(&session.account)?
			.ok_or_else(|| Error::MissingPrivateKey(session.account.clone()))?;
		let public_text = self.registry.public_key_for(assignment).await?;

		if !decryption::verify_key_pair_against_public(&private, &public_text) {
			let key_id = key_pair::import_public(&public_text)
				.map(|public| public.id())
				.unwrap_or_default();

			warn!(account = %session.account, %assignment, key_id, "local key does not match");

			return Err(Error::KeyMismatch { key_id });
		}

		Ok(private)
	}

	pub async fn open_submissions(
		&self,
		session: &Session,
		assignment: Uid,
	) -> Result<Vec<OpenedSubmission>> {
		let private = self.verified_key(session, assignment).await?;
		let records = self.registry.submissions_for(assignment).await?;
		let results = join_all(
			records
				.iter()
				.map(|record| decryption::decrypt_submission(record, &private, &self.store)),
		)
		.await;

		for (record, result) in records.iter().zip(&results) {
			if let Err(e) = result {
				warn!(submission = %record.id, error = %e, "could not open submission");
			}
		}

		Ok(records
			.into_iter()
			.zip(results)
			.map(|(record, result)| OpenedSubmission { record, result })
			.collect())
	}

	// pairs refer to positions in the assignment's submission list
	pub async fn check_plagiarism(&self, session: &Session, assignment: Uid) -> Result<Vec<Similarity>> {
		let private = self.verified_key(session, assignment).await?;
		let records = self.registry.submissions_for(assignment).await?;
		let answers = decryption::decrypt_answers(&records, &private).await;
		let found = Detector::from_config(&self.config).detect(&answers);

		info!(%assignment, submissions = records.len(), flagged = found.len(), "plagiarism check");

		Ok(found)
	}

	pub async fn grade(
		&self,
		session: &Session,
		id: Uid,
		grade: u8,
		comment: &str,
		correction_file: Option<&RawFile>,
	) -> Result<()> {
		session.require(Role::Teacher)?;
		self.registry
			.can_correct(&session.account, id, grade)
			.await?;

		let file = match correction_file {
			Some(file) => Some(submission::store_plain_file(file, &self.store).await?),
			None => None,
		};

		self.registry
			.record_correction(
				&session.account,
				id,
				Correction {
					grade,
					comment: comment.to_string(),
					file,
				},
			)
			.await
	}

	async fn download(&self, file: &StoredFile) -> Result<DecryptedFile> {
		let bytes = decryption::fetch_verified(&self.store, &file.uri, &file.hash).await?;

		Ok(DecryptedFile {
			bytes,
			name: file.name.clone(),
			mime_type: file.mime_type.clone(),
		})
	}

	pub async fn download_correction(&self, record: &SubmissionRecord) -> Result<Option<DecryptedFile>> {
		match record.correction.as_ref().and_then(|c| c.file.as_ref()) {
			Some(file) => Ok(Some(self.download(file).await?)),
			None => Ok(None),
		}
	}

	pub async fn download_attachment(&self, assignment: &Assignment) -> Result<Option<DecryptedFile>> {
		match &assignment.attachment {
			Some(file) => Ok(Some(self.download(file).await?)),
			None => Ok(None),
		}
	}

	pub async fn report(&self, student: &Account) -> Result<Report> {
		self.registry.student_report(student).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		blob_store::MemoryBlobStore,
		registry::{Ledger, SharedLedger},
		test_keys,
	};
	use chrono::Duration;
	use tempfile::TempDir;

	const ANSWER: &str = "La validite est garantie par consensus";

	fn admin() -> Account {
		Account::new("0xAD")
	}

	fn prof() -> Account {
		Account::new("0xT1")
	}

	fn alice() -> Account {
		Account::new("0xS1")
	}

	fn bob() -> Account {
		Account::new("0xS2")
	}

	type TestDesk = Desk<SharedLedger, MemoryBlobStore>;

	// one module taught by prof, alice and bob enrolled
	async fn desk(tmp: &TempDir) -> (TestDesk, Uid) {
		let now = Utc::now();
		let mut ledger = Ledger::new(admin());

		ledger.register_teacher(&admin(), prof(), "Prof", now).unwrap();
		ledger.register_student(&admin(), alice(), "Alice", "E001", now).unwrap();
		ledger.register_student(&admin(), bob(), "Bob", "E002", now).unwrap();

		let module = ledger.create_module(&admin(), "Blockchain", 2, &prof()).unwrap();

		ledger.enroll(&admin(), module, &alice()).unwrap();
		ledger.enroll(&admin(), module, &bob()).unwrap();

		let config = Config {
			rsa_bits: KeyPair::MIN_BITS,
			keystore_path: tmp.path().join("keys.json"),
			..Config::default()
		};
		let desk = Desk::open(config, SharedLedger::new(ledger), MemoryBlobStore::new())
			.await
			.unwrap();

		(desk, module)
	}

	async fn with_local_key(desk: &TestDesk, pair: &KeyPair) {
		desk.keys
			.lock()
			.await
			.put(&prof(), pair.private_key())
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_connect() {
		let tmp = tempfile::tempdir().unwrap();
		let (desk, _) = desk(&tmp).await;

		assert_eq!(desk.connect(admin()).await.role, Role::Admin);
		assert_eq!(desk.connect(prof()).await.role, Role::Teacher);
		assert_eq!(desk.connect(Account::new("0xS1")).await.role, Role::Student);
		assert_eq!(desk.connect(Account::new("0x42")).await.role, Role::Unregistered);
	}

	#[tokio::test]
	async fn test_full_course() {
		let tmp = tempfile::tempdir().unwrap();
		let (desk, module) = desk(&tmp).await;
		let pair = test_keys::teacher_a();

		with_local_key(&desk, pair).await;

		let teacher = desk.connect(prof()).await;
		let subject = RawFile::new("sujet.pdf", "application/pdf", b"sujet".to_vec());
		let assignment = desk
			.create_assignment(
				&teacher,
				module,
				"TP1",
				"Expliquer le consensus",
				Some(&subject),
				Utc::now() + Duration::days(7),
			)
			.await
			.unwrap();

		assert_eq!(
			desk.registry().teacher_key(&prof()).await,
			Some(pair.export_public())
		);

		let student = desk.connect(alice()).await;
		let published = desk.registry().assignment(assignment).await.unwrap();

		assert_eq!(student.assignments, vec![assignment]);
		assert_eq!(
			desk.download_attachment(&published).await.unwrap().unwrap().bytes,
			b"sujet"
		);

		let raw = RawFile::new("a.bin", "application/octet-stream", vec![1, 2, 3]);
		let first = desk
			.submit(&student, assignment, ANSWER, "Alice, E001", Some(&raw))
			.await
			.unwrap();
		desk.submit(&desk.connect(bob()).await, assignment, ANSWER, "Bob, E002", None)
			.await
			.unwrap();

		let opened = desk.open_submissions(&teacher, assignment).await.unwrap();

		assert_eq!(opened.len(), 2);

		let alice_work = opened[0].result.as_ref().unwrap();

		assert_eq!(opened[0].record.id, first);
		assert_eq!(alice_work.answer, ANSWER);
		assert_eq!(alice_work.identity, "Alice, E001");
		assert_eq!(alice_work.file.as_ref().unwrap().bytes, vec![1, 2, 3]);
		assert!(opened[1].result.as_ref().unwrap().file.is_none());

		assert_eq!(
			desk.check_plagiarism(&teacher, assignment).await.unwrap(),
			vec![Similarity {
				pair: (1, 2),
				score_percent: 100
			}]
		);

		let correction = RawFile::new("corrige.pdf", "application/pdf", b"corrige".to_vec());
		desk.grade(&teacher, first, 16, "bien", Some(&correction))
			.await
			.unwrap();

		let record = desk.registry().submission(first).await.unwrap();
		let downloaded = desk.download_correction(&record).await.unwrap().unwrap();

		assert_eq!(downloaded.bytes, b"corrige");
		assert_eq!(downloaded.name, "corrige.pdf");

		let report = desk.report(&alice()).await.unwrap();

		assert_eq!(report.grades.len(), 1);
		assert_eq!(report.average, Some(16.0));
		assert_eq!(desk.report(&bob()).await.unwrap().average, None);
	}

	#[tokio::test]
	async fn test_generates_and_publishes_keys_once() {
		let tmp = tempfile::tempdir().unwrap();
		let (desk, _) = desk(&tmp).await;
		let teacher = desk.connect(prof()).await;

		let first = desk.ensure_teacher_keys(&teacher).await.unwrap();
		let second = desk.ensure_teacher_keys(&teacher).await.unwrap();

		assert_eq!(first, second);
		assert_eq!(first.bits(), KeyPair::MIN_BITS);
		assert_eq!(
			desk.registry().teacher_key(&prof()).await,
			Some(first.to_base64())
		);

		let reopened = KeyStore::open(tmp.path().join("keys.json")).await.unwrap();

		assert!(reopened.contains(&prof()));
	}

	#[tokio::test]
	async fn test_wrong_local_key() {
		let tmp = tempfile::tempdir().unwrap();
		let (desk, module) = desk(&tmp).await;
		let published = test_keys::teacher_a();

		with_local_key(&desk, test_keys::teacher_b()).await;

		// the assignment was sealed for a key this machine doesn't hold
		desk.registry()
			.set_teacher_key(&prof(), &published.export_public())
			.await
			.unwrap();
		let assignment = desk
			.registry()
			.create_assignment(
				&prof(),
				NewAssignment {
					module,
					title: "TP1".to_string(),
					description: String::new(),
					attachment: None,
					public_key: String::new(),
					deadline: Utc::now() + Duration::days(1),
				},
				Utc::now(),
			)
			.await
			.unwrap();

		let student = desk.connect(alice()).await;
		desk.submit(&student, assignment, ANSWER, "Alice", None)
			.await
			.unwrap();

		let teacher = desk.connect(prof()).await;
		let res = desk.open_submissions(&teacher, assignment).await;

		assert!(matches!(res, Err(Error::KeyMismatch { key_id }) if key_id == published.id()));
		assert!(matches!(
			desk.check_plagiarism(&teacher, assignment).await,
			Err(Error::KeyMismatch { .. })
		));
	}

	#[tokio::test]
	async fn test_missing_local_key() {
		let tmp = tempfile::tempdir().unwrap();
		let (desk, module) = desk(&tmp).await;

		desk.registry()
			.set_teacher_key(&prof(), &test_keys::teacher_a().export_public())
			.await
			.unwrap();
		let assignment = desk
			.registry()
			.create_assignment(
				&prof(),
				NewAssignment {
					module,
					title: "TP1".to_string(),
					description: String::new(),
					attachment: None,
					public_key: String::new(),
					deadline: Utc::now() + Duration::days(1),
				},
				Utc::now(),
			)
			.await
			.unwrap();
		let teacher = desk.connect(prof()).await;

		assert!(matches!(
			desk.open_submissions(&teacher, assignment).await,
			Err(Error::MissingPrivateKey(_))
		));
	}

	#[tokio::test]
	async fn test_roles_are_enforced() {
		let tmp = tempfile::tempdir().unwrap();
		let (desk, module) = desk(&tmp).await;
		let student = desk.connect(alice()).await;
		let teacher = desk.connect(prof()).await;

		assert!(matches!(
			desk.create_assignment(&student, module, "t", "d", None, Utc::now() + Duration::days(1))
				.await,
			Err(Error::Registry(registry::Error::NotTeacher(_)))
		));
		assert!(matches!(
			desk.submit(&teacher, Uid::new(1), ANSWER, "Prof", None).await,
			Err(Error::Registry(registry::Error::NotStudent(_)))
		));
		assert!(matches!(
			desk.grade(&teacher, Uid::new(1), 12, "", None).await,
			Err(Error::Registry(registry::Error::SubmissionNotFound(_)))
		));
	}

	#[tokio::test]
	async fn test_key_store_failure_publishes_nothing() {
		let tmp = tempfile::tempdir().unwrap();
		let (desk, _) = desk(&tmp).await;
		let teacher = desk.connect(prof()).await;

		// the key store's directory is taken by a regular file
		*desk.keys.lock().await = KeyStore::open(tmp.path().join("blocker").join("keys.json"))
			.await
			.unwrap();
		tokio::fs::write(tmp.path().join("blocker"), b"a regular file")
			.await
			.unwrap();

		assert!(matches!(
			desk.ensure_teacher_keys(&teacher).await,
			Err(Error::Io(_))
		));
		assert!(matches!(
			desk.ensure_teacher_keys(&teacher).await,
			Err(Error::Io(_))
		));
		assert_eq!(desk.registry().teacher_key(&prof()).await, None);
		assert!(desk.keys.lock().await.get(&prof()).unwrap().is_none());
	}

	#[tokio::test]
	async fn test_rejected_work_uploads_nothing() {
		let tmp = tempfile::tempdir().unwrap();
		let (desk, module) = desk(&tmp).await;

		with_local_key(&desk, test_keys::teacher_a()).await;

		let teacher = desk.connect(prof()).await;
		let assignment = desk
			.create_assignment(&teacher, module, "TP1", "", None, Utc::now() + Duration::days(1))
			.await
			.unwrap();
		let student = desk.connect(alice()).await;
		let raw = RawFile::new("a.bin", "application/octet-stream", vec![1, 2, 3]);
		let first = desk
			.submit(&student, assignment, ANSWER, "Alice", Some(&raw))
			.await
			.unwrap();

		assert_eq!(desk.store().len().await, 1);
		assert!(matches!(
			desk.submit(&student, assignment, ANSWER, "Alice", Some(&raw)).await,
			Err(Error::Registry(registry::Error::AlreadySubmitted(..)))
		));
		assert_eq!(desk.store().len().await, 1);

		// a student registered but never enrolled
		desk.registry()
			.write()
			.await
			.register_student(&admin(), Account::new("0xS9"), "Eve", "E009", Utc::now())
			.unwrap();
		let outsider = desk.connect(Account::new("0xS9")).await;

		assert!(matches!(
			desk.submit(&outsider, assignment, ANSWER, "Eve", Some(&raw)).await,
			Err(Error::Registry(registry::Error::NotEnrolled(..)))
		));
		assert_eq!(desk.store().len().await, 1);

		// another teacher may not grade this work
		desk.registry()
			.write()
			.await
			.register_teacher(&admin(), Account::new("0xT2"), "Other", Utc::now())
			.unwrap();
		let other = desk.connect(Account::new("0xT2")).await;
		let correction = RawFile::new("corrige.pdf", "application/pdf", b"corrige".to_vec());

		assert!(matches!(
			desk.grade(&other, first, 12, "", Some(&correction)).await,
			Err(Error::Registry(registry::Error::NotAssignmentTeacher(..)))
		));
		assert!(matches!(
			desk.grade(&teacher, first, 21, "", Some(&correction)).await,
			Err(Error::Registry(registry::Error::InvalidGrade(21)))
		));
		assert_eq!(desk.store().len().await, 1);
	}

	#[tokio::test]
	async fn test_one_broken_submission_does_not_hide_the_others() {
		let tmp = tempfile::tempdir().unwrap();
		let (desk, module) = desk(&tmp).await;

		with_local_key(&desk, test_keys::teacher_a()).await;

		let teacher = desk.connect(prof()).await;
		let assignment = desk
			.create_assignment(&teacher, module, "TP1", "", None, Utc::now() + Duration::days(1))
			.await
			.unwrap();
		let raw = RawFile::new("a.bin", "application/octet-stream", vec![1, 2, 3]);

		desk.submit(&desk.connect(alice()).await, assignment, ANSWER, "Alice", Some(&raw))
			.await
			.unwrap();
		desk.submit(&desk.connect(bob()).await, assignment, ANSWER, "Bob", None)
			.await
			.unwrap();

		let records = desk.registry().submissions_for(assignment).await.unwrap();
		desk.store()
			.remove(&records[0].file.as_ref().unwrap().uri)
			.await;

		let opened = desk.open_submissions(&teacher, assignment).await.unwrap();

		assert!(matches!(opened[0].result, Err(Error::BlobUnavailable { .. })));
		assert_eq!(opened[1].result.as_ref().unwrap().answer, ANSWER);
	}
}
