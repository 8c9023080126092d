use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
	collections::{BTreeMap, HashMap},
	sync::Arc,
};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use crate::{
	account::Account,
	coursework::{
		self, Announcement, Assignment, Correction, GradeEntry, Module, NewAssignment,
		SubmissionRecord,
	},
	id::Uid,
	submission::SubmissionPayload,
	users::{Role, Student, Teacher, Users},
};

pub const MAX_GRADE: u8 = 20;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
	#[error("only the administrator may do this")]
	NotAdmin,
	#[error("{0} is not a registered teacher")]
	NotTeacher(Account),
	#[error("{0} is not a registered student")]
	NotStudent(Account),
	#[error("{0} is not a member of the registry")]
	NotMember(Account),
	#[error("invalid account address")]
	InvalidAccount,
	#[error("{0} is already registered")]
	AlreadyRegistered(Account),
	#[error("coefficient must be positive")]
	InvalidCoefficient,
	#[error("teacher {0} is inactive")]
	TeacherInactive(Account),
	#[error("teacher {0} already holds a module")]
	TeacherHasModule(Account),
	#[error("module {0} not found")]
	ModuleNotFound(Uid),
	#[error("module {0} is inactive")]
	ModuleInactive(Uid),
	#[error("student {0} is inactive")]
	StudentInactive(Account),
	#[error("{0} is already enrolled in module {1}")]
	AlreadyEnrolled(Account, Uid),
	#[error("{0} does not teach module {1}")]
	NotModuleTeacher(Account, Uid),
	#[error("the deadline must lie in the future")]
	InvalidDeadline,
	#[error("assignment {0} not found")]
	AssignmentNotFound(Uid),
	#[error("the deadline of assignment {0} has passed")]
	DeadlinePassed(Uid),
	#[error("assignment {0} is closed")]
	AssignmentClosed(Uid),
	#[error("{0} is not enrolled in module {1}")]
	NotEnrolled(Account, Uid),
	#[error("{0} already submitted to assignment {1}")]
	AlreadySubmitted(Account, Uid),
	#[error("the attached file is missing its hash, name, type, address or key")]
	IncompleteAttachment,
	#[error("submission {0} not found")]
	SubmissionNotFound(Uid),
	#[error("{0} did not create assignment {1}")]
	NotAssignmentTeacher(Account, Uid),
	#[error("grade {0} is out of range, grades go from 0 to 20")]
	InvalidGrade(u8),
	#[error("the public key is empty")]
	EmptyKey,
}

type LedgerResult<T> = std::result::Result<T, Error>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Report {
	pub student: Account,
	pub grades: Vec<GradeEntry>,
	pub average: Option<f64>,
}

// The system of record: who is who, what was assigned, submitted and graded
pub struct Ledger {
	admin: Account,
	users: Users,
	modules: BTreeMap<Uid, Module>,
	// { module, students }
	enrolments: HashMap<Uid, Vec<Account>>,
	assignments: BTreeMap<Uid, Assignment>,
	submissions: BTreeMap<Uid, SubmissionRecord>,
	// { assignment, submissions }
	by_assignment: HashMap<Uid, Vec<Uid>>,
	// { student, submissions }
	by_student: HashMap<Account, Vec<Uid>>,
	announcements: Vec<Announcement>,
	module_count: u64,
	assignment_count: u64,
	submission_count: u64,
	announcement_count: u64,
}

fn next(counter: &mut u64) -> Uid {
	*counter += 1;

	Uid::new(*counter)
}

fn valid(account: &Account) -> LedgerResult<()> {
	if account.is_zero() {
		Err(Error::InvalidAccount)
	} else {
		Ok(())
	}
}

impl Ledger {
	pub fn new(admin: Account) -> Self {
		Self {
			admin,
			users: Users::default(),
			modules: BTreeMap::new(),
			enrolments: HashMap::new(),
			assignments: BTreeMap::new(),
			submissions: BTreeMap::new(),
			by_assignment: HashMap::new(),
			by_student: HashMap::new(),
			announcements: Vec::new(),
			module_count: 0,
			assignment_count: 0,
			submission_count: 0,
			announcement_count: 0,
		}
	}

	pub fn admin(&self) -> &Account {
		&self.admin
	}

	fn require_admin(&self, caller: &Account) -> LedgerResult<()> {
		if *caller == self.admin {
			Ok(())
		} else {
			Err(Error::NotAdmin)
		}
	}

	fn require_teacher(&self, caller: &Account) -> LedgerResult<&Teacher> {
		self.users
			.teacher(caller)
			.ok_or_else(|| Error::NotTeacher(caller.clone()))
	}

	pub fn register_teacher(
		&mut self,
		caller: &Account,
		account: Account,
		name: &str,
		now: DateTime<Utc>,
	) -> LedgerResult<()> {
		self.require_admin(caller)?;
		valid(&account)?;

		if self.users.is_registered(&account) {
			return Err(Error::AlreadyRegistered(account));
		}

		info!(%account, name, "registered teacher");

		self.users.add_teacher(Teacher {
			account,
			name: name.to_string(),
			active: true,
			public_key: String::new(),
			module: None,
			registered_at: now,
		});

		Ok(())
	}

	pub fn register_student(
		&mut self,
		caller: &Account,
		account: Account,
		name: &str,
		number: &str,
		now: DateTime<Utc>,
	) -> LedgerResult<()> {
		self.require_admin(caller)?;
		valid(&account)?;

		if self.users.is_registered(&account) {
			return Err(Error::AlreadyRegistered(account));
		}

		info!(%account, name, number, "registered student");

		self.users.add_student(Student {
			account,
			name: name.to_string(),
			number: number.to_string(),
			active: true,
			registered_at: now,
		});

		Ok(())
	}

	pub fn set_teacher_active(
		&mut self,
		caller: &Account,
		account: &Account,
		active: bool,
	) -> LedgerResult<()> {
		self.require_admin(caller)?;

		let teacher = self
			.users
			.teacher_mut(account)
			.ok_or_else(|| Error::NotTeacher(account.clone()))?;

		teacher.active = active;

		Ok(())
	}

	pub fn set_student_active(
		&mut self,
		caller: &Account,
		account: &Account,
		active: bool,
	) -> LedgerResult<()> {
		self.require_admin(caller)?;

		let student = self
			.users
			.students
			.get_mut(account)
			.ok_or_else(|| Error::NotStudent(account.clone()))?;

		student.active = active;

		Ok(())
	}

	pub fn is_teacher(&self, account: &Account) -> bool {
		self.users.teacher(account).is_some()
	}

	pub fn is_student(&self, account: &Account) -> bool {
		self.users.student(account).is_some()
	}

	pub fn role_of(&self, account: &Account) -> Role {
		if *account == self.admin {
			Role::Admin
		} else if self.is_teacher(account) {
			Role::Teacher
		} else if self.is_student(account) {
			Role::Student
		} else {
			Role::Unregistered
		}
	}

	pub fn teacher(&self, account: &Account) -> Option<&Teacher> {
		self.users.teacher(account)
	}

	pub fn student(&self, account: &Account) -> Option<&Student> {
		self.users.student(account)
	}

	pub fn set_teacher_key(&mut self, caller: &Account, key: &str) -> LedgerResult<()> {
		let key = key.trim();

		if key.is_empty() {
			return Err(Error::EmptyKey);
		}

		let teacher = self
			.users
			.teacher_mut(caller)
			.ok_or_else(|| Error::NotTeacher(caller.clone()))?;

		teacher.public_key = key.to_string();
		info!(account = %caller, "published teacher key");

		Ok(())
	}

	pub fn teacher_key(&self, account: &Account) -> Option<&str> {
		self.users.key_for(account)
	}

	pub fn create_module(
		&mut self,
		caller: &Account,
		name: &str,
		coefficient: u32,
		teacher: &Account,
	) -> LedgerResult<Uid> {
		self.require_admin(caller)?;

		if coefficient == 0 {
			return Err(Error::InvalidCoefficient);
		}

		valid(teacher)?;

		let holder = self
			.users
			.teacher(teacher)
			.ok_or_else(|| Error::NotTeacher(teacher.clone()))?;

		if !holder.active {
			return Err(Error::TeacherInactive(teacher.clone()));
		}

		if holder.module.is_some() {
			return Err(Error::TeacherHasModule(teacher.clone()));
		}

		let id = next(&mut self.module_count);

		self.modules.insert(
			id,
			Module {
				id,
				name: name.to_string(),
				coefficient,
				teacher: teacher.clone(),
				active: true,
			},
		);

		if let Some(holder) = self.users.teacher_mut(teacher) {
			holder.module = Some(id);
		}

		info!(%id, name, coefficient, %teacher, "created module");

		Ok(id)
	}

	pub fn modules(&self) -> Vec<&Module> {
		self.modules.values().collect()
	}

	pub fn module(&self, id: Uid) -> LedgerResult<&Module> {
		self.modules.get(&id).ok_or(Error::ModuleNotFound(id))
	}

	pub fn set_module_active(&mut self, caller: &Account, id: Uid, active: bool) -> LedgerResult<()> {
		self.require_admin(caller)?;

		let module = self.modules.get_mut(&id).ok_or(Error::ModuleNotFound(id))?;

		module.active = active;
		info!(%id, active, "module activation changed");

		Ok(())
	}

	// an existing module that still takes enrolments and assignments
	fn open_module(&self, id: Uid) -> LedgerResult<&Module> {
		let module = self.module(id)?;

		if module.active {
			Ok(module)
		} else {
			Err(Error::ModuleInactive(id))
		}
	}

	pub fn enroll(&mut self, caller: &Account, module: Uid, student: &Account) -> LedgerResult<()> {
		self.require_admin(caller)?;
		self.open_module(module)?;
		valid(student)?;

		let enrolled = self
			.users
			.student(student)
			.ok_or_else(|| Error::NotStudent(student.clone()))?;

		if !enrolled.active {
			return Err(Error::StudentInactive(student.clone()));
		}

		if self.is_enrolled(module, student) {
			return Err(Error::AlreadyEnrolled(student.clone(), module));
		}

		self.enrolments
			.entry(module)
			.or_default()
			.push(student.clone());
		info!(%module, %student, "enrolled student");

		Ok(())
	}

	pub fn is_enrolled(&self, module: Uid, student: &Account) -> bool {
		self.enrolments
			.get(&module)
			.is_some_and(|students| students.contains(student))
	}

	pub fn students_of(&self, module: Uid) -> &[Account] {
		self.enrolments
			.get(&module)
			.map(Vec::as_slice)
			.unwrap_or_default()
	}

	pub fn modules_of(&self, student: &Account) -> Vec<Uid> {
		self.modules
			.keys()
			.filter(|id| self.is_enrolled(**id, student))
			.copied()
			.collect()
	}

	pub fn create_assignment(
		&mut self,
		caller: &Account,
		new: NewAssignment,
		now: DateTime<Utc>,
	) -> LedgerResult<Uid> {
		let teacher = self.require_teacher(caller)?;
		let module = self.open_module(new.module)?;

		if module.teacher != *caller {
			return Err(Error::NotModuleTeacher(caller.clone(), new.module));
		}

		if new.deadline <= now {
			return Err(Error::InvalidDeadline);
		}

		// falls back to the key the teacher published
		let public_key = match new.public_key.trim() {
			"" => teacher.public_key.clone(),
			key => key.to_string(),
		};

		if public_key.is_empty() {
			return Err(Error::EmptyKey);
		}

		if new.attachment.as_ref().is_some_and(|a| !a.is_complete()) {
			return Err(Error::IncompleteAttachment);
		}

		let id = next(&mut self.assignment_count);

		info!(%id, module = %new.module, title = %new.title, deadline = %new.deadline, "created assignment");

		self.assignments.insert(
			id,
			Assignment {
				id,
				module: new.module,
				teacher: caller.clone(),
				title: new.title,
				description: new.description,
				attachment: new.attachment,
				public_key,
				deadline: new.deadline,
				created_at: now,
				active: true,
			},
		);

		Ok(id)
	}

	// only the assignment's own teacher may close or reopen it
	pub fn set_assignment_active(
		&mut self,
		caller: &Account,
		id: Uid,
		active: bool,
	) -> LedgerResult<()> {
		self.require_teacher(caller)?;

		let assignment = self
			.assignments
			.get_mut(&id)
			.ok_or(Error::AssignmentNotFound(id))?;

		if assignment.teacher != *caller {
			return Err(Error::NotAssignmentTeacher(caller.clone(), id));
		}

		assignment.active = active;
		info!(%id, active, "assignment activation changed");

		Ok(())
	}

	pub fn assignment(&self, id: Uid) -> LedgerResult<&Assignment> {
		self.assignments.get(&id).ok_or(Error::AssignmentNotFound(id))
	}

	pub fn assignments(&self) -> Vec<Uid> {
		self.assignments.keys().copied().collect()
	}

	pub fn assignments_of(&self, teacher: &Account) -> Vec<Uid> {
		self.assignments
			.values()
			.filter(|a| a.teacher == *teacher)
			.map(|a| a.id)
			.collect()
	}

	pub fn submit(
		&mut self,
		caller: &Account,
		assignment: Uid,
		payload: SubmissionPayload,
		now: DateTime<Utc>,
	) -> LedgerResult<Uid> {
		let target = self.check_submission(caller, assignment, now)?.clone();

		if payload.file.as_ref().is_some_and(|f| !f.is_complete()) {
			return Err(Error::IncompleteAttachment);
		}

		let id = next(&mut self.submission_count);
		let record = SubmissionRecord::new(id, &target, caller.clone(), payload, now);

		self.submissions.insert(id, record);
		self.by_assignment.entry(assignment).or_default().push(id);
		self.by_student.entry(caller.clone()).or_default().push(id);

		info!(%id, %assignment, student = %caller, "stored submission");

		Ok(id)
	}

	// every rule a submission must pass, short of looking at its payload
	pub fn check_submission(
		&self,
		caller: &Account,
		assignment: Uid,
		now: DateTime<Utc>,
	) -> LedgerResult<&Assignment> {
		if !self.is_student(caller) {
			return Err(Error::NotStudent(caller.clone()));
		}

		let target = self.assignment(assignment)?;

		if !target.active {
			return Err(Error::AssignmentClosed(assignment));
		}

		if !target.is_open(now) {
			return Err(Error::DeadlinePassed(assignment));
		}

		if !self.is_enrolled(target.module, caller) {
			return Err(Error::NotEnrolled(caller.clone(), target.module));
		}

		if self.has_submitted(assignment, caller) {
			return Err(Error::AlreadySubmitted(caller.clone(), assignment));
		}

		Ok(target)
	}

	pub fn submission(&self, id: Uid) -> LedgerResult<&SubmissionRecord> {
		self.submissions.get(&id).ok_or(Error::SubmissionNotFound(id))
	}

	pub fn submissions_for(&self, assignment: Uid) -> LedgerResult<Vec<&SubmissionRecord>> {
		self.assignment(assignment)?;

		Ok(self.collect(self.by_assignment.get(&assignment)))
	}

	pub fn submissions_of(&self, student: &Account) -> Vec<&SubmissionRecord> {
		self.collect(self.by_student.get(student))
	}

	fn collect(&self, ids: Option<&Vec<Uid>>) -> Vec<&SubmissionRecord> {
		ids.into_iter()
			.flatten()
			.filter_map(|id| self.submissions.get(id))
			.collect()
	}

	pub fn has_submitted(&self, assignment: Uid, student: &Account) -> bool {
		self.submissions_of(student)
			.iter()
			.any(|s| s.assignment == assignment)
	}

	// a later correction replaces an earlier one
	pub fn correct(
		&mut self,
		caller: &Account,
		submission: Uid,
		correction: Correction,
	) -> LedgerResult<()> {
		self.check_correction(caller, submission, correction.grade)?;

		if correction.file.as_ref().is_some_and(|f| !f.is_complete()) {
			return Err(Error::IncompleteAttachment);
		}

		let record = self
			.submissions
			.get_mut(&submission)
			.ok_or(Error::SubmissionNotFound(submission))?;

		info!(%submission, grade = correction.grade, "recorded correction");
		record.correction = Some(correction);

		Ok(())
	}

	pub fn check_correction(&self, caller: &Account, submission: Uid, grade: u8) -> LedgerResult<()> {
		self.require_teacher(caller)?;

		let assignment = self.submission(submission)?.assignment;

		if self.assignment(assignment)?.teacher != *caller {
			return Err(Error::NotAssignmentTeacher(caller.clone(), assignment));
		}

		if grade > MAX_GRADE {
			return Err(Error::InvalidGrade(grade));
		}

		Ok(())
	}

	pub fn student_grades(&self, student: &Account) -> Vec<GradeEntry> {
		self.submissions_of(student)
			.into_iter()
			.filter_map(|record| {
				let correction = record.correction.as_ref()?;
				let module = self.modules.get(&record.module)?;

				Some(GradeEntry {
					submission: record.id,
					assignment: record.assignment,
					module: record.module,
					grade: correction.grade,
					coefficient: module.coefficient,
				})
			})
			.collect()
	}

	pub fn weighted_average(&self, student: &Account) -> Option<f64> {
		coursework::weighted_average(&self.student_grades(student))
	}

	pub fn report(&self, student: &Account) -> LedgerResult<Report> {
		if !self.is_student(student) {
			return Err(Error::NotStudent(student.clone()));
		}

		let grades = self.student_grades(student);

		Ok(Report {
			student: student.clone(),
			average: coursework::weighted_average(&grades),
			grades,
		})
	}

	pub fn publish_announcement(
		&mut self,
		caller: &Account,
		title: &str,
		body: &str,
		public: bool,
		now: DateTime<Utc>,
	) -> LedgerResult<Uid> {
		if self.role_of(caller) == Role::Unregistered {
			return Err(Error::NotMember(caller.clone()));
		}

		let id = next(&mut self.announcement_count);

		self.announcements.push(Announcement {
			id,
			author: caller.clone(),
			title: title.to_string(),
			body: body.to_string(),
			public,
			created_at: now,
		});
		info!(%id, author = %caller, public, "published announcement");

		Ok(id)
	}

	// newest first
	pub fn announcements(&self, include_private: bool) -> Vec<&Announcement> {
		self.announcements
			.iter()
			.rev()
			.filter(|a| include_private || a.public)
			.collect()
	}
}

// What the desk needs from a registry, whatever sits behind it
#[async_trait]
pub trait Registry: Send + Sync {
	async fn role_of(&self, account: &Account) -> Role;
	async fn set_teacher_key(&self, caller: &Account, key: &str) -> crate::error::Result<()>;
	async fn teacher_key(&self, account: &Account) -> Option<String>;
	async fn create_assignment(
		&self,
		caller: &Account,
		new: NewAssignment,
		now: DateTime<Utc>,
	) -> crate::error::Result<Uid>;
	async fn assignment(&self, id: Uid) -> crate::error::Result<Assignment>;
	async fn assignments_of(&self, account: &Account) -> Vec<Uid>;
	// the key submissions to `assignment` get sealed for
	async fn public_key_for(&self, assignment: Uid) -> crate::error::Result<String>;
	async fn push_submission(
		&self,
		caller: &Account,
		assignment: Uid,
		payload: SubmissionPayload,
		now: DateTime<Utc>,
	) -> crate::error::Result<Uid>;
	// checks `push_submission` would pass before anything gets uploaded
	async fn can_submit(
		&self,
		caller: &Account,
		assignment: Uid,
		now: DateTime<Utc>,
	) -> crate::error::Result<()>;
	async fn submission(&self, id: Uid) -> crate::error::Result<SubmissionRecord>;
	async fn submissions_for(&self, assignment: Uid) -> crate::error::Result<Vec<SubmissionRecord>>;
	async fn record_correction(
		&self,
		caller: &Account,
		submission: Uid,
		correction: Correction,
	) -> crate::error::Result<()>;
	async fn can_correct(&self, caller: &Account, submission: Uid, grade: u8) -> crate::error::Result<()>;
	async fn student_report(&self, student: &Account) -> crate::error::Result<Report>;
}

#[derive(Clone)]
pub struct SharedLedger {
	ledger: Arc<RwLock<Ledger>>,
}

impl SharedLedger {
	pub fn new(ledger: Ledger) -> Self {
		Self {
			ledger: Arc::new(RwLock::new(ledger)),
		}
	}

	pub async fn read(&self) -> RwLockReadGuard<'_, Ledger> {
		self.ledger.read().await
	}

	pub async fn write(&self) -> RwLockWriteGuard<'_, Ledger> {
		self.ledger.write().await
	}
}

#[async_trait]
impl Registry for SharedLedger {
	async fn role_of(&self, account: &Account) -> Role {
		self.read().await.role_of(account)
	}

	async fn set_teacher_key(&self, caller: &Account, key: &str) -> crate::error::Result<()> {
		Ok(self.write().await.set_teacher_key(caller, key)?)
	}

	async fn teacher_key(&self, account: &Account) -> Option<String> {
		self.read().await.teacher_key(account).map(str::to_string)
	}

	async fn create_assignment(
		&self,
		caller: &Account,
		new: NewAssignment,
		now: DateTime<Utc>,
	) -> crate::error::Result<Uid> {
		Ok(self.write().await.create_assignment(caller, new, now)?)
	}

	async fn assignment(&self, id: Uid) -> crate::error::Result<Assignment> {
		Ok(self.read().await.assignment(id)?.clone())
	}

	async fn assignments_of(&self, account: &Account) -> Vec<Uid> {
		let ledger = self.read().await;

		match ledger.role_of(account) {
			Role::Teacher => ledger.assignments_of(account),
			Role::Student => {
				let modules = ledger.modules_of(account);

				ledger
					.assignments
					.values()
					.filter(|a| modules.contains(&a.module))
					.map(|a| a.id)
					.collect()
			}
			Role::Admin => ledger.assignments(),
			Role::Unregistered => Vec::new(),
		}
	}

	async fn public_key_for(&self, assignment: Uid) -> crate::error::Result<String> {
		Ok(self.read().await.assignment(assignment)?.public_key.clone())
	}

	async fn push_submission(
		&self,
		caller: &Account,
		assignment: Uid,
		payload: SubmissionPayload,
		now: DateTime<Utc>,
	) -> crate::error::Result<Uid> {
		Ok(self.write().await.submit(caller, assignment, payload, now)?)
	}

	async fn can_submit(
		&self,
		caller: &Account,
		assignment: Uid,
		now: DateTime<Utc>,
	) -> crate::error::Result<()> {
		self.read().await.check_submission(caller, assignment, now)?;

		Ok(())
	}

	async fn submission(&self, id: Uid) -> crate::error::Result<SubmissionRecord> {
		Ok(self.read().await.submission(id)?.clone())
	}

	async fn submissions_for(&self, assignment: Uid) -> crate::error::Result<Vec<SubmissionRecord>> {
		Ok(self
			.read()
			.await
			.submissions_for(assignment)?
			.into_iter()
			.cloned()
			.collect())
	}

	async fn record_correction(
		&self,
		caller: &Account,
		submission: Uid,
		correction: Correction,
	) -> crate::error::Result<()> {
		Ok(self.write().await.correct(caller, submission, correction)?)
	}

	async fn can_correct(&self, caller: &Account, submission: Uid, grade: u8) -> crate::error::Result<()> {
		Ok(self.read().await.check_correction(caller, submission, grade)?)
	}

	async fn student_report(&self, student: &Account) -> crate::error::Result<Report> {
		Ok(self.read().await.report(student)?)
	}
}
