use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
	account::Account,
	id::Uid,
	submission::{FileAttachment, StoredFile, SubmissionPayload},
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Module {
	pub id: Uid,
	pub name: String,
	pub coefficient: u32,
	pub teacher: Account,
	pub active: bool,
}

// What a teacher fills in to publish an assignment
#[derive(Clone, Debug, PartialEq)]
pub struct NewAssignment {
	pub module: Uid,
	pub title: String,
	pub description: String,
	pub attachment: Option<StoredFile>,
	// the teacher's public key; submissions get sealed for it
	pub public_key: String,
	pub deadline: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Assignment {
	pub id: Uid,
	pub module: Uid,
	pub teacher: Account,
	pub title: String,
	pub description: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub attachment: Option<StoredFile>,
	pub public_key: String,
	pub deadline: DateTime<Utc>,
	pub created_at: DateTime<Utc>,
	// a closed assignment takes no submissions, whatever its deadline
	pub active: bool,
}

impl Assignment {
	pub fn is_open(&self, now: DateTime<Utc>) -> bool {
		now <= self.deadline
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Correction {
	// 0..=20
	pub grade: u8,
	pub comment: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file: Option<StoredFile>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SubmissionRecord {
	pub id: Uid,
	pub assignment: Uid,
	pub module: Uid,
	pub student: Account,
	// sealed texts, readable by the assignment's teacher only
	pub answer: String,
	pub identity: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file: Option<FileAttachment>,
	pub submitted_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub correction: Option<Correction>,
}

impl SubmissionRecord {
	pub fn new(
		id: Uid,
		assignment: &Assignment,
		student: Account,
		payload: SubmissionPayload,
		now: DateTime<Utc>,
	) -> Self {
		Self {
			id,
			assignment: assignment.id,
			module: assignment.module,
			student,
			answer: payload.answer,
			identity: payload.identity,
			file: payload.file,
			submitted_at: now,
			correction: None,
		}
	}

	pub fn is_corrected(&self) -> bool {
		self.correction.is_some()
	}
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GradeEntry {
	pub submission: Uid,
	pub assignment: Uid,
	pub module: Uid,
	pub grade: u8,
	pub coefficient: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Announcement {
	pub id: Uid,
	pub author: Account,
	pub title: String,
	pub body: String,
	// visible to unregistered visitors too
	pub public: bool,
	pub created_at: DateTime<Utc>,
}

// Σ(grade × coefficient) / Σ coefficient
pub fn weighted_average(grades: &[GradeEntry]) -> Option<f64> {
	let weights: u64 = grades.iter().map(|g| g.coefficient as u64).sum();

	if weights == 0 {
		return None;
	}

	let total: u64 = grades
		.iter()
		.map(|g| g.grade as u64 * g.coefficient as u64)
		.sum();

	Some(total as f64 / weights as f64)
}
