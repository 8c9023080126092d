use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{account::Account, id::Uid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	Admin,
	Teacher,
	Student,
	Unregistered,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Teacher {
	pub account: Account,
	pub name: String,
	pub active: bool,
	// base64 spki; empty until the teacher publishes one
	pub public_key: String,
	pub module: Option<Uid>,
	pub registered_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Student {
	pub account: Account,
	pub name: String,
	pub number: String,
	pub active: bool,
	pub registered_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct Users {
	// { account, Teacher }
	pub teachers: HashMap<Account, Teacher>,
	// { account, Student }
	pub students: HashMap<Account, Student>,
}

impl Users {
	pub fn is_registered(&self, account: &Account) -> bool {
		self.teachers.contains_key(account) || self.students.contains_key(account)
	}

	pub fn add_teacher(&mut self, teacher: Teacher) {
		self.teachers.insert(teacher.account.clone(), teacher);
	}

	pub fn teacher(&self, account: &Account) -> Option<&Teacher> {
		self.teachers.get(account)
	}

	pub fn teacher_mut(&mut self, account: &Account) -> Option<&mut Teacher> {
		self.teachers.get_mut(account)
	}

	pub fn add_student(&mut self, student: Student) {
		self.students.insert(student.account.clone(), student);
	}

	pub fn student(&self, account: &Account) -> Option<&Student> {
		self.students.get(account)
	}

	pub fn key_for(&self, account: &Account) -> Option<&str> {
		self.teacher(account)
			.map(|t| t.public_key.as_str())
			.filter(|key| !key.is_empty())
	}
}
