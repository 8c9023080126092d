use crate::{account::Account, id::Uid, registry, users::Role};

// Who is at the desk and what they can see; updates hand back a new value
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
	pub account: Account,
	pub role: Role,
	pub assignments: Vec<Uid>,
}

impl Session {
	pub fn new(account: Account) -> Self {
		Self {
			account,
			role: Role::Unregistered,
			assignments: Vec::new(),
		}
	}

	pub fn with_role(&self, role: Role) -> Self {
		Self {
			role,
			..self.clone()
		}
	}

	pub fn with_assignments(&self, assignments: Vec<Uid>) -> Self {
		Self {
			assignments,
			..self.clone()
		}
	}

	pub fn require(&self, role: Role) -> Result<(), registry::Error> {
		if self.role == role {
			return Ok(());
		}

		let account = self.account.clone();

		Err(match role {
			Role::Admin => registry::Error::NotAdmin,
			Role::Teacher => registry::Error::NotTeacher(account),
			Role::Student => registry::Error::NotStudent(account),
			Role::Unregistered => registry::Error::NotMember(account),
		})
	}
}
