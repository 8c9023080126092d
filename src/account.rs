use serde::{Deserialize, Serialize};
use std::fmt;

// A wallet address; compared case-insensitively
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Account(String);

impl Account {
	pub fn new(address: &str) -> Self {
		Self(address.trim().to_lowercase())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	// empty and 0x000.. addresses can't own anything
	pub fn is_zero(&self) -> bool {
		let digits = self.0.strip_prefix("0x").unwrap_or(&self.0);

		digits.chars().all(|c| c == '0')
	}
}

impl From<String> for Account {
	fn from(value: String) -> Self {
		Self::new(&value)
	}
}

impl From<&str> for Account {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<Account> for String {
	fn from(value: Account) -> Self {
		value.0
	}
}

impl fmt::Display for Account {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
