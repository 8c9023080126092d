use crate::base64_blobs::{deserialize_array_base64, serialize_array_base64};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

const SALT_SIZE: usize = 32;

// Mixed into every file key derivation, so one symmetric key never yields the same aes key/iv twice
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Salt {
	#[serde(
		serialize_with = "serialize_array_base64::<_, SALT_SIZE>",
		deserialize_with = "deserialize_array_base64::<_, SALT_SIZE>"
	)]
	pub bytes: [u8; Self::SIZE],
}

impl Salt {
	pub const SIZE: usize = SALT_SIZE;

	pub fn generate() -> Self {
		let mut bytes = [0u8; Self::SIZE];
		OsRng.fill_bytes(&mut bytes);

		Self { bytes }
	}

	// splits `salt || rest`; None when the input is too short to hold a salt
	pub fn split_prefix(bytes: &[u8]) -> Option<(Self, &[u8])> {
		if bytes.len() < Self::SIZE {
			return None;
		}

		let (head, rest) = bytes.split_at(Self::SIZE);
		let mut salt = [0u8; Self::SIZE];
		salt.copy_from_slice(head);

		Some((Self { bytes: salt }, rest))
	}
}
