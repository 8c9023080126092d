use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::{Error as _, Visitor};
use serde::{Deserializer, Serializer};

use crate::error::{Error, Result};

pub fn encode(bytes: &[u8]) -> String {
	STANDARD.encode(bytes)
}

// Pasted keys and ciphertexts tend to carry line breaks and stray spaces
pub fn normalize(text: &str) -> Result<String> {
	let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();

	if compact.is_empty() {
		Err(Error::EmptyInput)
	} else {
		Ok(compact)
	}
}

pub fn decode(text: &str) -> std::result::Result<Vec<u8>, DecodeError> {
	let compact = normalize(text).map_err(|_| DecodeError::Empty)?;

	STANDARD.decode(compact).map_err(DecodeError::Base64)
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
	#[error("empty input")]
	Empty,
	#[error("invalid base64: {0}")]
	Base64(#[from] base64::DecodeError),
}

impl DecodeError {
	// empty input stays an input error, everything else is reported through `or`
	pub fn or_else(self, or: impl FnOnce(String) -> Error) -> Error {
		match self {
			DecodeError::Empty => Error::EmptyInput,
			DecodeError::Base64(e) => or(e.to_string()),
		}
	}
}

struct Base64Visitor;

impl<'de> Visitor<'de> for Base64Visitor {
	type Value = Vec<u8>;

	fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(formatter, "Expected base64 encoded string")
	}

	fn visit_str<E>(self, s: &str) -> std::result::Result<Self::Value, E>
	where
		E: serde::de::Error,
	{
		decode(s).map_err(E::custom)
	}
}

pub fn deserialize_vec_base64<'de, D: Deserializer<'de>>(
	deserializer: D,
) -> std::result::Result<Vec<u8>, D::Error> {
	deserializer.deserialize_str(Base64Visitor {})
}

pub fn serialize_vec_base64<S: Serializer>(
	blob: &Vec<u8>,
	serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
	serializer.serialize_str(&encode(blob))
}

pub fn deserialize_array_base64<'de, D, const N: usize>(
	deserializer: D,
) -> std::result::Result<[u8; N], D::Error>
where
	D: Deserializer<'de>,
{
	let decoded = deserializer.deserialize_str(Base64Visitor {})?;

	decoded
		.try_into()
		.map_err(|_| D::Error::custom(format!("expected a byte array of length {}", N)))
}

pub fn serialize_array_base64<S, const N: usize>(
	blob: &[u8; N],
	serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_str(&encode(blob))
}
