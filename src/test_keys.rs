// 2048-bit keys are slow to generate, so tests share a couple of them
use std::sync::OnceLock;

use crate::key_pair::KeyPair;

static TEACHER_A: OnceLock<KeyPair> = OnceLock::new();
static TEACHER_B: OnceLock<KeyPair> = OnceLock::new();

pub fn teacher_a() -> &'static KeyPair {
	TEACHER_A.get_or_init(|| KeyPair::generate().unwrap())
}

pub fn teacher_b() -> &'static KeyPair {
	TEACHER_B.get_or_init(|| KeyPair::generate().unwrap())
}
