use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::Config;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Similarity {
	// 1-indexed positions in the input, first < second
	pub pair: (usize, usize),
	pub score_percent: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detector {
	pub threshold: f64,
	pub min_token_len: usize,
}

impl Default for Detector {
	fn default() -> Self {
		Self {
			threshold: 0.75,
			min_token_len: 3,
		}
	}
}

impl Detector {
	pub fn from_config(config: &Config) -> Self {
		Self {
			threshold: config.similarity_threshold,
			min_token_len: config.min_token_len,
		}
	}

	// term frequencies of lowercased letter runs
	pub fn text_to_vector(&self, text: &str) -> HashMap<String, usize> {
		let mut terms = HashMap::new();

		for word in text
			.split(|c: char| !c.is_alphabetic())
			.filter(|w| w.chars().count() >= self.min_token_len)
		{
			*terms.entry(word.to_lowercase()).or_insert(0) += 1;
		}

		terms
	}

	// every pair scoring strictly above the threshold, ascending
	pub fn detect<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Similarity> {
		let vectors: Vec<_> = texts
			.iter()
			.map(|t| self.text_to_vector(t.as_ref()))
			.collect();
		let mut found = Vec::new();

		for i in 0..vectors.len() {
			for j in i + 1..vectors.len() {
				let similarity = cosine_similarity(&vectors[i], &vectors[j]);

				if similarity > self.threshold {
					found.push(Similarity {
						pair: (i + 1, j + 1),
						score_percent: (similarity * 100.0).round() as u32,
					});
				}
			}
		}

		found
	}
}

pub fn text_to_vector(text: &str) -> HashMap<String, usize> {
	Detector::default().text_to_vector(text)
}

// 0 when either side has no terms
pub fn cosine_similarity(a: &HashMap<String, usize>, b: &HashMap<String, usize>) -> f64 {
	let dot: f64 = a
		.iter()
		.filter_map(|(term, x)| b.get(term).map(|y| (*x * *y) as f64))
		.sum();
	let magnitude = |v: &HashMap<String, usize>| {
		v.values()
			.map(|x| (*x * *x) as f64)
			.sum::<f64>()
			.sqrt()
	};
	let (ma, mb) = (magnitude(a), magnitude(b));

	if ma == 0.0 || mb == 0.0 {
		0.0
	} else {
		(dot / (ma * mb)).min(1.0)
	}
}

pub fn detect<S: AsRef<str>>(texts: &[S]) -> Vec<Similarity> {
	Detector::default().detect(texts)
}
