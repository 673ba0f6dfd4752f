use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;

use crate::text;

const MAX_PHRASE_LEN: usize = 3;

/// Maps domain terms and short phrases to synonym sets.
///
/// Keys are matched on their normalized form, both space-joined ("ab test") and compact
/// ("abtest"), so either spelling in the query hits the same entry.
#[derive(Clone, Debug, Default)]
pub struct VocabularyExpander {
	synonyms: AHashMap<String, Vec<String>>,
}
impl VocabularyExpander {
	pub fn new(mapping: &BTreeMap<String, Vec<String>>) -> Self {
		let mut synonyms: AHashMap<String, Vec<String>> = AHashMap::new();

		for (term, targets) in mapping {
			let key = text::normalize(term);

			if key.is_empty() {
				continue;
			}

			let expanded: Vec<String> =
				targets.iter().flat_map(|target| text::tokens(target)).collect();

			for key in [key.clone(), key.replace(' ', "")] {
				let slot = synonyms.entry(key).or_default();

				for synonym in &expanded {
					if !slot.contains(synonym) {
						slot.push(synonym.clone());
					}
				}
			}
		}

		Self { synonyms }
	}

	pub fn is_empty(&self) -> bool {
		self.synonyms.is_empty()
	}

	/// Returns the input terms plus the synonyms of every term and of every adjacent pair and
	/// triple.
	pub fn expand(&self, terms: &[String]) -> BTreeSet<String> {
		let mut out: BTreeSet<String> = terms.iter().cloned().collect();

		for start in 0..terms.len() {
			for len in 1..=MAX_PHRASE_LEN {
				let Some(window) = terms.get(start..start + len) else {
					break;
				};

				for key in [window.join(" "), window.concat()] {
					if let Some(synonyms) = self.synonyms.get(&key) {
						out.extend(synonyms.iter().cloned());
					}
				}
			}
		}

		out
	}
}
