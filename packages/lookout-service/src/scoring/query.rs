use std::collections::BTreeSet;

use regex::Regex;

use lookout_config::Config;
use lookout_domain::{DomainBuckets, Variant, VocabularyExpander, text};

use crate::{Error, Result};

/// A query prepared once and shared by every tier.
#[derive(Clone, Debug)]
pub struct Query {
	pub raw: String,
	pub normalized: String,
	pub tokens: Vec<String>,
	/// Tokens of length two or more minus stopwords, markers, and the intent variant word.
	pub content: Vec<String>,
	/// Content terms plus vocabulary synonyms.
	pub expanded: BTreeSet<String>,
	/// Synonyms of each content term on its own, aligned with `content`.
	pub synonyms: Vec<Vec<String>>,
	/// Compact form of the whole query. Checked against every variant.
	pub whole: String,
	/// Compact candidate names: content terms joined and each phrase after a marker.
	pub phrases: Vec<String>,
	pub hint: Option<Variant>,
	/// Variant named next to a marker ("model called ..."), or Dashboard on dashboard intent.
	pub intent: Option<Variant>,
	pub dashboard_intent: bool,
	/// Tokens with dashboard intent words removed, in query order.
	pub dashboard_tokens: Vec<String>,
	/// Domain buckets of the content terms.
	pub buckets: BTreeSet<String>,
}
impl Query {
	/// Variants the exact tier scopes its phrase checks to. `None` means every variant.
	pub fn scope(&self) -> Option<Variant> {
		self.hint.or(self.intent)
	}

	/// Content terms without dashboard intent words.
	pub fn dashboard_terms(&self) -> Vec<String> {
		self.content.iter().filter(|term| self.dashboard_tokens.contains(term)).cloned().collect()
	}
}

pub struct QueryAnalyzer {
	expander: VocabularyExpander,
	extra_stopwords: Vec<String>,
	markers: Vec<String>,
	dashboard_intent: Vec<Regex>,
}
impl QueryAnalyzer {
	pub fn new(cfg: &Config) -> Result<Self> {
		let dashboard_intent = cfg
			.resolver
			.dashboard_intent_patterns
			.iter()
			.map(|pattern| {
				Regex::new(pattern).map_err(|err| Error::Config {
					message: format!("Invalid dashboard intent pattern {pattern:?}: {err}."),
				})
			})
			.collect::<Result<Vec<_>>>()?;

		Ok(Self {
			expander: VocabularyExpander::new(&cfg.vocabulary),
			extra_stopwords: cfg.resolver.extra_stopwords.clone(),
			markers: cfg.resolver.exact_name_markers.iter().map(|marker| text::normalize(marker)).collect(),
			dashboard_intent,
		})
	}

	pub fn analyze(&self, raw: &str, hint: Option<Variant>, buckets: &DomainBuckets) -> Query {
		let normalized = text::normalize(raw);
		let tokens: Vec<String> =
			normalized.split(' ').filter(|token| !token.is_empty()).map(str::to_string).collect();
		let marker_positions: Vec<usize> = tokens
			.iter()
			.enumerate()
			.filter(|(_, token)| self.markers.contains(token))
			.map(|(idx, _)| idx)
			.collect();
		let intent_word = marker_positions.iter().find_map(|idx| {
			let prev = tokens.get(idx.checked_sub(1)?)?;

			prev.parse::<Variant>().ok().map(|variant| (prev.clone(), variant))
		});
		let dashboard_intent = self.dashboard_intent.iter().any(|re| re.is_match(&normalized));
		let intent = intent_word
			.as_ref()
			.map(|(_, variant)| *variant)
			.or(dashboard_intent.then_some(Variant::Dashboard));
		let mut skip = self.extra_stopwords.clone();

		skip.extend(self.markers.iter().cloned());

		if let Some((word, _)) = intent_word.as_ref() {
			skip.push(word.clone());
		}

		let content = text::content_terms(&tokens, &skip);
		let expanded = self.expander.expand(&content);
		let synonyms = content
			.iter()
			.map(|term| {
				self.expander
					.expand(std::slice::from_ref(term))
					.into_iter()
					.filter(|synonym| synonym != term)
					.collect()
			})
			.collect();
		let whole = tokens.concat();
		let mut phrases = vec![content.concat()];

		for idx in &marker_positions {
			let after = &tokens[idx + 1..];

			phrases.push(after.concat());
			phrases.push(text::content_terms(after, &self.extra_stopwords).concat());
		}

		phrases.retain(|phrase| !phrase.is_empty() && *phrase != whole);
		phrases.sort();
		phrases.dedup();

		let dashboard_tokens = tokens
			.iter()
			.filter(|token| !self.dashboard_intent.iter().any(|re| re.is_match(token)))
			.cloned()
			.collect();
		let buckets =
			buckets.classify(content.iter().map(String::as_str)).into_iter().map(str::to_string).collect();

		Query {
			raw: raw.to_string(),
			normalized,
			tokens,
			content,
			expanded,
			synonyms,
			whole,
			phrases,
			hint,
			intent,
			dashboard_intent,
			dashboard_tokens,
			buckets,
		}
	}
}
