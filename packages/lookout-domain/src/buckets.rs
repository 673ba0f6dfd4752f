use std::{collections::BTreeSet, ops::Range};

use ahash::AHashSet;

use lookout_config::Domains;

#[derive(Clone, Debug)]
struct Bucket {
	name: String,
	keywords: AHashSet<String>,
}

#[derive(Clone, Debug)]
struct TemporalTerm {
	tokens: Vec<String>,
	compact: String,
}

/// A compound temporal term found in a token sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemporalMatch {
	/// Compact spelling, e.g. "biweekly".
	pub term: String,
	/// Token positions the match consumed.
	pub span: Range<usize>,
}

/// Coarse business-topic buckets, the exclusive pairs among them, and the compound temporal terms.
#[derive(Clone, Debug, Default)]
pub struct DomainBuckets {
	buckets: Vec<Bucket>,
	exclusive: Vec<(String, String)>,
	temporal: Vec<TemporalTerm>,
}
impl DomainBuckets {
	pub fn new(cfg: &Domains) -> Self {
		let buckets = cfg
			.buckets
			.iter()
			.map(|bucket| Bucket {
				name: bucket.name.clone(),
				keywords: bucket.keywords.iter().map(|keyword| keyword.to_lowercase()).collect(),
			})
			.collect();
		let exclusive =
			cfg.exclusive.iter().map(|[left, right]| (left.clone(), right.clone())).collect();
		let mut temporal: Vec<TemporalTerm> = cfg
			.temporal_terms
			.iter()
			.map(|term| {
				let tokens = crate::text::tokens(term);
				let compact = tokens.concat();

				TemporalTerm { tokens, compact }
			})
			.filter(|term| !term.tokens.is_empty())
			.collect();

		// Longest phrases first so "year over year" wins over any shorter overlap.
		temporal.sort_by(|a, b| b.tokens.len().cmp(&a.tokens.len()));

		Self { buckets, exclusive, temporal }
	}

	/// Names of the buckets with at least one keyword among `terms`.
	pub fn classify<'a, I>(&self, terms: I) -> BTreeSet<&str>
	where
		I: IntoIterator<Item = &'a str>,
	{
		let terms: Vec<&str> = terms.into_iter().collect();

		self.buckets
			.iter()
			.filter(|bucket| terms.iter().any(|term| bucket.keywords.contains(*term)))
			.map(|bucket| bucket.name.as_str())
			.collect()
	}

	/// True when both sides are classified, share no bucket, and an exclusive pair links them.
	pub fn conflicts(&self, query: &BTreeSet<&str>, entity: &BTreeSet<&str>) -> bool {
		if query.is_empty() || entity.is_empty() || !query.is_disjoint(entity) {
			return false;
		}

		self.exclusive.iter().any(|(left, right)| {
			(query.contains(left.as_str()) && entity.contains(right.as_str()))
				|| (query.contains(right.as_str()) && entity.contains(left.as_str()))
		})
	}

	/// Finds compound temporal terms in any spelling: split ("bi weekly", which also covers
	/// "bi-weekly" after normalization) or fused ("biweekly").
	pub fn temporal_matches(&self, tokens: &[String]) -> Vec<TemporalMatch> {
		let mut consumed = vec![false; tokens.len()];
		let mut out = Vec::new();

		for term in &self.temporal {
			let width = term.tokens.len();
			let mut idx = 0;

			while idx < tokens.len() {
				let split = tokens.get(idx..idx + width).map(|window| window == term.tokens.as_slice());
				let span = if split.unwrap_or(false) {
					Some(idx..idx + width)
				} else if tokens[idx] == term.compact {
					Some(idx..idx + 1)
				} else {
					None
				};

				if let Some(span) = span
					&& !consumed[span.clone()].iter().any(|taken| *taken)
				{
					consumed[span.clone()].iter_mut().for_each(|taken| *taken = true);
					idx = span.end;

					out.push(TemporalMatch { term: term.compact.clone(), span });

					continue;
				}

				idx += 1;
			}
		}

		out.sort_by_key(|found| found.span.start);

		out
	}

	pub fn is_temporal(&self, compact: &str) -> bool {
		self.temporal.iter().any(|term| term.compact == compact)
	}
}
