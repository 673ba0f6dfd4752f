use std::collections::BTreeSet;

use ahash::AHashSet;

use lookout_config::Scoring;
use lookout_domain::{CatalogEntity, DomainBuckets, text};

use crate::scoring::{Query, Score, field};

pub const REASON: &str = "dashboard-context";

/// Scores a dashboard's title, description, and folder against the query's dashboard terms.
///
/// Compound temporal terms are matched first and consume their component words. A dashboard
/// classified into a bucket exclusive to the query's bucket carries a penalty instead of a boost.
pub fn score(entity: &CatalogEntity, query: &Query, buckets: &DomainBuckets, weights: &Scoring) -> Score {
	let title_tokens = text::tokens(&entity.name);
	let title_compact = title_tokens.concat();
	let description = entity.description().unwrap_or_default();
	let description_tokens = text::tokens(description);
	let description_compact = description_tokens.concat();
	let folder_tokens = entity.folder().map(text::tokens).unwrap_or_default();
	let mut value = 0.0_f32;
	let mut penalty = 0.0_f32;
	let mut parts = Vec::new();
	let mut consumed: AHashSet<&str> = AHashSet::new();
	let mut accounted: AHashSet<&str> = AHashSet::new();

	for found in buckets.temporal_matches(&query.dashboard_tokens) {
		let words = &query.dashboard_tokens[found.span.clone()];

		consumed.extend(words.iter().map(String::as_str));

		if title_compact.contains(&found.term) || description_compact.contains(&found.term) {
			value += weights.temporal_compound;

			accounted.extend(words.iter().map(String::as_str));
			parts.push(format!("temporal {}", found.term));
		}
	}

	let mut folder_hit = false;

	for (term, synonyms) in query.content.iter().zip(&query.synonyms) {
		if !query.dashboard_tokens.contains(term) || consumed.contains(term.as_str()) {
			continue;
		}

		let candidates = || std::iter::once(term).chain(synonyms.iter());
		let title = candidates()
			.filter_map(|candidate| field::match_factor(candidate, &title_tokens))
			.fold(0.0_f32, f32::max);

		if title > 0.0 {
			value += weights.title_token * title;

			accounted.insert(term);
			parts.push(format!("title {term}"));
		} else if candidates().any(|candidate| field::match_factor(candidate, &description_tokens).is_some()) {
			value += weights.dashboard_description;

			accounted.insert(term);
			parts.push(format!("description {term}"));
		}

		if candidates().any(|candidate| folder_tokens.contains(candidate)) {
			folder_hit = true;

			accounted.insert(term);
		}
	}

	if folder_hit {
		value += if description.is_empty() {
			weights.folder_boost
		} else {
			weights.folder_boost_with_description
		};

		parts.push("folder".to_string());
	}

	let query_buckets: BTreeSet<&str> = query.buckets.iter().map(String::as_str).collect();
	let entity_buckets = buckets.classify(title_tokens.iter().chain(&folder_tokens).map(String::as_str));

	if !query_buckets.is_disjoint(&entity_buckets) {
		value += weights.domain_boost;

		parts.push("domain".to_string());
	} else if buckets.conflicts(&query_buckets, &entity_buckets) {
		penalty = weights.exclusive_penalty;

		parts.push("domain-conflict".to_string());
	}

	let terms = query.dashboard_terms();

	if value > 0.0 && !terms.is_empty() && terms.iter().all(|term| accounted.contains(term.as_str())) {
		value += weights.coverage_bonus;

		parts.push("coverage".to_string());
	}

	let reason = if parts.is_empty() { REASON.to_string() } else { format!("{REASON} ({})", parts.join(", ")) };

	Score { value, penalty, reason, ..Score::default() }
}
