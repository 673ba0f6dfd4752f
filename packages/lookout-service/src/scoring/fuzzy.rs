use lookout_domain::{CatalogEntity, text};

use crate::scoring::{Query, Score};

const MAX_LENGTH_GAP: usize = 3;

/// Larger of the fuzzy token Jaccard and the compact-string Levenshtein similarity, in 0..=1.
pub fn similarity(entity: &CatalogEntity, query: &Query, token_threshold: f64) -> f64 {
	let mut name_tokens = text::tokens(&entity.name);

	if let Some(label) = entity.label.as_deref() {
		for token in text::tokens(label) {
			if !name_tokens.contains(&token) {
				name_tokens.push(token);
			}
		}
	}

	let jaccard = fuzzy_jaccard(&query.content, &name_tokens, token_threshold);
	let names = [Some(text::compact(&entity.name)), entity.label.as_deref().map(text::compact)];
	let mut edit = 0.0_f64;

	for name in names.iter().flatten().filter(|name| !name.is_empty()) {
		for phrase in query.phrases.iter().chain(std::iter::once(&query.whole)) {
			edit = edit.max(strsim::normalized_levenshtein(phrase, name));
		}
	}

	jaccard.max(edit).clamp(0.0, 1.0)
}

pub fn score(entity: &CatalogEntity, query: &Query, ceiling: f32, token_threshold: f32) -> Score {
	let similarity = similarity(entity, query, token_threshold as f64);

	Score {
		value: ceiling * similarity as f32,
		reason: format!("fuzzy-similarity {similarity:.2}"),
		..Score::default()
	}
}

/// Each name token pairs with at most one distinct query term.
fn fuzzy_jaccard(terms: &[String], name_tokens: &[String], threshold: f64) -> f64 {
	let mut distinct: Vec<&String> = Vec::with_capacity(terms.len());

	for term in terms {
		if !distinct.contains(&term) {
			distinct.push(term);
		}
	}

	if distinct.is_empty() || name_tokens.is_empty() {
		return 0.0;
	}

	let mut used = vec![false; name_tokens.len()];
	let mut matched = 0;

	for term in &distinct {
		let pair = name_tokens
			.iter()
			.enumerate()
			.position(|(idx, token)| !used[idx] && tokens_match(term, token, threshold));

		if let Some(idx) = pair {
			used[idx] = true;
			matched += 1;
		}
	}

	let union = distinct.len() + name_tokens.len() - matched;

	(matched as f64 / union as f64).min(1.0)
}

fn tokens_match(a: &str, b: &str, threshold: f64) -> bool {
	a.chars().count().abs_diff(b.chars().count()) <= MAX_LENGTH_GAP
		&& strsim::normalized_levenshtein(a, b) >= threshold
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;
	use crate::scoring::tests::analyze;

	#[test]
	fn spelling_variants_score_high() {
		let model = CatalogEntity::model("user_saga_behavior", "u", datetime!(2024-05-01 0:00 UTC));
		let query = analyze("user saga behaviour");
		let similarity = similarity(&model, &query, 0.8);

		assert!(similarity > 0.9, "Unexpected similarity {similarity}.");
	}

	#[test]
	fn fuzzy_never_reaches_exact_certainty() {
		let model = CatalogEntity::model("orders", "u", datetime!(2024-05-01 0:00 UTC));
		let score = score(&model, &analyze("orders"), 90.0, 0.8);

		assert_eq!(score.value, 90.0);
		assert!(!score.exact);
	}

	#[test]
	fn repeated_terms_pair_with_a_name_token_once() {
		let model = CatalogEntity::model("orders", "u", datetime!(2024-05-01 0:00 UTC));

		for raw in ["order orders", "ordrs orderz", "orders orders"] {
			let similarity = similarity(&model, &analyze(raw), 0.8);

			assert!(similarity <= 1.0, "Unexpected similarity {similarity} for {raw:?}.");
		}

		assert!(similarity(&model, &analyze("order orders"), 0.8) < 0.9);
		assert!(score(&model, &analyze("ordrs orderz"), 90.0, 0.8).value < 80.0);
	}

	#[test]
	fn token_matching_bounds_length_gap() {
		assert!(tokens_match("behaviour", "behavior", 0.8));
		assert!(!tokens_match("rev", "revenue", 0.3));
		assert!(!tokens_match("cost", "retention", 0.8));
	}

	#[test]
	fn unrelated_names_score_low() {
		let dashboard = CatalogEntity::dashboard("1", "Cost Report", "u", datetime!(2024-05-01 0:00 UTC));
		let similarity = similarity(&dashboard, &analyze("experiment winners"), 0.8);

		assert!(similarity < 0.4, "Unexpected similarity {similarity}.");
	}
}
