use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use unicode_segmentation::UnicodeSegmentation;

/// Function words dropped from query content terms.
pub const STOPWORDS: &[&str] = &[
	"a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "by", "can", "could", "do",
	"does", "find", "for", "from", "get", "give", "have", "how", "i", "in", "is", "it", "its",
	"list", "me", "my", "need", "of", "on", "or", "our", "please", "show", "some", "tell", "that",
	"the", "there", "this", "to", "us", "was", "we", "what", "where", "which", "who", "with",
	"would", "you",
];

/// Lowercased, accent-free text with every run of non-alphanumeric characters collapsed to a
/// single space.
///
/// Single letters joined by `/` or `&` are fused first, so "A/B test" reads as "ab test" and
/// "P&L" as "pl".
pub fn normalize(input: &str) -> String {
	let fused = fuse_initialisms(input);
	let mut out = String::with_capacity(fused.len());
	let mut pending_space = false;

	for ch in fused.nfkd().filter(|ch| !is_combining_mark(*ch)) {
		if ch.is_alphanumeric() {
			if pending_space && !out.is_empty() {
				out.push(' ');
			}

			pending_space = false;

			out.extend(ch.to_lowercase());
		} else {
			pending_space = true;
		}
	}

	out
}

pub fn tokens(input: &str) -> Vec<String> {
	normalize(input).split(' ').filter(|token| !token.is_empty()).map(str::to_string).collect()
}

/// Normalized text with the separators removed: "Bi-Weekly Report" becomes "biweeklyreport".
pub fn compact(input: &str) -> String {
	normalize(input).replace(' ', "")
}

pub fn is_stopword(token: &str, extra: &[String]) -> bool {
	STOPWORDS.binary_search(&token).is_ok() || extra.iter().any(|word| word == token)
}

/// Tokens of length two or more that are not stopwords, in query order.
pub fn content_terms(tokens: &[String], extra_stopwords: &[String]) -> Vec<String> {
	tokens
		.iter()
		.filter(|token| token.chars().count() >= 2 && !is_stopword(token, extra_stopwords))
		.cloned()
		.collect()
}

fn fuse_initialisms(input: &str) -> String {
	let segments: Vec<&str> = input.split_word_bounds().collect();
	let mut out = String::with_capacity(input.len());

	for (idx, segment) in segments.iter().enumerate() {
		if matches!(*segment, "/" | "&")
			&& idx > 0
			&& is_single_letter(segments[idx - 1])
			&& segments.get(idx + 1).map(|next| is_single_letter(next)).unwrap_or(false)
		{
			continue;
		}

		out.push_str(segment);
	}

	out
}

fn is_single_letter(segment: &str) -> bool {
	let mut chars = segment.chars();

	matches!((chars.next(), chars.next()), (Some(ch), None) if ch.is_alphabetic())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stopwords_are_sorted_for_binary_search() {
		let mut sorted = STOPWORDS.to_vec();

		sorted.sort_unstable();

		assert_eq!(sorted, STOPWORDS);
	}

	#[test]
	fn normalize_folds_case_accents_and_separators() {
		assert_eq!(normalize("  Bi-Weekly   Retention_Report!  "), "bi weekly retention report");
		assert_eq!(normalize("Café Überblick"), "cafe uberblick");
		assert_eq!(normalize("user_saga_behaviour"), "user saga behaviour");
		assert_eq!(normalize("???"), "");
	}

	#[test]
	fn normalize_fuses_slash_initialisms() {
		assert_eq!(normalize("A/B test winner"), "ab test winner");
		assert_eq!(normalize("P&L summary"), "pl summary");
		assert_eq!(normalize("orders/returns"), "orders returns");
	}

	#[test]
	fn compact_drops_separators() {
		assert_eq!(compact("Bi-Weekly Report"), "biweeklyreport");
		assert_eq!(compact("bi weekly report"), "biweeklyreport");
	}

	#[test]
	fn content_terms_drop_short_tokens_and_stopwords() {
		let tokens = tokens("Is there a dashboard for the x cost?");
		let extra = vec!["dashboard".to_string()];

		assert_eq!(content_terms(&tokens, &[]), vec!["dashboard".to_string(), "cost".to_string()]);
		assert_eq!(content_terms(&tokens, &extra), vec!["cost".to_string()]);
	}
}
