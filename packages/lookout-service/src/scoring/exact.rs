use lookout_domain::{CatalogEntity, text};

use crate::scoring::{Query, Score};

pub const REASON: &str = "exact-name";

/// Exact match of the compact name or label against the whole query, and against the query's
/// candidate phrases when `scoped` is set.
pub fn score(entity: &CatalogEntity, query: &Query, scoped: bool, weight: f32) -> Option<Score> {
	let names = [Some(text::compact(&entity.name)), entity.label.as_deref().map(text::compact)];
	let hit = names.iter().flatten().any(|name| {
		!name.is_empty() && (*name == query.whole || (scoped && query.phrases.contains(name)))
	});

	hit.then(|| Score { value: weight, reason: REASON.to_string(), exact: true, ..Score::default() })
}
