use std::collections::BTreeSet;

use lookout_config::Scoring;
use lookout_domain::{CatalogEntity, FieldKind, text};

use crate::scoring::Score;

pub const REASON: &str = "field-keyword";

const CAP: f32 = 99.0;
/// Weights of the strongest, second, and third match of one term.
const DECAY: [f32; 3] = [1.0, 0.5, 0.25];
const MIN_PARTIAL_LEN: usize = 4;

struct Component<'a> {
	weight: f32,
	tokens: Vec<String>,
	field: Option<&'a str>,
}

/// Keyword score of `terms` against the names, tags, descriptions, and fields of `entity`.
///
/// Each term keeps its three strongest matches with decaying weight, so one word repeated
/// across many fields cannot dominate the total.
pub fn score(entity: &CatalogEntity, terms: &BTreeSet<String>, weights: &Scoring) -> Score {
	let components = components(entity, weights);
	let mut total = 0.0_f32;
	let mut fields: BTreeSet<&str> = BTreeSet::new();

	for term in terms {
		let mut hits = Vec::new();

		for component in &components {
			let Some(factor) = match_factor(term, &component.tokens) else {
				continue;
			};

			hits.push(component.weight * factor);

			if let Some(field) = component.field {
				fields.insert(field);
			}
		}

		hits.sort_by(|a, b| b.total_cmp(a));

		total += hits.iter().zip(DECAY).map(|(hit, decay)| hit * decay).sum::<f32>();
	}

	let reason = if fields.is_empty() {
		REASON.to_string()
	} else {
		format!("{REASON} ({})", fields.iter().copied().collect::<Vec<_>>().join(", "))
	};

	Score {
		value: total.min(CAP),
		reason,
		field_matches: fields.len(),
		matched_fields: fields.into_iter().map(str::to_string).collect(),
		..Score::default()
	}
}

/// 1.0 for a whole-token match, 0.5 for a substring match between longer words.
pub fn match_factor(term: &str, tokens: &[String]) -> Option<f32> {
	if tokens.iter().any(|token| token == term) {
		return Some(1.0);
	}
	if term.chars().count() < MIN_PARTIAL_LEN {
		return None;
	}

	tokens
		.iter()
		.any(|token| {
			token.contains(term)
				|| (token.chars().count() >= MIN_PARTIAL_LEN && term.contains(token.as_str()))
		})
		.then_some(0.5)
}

fn components<'a>(entity: &'a CatalogEntity, weights: &Scoring) -> Vec<Component<'a>> {
	let mut out = vec![Component { weight: weights.name_token, tokens: text::tokens(&entity.name), field: None }];

	if let Some(label) = entity.label.as_deref() {
		out.push(Component { weight: weights.name_token, tokens: text::tokens(label), field: None });
	}
	for tag in &entity.tags {
		out.push(Component { weight: weights.tag, tokens: text::tokens(tag), field: None });
	}
	if let Some(description) = entity.description() {
		out.push(Component { weight: weights.description, tokens: text::tokens(description), field: None });
	}

	for field in entity.fields() {
		let short = field.name.rsplit('.').next().unwrap_or(&field.name);
		let weight = match field.kind {
			FieldKind::Measure => weights.measure_name,
			FieldKind::Dimension => weights.dimension_name,
		};
		let name = Some(field.name.as_str());

		out.push(Component { weight, tokens: text::tokens(short), field: name });

		if let Some(label) = field.label.as_deref() {
			out.push(Component { weight: weights.field_label, tokens: text::tokens(label), field: name });
		}
		if let Some(description) = field.description.as_deref() {
			out.push(Component {
				weight: weights.field_description,
				tokens: text::tokens(description),
				field: name,
			});
		}
	}

	for explore in entity.explore_names() {
		out.push(Component { weight: weights.explore_name, tokens: text::tokens(explore), field: None });
	}

	out
}
