//! Candidate scoring: per-signal scorers, score combination, bands, and ranking.

pub mod dashboard;
pub mod exact;
pub mod field;
pub mod fuzzy;
pub mod query;

pub use query::{Query, QueryAnalyzer};

use std::cmp::Ordering;

use serde::Serialize;

use lookout_config::{Config, Scoring};
use lookout_domain::{CatalogEntity, DomainBuckets};

use crate::store::CatalogView;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
	High,
	Medium,
	Excluded,
}

/// One signal's contribution to a candidate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Score {
	pub value: f32,
	/// Subtracted after the positive contributions are clamped.
	pub penalty: f32,
	pub reason: String,
	pub exact: bool,
	pub field_matches: usize,
	pub matched_fields: Vec<String>,
}

/// A catalog entity with its combined score.
#[derive(Clone, Debug)]
pub struct Scored<'a> {
	pub entity: &'a CatalogEntity,
	pub score: f32,
	pub reasons: Vec<String>,
	pub exact: bool,
	pub field_matches: usize,
	pub matched_fields: Vec<String>,
}

pub struct ScoringEngine {
	weights: Scoring,
	buckets: DomainBuckets,
	high_threshold: f32,
	medium_threshold: f32,
}
impl ScoringEngine {
	pub fn new(cfg: &Config) -> Self {
		Self {
			weights: cfg.scoring.clone(),
			buckets: DomainBuckets::new(&cfg.domains),
			high_threshold: cfg.resolver.high_threshold,
			medium_threshold: cfg.resolver.medium_threshold,
		}
	}

	pub fn buckets(&self) -> &DomainBuckets {
		&self.buckets
	}

	pub fn high_threshold(&self) -> f32 {
		self.high_threshold
	}

	pub fn medium_threshold(&self) -> f32 {
		self.medium_threshold
	}

	pub fn band(&self, score: f32) -> Band {
		if score > self.high_threshold {
			Band::High
		} else if score >= self.medium_threshold {
			Band::Medium
		} else {
			Band::Excluded
		}
	}

	/// Exact name match. Marker phrases only count for the variant the query is scoped to.
	pub fn exact_name(&self, entity: &CatalogEntity, query: &Query) -> Option<Score> {
		let scoped = query.scope().map(|variant| variant == entity.variant()).unwrap_or(true);

		exact::score(entity, query, scoped, self.weights.exact_name)
	}

	pub fn field_keyword(&self, entity: &CatalogEntity, query: &Query) -> Score {
		field::score(entity, &query.expanded, &self.weights)
	}

	pub fn fuzzy(&self, entity: &CatalogEntity, query: &Query) -> Score {
		fuzzy::score(entity, query, self.weights.fuzzy_ceiling, self.weights.fuzzy_token_similarity)
	}

	pub fn dashboard_context(&self, entity: &CatalogEntity, query: &Query) -> Score {
		dashboard::score(entity, query, &self.buckets, &self.weights)
	}

	/// A weighted share of the best keyword score among the explores mapped to `dashboard`.
	pub fn mapped_explore(&self, dashboard: &CatalogEntity, query: &Query, view: &CatalogView) -> Score {
		let best = view
			.related_explores(&dashboard.id)
			.map(|(_, explore)| (field::score(explore, &query.expanded, &self.weights), explore))
			.max_by(|(a, _), (b, _)| a.value.total_cmp(&b.value));

		match best {
			Some((score, explore)) if score.value > 0.0 => Score {
				value: score.value * self.weights.mapped_explore_weight,
				reason: format!("mapped-explore {}", explore.id),
				field_matches: score.field_matches,
				matched_fields: score.matched_fields,
				..Score::default()
			},
			_ => Score::default(),
		}
	}

	/// Penalty for a dashboard whose domain bucket is exclusive to the query's.
	pub fn domain_penalty(&self, entity: &CatalogEntity, query: &Query) -> Option<Score> {
		let query_buckets = query.buckets.iter().map(String::as_str).collect();
		let mut entity_tokens = lookout_domain::text::tokens(&entity.name);

		if let Some(folder) = entity.folder() {
			entity_tokens.extend(lookout_domain::text::tokens(folder));
		}

		let entity_buckets = self.buckets.classify(entity_tokens.iter().map(String::as_str));

		self.buckets.conflicts(&query_buckets, &entity_buckets).then(|| Score {
			penalty: self.weights.exclusive_penalty,
			reason: "domain-conflict".to_string(),
			..Score::default()
		})
	}

	/// Sums the positive contributions into 0..=100, then subtracts penalties and clamps again.
	pub fn combine<'a>(&self, entity: &'a CatalogEntity, scores: Vec<Score>) -> Scored<'a> {
		let positive = scores.iter().map(|score| score.value).sum::<f32>().clamp(0.0, 100.0);
		let penalty = scores.iter().map(|score| score.penalty).sum::<f32>();
		let mut scored = Scored {
			entity,
			score: (positive - penalty).clamp(0.0, 100.0),
			reasons: Vec::new(),
			exact: false,
			field_matches: 0,
			matched_fields: Vec::new(),
		};

		for score in scores {
			if score.value <= 0.0 && score.penalty <= 0.0 {
				continue;
			}

			scored.exact |= score.exact;
			scored.field_matches = scored.field_matches.max(score.field_matches);

			for field in score.matched_fields {
				if !scored.matched_fields.contains(&field) {
					scored.matched_fields.push(field);
				}
			}

			if !score.reason.is_empty() {
				scored.reasons.push(score.reason);
			}
		}

		scored
	}
}

/// Orders by score, then exactness, field matches, recency, variant, and id.
pub fn rank(scored: &mut [Scored<'_>]) {
	scored.sort_by(compare);
}

fn compare(a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
	b.score
		.total_cmp(&a.score)
		.then_with(|| b.exact.cmp(&a.exact))
		.then_with(|| b.field_matches.cmp(&a.field_matches))
		.then_with(|| b.entity.fetched_at.cmp(&a.entity.fetched_at))
		.then_with(|| a.entity.variant().cmp(&b.entity.variant()))
		.then_with(|| a.entity.id.cmp(&b.entity.id))
}
