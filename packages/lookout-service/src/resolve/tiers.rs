use std::fmt;

use serde::{Deserialize, Serialize};

use lookout_domain::Variant;

use crate::{
	scoring::{Band, Query, Scored, ScoringEngine},
	store::CatalogView,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
	Exact,
	Dashboard,
	Semantic,
	Fallback,
}
impl TierKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Exact => "exact",
			Self::Dashboard => "dashboard",
			Self::Semantic => "semantic",
			Self::Fallback => "fallback",
		}
	}
}
impl fmt::Display for TierKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One stage of resolution. `None` escalates to the next tier; `Some` ends resolution.
pub trait Tier
where
	Self: Send + Sync,
{
	fn kind(&self) -> TierKind;

	fn attempt<'a>(
		&self,
		query: &Query,
		catalog: &'a CatalogView,
		engine: &ScoringEngine,
	) -> Option<Vec<Scored<'a>>>;
}

pub struct ExactTier;
impl Tier for ExactTier {
	fn kind(&self) -> TierKind {
		TierKind::Exact
	}

	fn attempt<'a>(
		&self,
		query: &Query,
		catalog: &'a CatalogView,
		engine: &ScoringEngine,
	) -> Option<Vec<Scored<'a>>> {
		let hits: Vec<Scored<'a>> = Variant::ALL
			.iter()
			.flat_map(|variant| catalog.entities(*variant))
			.filter_map(|entity| {
				engine.exact_name(entity, query).map(|score| engine.combine(entity, vec![score]))
			})
			.filter(|scored| engine.band(scored.score) == Band::High)
			.collect();

		(!hits.is_empty()).then_some(hits)
	}
}

pub struct DashboardTier;
impl Tier for DashboardTier {
	fn kind(&self) -> TierKind {
		TierKind::Dashboard
	}

	fn attempt<'a>(
		&self,
		query: &Query,
		catalog: &'a CatalogView,
		engine: &ScoringEngine,
	) -> Option<Vec<Scored<'a>>> {
		let wanted = match query.hint {
			Some(variant) => variant == Variant::Dashboard,
			None => query.dashboard_intent,
		};

		if !wanted {
			return None;
		}

		Some(
			catalog
				.dashboards
				.iter()
				.map(|dashboard| {
					engine.combine(
						dashboard,
						vec![
							engine.dashboard_context(dashboard, query),
							engine.mapped_explore(dashboard, query, catalog),
						],
					)
				})
				.collect(),
		)
	}
}

pub struct SemanticTier;
impl Tier for SemanticTier {
	fn kind(&self) -> TierKind {
		TierKind::Semantic
	}

	fn attempt<'a>(
		&self,
		query: &Query,
		catalog: &'a CatalogView,
		engine: &ScoringEngine,
	) -> Option<Vec<Scored<'a>>> {
		let scored: Vec<Scored<'a>> = [Variant::Explore, Variant::Model]
			.into_iter()
			.filter(|variant| query.hint.map(|hint| hint == *variant).unwrap_or(true))
			.flat_map(|variant| catalog.entities(variant))
			.map(|entity| engine.combine(entity, vec![engine.field_keyword(entity, query)]))
			.collect();

		scored.iter().any(|scored| scored.score >= engine.medium_threshold()).then_some(scored)
	}
}

/// Fuzzy similarity over every entity. Always answers, possibly with nothing above the bands.
pub struct FallbackTier;
impl Tier for FallbackTier {
	fn kind(&self) -> TierKind {
		TierKind::Fallback
	}

	fn attempt<'a>(
		&self,
		query: &Query,
		catalog: &'a CatalogView,
		engine: &ScoringEngine,
	) -> Option<Vec<Scored<'a>>> {
		let scored = Variant::ALL
			.into_iter()
			.filter(|variant| query.hint.map(|hint| hint == *variant).unwrap_or(true))
			.flat_map(|variant| catalog.entities(variant))
			.map(|entity| {
				let mut scores = vec![engine.fuzzy(entity, query)];

				if entity.variant() == Variant::Dashboard
					&& let Some(penalty) = engine.domain_penalty(entity, query)
				{
					scores.push(penalty);
				}

				engine.combine(entity, scores)
			})
			.collect();

		Some(scored)
	}
}

pub fn default_tiers() -> Vec<Box<dyn Tier>> {
	vec![Box::new(ExactTier), Box::new(DashboardTier), Box::new(SemanticTier), Box::new(FallbackTier)]
}
