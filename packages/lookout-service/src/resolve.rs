//! Tiered resolution of a free-text query against one catalog snapshot.

pub mod tiers;

pub use tiers::{DashboardTier, ExactTier, FallbackTier, SemanticTier, Tier, TierKind, default_tiers};

use std::sync::Arc;

use serde::Serialize;

use lookout_config::Config;
use lookout_domain::{CatalogEntity, Variant};

use crate::{
	Result,
	scoring::{self, Band, Query, QueryAnalyzer, Scored, ScoringEngine},
	store::CatalogView,
};

const EXCLUDED_LIMIT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
	Matched,
	NoMatch,
}

#[derive(Clone, Debug, Serialize)]
pub struct Resolution {
	pub query: String,
	pub tier: TierKind,
	pub status: Status,
	pub candidates: Vec<Candidate>,
	/// Strongest entities below the medium threshold, kept for explaining a miss.
	pub excluded: Vec<Candidate>,
}
impl Resolution {
	pub fn top(&self) -> Option<&Candidate> {
		self.candidates.first()
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct Candidate {
	pub id: String,
	pub variant: Variant,
	pub score: f32,
	pub band: Band,
	pub reason: String,
	pub presentation: Presentation,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Presentation {
	Dashboard {
		title: String,
		folder: Option<String>,
		url: String,
		related_explores: Vec<RelatedExplore>,
	},
	Entity {
		name: String,
		label: Option<String>,
		url: String,
		matched_fields: Vec<String>,
	},
}

#[derive(Clone, Debug, Serialize)]
pub struct RelatedExplore {
	pub id: String,
	pub name: String,
	pub url: String,
	pub business_context: f32,
}

/// Runs the tiers in order and shapes the first answer into a [`Resolution`].
pub struct Resolver {
	analyzer: QueryAnalyzer,
	engine: Arc<ScoringEngine>,
	tiers: Vec<Box<dyn Tier>>,
	max_candidates: usize,
}
impl Resolver {
	pub fn new(cfg: &Config) -> Result<Self> {
		Self::with_tiers(cfg, default_tiers())
	}

	pub fn with_tiers(cfg: &Config, tiers: Vec<Box<dyn Tier>>) -> Result<Self> {
		Ok(Self {
			analyzer: QueryAnalyzer::new(cfg)?,
			engine: Arc::new(ScoringEngine::new(cfg)),
			tiers,
			max_candidates: cfg.resolver.max_candidates as usize,
		})
	}

	pub fn engine(&self) -> &Arc<ScoringEngine> {
		&self.engine
	}

	pub fn tier_kinds(&self) -> Vec<TierKind> {
		self.tiers.iter().map(|tier| tier.kind()).collect()
	}

	pub fn analyze(&self, raw: &str, hint: Option<Variant>) -> Query {
		self.analyzer.analyze(raw, hint, self.engine.buckets())
	}

	pub fn resolve(&self, raw: &str, hint: Option<Variant>, catalog: &CatalogView) -> Resolution {
		let query = self.analyze(raw, hint);

		self.resolve_query(&query, catalog)
	}

	pub fn resolve_query(&self, query: &Query, catalog: &CatalogView) -> Resolution {
		for tier in &self.tiers {
			if let Some(scored) = tier.attempt(query, catalog, &self.engine) {
				return self.finish(query, tier.kind(), scored, catalog);
			}
		}

		// A tier list without a terminal tier ends here.
		self.finish(query, TierKind::Fallback, Vec::new(), catalog)
	}

	fn finish(&self, query: &Query, tier: TierKind, mut scored: Vec<Scored<'_>>, catalog: &CatalogView) -> Resolution {
		scored.retain(|scored| scored.score > 0.0 || !scored.reasons.is_empty());
		scoring::rank(&mut scored);

		let medium = self.engine.medium_threshold();
		let (kept, below): (Vec<_>, Vec<_>) = scored.into_iter().partition(|scored| scored.score >= medium);
		let candidates: Vec<Candidate> =
			kept.into_iter().take(self.max_candidates).map(|scored| self.candidate(scored, catalog)).collect();
		let excluded =
			below.into_iter().take(EXCLUDED_LIMIT).map(|scored| self.candidate(scored, catalog)).collect();
		let status = if candidates.is_empty() { Status::NoMatch } else { Status::Matched };

		Resolution { query: query.raw.clone(), tier, status, candidates, excluded }
	}

	fn candidate(&self, scored: Scored<'_>, catalog: &CatalogView) -> Candidate {
		let entity = scored.entity;

		Candidate {
			id: entity.id.clone(),
			variant: entity.variant(),
			score: scored.score,
			band: self.engine.band(scored.score),
			reason: scored.reasons.join("; "),
			presentation: presentation(entity, scored.matched_fields, catalog),
		}
	}
}

fn presentation(entity: &CatalogEntity, matched_fields: Vec<String>, catalog: &CatalogView) -> Presentation {
	match entity.variant() {
		Variant::Dashboard => Presentation::Dashboard {
			title: entity.name.clone(),
			folder: entity.folder().map(str::to_string),
			url: entity.url.clone(),
			related_explores: catalog
				.related_explores(&entity.id)
				.map(|(mapping, explore)| RelatedExplore {
					id: explore.id.clone(),
					name: explore.display_name().to_string(),
					url: explore.url.clone(),
					business_context: mapping.business_context,
				})
				.collect(),
		},
		Variant::Model | Variant::Explore => Presentation::Entity {
			name: entity.name.clone(),
			label: entity.label.clone(),
			url: entity.url.clone(),
			matched_fields,
		},
	}
}
