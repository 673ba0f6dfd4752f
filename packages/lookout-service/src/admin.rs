use std::collections::BTreeSet;

use serde::Serialize;

use lookout_domain::Variant;
use lookout_storage::queries;

use crate::{LookoutService, RefreshReport, Result, rows};

#[derive(Clone, Debug, Serialize)]
pub struct RefreshSummary {
	pub reports: Vec<RefreshReport>,
	/// Store batch number after the last report.
	pub batch: u64,
}
impl RefreshSummary {
	pub fn is_complete(&self) -> bool {
		self.reports.iter().all(RefreshReport::is_complete)
	}

	pub fn fetched(&self) -> usize {
		self.reports.iter().map(|report| report.fetched).sum()
	}
}

impl LookoutService {
	/// Refreshes models, then explores, then dashboards. Fresh variants are skipped unless
	/// `force` is set.
	pub async fn refresh_all(&self, force: bool) -> RefreshSummary {
		self.refresh_variants(&Variant::ALL, force).await
	}

	pub async fn refresh_models(&self, force: bool) -> RefreshSummary {
		self.refresh_variants(&[Variant::Model], force).await
	}

	pub async fn refresh_explores(&self, force: bool) -> RefreshSummary {
		self.refresh_variants(&[Variant::Explore], force).await
	}

	pub async fn refresh_dashboards(&self, force: bool) -> RefreshSummary {
		self.refresh_variants(&[Variant::Dashboard], force).await
	}

	/// Loads the persisted catalog into the in-memory store. Returns the number of entities loaded.
	pub async fn hydrate(&self) -> Result<usize> {
		let Some(db) = self.db.as_deref() else {
			return Ok(0);
		};
		let mut loaded = 0;

		for variant in Variant::ALL {
			let entities = queries::list_entities(db, variant.as_str())
				.await?
				.into_iter()
				.map(rows::entity_from_row)
				.collect::<Result<Vec<_>>>()?;

			loaded += entities.len();

			self.store.replace(variant, entities);
		}

		let mappings: Vec<_> =
			queries::list_mappings(db).await?.into_iter().map(rows::mapping_from_row).collect();
		let dashboard_ids: Vec<String> = mappings
			.iter()
			.map(|mapping| mapping.dashboard_id.clone())
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect();
		let mapping_count = mappings.len();

		self.store.replace_mappings(&dashboard_ids, mappings);

		tracing::info!(entities = loaded, mappings = mapping_count, "Hydrated catalog cache from Postgres.");

		Ok(loaded)
	}

	async fn refresh_variants(&self, variants: &[Variant], force: bool) -> RefreshSummary {
		let mut reports = Vec::with_capacity(variants.len());

		for variant in variants {
			if !force && !self.store.is_stale(*variant) {
				tracing::info!(variant = %variant, "Catalog variant is fresh. Skipping refresh.");

				reports.push(RefreshReport::skipped(*variant, self.store.batch()));

				continue;
			}

			reports.push(self.refresher.refresh(*variant, None).await);
		}

		RefreshSummary { reports, batch: self.store.batch() }
	}
}
