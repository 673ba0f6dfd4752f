use std::{collections::BTreeMap, sync::Arc, time::Instant};

use ahash::AHashSet;
use serde::Serialize;
use tokio::sync::Mutex;

use lookout_config::Config;
use lookout_domain::{CatalogEntity, DashboardExploreMapping, EntityKind, Variant, entity};
use lookout_storage::{db::Db, queries};

use crate::{CatalogSource, rows, store::CatalogStore};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
	/// Not attempted: the variant was fresh, or another refresh of it was running.
	Skipped,
	Complete,
	/// Some entities were fetched and published before an upstream failure.
	Partial { error: String },
	Failed { error: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct RefreshReport {
	pub variant: Variant,
	pub outcome: RefreshOutcome,
	pub fetched: usize,
	pub pruned: usize,
	/// Store batch number after the refresh.
	pub batch: u64,
	pub elapsed_ms: u64,
}
impl RefreshReport {
	pub fn skipped(variant: Variant, batch: u64) -> Self {
		Self { variant, outcome: RefreshOutcome::Skipped, fetched: 0, pruned: 0, batch, elapsed_ms: 0 }
	}

	pub fn is_complete(&self) -> bool {
		matches!(self.outcome, RefreshOutcome::Complete | RefreshOutcome::Skipped)
	}
}

#[derive(Default)]
struct Run {
	fetched: usize,
	pruned: usize,
	error: Option<String>,
}
impl Run {
	fn failed(error: impl Into<String>) -> Self {
		Self { error: Some(error.into()), ..Self::default() }
	}

	fn outcome(&self) -> RefreshOutcome {
		match &self.error {
			None => RefreshOutcome::Complete,
			Some(error) if self.fetched > 0 => RefreshOutcome::Partial { error: error.clone() },
			Some(error) => RefreshOutcome::Failed { error: error.clone() },
		}
	}
}

/// The only writer of the catalog cache.
///
/// A budget bounds how many entities one refresh fetches and marks the refresh as interactive:
/// an interactive refresh of a variant that is already refreshing is skipped, while an unbounded
/// batch refresh waits its turn. Only unbounded refreshes that saw no upstream error prune
/// entities that disappeared upstream.
pub struct CatalogRefresher {
	source: Arc<dyn CatalogSource>,
	store: Arc<CatalogStore>,
	db: Option<Arc<Db>>,
	page_size: usize,
	prune_orphans: bool,
	locks: [Mutex<()>; 3],
}
impl CatalogRefresher {
	pub fn new(
		cfg: &Config,
		source: Arc<dyn CatalogSource>,
		store: Arc<CatalogStore>,
		db: Option<Arc<Db>>,
	) -> Self {
		Self {
			source,
			store,
			db,
			page_size: cfg.looker.page_size.max(1) as usize,
			prune_orphans: cfg.cache.prune_orphans,
			locks: [Mutex::new(()), Mutex::new(()), Mutex::new(())],
		}
	}

	pub fn store(&self) -> &Arc<CatalogStore> {
		&self.store
	}

	pub async fn refresh_models(&self, budget: Option<usize>) -> RefreshReport {
		self.refresh(Variant::Model, budget).await
	}

	pub async fn refresh_explores(&self, budget: Option<usize>) -> RefreshReport {
		self.refresh(Variant::Explore, budget).await
	}

	pub async fn refresh_dashboards(&self, budget: Option<usize>) -> RefreshReport {
		self.refresh(Variant::Dashboard, budget).await
	}

	pub async fn refresh(&self, variant: Variant, budget: Option<usize>) -> RefreshReport {
		let lock = &self.locks[lock_index(variant)];
		let _guard = match budget {
			Some(_) => match lock.try_lock() {
				Ok(guard) => guard,
				Err(_) => {
					tracing::info!(variant = %variant, "Catalog refresh already running. Serving the cached snapshot.");

					return RefreshReport::skipped(variant, self.store.batch());
				},
			},
			None => lock.lock().await,
		};
		let started = Instant::now();

		tracing::info!(variant = %variant, budget = ?budget, "Catalog refresh started.");

		let run = match variant {
			Variant::Model => self.run_models(budget).await,
			Variant::Explore => self.run_explores(budget).await,
			Variant::Dashboard => self.run_dashboards(budget).await,
		};
		let report = RefreshReport {
			variant,
			outcome: run.outcome(),
			fetched: run.fetched,
			pruned: run.pruned,
			batch: self.store.batch(),
			elapsed_ms: started.elapsed().as_millis() as u64,
		};

		match &report.outcome {
			RefreshOutcome::Partial { error } | RefreshOutcome::Failed { error } => tracing::warn!(
				variant = %variant,
				fetched = report.fetched,
				error = %error,
				"Catalog refresh did not complete. Serving stale entries for the rest."
			),
			_ => tracing::info!(
				variant = %variant,
				fetched = report.fetched,
				pruned = report.pruned,
				elapsed_ms = report.elapsed_ms,
				"Catalog refresh finished."
			),
		}

		report
	}

	async fn run_models(&self, budget: Option<usize>) -> Run {
		let mut models = match self.source.list_models().await {
			Ok(models) => models,
			Err(err) => return Run::failed(err.to_string()),
		};

		if let Some(budget) = budget {
			models.truncate(budget);
		}

		let live: AHashSet<String> = models.iter().map(|model| model.id.clone()).collect();
		let mut run = Run { fetched: models.len(), ..Run::default() };

		self.publish(Variant::Model, models).await;

		if budget.is_none() && self.prune_orphans {
			run.pruned = self.prune(Variant::Model, &live).await;
		}

		run
	}

	async fn run_explores(&self, budget: Option<usize>) -> Run {
		let models = self.store.get(Variant::Model);

		if models.is_empty() {
			return Run::failed("No models cached. Refresh models first.");
		}

		let mut remaining = budget;
		let mut live = AHashSet::new();
		let mut errors = Vec::new();
		let mut run = Run::default();

		for model in models.iter() {
			if remaining == Some(0) {
				break;
			}

			match self.source.list_explores(model, remaining).await {
				Ok(mut explores) => {
					if let Some(left) = remaining {
						explores.truncate(left);

						remaining = Some(left - explores.len());
					}

					run.fetched += explores.len();

					live.extend(explores.iter().map(|explore| explore.id.clone()));
					self.publish(Variant::Explore, explores).await;
				},
				Err(err) => {
					tracing::warn!(model = %model.name, error = %err, "Failed to fetch explores of model.");

					errors.push(format!("{}: {err}", model.name));
				},
			}
		}

		if !errors.is_empty() {
			run.error = Some(errors.join("; "));
		} else if budget.is_none() && self.prune_orphans {
			run.pruned = self.prune(Variant::Explore, &live).await;
		}

		run
	}

	async fn run_dashboards(&self, budget: Option<usize>) -> Run {
		let mut remaining = budget;
		let mut offset = 0;
		let mut live = AHashSet::new();
		let mut run = Run::default();

		loop {
			let limit = match remaining {
				Some(0) => break,
				Some(left) => left.min(self.page_size),
				None => self.page_size,
			};
			let mut page = match self.source.list_dashboards(offset, limit).await {
				Ok(page) => page,
				Err(err) => {
					tracing::warn!(offset, limit, error = %err, "Failed to fetch dashboard page.");

					run.error = Some(err.to_string());

					break;
				},
			};
			let page_len = page.len();

			page.truncate(limit);

			let mut mappings = Vec::new();

			for dashboard in &page {
				mappings.extend(self.mappings_for(dashboard).await);
			}

			let ids: Vec<String> = page.iter().map(|dashboard| dashboard.id.clone()).collect();

			run.fetched += page.len();
			remaining = remaining.map(|left| left - page.len());
			offset += page_len;

			live.extend(ids.iter().cloned());
			self.publish(Variant::Dashboard, page).await;
			self.publish_mappings(&ids, mappings).await;

			if page_len < limit {
				break;
			}
		}

		if run.error.is_none() && budget.is_none() && self.prune_orphans {
			run.pruned = self.prune(Variant::Dashboard, &live).await;
		}

		run
	}

	async fn mappings_for(&self, dashboard: &CatalogEntity) -> Vec<DashboardExploreMapping> {
		let refs = match self.source.dashboard_explore_refs(&dashboard.id).await {
			Ok(refs) => refs,
			Err(err) => {
				tracing::warn!(
					dashboard_id = %dashboard.id,
					error = %err,
					"Failed to fetch dashboard elements. The dashboard will have no related explores."
				);

				return Vec::new();
			},
		};
		let mut usage: BTreeMap<String, u32> = BTreeMap::new();

		for explore_id in refs {
			*usage.entry(explore_id).or_default() += 1;
		}

		let view_count = match &dashboard.kind {
			EntityKind::Dashboard { view_count, .. } => *view_count,
			_ => 0,
		};
		let business_context = entity::business_context(
			&dashboard.name,
			dashboard.description(),
			dashboard.folder(),
			view_count,
		);

		usage
			.into_iter()
			.map(|(explore_id, usage_count)| DashboardExploreMapping {
				dashboard_id: dashboard.id.clone(),
				explore_id,
				business_context,
				usage_count,
				fetched_at: dashboard.fetched_at,
			})
			.collect()
	}

	async fn publish(&self, variant: Variant, entities: Vec<CatalogEntity>) {
		if entities.is_empty() {
			return;
		}

		if let Some(db) = self.db.as_deref() {
			match entities.iter().map(rows::entity_row).collect::<crate::Result<Vec<_>>>() {
				Ok(encoded) =>
					if let Err(err) = queries::upsert_entities(db, &encoded).await {
						tracing::warn!(variant = %variant, error = %err, "Failed to persist catalog entities.");
					},
				Err(err) => {
					tracing::warn!(variant = %variant, error = %err, "Failed to encode catalog entities.");
				},
			}
		}

		self.store.upsert(variant, entities);
	}

	async fn publish_mappings(&self, dashboard_ids: &[String], mappings: Vec<DashboardExploreMapping>) {
		if let Some(db) = self.db.as_deref() {
			let encoded: Vec<_> = mappings.iter().map(rows::mapping_row).collect();

			if let Err(err) = queries::replace_mappings(db, dashboard_ids, &encoded).await {
				tracing::warn!(error = %err, "Failed to persist dashboard explore mappings.");
			}
		}

		self.store.replace_mappings(dashboard_ids, mappings);
	}

	/// Drops cached entities of `variant` that are not in `live`. Returns how many were dropped.
	async fn prune(&self, variant: Variant, live: &AHashSet<String>) -> usize {
		let current = self.store.get(variant);
		let kept: Vec<CatalogEntity> =
			current.iter().filter(|entity| live.contains(&entity.id)).cloned().collect();
		let pruned = current.len() - kept.len();

		if let Some(db) = self.db.as_deref() {
			match kept.iter().map(rows::entity_row).collect::<crate::Result<Vec<_>>>() {
				Ok(encoded) =>
					if let Err(err) = queries::replace_entities(db, variant.as_str(), &encoded).await {
						tracing::warn!(variant = %variant, error = %err, "Failed to prune persisted entities.");
					},
				Err(err) => {
					tracing::warn!(variant = %variant, error = %err, "Failed to encode catalog entities.");
				},
			}
		}

		let live_ids: Vec<String> = kept.iter().map(|entity| entity.id.clone()).collect();

		if pruned > 0 {
			self.store.replace(variant, kept);
		}

		if variant == Variant::Dashboard {
			let dropped = self.store.prune_mappings(&live_ids);

			if let Some(db) = self.db.as_deref()
				&& let Err(err) = queries::prune_mappings(db, &live_ids).await
			{
				tracing::warn!(error = %err, "Failed to prune persisted dashboard explore mappings.");
			}

			if dropped > 0 {
				tracing::info!(dropped, "Pruned mappings of removed dashboards.");
			}
		}

		pruned
	}
}

fn lock_index(variant: Variant) -> usize {
	match variant {
		Variant::Model => 0,
		Variant::Explore => 1,
		Variant::Dashboard => 2,
	}
}
