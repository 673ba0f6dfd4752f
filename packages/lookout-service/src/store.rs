use std::{
	collections::BTreeMap,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use time::{Duration, OffsetDateTime};

use lookout_domain::{CatalogEntity, DashboardExploreMapping, Variant, staleness};

/// In-memory catalog snapshots, one per variant, plus the dashboard to explore mappings.
///
/// Writers build the next set outside the read path and publish it with a pointer swap, so a
/// reader always observes one complete batch.
pub struct CatalogStore {
	ttl: Duration,
	variants: [RwLock<Arc<[CatalogEntity]>>; 3],
	mappings: RwLock<Arc<[DashboardExploreMapping]>>,
	batch: AtomicU64,
	writer: Mutex<()>,
}
impl CatalogStore {
	pub fn new(ttl: Duration) -> Self {
		Self {
			ttl,
			variants: [
				RwLock::new(Arc::from(Vec::new())),
				RwLock::new(Arc::from(Vec::new())),
				RwLock::new(Arc::from(Vec::new())),
			],
			mappings: RwLock::new(Arc::from(Vec::new())),
			batch: AtomicU64::new(0),
			writer: Mutex::new(()),
		}
	}

	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Latest published batch number. Zero until the first write.
	pub fn batch(&self) -> u64 {
		self.batch.load(Ordering::Acquire)
	}

	pub fn get(&self, variant: Variant) -> Arc<[CatalogEntity]> {
		self.slot(variant).read().clone()
	}

	/// Merges `entities` by id into the current set of `variant`. Returns the new batch number.
	pub fn upsert(&self, variant: Variant, entities: Vec<CatalogEntity>) -> u64 {
		let _writer = self.writer.lock();
		let current = self.get(variant);
		let mut merged: BTreeMap<String, CatalogEntity> =
			current.iter().map(|entity| (entity.id.clone(), entity.clone())).collect();

		for entity in entities.into_iter().filter(|entity| entity.variant() == variant) {
			merged.insert(entity.id.clone(), entity);
		}

		self.publish(variant, merged.into_values().collect())
	}

	/// Swaps in exactly `entities` for `variant`. Returns the new batch number.
	pub fn replace(&self, variant: Variant, entities: Vec<CatalogEntity>) -> u64 {
		let _writer = self.writer.lock();
		let mut by_id: BTreeMap<String, CatalogEntity> = BTreeMap::new();

		for entity in entities.into_iter().filter(|entity| entity.variant() == variant) {
			by_id.insert(entity.id.clone(), entity);
		}

		self.publish(variant, by_id.into_values().collect())
	}

	pub fn is_stale(&self, variant: Variant) -> bool {
		self.is_stale_at(variant, OffsetDateTime::now_utc())
	}

	pub fn is_stale_at(&self, variant: Variant, now: OffsetDateTime) -> bool {
		staleness::is_stale(&self.get(variant), now, self.ttl)
	}

	pub fn mappings(&self) -> Arc<[DashboardExploreMapping]> {
		self.mappings.read().clone()
	}

	/// Replaces the mappings of `dashboard_ids` with `mappings` and keeps every other dashboard's.
	pub fn replace_mappings(&self, dashboard_ids: &[String], mappings: Vec<DashboardExploreMapping>) {
		let _writer = self.writer.lock();
		let mut next: Vec<DashboardExploreMapping> = self
			.mappings()
			.iter()
			.filter(|mapping| !dashboard_ids.contains(&mapping.dashboard_id))
			.cloned()
			.collect();

		next.extend(mappings);
		next.sort_by(|a, b| {
			a.dashboard_id.cmp(&b.dashboard_id).then_with(|| a.explore_id.cmp(&b.explore_id))
		});
		next.dedup_by(|a, b| a.dashboard_id == b.dashboard_id && a.explore_id == b.explore_id);

		*self.mappings.write() = Arc::from(next);

		self.batch.fetch_add(1, Ordering::AcqRel);
	}

	/// Drops mappings whose dashboard is not in `live_dashboard_ids`. Returns how many were dropped.
	pub fn prune_mappings(&self, live_dashboard_ids: &[String]) -> usize {
		let _writer = self.writer.lock();
		let current = self.mappings();
		let next: Vec<DashboardExploreMapping> = current
			.iter()
			.filter(|mapping| live_dashboard_ids.contains(&mapping.dashboard_id))
			.cloned()
			.collect();
		let dropped = current.len() - next.len();

		if dropped > 0 {
			*self.mappings.write() = Arc::from(next);

			self.batch.fetch_add(1, Ordering::AcqRel);
		}

		dropped
	}

	pub fn snapshot(&self) -> CatalogView {
		CatalogView::new(
			self.get(Variant::Model),
			self.get(Variant::Explore),
			self.get(Variant::Dashboard),
			self.mappings(),
		)
	}

	fn publish(&self, variant: Variant, entities: Vec<CatalogEntity>) -> u64 {
		let next: Arc<[CatalogEntity]> = Arc::from(entities);

		*self.slot(variant).write() = next;

		self.batch.fetch_add(1, Ordering::AcqRel) + 1
	}

	fn slot(&self, variant: Variant) -> &RwLock<Arc<[CatalogEntity]>> {
		match variant {
			Variant::Model => &self.variants[0],
			Variant::Explore => &self.variants[1],
			Variant::Dashboard => &self.variants[2],
		}
	}
}

/// A consistent read view over the catalog for one resolution.
pub struct CatalogView {
	pub models: Arc<[CatalogEntity]>,
	pub explores: Arc<[CatalogEntity]>,
	pub dashboards: Arc<[CatalogEntity]>,
	pub mappings: Arc<[DashboardExploreMapping]>,
	explore_index: AHashMap<String, usize>,
	/// Mapping positions per dashboard, strongest business context first.
	mappings_by_dashboard: AHashMap<String, Vec<usize>>,
}
impl CatalogView {
	pub fn new(
		models: Arc<[CatalogEntity]>,
		explores: Arc<[CatalogEntity]>,
		dashboards: Arc<[CatalogEntity]>,
		mappings: Arc<[DashboardExploreMapping]>,
	) -> Self {
		let explore_index =
			explores.iter().enumerate().map(|(idx, explore)| (explore.id.clone(), idx)).collect();
		let mut mappings_by_dashboard: AHashMap<String, Vec<usize>> = AHashMap::new();

		for (idx, mapping) in mappings.iter().enumerate() {
			mappings_by_dashboard.entry(mapping.dashboard_id.clone()).or_default().push(idx);
		}
		for positions in mappings_by_dashboard.values_mut() {
			positions.sort_by(|a, b| {
				let (a, b) = (&mappings[*a], &mappings[*b]);

				b.business_context
					.total_cmp(&a.business_context)
					.then_with(|| b.usage_count.cmp(&a.usage_count))
					.then_with(|| a.explore_id.cmp(&b.explore_id))
			});
		}

		Self { models, explores, dashboards, mappings, explore_index, mappings_by_dashboard }
	}

	pub fn entities(&self, variant: Variant) -> &[CatalogEntity] {
		match variant {
			Variant::Model => &self.models,
			Variant::Explore => &self.explores,
			Variant::Dashboard => &self.dashboards,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.models.is_empty() && self.explores.is_empty() && self.dashboards.is_empty()
	}

	pub fn explore(&self, id: &str) -> Option<&CatalogEntity> {
		self.explore_index.get(id).map(|idx| &self.explores[*idx])
	}

	/// Mappings of a dashboard whose explore is cached, strongest business context first.
	pub fn related_explores(
		&self,
		dashboard_id: &str,
	) -> impl Iterator<Item = (&DashboardExploreMapping, &CatalogEntity)> {
		self.mappings_by_dashboard
			.get(dashboard_id)
			.into_iter()
			.flatten()
			.filter_map(|idx| {
				let mapping = &self.mappings[*idx];

				self.explore(&mapping.explore_id).map(|explore| (mapping, explore))
			})
	}
}
