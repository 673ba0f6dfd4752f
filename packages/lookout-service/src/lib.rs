pub mod admin;
pub mod refresh;
pub mod resolve;
pub mod scoring;
pub mod source;
pub mod store;

mod error;
mod rows;

pub use admin::RefreshSummary;
pub use error::{Error, Result};
pub use refresh::{CatalogRefresher, RefreshOutcome, RefreshReport};
pub use resolve::{
	Candidate, Presentation, RelatedExplore, Resolution, Resolver, Status, Tier, TierKind,
};
pub use scoring::{Band, Query, ScoringEngine};
pub use source::LookerSource;
pub use store::{CatalogStore, CatalogView};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use serde::Deserialize;

use lookout_config::Config;
use lookout_domain::{CatalogEntity, Variant, staleness};
use lookout_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where catalog metadata comes from.
pub trait CatalogSource
where
	Self: Send + Sync,
{
	fn list_models(&self) -> BoxFuture<'_, Result<Vec<CatalogEntity>>>;

	/// Explores of `model`, with fields. `limit` caps how many are fetched.
	fn list_explores<'a>(
		&'a self,
		model: &'a CatalogEntity,
		limit: Option<usize>,
	) -> BoxFuture<'a, Result<Vec<CatalogEntity>>>;

	/// One page of dashboards. A page shorter than `limit` is the last one.
	fn list_dashboards(&self, offset: usize, limit: usize) -> BoxFuture<'_, Result<Vec<CatalogEntity>>>;

	/// `model.explore` ids referenced by the dashboard's elements, one per element.
	fn dashboard_explore_refs<'a>(&'a self, dashboard_id: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;
}

#[derive(Clone, Debug, Deserialize)]
pub struct ResolveRequest {
	pub query: String,
	#[serde(default)]
	pub variant_hint: Option<Variant>,
}

pub struct LookoutService {
	pub cfg: Config,
	pub store: Arc<CatalogStore>,
	pub refresher: Arc<CatalogRefresher>,
	pub resolver: Resolver,
	pub db: Option<Arc<Db>>,
}
impl LookoutService {
	pub fn new(cfg: Config, source: Arc<dyn CatalogSource>, db: Option<Db>) -> Result<Self> {
		let store = Arc::new(CatalogStore::new(staleness::ttl_from_hours(cfg.cache.ttl_hours)));
		let db = db.map(Arc::new);
		let refresher = Arc::new(CatalogRefresher::new(&cfg, source, store.clone(), db.clone()));
		let resolver = Resolver::new(&cfg)?;

		Ok(Self { cfg, store, refresher, resolver, db })
	}

	/// Builds the service against Looker and, when configured, Postgres, then hydrates the cache
	/// from the persisted catalog.
	pub async fn connect(cfg: Config) -> Result<Self> {
		let source = Arc::new(LookerSource::new(&cfg.looker)?);
		let db = match cfg.storage.postgres.as_ref() {
			Some(postgres) => {
				let db = Db::connect(postgres).await?;

				db.ensure_schema().await?;

				Some(db)
			},
			None => None,
		};
		let service = Self::new(cfg, source, db)?;

		service.hydrate().await?;

		Ok(service)
	}

	pub async fn resolve(&self, req: ResolveRequest) -> Result<Resolution> {
		let raw = req.query.trim();

		if raw.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		self.refresh_stale().await;

		let catalog = self.store.snapshot();

		if catalog.is_empty() {
			return Err(Error::CacheEmpty);
		}

		let resolution = self.resolver.resolve(raw, req.variant_hint, &catalog);

		tracing::info!(
			tier = %resolution.tier,
			status = ?resolution.status,
			candidates = resolution.candidates.len(),
			"Query resolved."
		);

		Ok(resolution)
	}

	/// Refreshes stale variants with the interactive budget, bounded by the interactive timeout.
	/// With inline refresh disabled, the refresh runs on a background task instead.
	async fn refresh_stale(&self) {
		let stale: Vec<Variant> =
			Variant::ALL.into_iter().filter(|variant| self.store.is_stale(*variant)).collect();

		if stale.is_empty() {
			return;
		}

		let budget = Some(self.cfg.cache.interactive_budget as usize);

		if !self.cfg.cache.inline_refresh {
			let refresher = self.refresher.clone();

			tokio::spawn(async move {
				for variant in stale {
					refresher.refresh(variant, budget).await;
				}
			});

			return;
		}

		let timeout = Duration::from_millis(self.cfg.cache.interactive_timeout_ms);
		let run = async {
			for variant in &stale {
				self.refresher.refresh(*variant, budget).await;
			}
		};

		if tokio::time::timeout(timeout, run).await.is_err() {
			tracing::warn!(
				timeout_ms = self.cfg.cache.interactive_timeout_ms,
				"Inline catalog refresh timed out. Serving the cached snapshot."
			);
		}
	}
}
