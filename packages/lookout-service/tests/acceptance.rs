mod acceptance {
	mod persistence;
	mod refresh;
	mod resolution;

	use std::{collections::BTreeMap, sync::Arc, time::Duration};

	use parking_lot::Mutex;
	use time::OffsetDateTime;

	use lookout_config::{
		Cache, Config, Domains, Looker, Resolver, Scoring, Service, Storage, default_vocabulary,
	};
	use lookout_domain::{CatalogEntity, EntityKind, Field};
	use lookout_service::{BoxFuture, CatalogSource, Error, LookoutService, Result};

	/// In-memory catalog source with switchable failures.
	#[derive(Default)]
	pub struct FakeSource {
		pub models: Vec<CatalogEntity>,
		pub explores: Vec<CatalogEntity>,
		pub dashboards: Mutex<Vec<CatalogEntity>>,
		pub refs: BTreeMap<String, Vec<String>>,
		pub fail_models: bool,
		/// Models whose explores fail to load.
		pub failing_models: Vec<String>,
		/// Dashboard pages starting at or after this offset fail.
		pub fail_dashboards_from: Option<usize>,
		pub failing_refs: Vec<String>,
		pub dashboard_delay: Option<Duration>,
		/// `(offset, limit)` of every dashboard page request.
		pub dashboard_calls: Mutex<Vec<(usize, usize)>>,
	}
	impl FakeSource {
		pub fn catalog() -> Self {
			let models = vec![
				model("orders", &["order_items"]),
				model("growth", &["ab_tests", "signups"]),
				model("finance", &["costs"]),
			];
			let explores = vec![
				explore(
					"orders",
					"order_items",
					vec![
						Field::measure("order_items.total_revenue").with_label("Total Revenue"),
						Field::dimension("order_items.created_date"),
					],
				),
				explore(
					"growth",
					"ab_tests",
					vec![
						Field::dimension("ab_tests.experiment_variant"),
						Field::measure("ab_tests.conversion_rate"),
					],
				),
				explore("growth", "signups", vec![Field::measure("signups.count")]),
				explore(
					"finance",
					"costs",
					vec![Field::measure("costs.total_spend"), Field::dimension("costs.cost_center")],
				),
			];
			let dashboards = vec![
				dashboard("101", "Bi-Weekly Retention Report", Some("User Analytics")),
				dashboard("102", "Cost Report", Some("Finance")),
				dashboard("103", "Experiment Results", Some("Growth")),
			];
			let refs = BTreeMap::from([
				("101".to_string(), vec!["growth.signups".to_string(), "growth.signups".to_string()]),
				("102".to_string(), vec!["finance.costs".to_string()]),
				("103".to_string(), vec!["growth.ab_tests".to_string()]),
			]);

			Self { models, explores, dashboards: Mutex::new(dashboards), refs, ..Self::default() }
		}

		/// `count` untitled dashboards with ids 1..=count and no element references.
		pub fn numbered_dashboards(count: usize) -> Self {
			let dashboards = (1..=count)
				.map(|idx| dashboard(&idx.to_string(), &format!("Dashboard {idx}"), None))
				.collect();

			Self { dashboards: Mutex::new(dashboards), ..Self::default() }
		}

		pub fn unavailable() -> Self {
			Self { fail_models: true, fail_dashboards_from: Some(0), ..Self::default() }
		}
	}
	impl CatalogSource for FakeSource {
		fn list_models(&self) -> BoxFuture<'_, Result<Vec<CatalogEntity>>> {
			Box::pin(async move {
				if self.fail_models {
					return Err(unavailable("models"));
				}

				Ok(self.models.clone())
			})
		}

		fn list_explores<'a>(
			&'a self,
			model: &'a CatalogEntity,
			limit: Option<usize>,
		) -> BoxFuture<'a, Result<Vec<CatalogEntity>>> {
			Box::pin(async move {
				if self.failing_models.contains(&model.name) {
					return Err(unavailable("explores"));
				}

				Ok(self
					.explores
					.iter()
					.filter(|explore| {
						matches!(&explore.kind, EntityKind::Explore { model: owner, .. } if *owner == model.name)
					})
					.take(limit.unwrap_or(usize::MAX))
					.cloned()
					.collect())
			})
		}

		fn list_dashboards(&self, offset: usize, limit: usize) -> BoxFuture<'_, Result<Vec<CatalogEntity>>> {
			Box::pin(async move {
				self.dashboard_calls.lock().push((offset, limit));

				if let Some(delay) = self.dashboard_delay {
					tokio::time::sleep(delay).await;
				}
				if self.fail_dashboards_from.is_some_and(|from| offset >= from) {
					return Err(unavailable("dashboards"));
				}

				let page = self.dashboards.lock().iter().skip(offset).take(limit).cloned().collect();

				Ok(page)
			})
		}

		fn dashboard_explore_refs<'a>(&'a self, dashboard_id: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
			Box::pin(async move {
				if self.failing_refs.iter().any(|id| id == dashboard_id) {
					return Err(unavailable("dashboard elements"));
				}

				Ok(self.refs.get(dashboard_id).cloned().unwrap_or_default())
			})
		}
	}

	pub fn test_config() -> Config {
		Config {
			service: Service { log_level: "info".to_string() },
			looker: Looker {
				base_url: "https://looker.example.com".to_string(),
				client_id: "id".to_string(),
				client_secret: "secret".to_string(),
				api_version: "4.0".to_string(),
				timeout_ms: 1_000,
				page_size: 2,
			},
			storage: Storage::default(),
			cache: Cache::default(),
			resolver: Resolver::default(),
			scoring: Scoring::default(),
			vocabulary: default_vocabulary(),
			domains: Domains::default(),
		}
	}

	pub fn service(cfg: Config, source: FakeSource) -> LookoutService {
		LookoutService::new(cfg, Arc::new(source), None).expect("Failed to build service.")
	}

	pub fn model(name: &str, explores: &[&str]) -> CatalogEntity {
		CatalogEntity::model(name, format!("https://looker.example.com/projects/{name}"), fetched_at())
			.with_explore_names(explores.iter().copied())
	}

	pub fn explore(model: &str, name: &str, fields: Vec<Field>) -> CatalogEntity {
		CatalogEntity::explore(model, name, format!("https://looker.example.com/explore/{model}/{name}"), fetched_at())
			.with_fields(fields)
	}

	pub fn dashboard(id: &str, title: &str, folder: Option<&str>) -> CatalogEntity {
		let entity =
			CatalogEntity::dashboard(id, title, format!("https://looker.example.com/dashboards/{id}"), fetched_at());

		match folder {
			Some(folder) => entity.with_folder(folder),
			None => entity,
		}
	}

	/// Fresh enough to pass the TTL check, truncated to whole seconds so values are stable.
	fn fetched_at() -> OffsetDateTime {
		let now = OffsetDateTime::now_utc();

		now.replace_nanosecond(0).unwrap_or(now)
	}

	fn unavailable(what: &str) -> Error {
		Error::UpstreamUnavailable { message: format!("{what} request failed") }
	}
}
