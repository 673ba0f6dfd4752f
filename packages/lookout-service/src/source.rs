use time::OffsetDateTime;

use lookout_config::Looker;
use lookout_domain::{CatalogEntity, EntityKind, Field, FieldKind};
use lookout_providers::{DashboardSummary, LookerClient, LookmlExplore, LookmlField, LookmlModel};

use crate::{BoxFuture, CatalogSource, Error, Result};

/// [`CatalogSource`] backed by the Looker API.
pub struct LookerSource {
	client: LookerClient,
}
impl LookerSource {
	pub fn new(cfg: &Looker) -> Result<Self> {
		Ok(Self { client: LookerClient::new(cfg)? })
	}

	async fn models(&self) -> Result<Vec<CatalogEntity>> {
		let now = OffsetDateTime::now_utc();
		let models = self.client.list_models().await?;

		Ok(models.into_iter().map(|model| self.model_entity(model, now)).collect())
	}

	async fn explores(&self, model: &CatalogEntity, limit: Option<usize>) -> Result<Vec<CatalogEntity>> {
		let names = model.explore_names();
		let names = &names[..limit.map(|limit| limit.min(names.len())).unwrap_or(names.len())];
		let mut out = Vec::with_capacity(names.len());
		let mut last_error = None;

		for name in names {
			match self.client.explore(&model.name, name).await {
				Ok(explore) => out.push(self.explore_entity(explore, OffsetDateTime::now_utc())),
				Err(err) => {
					tracing::warn!(model = %model.name, explore = %name, error = %err, "Failed to fetch explore.");

					last_error = Some(err);
				},
			}
		}

		match last_error {
			Some(err) if out.is_empty() => Err(Error::from(err)),
			_ => Ok(out),
		}
	}

	async fn dashboards(&self, offset: usize, limit: usize) -> Result<Vec<CatalogEntity>> {
		let now = OffsetDateTime::now_utc();
		let page = self.client.search_dashboards(to_u32(offset), to_u32(limit)).await?;

		Ok(page.into_iter().map(|dashboard| self.dashboard_entity(dashboard, now)).collect())
	}

	fn model_entity(&self, model: LookmlModel, now: OffsetDateTime) -> CatalogEntity {
		let mut entity = CatalogEntity::model(&model.name, self.client.model_url(&model.name), now)
			.with_label(model.label.unwrap_or_default())
			.with_explore_names(
				model.explores.into_iter().filter(|explore| !explore.hidden).map(|explore| explore.name),
			);

		if let EntityKind::Model { project, .. } = &mut entity.kind {
			*project = model.project_name;
		}

		entity
	}

	fn explore_entity(&self, explore: LookmlExplore, now: OffsetDateTime) -> CatalogEntity {
		let url = self.client.explore_url(&explore.model_name, &explore.name);
		let fields = explore
			.dimensions
			.into_iter()
			.map(|field| to_field(field, FieldKind::Dimension))
			.chain(explore.measures.into_iter().map(|field| to_field(field, FieldKind::Measure)))
			.collect();

		CatalogEntity::explore(explore.model_name, explore.name, url, now)
			.with_label(explore.label.unwrap_or_default())
			.with_description(explore.description.unwrap_or_default())
			.with_tags(explore.tags)
			.with_fields(fields)
	}

	fn dashboard_entity(&self, dashboard: DashboardSummary, now: OffsetDateTime) -> CatalogEntity {
		let url = self.client.dashboard_url(&dashboard.id);
		let mut entity = CatalogEntity::dashboard(dashboard.id, dashboard.title, url, now)
			.with_description(dashboard.description.unwrap_or_default())
			.with_folder(dashboard.folder.unwrap_or_default());

		if let EntityKind::Dashboard { view_count, .. } = &mut entity.kind {
			*view_count = dashboard.view_count;
		}

		entity
	}
}
impl CatalogSource for LookerSource {
	fn list_models(&self) -> BoxFuture<'_, Result<Vec<CatalogEntity>>> {
		Box::pin(self.models())
	}

	fn list_explores<'a>(
		&'a self,
		model: &'a CatalogEntity,
		limit: Option<usize>,
	) -> BoxFuture<'a, Result<Vec<CatalogEntity>>> {
		Box::pin(self.explores(model, limit))
	}

	fn list_dashboards(&self, offset: usize, limit: usize) -> BoxFuture<'_, Result<Vec<CatalogEntity>>> {
		Box::pin(self.dashboards(offset, limit))
	}

	fn dashboard_explore_refs<'a>(&'a self, dashboard_id: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move { Ok(self.client.dashboard_explore_refs(dashboard_id).await?) })
	}
}

fn to_field(field: LookmlField, kind: FieldKind) -> Field {
	Field {
		name: field.name,
		kind,
		label: field.label.filter(|label| !label.trim().is_empty()),
		description: field.description.filter(|description| !description.trim().is_empty()),
	}
}

fn to_u32(value: usize) -> u32 {
	u32::try_from(value).unwrap_or(u32::MAX)
}
