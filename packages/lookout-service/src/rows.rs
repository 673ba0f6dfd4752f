use lookout_domain::{CatalogEntity, DashboardExploreMapping};
use lookout_storage::models::{CatalogEntityRow, DashboardExploreMappingRow};

use crate::{Error, Result};

pub(crate) fn entity_row(entity: &CatalogEntity) -> Result<CatalogEntityRow> {
	Ok(CatalogEntityRow {
		variant: entity.variant().as_str().to_string(),
		entity_id: entity.id.clone(),
		name: entity.name.clone(),
		payload: serde_json::to_value(entity)?,
		fetched_at: entity.fetched_at,
	})
}

pub(crate) fn entity_from_row(row: CatalogEntityRow) -> Result<CatalogEntity> {
	let entity: CatalogEntity = serde_json::from_value(row.payload)?;

	if entity.variant().as_str() != row.variant || entity.id != row.entity_id {
		return Err(Error::Storage {
			message: format!(
				"Stored payload of {} {} describes {} {}.",
				row.variant,
				row.entity_id,
				entity.variant(),
				entity.id
			),
		});
	}

	Ok(entity)
}

pub(crate) fn mapping_row(mapping: &DashboardExploreMapping) -> DashboardExploreMappingRow {
	DashboardExploreMappingRow {
		dashboard_id: mapping.dashboard_id.clone(),
		explore_id: mapping.explore_id.clone(),
		business_context: mapping.business_context,
		usage_count: i32::try_from(mapping.usage_count).unwrap_or(i32::MAX),
		fetched_at: mapping.fetched_at,
	}
}

pub(crate) fn mapping_from_row(row: DashboardExploreMappingRow) -> DashboardExploreMapping {
	DashboardExploreMapping {
		dashboard_id: row.dashboard_id,
		explore_id: row.explore_id,
		business_context: row.business_context,
		usage_count: u32::try_from(row.usage_count).unwrap_or(0),
		fetched_at: row.fetched_at,
	}
}
