use serde_json::Value;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CatalogEntityRow {
	pub variant: String,
	pub entity_id: String,
	pub name: String,
	pub payload: Value,
	pub fetched_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DashboardExploreMappingRow {
	pub dashboard_id: String,
	pub explore_id: String,
	pub business_context: f32,
	pub usage_count: i32,
	pub fetched_at: OffsetDateTime,
}
