use sqlx::{PgConnection, Postgres, Transaction};

use crate::{
	Error, Result,
	db::Db,
	models::{CatalogEntityRow, DashboardExploreMappingRow},
};

const VARIANTS: [&str; 3] = ["model", "explore", "dashboard"];

/// Inserts or overwrites rows by `(variant, entity_id)` in one transaction.
pub async fn upsert_entities(db: &Db, rows: &[CatalogEntityRow]) -> Result<()> {
	if rows.is_empty() {
		return Ok(());
	}

	let mut tx = db.pool.begin().await?;

	for row in rows {
		upsert_entity(&mut tx, row).await?;
	}

	tx.commit().await?;

	Ok(())
}

/// Makes the stored set of `variant` exactly `rows`. Entities absent from `rows` are deleted.
pub async fn replace_entities(db: &Db, variant: &str, rows: &[CatalogEntityRow]) -> Result<u64> {
	check_variant(variant)?;

	if let Some(row) = rows.iter().find(|row| row.variant != variant) {
		return Err(Error::InvalidArgument(format!(
			"Row {} has variant {} but {variant} was requested.",
			row.entity_id, row.variant
		)));
	}

	let keep: Vec<String> = rows.iter().map(|row| row.entity_id.clone()).collect();
	let mut tx = db.pool.begin().await?;
	let deleted = sqlx::query(
		"\
DELETE FROM catalog_entities
WHERE variant = $1
	AND NOT (entity_id = ANY($2))",
	)
	.bind(variant)
	.bind(&keep)
	.execute(&mut *tx)
	.await?
	.rows_affected();

	for row in rows {
		upsert_entity(&mut tx, row).await?;
	}

	tx.commit().await?;

	Ok(deleted)
}

pub async fn list_entities(db: &Db, variant: &str) -> Result<Vec<CatalogEntityRow>> {
	check_variant(variant)?;

	let rows = sqlx::query_as::<_, CatalogEntityRow>(
		"\
SELECT variant, entity_id, name, payload, fetched_at
FROM catalog_entities
WHERE variant = $1
ORDER BY entity_id",
	)
	.bind(variant)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn count_entities(db: &Db, variant: &str) -> Result<i64> {
	check_variant(variant)?;

	let count: i64 = sqlx::query_scalar("SELECT count(*) FROM catalog_entities WHERE variant = $1")
		.bind(variant)
		.fetch_one(&db.pool)
		.await?;

	Ok(count)
}

/// Replaces the mappings of `dashboard_ids` with `rows`. Mappings of other dashboards are kept.
pub async fn replace_mappings(
	db: &Db,
	dashboard_ids: &[String],
	rows: &[DashboardExploreMappingRow],
) -> Result<()> {
	if let Some(row) = rows.iter().find(|row| !dashboard_ids.contains(&row.dashboard_id)) {
		return Err(Error::InvalidArgument(format!(
			"Mapping for dashboard {} is outside the replaced set.",
			row.dashboard_id
		)));
	}

	let mut tx = db.pool.begin().await?;

	sqlx::query("DELETE FROM dashboard_explore_mappings WHERE dashboard_id = ANY($1)")
		.bind(dashboard_ids)
		.execute(&mut *tx)
		.await?;

	for row in rows {
		upsert_mapping(&mut tx, row).await?;
	}

	tx.commit().await?;

	Ok(())
}

/// Deletes mappings whose dashboard is not in `live_dashboard_ids`.
pub async fn prune_mappings(db: &Db, live_dashboard_ids: &[String]) -> Result<u64> {
	let deleted = sqlx::query(
		"DELETE FROM dashboard_explore_mappings WHERE NOT (dashboard_id = ANY($1))",
	)
	.bind(live_dashboard_ids)
	.execute(&db.pool)
	.await?
	.rows_affected();

	Ok(deleted)
}

pub async fn list_mappings(db: &Db) -> Result<Vec<DashboardExploreMappingRow>> {
	let rows = sqlx::query_as::<_, DashboardExploreMappingRow>(
		"\
SELECT dashboard_id, explore_id, business_context, usage_count, fetched_at
FROM dashboard_explore_mappings
ORDER BY dashboard_id, business_context DESC, explore_id",
	)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

async fn upsert_entity(tx: &mut Transaction<'_, Postgres>, row: &CatalogEntityRow) -> Result<()> {
	let conn: &mut PgConnection = &mut *tx;

	sqlx::query(
		"\
INSERT INTO catalog_entities (variant, entity_id, name, payload, fetched_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (variant, entity_id) DO UPDATE
SET
	name = EXCLUDED.name,
	payload = EXCLUDED.payload,
	fetched_at = EXCLUDED.fetched_at",
	)
	.bind(row.variant.as_str())
	.bind(row.entity_id.as_str())
	.bind(row.name.as_str())
	.bind(&row.payload)
	.bind(row.fetched_at)
	.execute(conn)
	.await?;

	Ok(())
}

async fn upsert_mapping(
	tx: &mut Transaction<'_, Postgres>,
	row: &DashboardExploreMappingRow,
) -> Result<()> {
	let conn: &mut PgConnection = &mut *tx;

	sqlx::query(
		"\
INSERT INTO dashboard_explore_mappings (
	dashboard_id,
	explore_id,
	business_context,
	usage_count,
	fetched_at
)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (dashboard_id, explore_id) DO UPDATE
SET
	business_context = EXCLUDED.business_context,
	usage_count = EXCLUDED.usage_count,
	fetched_at = EXCLUDED.fetched_at",
	)
	.bind(row.dashboard_id.as_str())
	.bind(row.explore_id.as_str())
	.bind(row.business_context)
	.bind(row.usage_count)
	.bind(row.fetched_at)
	.execute(conn)
	.await?;

	Ok(())
}

fn check_variant(variant: &str) -> Result<()> {
	if VARIANTS.contains(&variant) {
		Ok(())
	} else {
		Err(Error::InvalidArgument(format!("Unknown catalog variant {variant:?}.")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_variants_pass_the_check() {
		for variant in VARIANTS {
			assert!(check_variant(variant).is_ok());
		}

		assert!(matches!(check_variant("look"), Err(Error::InvalidArgument(_))));
	}
}
