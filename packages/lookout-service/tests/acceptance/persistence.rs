use std::sync::Arc;

use lookout_config::Postgres;
use lookout_domain::Variant;
use lookout_service::{LookoutService, ResolveRequest, TierKind};
use lookout_storage::{db::Db, queries};
use lookout_testkit::TestDatabase;

use super::{FakeSource, test_config};

async fn connect(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	db
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set LOOKOUT_PG_DSN to run."]
async fn refreshed_catalog_is_written_through_and_hydrates() {
	let Some(base_dsn) = lookout_testkit::env_dsn() else {
		eprintln!("Skipping refreshed_catalog_is_written_through_and_hydrates; set LOOKOUT_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let writer = LookoutService::new(
		test_config(),
		Arc::new(FakeSource::catalog()),
		Some(connect(&test_db).await),
	)
	.expect("Failed to build service.");
	let summary = writer.refresh_all(true).await;

	assert!(summary.is_complete());

	let db = connect(&test_db).await;

	assert_eq!(queries::count_entities(&db, "dashboard").await.expect("count"), 3);
	assert_eq!(queries::list_mappings(&db).await.expect("Failed to list mappings.").len(), 3);

	// A reader with a dead upstream still answers from the persisted catalog.
	let reader = LookoutService::new(test_config(), Arc::new(FakeSource::unavailable()), Some(db))
		.expect("Failed to build service.");
	let loaded = reader.hydrate().await.expect("Failed to hydrate.");

	assert_eq!(loaded, 3 + 4 + 3);
	assert_eq!(reader.store.get(Variant::Explore).as_ref(), writer.store.get(Variant::Explore).as_ref());

	let resolution = reader
		.resolve(ResolveRequest { query: "model called orders".to_string(), variant_hint: None })
		.await
		.expect("Failed to resolve.");

	assert_eq!(resolution.tier, TierKind::Exact);
	assert_eq!(resolution.top().map(|top| top.id.as_str()), Some("orders"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
