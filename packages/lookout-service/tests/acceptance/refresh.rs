use std::{sync::Arc, thread, time::Duration};

use lookout_domain::Variant;
use lookout_service::{CatalogRefresher, CatalogStore, RefreshOutcome};

use super::{FakeSource, dashboard, service, test_config};

fn refresher(source: FakeSource) -> (Arc<CatalogRefresher>, Arc<FakeSource>, Arc<CatalogStore>) {
	let cfg = test_config();
	let source = Arc::new(source);
	let store = Arc::new(CatalogStore::new(time::Duration::hours(cfg.cache.ttl_hours)));
	let refresher = Arc::new(CatalogRefresher::new(&cfg, source.clone(), store.clone(), None));

	(refresher, source, store)
}

#[tokio::test]
async fn refreshing_identical_upstream_twice_is_idempotent() {
	let (refresher, _, store) = refresher(FakeSource::catalog());

	refresher.refresh_dashboards(None).await;

	let first = (store.get(Variant::Dashboard), store.mappings());

	refresher.refresh_dashboards(None).await;

	let second = (store.get(Variant::Dashboard), store.mappings());

	assert_eq!(first.0.as_ref(), second.0.as_ref());
	assert_eq!(first.1.as_ref(), second.1.as_ref());
	assert_eq!(second.0.len(), 3);
}

#[tokio::test]
async fn failing_second_page_keeps_the_first() {
	let source = FakeSource { fail_dashboards_from: Some(2), ..FakeSource::numbered_dashboards(5) };
	let (refresher, _, store) = refresher(source);
	let report = refresher.refresh_dashboards(None).await;

	assert!(matches!(report.outcome, RefreshOutcome::Partial { .. }));
	assert_eq!(report.fetched, 2);
	assert_eq!(report.pruned, 0);
	assert_eq!(store.get(Variant::Dashboard).len(), 2);
}

#[tokio::test]
async fn interactive_budget_bounds_the_fetch() {
	let (refresher, source, store) = refresher(FakeSource::numbered_dashboards(5));
	let report = refresher.refresh_dashboards(Some(3)).await;

	assert_eq!(report.outcome, RefreshOutcome::Complete);
	assert_eq!(report.fetched, 3);
	assert_eq!(store.get(Variant::Dashboard).len(), 3);
	assert_eq!(*source.dashboard_calls.lock(), vec![(0, 2), (2, 1)]);
}

#[tokio::test]
async fn paging_stops_at_a_short_page() {
	let (refresher, source, _) = refresher(FakeSource::numbered_dashboards(5));
	let report = refresher.refresh_dashboards(None).await;

	assert_eq!(report.fetched, 5);
	assert_eq!(*source.dashboard_calls.lock(), vec![(0, 2), (2, 2), (4, 2)]);
}

#[tokio::test]
async fn unbounded_refresh_prunes_removed_dashboards_and_their_mappings() {
	let (refresher, source, store) = refresher(FakeSource::catalog());

	refresher.refresh_dashboards(None).await;
	source.dashboards.lock().retain(|dashboard| dashboard.id != "103");

	let report = refresher.refresh_dashboards(None).await;

	assert_eq!(report.pruned, 1);
	assert!(store.get(Variant::Dashboard).iter().all(|dashboard| dashboard.id != "103"));
	assert!(store.mappings().iter().all(|mapping| mapping.dashboard_id != "103"));
}

#[tokio::test]
async fn budgeted_refresh_never_prunes() {
	let (refresher, source, store) = refresher(FakeSource::catalog());

	refresher.refresh_dashboards(None).await;
	source.dashboards.lock().retain(|dashboard| dashboard.id != "103");

	let report = refresher.refresh_dashboards(Some(10)).await;

	assert_eq!(report.pruned, 0);
	assert_eq!(store.get(Variant::Dashboard).len(), 3);
}

#[tokio::test]
async fn mappings_count_usage_and_survive_element_failures() {
	let source = FakeSource { failing_refs: vec!["102".to_string()], ..FakeSource::catalog() };
	let (refresher, _, store) = refresher(source);
	let report = refresher.refresh_dashboards(None).await;
	let mappings = store.mappings();

	assert_eq!(report.outcome, RefreshOutcome::Complete);
	assert!(mappings.iter().all(|mapping| mapping.dashboard_id != "102"));

	let signups = mappings
		.iter()
		.find(|mapping| mapping.dashboard_id == "101")
		.expect("Expected a mapping for dashboard 101.");

	assert_eq!(signups.explore_id, "growth.signups");
	assert_eq!(signups.usage_count, 2);
	// Title, folder, and no views.
	assert_eq!(signups.business_context, 1.5);
}

#[tokio::test]
async fn explores_need_cached_models() {
	let (refresher, _, _) = refresher(FakeSource::catalog());
	let report = refresher.refresh_explores(None).await;

	assert!(matches!(report.outcome, RefreshOutcome::Failed { .. }));
}

#[tokio::test]
async fn one_failing_model_makes_the_explore_refresh_partial() {
	let source = FakeSource { failing_models: vec!["growth".to_string()], ..FakeSource::catalog() };
	let (refresher, _, store) = refresher(source);

	refresher.refresh_models(None).await;

	let report = refresher.refresh_explores(None).await;
	let ids: Vec<String> = store.get(Variant::Explore).iter().map(|explore| explore.id.clone()).collect();

	assert!(matches!(report.outcome, RefreshOutcome::Partial { .. }));
	assert_eq!(ids, vec!["finance.costs".to_string(), "orders.order_items".to_string()]);
}

#[tokio::test]
async fn interactive_refresh_is_skipped_while_another_runs() {
	let source =
		FakeSource { dashboard_delay: Some(Duration::from_millis(200)), ..FakeSource::numbered_dashboards(1) };
	let (refresher, _, _) = refresher(source);
	let batch = tokio::spawn({
		let refresher = refresher.clone();

		async move { refresher.refresh_dashboards(None).await }
	});

	tokio::time::sleep(Duration::from_millis(50)).await;

	let interactive = refresher.refresh_dashboards(Some(10)).await;
	let batch = batch.await.expect("Batch refresh task panicked.");

	assert_eq!(interactive.outcome, RefreshOutcome::Skipped);
	assert_eq!(batch.outcome, RefreshOutcome::Complete);
	assert_eq!(batch.fetched, 1);
}

#[test]
fn readers_never_observe_a_torn_batch() {
	let store = Arc::new(CatalogStore::new(time::Duration::hours(24)));
	let writer = {
		let store = store.clone();

		thread::spawn(move || {
			for round in 0..200 {
				let entities = (0..20)
					.map(|idx| dashboard(&idx.to_string(), &format!("Round {round}"), None))
					.collect();

				store.replace(Variant::Dashboard, entities);
			}
		})
	};

	for _ in 0..2_000 {
		let snapshot = store.get(Variant::Dashboard);

		if let Some(first) = snapshot.first() {
			assert!(snapshot.iter().all(|entity| entity.name == first.name), "Observed a mixed batch.");
			assert_eq!(snapshot.len(), 20);
		}
	}

	writer.join().expect("Writer thread panicked.");
}

#[tokio::test]
async fn admin_refresh_skips_fresh_variants_unless_forced() {
	let service = service(test_config(), FakeSource::catalog());
	let first = service.refresh_all(false).await;

	assert!(first.is_complete());
	assert_eq!(first.fetched(), 3 + 4 + 3);

	let second = service.refresh_all(false).await;

	assert!(second.reports.iter().all(|report| report.outcome == RefreshOutcome::Skipped));

	let forced = service.refresh_dashboards(true).await;

	assert_eq!(forced.reports.len(), 1);
	assert_eq!(forced.reports[0].outcome, RefreshOutcome::Complete);
}
