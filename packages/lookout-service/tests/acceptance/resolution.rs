use std::time::{Duration, Instant};

use time::OffsetDateTime;

use lookout_domain::Variant;
use lookout_service::{Band, Error, Presentation, ResolveRequest, Status, TierKind};

use super::{FakeSource, dashboard, service, test_config};

fn request(query: &str) -> ResolveRequest {
	ResolveRequest { query: query.to_string(), variant_hint: None }
}

#[tokio::test]
async fn model_named_after_a_marker_resolves_exactly() {
	let service = service(test_config(), FakeSource::catalog());
	let resolution =
		service.resolve(request("Is there a model called orders?")).await.expect("Failed to resolve.");
	let top = resolution.top().expect("Expected a candidate.");

	assert_eq!(resolution.tier, TierKind::Exact);
	assert_eq!(resolution.candidates.len(), 1);
	assert_eq!(top.id, "orders");
	assert_eq!(top.variant, Variant::Model);
	assert!(top.score >= 80.0);
	assert_eq!(top.band, Band::High);
	assert_eq!(top.reason, "exact-name");
}

#[tokio::test]
async fn whole_query_equal_to_an_explore_name_resolves_exactly() {
	let service = service(test_config(), FakeSource::catalog());
	let resolution = service.resolve(request("Order Items")).await.expect("Failed to resolve.");

	assert_eq!(resolution.tier, TierKind::Exact);
	assert_eq!(resolution.top().map(|top| top.id.as_str()), Some("orders.order_items"));
}

#[tokio::test]
async fn temporal_dashboard_query_prefers_matching_domain() {
	let service = service(test_config(), FakeSource::catalog());
	let resolution =
		service.resolve(request("bi-weekly retention dashboard")).await.expect("Failed to resolve.");
	let top = resolution.top().expect("Expected a candidate.");

	assert_eq!(resolution.tier, TierKind::Dashboard);
	assert_eq!(top.id, "101");
	assert!(top.score > 80.0, "Unexpected score {}.", top.score);
	assert!(resolution.candidates.iter().all(|candidate| candidate.id != "102"));

	let cost = resolution
		.excluded
		.iter()
		.find(|candidate| candidate.id == "102")
		.expect("Expected the cost dashboard among the excluded.");

	assert!(cost.score < 40.0);
	assert!(cost.reason.contains("domain-conflict"));

	let Presentation::Dashboard { title, folder, related_explores, .. } = &top.presentation else {
		panic!("Expected a dashboard presentation.");
	};

	assert_eq!(title, "Bi-Weekly Retention Report");
	assert_eq!(folder.as_deref(), Some("User Analytics"));
	assert_eq!(related_explores.len(), 1);
	assert_eq!(related_explores[0].id, "growth.signups");
}

#[tokio::test]
async fn vocabulary_expansion_lets_the_semantic_tier_answer() {
	let service = service(test_config(), FakeSource::catalog());
	let resolution = service.resolve(request("ab test winner")).await.expect("Failed to resolve.");
	let top = resolution.top().expect("Expected a candidate.");

	assert_eq!(resolution.tier, TierKind::Semantic);
	assert_eq!(top.id, "growth.ab_tests");

	let Presentation::Entity { matched_fields, .. } = &top.presentation else {
		panic!("Expected an entity presentation.");
	};

	assert!(matched_fields.contains(&"ab_tests.experiment_variant".to_string()));
}

#[tokio::test]
async fn cost_queries_never_surface_experiment_dashboards() {
	let service = service(test_config(), FakeSource::catalog());

	for query in ["cost dashboard", "cost spend", "spend budget dashboards"] {
		let resolution = service.resolve(request(query)).await.expect("Failed to resolve.");

		assert!(
			resolution.candidates.iter().all(|candidate| candidate.id != "103"),
			"Experiment dashboard surfaced for {query:?}."
		);
	}
}

#[tokio::test]
async fn variant_hint_routes_to_the_dashboard_tier() {
	let service = service(test_config(), FakeSource::catalog());
	let resolution = service
		.resolve(ResolveRequest { query: "retention".to_string(), variant_hint: Some(Variant::Dashboard) })
		.await
		.expect("Failed to resolve.");

	assert_eq!(resolution.tier, TierKind::Dashboard);
	assert_eq!(resolution.top().map(|top| top.id.as_str()), Some("101"));
}

#[tokio::test]
async fn nothing_relevant_is_a_no_match_not_an_error() {
	let service = service(test_config(), FakeSource::catalog());
	let resolution = service.resolve(request("zzzz qqqq")).await.expect("Failed to resolve.");

	assert_eq!(resolution.tier, TierKind::Fallback);
	assert_eq!(resolution.status, Status::NoMatch);
	assert!(resolution.candidates.is_empty());
	assert!(resolution.excluded.len() <= 3);
}

#[tokio::test]
async fn candidates_are_truncated_to_the_configured_maximum() {
	let mut cfg = test_config();

	cfg.resolver.max_candidates = 1;

	let service = service(cfg, FakeSource::catalog());
	let resolution = service.resolve(request("growth")).await.expect("Failed to resolve.");

	assert!(resolution.candidates.len() <= 1);
}

#[tokio::test]
async fn empty_cache_with_failing_upstream_is_reported() {
	let service = service(test_config(), FakeSource::unavailable());
	let err = service.resolve(request("orders")).await.expect_err("Expected an error.");

	assert!(matches!(err, Error::CacheEmpty));
}

#[tokio::test]
async fn blank_query_is_rejected() {
	let service = service(test_config(), FakeSource::catalog());
	let err = service.resolve(request("   ")).await.expect_err("Expected an error.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
}

#[tokio::test]
async fn background_refresh_serves_later_requests() {
	let mut cfg = test_config();

	cfg.cache.inline_refresh = false;

	let service = service(cfg, FakeSource::catalog());
	let first = service.resolve(request("orders")).await;

	assert!(matches!(first, Err(Error::CacheEmpty)));

	tokio::time::sleep(Duration::from_millis(100)).await;

	let second = service.resolve(request("orders")).await.expect("Failed to resolve.");

	assert_eq!(second.top().map(|top| top.id.as_str()), Some("orders"));
}

#[tokio::test]
async fn hung_inline_refresh_serves_the_stale_snapshot() {
	let mut cfg = test_config();

	cfg.cache.interactive_timeout_ms = 100;

	let source = FakeSource { dashboard_delay: Some(Duration::from_secs(30)), ..FakeSource::default() };
	let service = service(cfg, source);
	let mut stale = dashboard("102", "Cost Report", Some("Finance"));

	stale.fetched_at = OffsetDateTime::now_utc() - time::Duration::hours(48);
	service.store.upsert(Variant::Dashboard, vec![stale]);

	assert!(service.store.is_stale(Variant::Dashboard));

	let started = Instant::now();
	let resolution = tokio::time::timeout(Duration::from_secs(5), service.resolve(request("Cost Report")))
		.await
		.expect("Resolution must not wait for the hung refresh.")
		.expect("Stale entries must still be served.");

	assert!(started.elapsed() < Duration::from_secs(5));
	assert_eq!(resolution.status, Status::Matched);
	assert_eq!(resolution.top().map(|top| top.id.as_str()), Some("102"));
	assert!(service.store.is_stale(Variant::Dashboard));
}
