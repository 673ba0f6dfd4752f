use lookout_config::Looker;
use lookout_providers::{Error, LookerClient};

fn looker_config(base_url: &str) -> Looker {
	Looker {
		base_url: base_url.to_string(),
		client_id: "id".to_string(),
		client_secret: "secret".to_string(),
		api_version: "4.0".to_string(),
		timeout_ms: 200,
		page_size: 10,
	}
}

#[test]
fn client_builds_web_urls_from_config() {
	let client = LookerClient::new(&looker_config("https://looker.example.com"))
		.expect("Failed to build client.");

	assert_eq!(client.model_url("orders"), "https://looker.example.com/models/orders");
	assert_eq!(
		client.explore_url("ecommerce", "orders"),
		"https://looker.example.com/explore/ecommerce/orders"
	);
	assert_eq!(client.dashboard_url("2659"), "https://looker.example.com/dashboards/2659");
}

#[test]
fn client_rejects_blank_base_url() {
	let result = LookerClient::new(&looker_config("  "));

	assert!(matches!(result, Err(Error::InvalidConfig { .. })));
}

#[test]
fn server_errors_are_transient() {
	let unavailable = Error::Status { status: 503, path: "/lookml_models".to_string() };
	let not_found = Error::Status { status: 404, path: "/dashboards/1".to_string() };
	let auth = Error::Auth { message: "status 403".to_string() };

	assert!(unavailable.is_transient());
	assert!(!not_found.is_transient());
	assert!(!auth.is_transient());
}

#[tokio::test]
async fn unreachable_host_fails_without_panicking() {
	let client = LookerClient::new(&looker_config("http://127.0.0.1:9")).expect("Failed to build client.");
	let err = client.list_models().await.expect_err("Expected connection failure.");

	assert!(matches!(err, Error::Reqwest(_)), "Unexpected error: {err:?}");
	assert!(err.is_transient());
}
