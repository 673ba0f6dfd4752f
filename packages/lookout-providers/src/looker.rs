use std::time::{Duration, Instant};

use reqwest::{
	Client, Method, StatusCode,
	header::{AUTHORIZATION, HeaderValue},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{Error, Result};

/// Tokens are renewed this long before Looker says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DASHBOARD_SEARCH_FIELDS: &str = "id,title,description,folder(name),space(name),view_count";
const DASHBOARD_DETAIL_FIELDS: &str =
	"id,dashboard_elements(query(model,view),result_maker(query(model,view)),look(query(model,view)))";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookmlModel {
	pub name: String,
	pub label: Option<String>,
	pub project_name: Option<String>,
	pub explores: Vec<ModelExplore>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelExplore {
	pub name: String,
	pub label: Option<String>,
	pub description: Option<String>,
	pub hidden: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookmlExplore {
	pub model_name: String,
	pub name: String,
	pub label: Option<String>,
	pub description: Option<String>,
	pub tags: Vec<String>,
	pub dimensions: Vec<LookmlField>,
	pub measures: Vec<LookmlField>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookmlField {
	pub name: String,
	pub label: Option<String>,
	pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardSummary {
	pub id: String,
	pub title: String,
	pub description: Option<String>,
	/// Folder name, falling back to the legacy space name.
	pub folder: Option<String>,
	pub view_count: u64,
}

struct AccessToken {
	value: String,
	renew_at: Instant,
}

/// Looker API client authenticated with client credentials.
pub struct LookerClient {
	cfg: lookout_config::Looker,
	client: Client,
	token: Mutex<Option<AccessToken>>,
}
impl LookerClient {
	pub fn new(cfg: &lookout_config::Looker) -> Result<Self> {
		if cfg.base_url.trim().is_empty() {
			return Err(Error::InvalidConfig {
				message: "Looker base_url must be non-empty.".to_string(),
			});
		}

		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { cfg: cfg.clone(), client, token: Mutex::new(None) })
	}

	pub fn model_url(&self, model: &str) -> String {
		model_url(&self.cfg.base_url, model)
	}

	pub fn explore_url(&self, model: &str, explore: &str) -> String {
		explore_url(&self.cfg.base_url, model, explore)
	}

	pub fn dashboard_url(&self, id: &str) -> String {
		dashboard_url(&self.cfg.base_url, id)
	}

	pub async fn list_models(&self) -> Result<Vec<LookmlModel>> {
		let raw: Vec<RawModel> = self
			.get_json("/lookml_models", &[("fields", "name,label,project_name,explores".to_string())])
			.await?;

		Ok(raw.into_iter().filter_map(RawModel::into_model).collect())
	}

	pub async fn explore(&self, model: &str, explore: &str) -> Result<LookmlExplore> {
		let path = format!("/lookml_models/{model}/explores/{explore}");
		let raw: RawExplore = self.get_json(&path, &[]).await?;

		Ok(raw.into_explore(model))
	}

	pub async fn search_dashboards(&self, offset: u32, limit: u32) -> Result<Vec<DashboardSummary>> {
		let query = [
			("fields", DASHBOARD_SEARCH_FIELDS.to_string()),
			("limit", limit.to_string()),
			("offset", offset.to_string()),
			("sorts", "id".to_string()),
		];
		let raw: Vec<RawDashboard> = self.get_json("/dashboards/search", &query).await?;

		raw.into_iter().map(RawDashboard::into_summary).collect()
	}

	/// `model.explore` references of the dashboard's elements, one per element, so repeated
	/// references count usage.
	pub async fn dashboard_explore_refs(&self, dashboard_id: &str) -> Result<Vec<String>> {
		let path = format!("/dashboards/{dashboard_id}");
		let json: Value =
			self.get_json(&path, &[("fields", DASHBOARD_DETAIL_FIELDS.to_string())]).await?;

		Ok(parse_explore_refs(&json))
	}

	async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut retried = false;

		loop {
			let token = self.access_token().await?;
			let res = self
				.client
				.request(Method::GET, self.api_url(path))
				.header(AUTHORIZATION, HeaderValue::from_str(&format!("token {token}"))?)
				.query(query)
				.send()
				.await?;
			let status = res.status();

			if status == StatusCode::UNAUTHORIZED && !retried {
				tracing::debug!(path, "Looker token rejected. Logging in again.");

				self.token.lock().await.take();

				retried = true;

				continue;
			}
			if !status.is_success() {
				return Err(Error::Status { status: status.as_u16(), path: path.to_string() });
			}

			let json: Value = res.json().await?;

			return Ok(serde_json::from_value(json)?);
		}
	}

	async fn access_token(&self) -> Result<String> {
		let mut slot = self.token.lock().await;

		if let Some(token) = slot.as_ref()
			&& token.renew_at > Instant::now()
		{
			return Ok(token.value.clone());
		}

		let res = self
			.client
			.post(self.api_url("/login"))
			.form(&[
				("client_id", self.cfg.client_id.as_str()),
				("client_secret", self.cfg.client_secret.as_str()),
			])
			.send()
			.await?;

		if !res.status().is_success() {
			return Err(Error::Auth { message: format!("status {}", res.status().as_u16()) });
		}

		let login: LoginResponse = res.json().await?;

		if login.access_token.is_empty() {
			return Err(Error::Auth { message: "empty access token".to_string() });
		}

		let lifetime = Duration::from_secs(login.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
		let value = login.access_token;

		*slot = Some(AccessToken { value: value.clone(), renew_at: Instant::now() + lifetime });

		Ok(value)
	}

	fn api_url(&self, path: &str) -> String {
		format!("{}/api/{}{}", self.cfg.base_url, self.cfg.api_version, path)
	}
}

pub fn model_url(base_url: &str, model: &str) -> String {
	format!("{}/models/{model}", base_url.trim_end_matches('/'))
}

pub fn explore_url(base_url: &str, model: &str, explore: &str) -> String {
	format!("{}/explore/{model}/{explore}", base_url.trim_end_matches('/'))
}

pub fn dashboard_url(base_url: &str, id: &str) -> String {
	format!("{}/dashboards/{id}", base_url.trim_end_matches('/'))
}

#[derive(Deserialize)]
struct LoginResponse {
	access_token: String,
	#[serde(default = "default_expires_in")]
	expires_in: u64,
}

#[derive(Deserialize)]
struct RawModel {
	name: Option<String>,
	label: Option<String>,
	project_name: Option<String>,
	#[serde(default)]
	explores: Vec<RawModelExplore>,
}
impl RawModel {
	fn into_model(self) -> Option<LookmlModel> {
		let name = non_blank(self.name)?;

		Some(LookmlModel {
			name,
			label: non_blank(self.label),
			project_name: non_blank(self.project_name),
			explores: self
				.explores
				.into_iter()
				.filter_map(|explore| {
					Some(ModelExplore {
						name: non_blank(explore.name)?,
						label: non_blank(explore.label),
						description: non_blank(explore.description),
						hidden: explore.hidden,
					})
				})
				.collect(),
		})
	}
}

#[derive(Deserialize)]
struct RawModelExplore {
	name: Option<String>,
	label: Option<String>,
	description: Option<String>,
	#[serde(default)]
	hidden: bool,
}

#[derive(Deserialize)]
struct RawExplore {
	name: String,
	model_name: Option<String>,
	label: Option<String>,
	description: Option<String>,
	#[serde(default)]
	tags: Vec<String>,
	#[serde(default)]
	fields: RawExploreFields,
}
impl RawExplore {
	fn into_explore(self, model: &str) -> LookmlExplore {
		LookmlExplore {
			model_name: non_blank(self.model_name).unwrap_or_else(|| model.to_string()),
			name: self.name,
			label: non_blank(self.label),
			description: non_blank(self.description),
			tags: self.tags,
			dimensions: visible_fields(self.fields.dimensions),
			measures: visible_fields(self.fields.measures),
		}
	}
}

#[derive(Default, Deserialize)]
struct RawExploreFields {
	#[serde(default)]
	dimensions: Vec<RawField>,
	#[serde(default)]
	measures: Vec<RawField>,
}

#[derive(Deserialize)]
struct RawField {
	name: String,
	label_short: Option<String>,
	label: Option<String>,
	description: Option<String>,
	#[serde(default)]
	hidden: bool,
}

#[derive(Deserialize)]
struct RawDashboard {
	id: Value,
	title: Option<String>,
	description: Option<String>,
	folder: Option<RawNamed>,
	space: Option<RawNamed>,
	view_count: Option<u64>,
}
impl RawDashboard {
	fn into_summary(self) -> Result<DashboardSummary> {
		let id = match self.id {
			Value::String(id) if !id.trim().is_empty() => id,
			Value::Number(id) => id.to_string(),
			other => {
				return Err(Error::InvalidResponse {
					message: format!("Dashboard search returned an invalid id {other}."),
				});
			},
		};
		let folder = self
			.folder
			.and_then(|folder| non_blank(folder.name))
			.or_else(|| self.space.and_then(|space| non_blank(space.name)));
		let title = non_blank(self.title).unwrap_or_else(|| format!("Dashboard {id}"));

		Ok(DashboardSummary {
			id,
			title,
			description: non_blank(self.description),
			folder,
			view_count: self.view_count.unwrap_or(0),
		})
	}
}

#[derive(Deserialize)]
struct RawNamed {
	name: Option<String>,
}

fn parse_explore_refs(json: &Value) -> Vec<String> {
	let Some(elements) = json.get("dashboard_elements").and_then(Value::as_array) else {
		return Vec::new();
	};
	let mut refs = Vec::new();

	for element in elements {
		let query = element
			.get("query")
			.filter(|query| !query.is_null())
			.or_else(|| element.pointer("/result_maker/query").filter(|query| !query.is_null()))
			.or_else(|| element.pointer("/look/query").filter(|query| !query.is_null()));
		let Some(query) = query else {
			continue;
		};

		if let (Some(model), Some(view)) = (
			query.get("model").and_then(Value::as_str),
			query.get("view").and_then(Value::as_str),
		) && !model.is_empty()
			&& !view.is_empty()
		{
			refs.push(format!("{model}.{view}"));
		}
	}

	refs
}

fn visible_fields(fields: Vec<RawField>) -> Vec<LookmlField> {
	fields
		.into_iter()
		.filter(|field| !field.hidden)
		.map(|field| LookmlField {
			name: field.name,
			label: non_blank(field.label_short).or_else(|| non_blank(field.label)),
			description: non_blank(field.description),
		})
		.collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
	value.filter(|value| !value.trim().is_empty())
}

fn default_expires_in() -> u64 {
	3_600
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_models_and_skips_nameless_entries() {
		let json = serde_json::json!([
			{
				"name": "ecommerce",
				"label": "E-commerce",
				"project_name": "core",
				"explores": [
					{ "name": "orders", "label": "Orders", "description": "", "hidden": false },
					{ "name": null }
				]
			},
			{ "name": "" }
		]);
		let raw: Vec<RawModel> = serde_json::from_value(json).expect("parse failed");
		let models: Vec<LookmlModel> = raw.into_iter().filter_map(RawModel::into_model).collect();

		assert_eq!(models.len(), 1);
		assert_eq!(models[0].project_name.as_deref(), Some("core"));
		assert_eq!(models[0].explores.len(), 1);
		assert_eq!(models[0].explores[0].description, None);
	}

	#[test]
	fn explore_fields_drop_hidden_and_prefer_short_labels() {
		let json = serde_json::json!({
			"name": "ab_tests",
			"label": "A/B Tests",
			"fields": {
				"dimensions": [
					{ "name": "ab_tests.experiment_variant", "label": "AB Tests Experiment Variant", "label_short": "Experiment Variant" },
					{ "name": "ab_tests.internal_id", "hidden": true }
				],
				"measures": [
					{ "name": "ab_tests.conversion_rate", "label": "Conversion Rate", "description": "Share of converted users" }
				]
			}
		});
		let raw: RawExplore = serde_json::from_value(json).expect("parse failed");
		let explore = raw.into_explore("experiments");

		assert_eq!(explore.model_name, "experiments");
		assert_eq!(explore.dimensions.len(), 1);
		assert_eq!(explore.dimensions[0].label.as_deref(), Some("Experiment Variant"));
		assert_eq!(explore.measures[0].description.as_deref(), Some("Share of converted users"));
	}

	#[test]
	fn dashboard_summary_falls_back_to_space_and_numeric_ids() {
		let json = serde_json::json!([
			{ "id": 2659, "title": "Bi-Weekly Cost Check", "folder": null, "space": { "name": "Finance" }, "view_count": 12 },
			{ "id": "17", "title": "", "folder": { "name": "User Analytics" } }
		]);
		let raw: Vec<RawDashboard> = serde_json::from_value(json).expect("parse failed");
		let summaries: Vec<DashboardSummary> = raw
			.into_iter()
			.map(RawDashboard::into_summary)
			.collect::<Result<_>>()
			.expect("summary failed");

		assert_eq!(summaries[0].id, "2659");
		assert_eq!(summaries[0].folder.as_deref(), Some("Finance"));
		assert_eq!(summaries[0].view_count, 12);
		assert_eq!(summaries[1].title, "Dashboard 17");
		assert_eq!(summaries[1].folder.as_deref(), Some("User Analytics"));
	}

	#[test]
	fn dashboard_summary_rejects_missing_id() {
		let raw: RawDashboard =
			serde_json::from_value(serde_json::json!({ "id": null, "title": "x" })).expect("parse failed");

		assert!(matches!(raw.into_summary(), Err(Error::InvalidResponse { .. })));
	}

	#[test]
	fn explore_refs_come_from_every_element_query_shape() {
		let json = serde_json::json!({
			"dashboard_elements": [
				{ "query": { "model": "finance", "view": "costs" } },
				{ "query": null, "result_maker": { "query": { "model": "finance", "view": "costs" } } },
				{ "look": { "query": { "model": "users", "view": "sessions" } } },
				{ "type": "text" }
			]
		});

		assert_eq!(
			parse_explore_refs(&json),
			vec![
				"finance.costs".to_string(),
				"finance.costs".to_string(),
				"users.sessions".to_string()
			]
		);
	}

	#[test]
	fn web_urls_ignore_trailing_slashes() {
		assert_eq!(model_url("https://looker.example.com/", "orders"), "https://looker.example.com/models/orders");
		assert_eq!(
			explore_url("https://looker.example.com", "ecommerce", "orders"),
			"https://looker.example.com/explore/ecommerce/orders"
		);
		assert_eq!(dashboard_url("https://looker.example.com", "42"), "https://looker.example.com/dashboards/42");
	}
}
