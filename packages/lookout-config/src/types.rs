use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub looker: Looker,
	#[serde(default)]
	pub storage: Storage,
	#[serde(default)]
	pub cache: Cache,
	#[serde(default)]
	pub resolver: Resolver,
	#[serde(default)]
	pub scoring: Scoring,
	/// Map keys are query terms or phrases, e.g. "ab test". Values are the synonyms added on a match.
	#[serde(default = "default_vocabulary")]
	pub vocabulary: BTreeMap<String, Vec<String>>,
	#[serde(default)]
	pub domains: Domains,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Looker {
	pub base_url: String,
	pub client_id: String,
	pub client_secret: String,
	#[serde(default = "default_api_version")]
	pub api_version: String,
	pub timeout_ms: u64,
	#[serde(default = "default_page_size")]
	pub page_size: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct Storage {
	pub postgres: Option<Postgres>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub ttl_hours: i64,
	/// Entity budget for refreshes triggered by a resolution request.
	pub interactive_budget: u32,
	pub interactive_timeout_ms: u64,
	/// When false, stale variants are refreshed by a background task instead of inline.
	pub inline_refresh: bool,
	pub prune_orphans: bool,
	pub schedule_interval_hours: u64,
}
impl Default for Cache {
	fn default() -> Self {
		Self {
			ttl_hours: 24,
			interactive_budget: 100,
			interactive_timeout_ms: 15_000,
			inline_refresh: true,
			prune_orphans: true,
			schedule_interval_hours: 24,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Resolver {
	pub max_candidates: u32,
	pub high_threshold: f32,
	pub medium_threshold: f32,
	/// Regular expressions matched against the normalized query.
	pub dashboard_intent_patterns: Vec<String>,
	pub exact_name_markers: Vec<String>,
	pub extra_stopwords: Vec<String>,
}
impl Default for Resolver {
	fn default() -> Self {
		Self {
			max_candidates: 5,
			high_threshold: 80.0,
			medium_threshold: 40.0,
			dashboard_intent_patterns: vec![r"\bdashboards?\b".to_string()],
			exact_name_markers: vec![
				"called".to_string(),
				"named".to_string(),
				"titled".to_string(),
			],
			extra_stopwords: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Scoring {
	pub exact_name: f32,
	pub name_token: f32,
	pub measure_name: f32,
	pub dimension_name: f32,
	pub field_label: f32,
	pub tag: f32,
	pub explore_name: f32,
	pub description: f32,
	pub field_description: f32,
	pub temporal_compound: f32,
	pub title_token: f32,
	pub dashboard_description: f32,
	pub domain_boost: f32,
	pub exclusive_penalty: f32,
	pub folder_boost: f32,
	pub folder_boost_with_description: f32,
	pub coverage_bonus: f32,
	/// Fraction of a mapped explore's keyword score lent to its dashboard.
	pub mapped_explore_weight: f32,
	pub fuzzy_ceiling: f32,
	pub fuzzy_token_similarity: f32,
}
impl Default for Scoring {
	fn default() -> Self {
		Self {
			exact_name: 100.0,
			name_token: 25.0,
			measure_name: 25.0,
			dimension_name: 20.0,
			field_label: 15.0,
			tag: 10.0,
			explore_name: 20.0,
			description: 8.0,
			field_description: 6.0,
			temporal_compound: 35.0,
			title_token: 20.0,
			dashboard_description: 8.0,
			domain_boost: 25.0,
			exclusive_penalty: 100.0,
			folder_boost: 15.0,
			folder_boost_with_description: 5.0,
			coverage_bonus: 15.0,
			mapped_explore_weight: 0.5,
			fuzzy_ceiling: 90.0,
			fuzzy_token_similarity: 0.8,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Domains {
	pub buckets: Vec<DomainBucket>,
	/// Bucket name pairs whose mismatch between query and dashboard is penalized.
	pub exclusive: Vec<[String; 2]>,
	pub temporal_terms: Vec<String>,
}
impl Default for Domains {
	fn default() -> Self {
		Self {
			buckets: vec![
				DomainBucket::new(
					"cost",
					&[
						"cost", "costs", "spend", "spending", "expense", "expenses", "budget",
						"budgets", "finance", "financial", "billing", "invoice", "invoices",
						"revenue", "margin", "profit", "pricing",
					],
				),
				DomainBucket::new(
					"experiments",
					&[
						"experiment",
						"experiments",
						"abtest",
						"ab",
						"variant",
						"variants",
						"winner",
						"winners",
						"hypothesis",
						"treatment",
						"control",
					],
				),
				DomainBucket::new(
					"user_analytics",
					&[
						"user",
						"users",
						"retention",
						"engagement",
						"behavior",
						"behaviour",
						"session",
						"sessions",
						"signup",
						"signups",
						"churn",
						"cohort",
						"cohorts",
						"dau",
						"mau",
						"analytics",
					],
				),
			],
			exclusive: vec![
				["cost".to_string(), "experiments".to_string()],
				["cost".to_string(), "user_analytics".to_string()],
			],
			temporal_terms: [
				"bi weekly",
				"bi monthly",
				"bi annual",
				"semi annual",
				"semi monthly",
				"year over year",
				"quarter over quarter",
				"month over month",
				"week over week",
				"year to date",
				"month to date",
			]
			.into_iter()
			.map(str::to_string)
			.collect(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainBucket {
	pub name: String,
	pub keywords: Vec<String>,
}
impl DomainBucket {
	pub fn new(name: &str, keywords: &[&str]) -> Self {
		Self {
			name: name.to_string(),
			keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
		}
	}
}

pub fn default_vocabulary() -> BTreeMap<String, Vec<String>> {
	let entries: [(&str, &[&str]); 16] = [
		("ab test", &["experiment", "variant", "winner"]),
		("abtest", &["experiment", "variant", "winner"]),
		("ab", &["experiment", "variant", "test"]),
		("split test", &["experiment", "variant"]),
		("experiment", &["abtest", "variant", "test"]),
		("signup", &["registration", "register", "signups"]),
		("sign up", &["signup", "registration"]),
		("revenue", &["sales", "income", "gmv"]),
		("cost", &["spend", "expense", "budget"]),
		("spend", &["cost", "expense"]),
		("churn", &["retention", "cancellation"]),
		("conversion", &["cvr", "funnel"]),
		("cvr", &["conversion", "rate"]),
		("dau", &["daily", "active", "users"]),
		("mau", &["monthly", "active", "users"]),
		("bookings", &["booking", "reservation"]),
	];

	entries
		.into_iter()
		.map(|(term, synonyms)| {
			(term.to_string(), synonyms.iter().map(|synonym| synonym.to_string()).collect())
		})
		.collect()
}

fn default_api_version() -> String {
	"4.0".to_string()
}

fn default_page_size() -> u32 {
	50
}
