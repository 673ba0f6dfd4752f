use std::{
	collections::{BTreeMap, HashSet},
	fs,
	path::{Path, PathBuf},
	sync::Arc,
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};

use lookout_config::Config;
use lookout_domain::{CatalogEntity, DashboardExploreMapping, Variant};
use lookout_service::{CatalogView, LookoutService, Resolver, Status, TierKind};

#[derive(Debug, Parser)]
#[command(
	version = lookout_cli::VERSION,
	rename_all = "kebab",
	styles = lookout_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// JSON catalog snapshot. Without it the persisted catalog in Postgres is used.
	#[arg(long, value_name = "FILE")]
	pub catalog: Option<PathBuf>,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	/// Rank cutoff for hit@k. Defaults to `resolver.max_candidates`.
	#[arg(long, value_name = "N")]
	pub top_k: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSnapshot {
	pub models: Vec<CatalogEntity>,
	pub explores: Vec<CatalogEntity>,
	pub dashboards: Vec<CatalogEntity>,
	pub mappings: Vec<DashboardExploreMapping>,
}
impl CatalogSnapshot {
	pub fn into_view(self) -> CatalogView {
		CatalogView::new(
			Arc::from(self.models),
			Arc::from(self.explores),
			Arc::from(self.dashboards),
			Arc::from(self.mappings),
		)
	}
}

#[derive(Debug, Deserialize)]
pub struct EvalDataset {
	pub name: Option<String>,
	pub queries: Vec<EvalQuery>,
}

#[derive(Debug, Deserialize)]
pub struct EvalQuery {
	pub id: Option<String>,
	pub query: String,
	#[serde(default)]
	pub variant_hint: Option<Variant>,
	/// Entity ids any of which counts as a hit.
	pub expected_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EvalOutput {
	pub dataset: EvalDatasetInfo,
	pub settings: EvalSettings,
	pub summary: EvalSummary,
	pub queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
pub struct EvalDatasetInfo {
	pub name: String,
	pub query_count: usize,
}

#[derive(Debug, Serialize)]
pub struct EvalSettings {
	pub config_path: String,
	pub catalog: String,
	pub top_k: usize,
}

#[derive(Debug, Serialize)]
pub struct EvalSummary {
	pub hit_at_k: f64,
	pub mrr: f64,
	pub no_match_count: usize,
	/// Queries answered per tier.
	pub tiers: BTreeMap<TierKind, usize>,
	pub latency_ms_p50: f64,
	pub latency_ms_p95: f64,
}

#[derive(Debug, Serialize)]
pub struct QueryReport {
	pub id: String,
	pub query: String,
	pub tier: TierKind,
	pub status: Status,
	pub expected_ids: Vec<String>,
	pub retrieved_ids: Vec<String>,
	pub hit: bool,
	pub rr: f64,
	pub latency_ms: f64,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = lookout_config::load(&args.config)?;

	lookout_cli::init_tracing(&cfg.service.log_level);

	let dataset = load_dataset(&args.dataset)?;
	let top_k = args.top_k.unwrap_or(cfg.resolver.max_candidates as usize).max(1);
	let resolver = Resolver::new(&cfg)?;
	let (view, catalog) = match &args.catalog {
		Some(path) => (load_catalog(path)?.into_view(), path.display().to_string()),
		None => (persisted_view(cfg).await?, "postgres".to_string()),
	};
	let mut output = evaluate(&resolver, &view, &dataset, top_k);

	output.settings.config_path = args.config.display().to_string();
	output.settings.catalog = catalog;

	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

/// Resolves every dataset query against `view` and scores the rankings.
pub fn evaluate(
	resolver: &Resolver,
	view: &CatalogView,
	dataset: &EvalDataset,
	top_k: usize,
) -> EvalOutput {
	let mut reports = Vec::with_capacity(dataset.queries.len());
	let mut latencies_ms = Vec::with_capacity(dataset.queries.len());

	for (idx, query) in dataset.queries.iter().enumerate() {
		let started = Instant::now();
		let resolution = resolver.resolve(&query.query, query.variant_hint, view);
		let latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
		let retrieved_ids: Vec<String> =
			resolution.candidates.iter().map(|candidate| candidate.id.clone()).collect();
		let expected: HashSet<&str> = query.expected_ids.iter().map(String::as_str).collect();
		let (hit, rr) = rank_metrics(&retrieved_ids, &expected, top_k);

		latencies_ms.push(latency_ms);
		reports.push(QueryReport {
			id: query.id.clone().unwrap_or_else(|| format!("q{}", idx + 1)),
			query: query.query.clone(),
			tier: resolution.tier,
			status: resolution.status,
			expected_ids: query.expected_ids.clone(),
			retrieved_ids,
			hit,
			rr,
			latency_ms,
		});
	}

	EvalOutput {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "unnamed".to_string()),
			query_count: reports.len(),
		},
		settings: EvalSettings { config_path: String::new(), catalog: String::new(), top_k },
		summary: summarize(&reports, &latencies_ms),
		queries: reports,
	}
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

fn load_catalog(path: &Path) -> color_eyre::Result<CatalogSnapshot> {
	let raw = fs::read_to_string(path)?;

	Ok(serde_json::from_str(&raw)?)
}

async fn persisted_view(cfg: Config) -> color_eyre::Result<CatalogView> {
	if cfg.storage.postgres.is_none() {
		return Err(eyre::eyre!("Without --catalog, storage.postgres must be configured."));
	}

	let service = LookoutService::connect(cfg).await?;

	Ok(service.store.snapshot())
}

/// Hit within the first `k` and reciprocal rank of the first expected id.
fn rank_metrics(retrieved: &[String], expected: &HashSet<&str>, k: usize) -> (bool, f64) {
	let first = retrieved.iter().position(|id| expected.contains(id.as_str()));
	let hit = first.map(|idx| idx < k).unwrap_or(false);
	let rr = first.map(|idx| 1.0 / (idx + 1) as f64).unwrap_or(0.0);

	(hit, rr)
}

fn summarize(reports: &[QueryReport], latencies_ms: &[f64]) -> EvalSummary {
	let count = reports.len().max(1) as f64;
	let hit_at_k = reports.iter().filter(|report| report.hit).count() as f64 / count;
	let mrr = reports.iter().map(|report| report.rr).sum::<f64>() / count;
	let no_match_count = reports.iter().filter(|report| report.status == Status::NoMatch).count();
	let mut tiers = BTreeMap::new();

	for report in reports {
		*tiers.entry(report.tier).or_insert(0) += 1;
	}

	let mut sorted = latencies_ms.to_vec();

	sorted.sort_by(|a, b| a.total_cmp(b));

	EvalSummary {
		hit_at_k,
		mrr,
		no_match_count,
		tiers,
		latency_ms_p50: percentile(&sorted, 0.50),
		latency_ms_p95: percentile(&sorted, 0.95),
	}
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}
