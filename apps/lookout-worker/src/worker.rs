use std::time::Duration;

use lookout_domain::Variant;
use lookout_service::{LookoutService, RefreshOutcome, RefreshSummary};

use crate::{Error, Result};

pub struct Plan {
	pub targets: Vec<Variant>,
	pub force: bool,
	/// Pause between cycles. `None` runs a single cycle.
	pub interval: Option<Duration>,
}

/// Runs refresh cycles until a single-cycle plan finishes. A looping worker logs incomplete
/// cycles and keeps going; a single cycle reports them as an error.
pub async fn run_worker(service: &LookoutService, plan: &Plan) -> Result<()> {
	loop {
		let summary = run_cycle(service, plan).await;

		log_summary(&summary);

		let Some(interval) = plan.interval else {
			return if summary.is_complete() {
				Ok(())
			} else {
				Err(Error::Incomplete(describe_failures(&summary)))
			};
		};

		tracing::info!(interval_secs = interval.as_secs(), "Waiting for the next refresh cycle.");
		tokio::time::sleep(interval).await;
	}
}

pub async fn run_cycle(service: &LookoutService, plan: &Plan) -> RefreshSummary {
	let mut reports = Vec::with_capacity(plan.targets.len());

	for variant in &plan.targets {
		let summary = match variant {
			Variant::Model => service.refresh_models(plan.force).await,
			Variant::Explore => service.refresh_explores(plan.force).await,
			Variant::Dashboard => service.refresh_dashboards(plan.force).await,
		};

		reports.extend(summary.reports);
	}

	RefreshSummary { reports, batch: service.store.batch() }
}

fn log_summary(summary: &RefreshSummary) {
	for report in &summary.reports {
		tracing::info!(
			variant = %report.variant,
			outcome = ?report.outcome,
			fetched = report.fetched,
			pruned = report.pruned,
			elapsed_ms = report.elapsed_ms,
			"Refresh report."
		);
	}

	tracing::info!(
		fetched = summary.fetched(),
		batch = summary.batch,
		complete = summary.is_complete(),
		"Refresh cycle finished."
	);
}

fn describe_failures(summary: &RefreshSummary) -> String {
	summary
		.reports
		.iter()
		.filter_map(|report| match &report.outcome {
			RefreshOutcome::Partial { error } => Some(format!("{} partial: {error}", report.variant)),
			RefreshOutcome::Failed { error } => Some(format!("{} failed: {error}", report.variant)),
			_ => None,
		})
		.collect::<Vec<_>>()
		.join("; ")
}
