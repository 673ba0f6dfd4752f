pub mod error;
pub mod worker;

pub use error::{Error, Result};

use std::{path::PathBuf, time::Duration};

use clap::Parser;

use lookout_domain::Variant;
use lookout_service::LookoutService;

#[derive(Debug, Parser)]
#[command(
	version = lookout_cli::VERSION,
	rename_all = "kebab",
	styles = lookout_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Refresh models.
	#[arg(long)]
	pub models: bool,
	/// Refresh explores. Needs cached models.
	#[arg(long)]
	pub explores: bool,
	/// Refresh dashboards and their explore mappings.
	#[arg(long)]
	pub dashboards: bool,
	/// Refresh every variant. The default when no variant flag is given.
	#[arg(long, conflicts_with_all = ["models", "explores", "dashboards"])]
	pub all: bool,
	/// Refresh even when the cached variant is within its TTL.
	#[arg(long)]
	pub force: bool,
	/// Run one cycle and exit instead of looping on the schedule.
	#[arg(long)]
	pub once: bool,
}
impl Args {
	/// Variants to refresh, in dependency order.
	pub fn targets(&self) -> Vec<Variant> {
		let picked = [
			(Variant::Model, self.models),
			(Variant::Explore, self.explores),
			(Variant::Dashboard, self.dashboards),
		];

		if self.all || picked.iter().all(|(_, on)| !on) {
			return Variant::ALL.to_vec();
		}

		picked.into_iter().filter(|(_, on)| *on).map(|(variant, _)| variant).collect()
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = lookout_config::load(&args.config)?;

	lookout_cli::init_tracing(&cfg.service.log_level);

	let plan = worker::Plan {
		targets: args.targets(),
		force: args.force,
		interval: (!args.once)
			.then(|| Duration::from_secs(cfg.cache.schedule_interval_hours.saturating_mul(3_600))),
	};
	let service = LookoutService::connect(cfg).await?;

	worker::run_worker(&service, &plan).await?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(flags: &[&str]) -> Args {
		Args::try_parse_from(["lookout-worker", "--config", "lookout.toml"].iter().chain(flags))
			.expect("Failed to parse arguments.")
	}

	#[test]
	fn no_variant_flag_means_all() {
		assert_eq!(parse(&[]).targets(), Variant::ALL.to_vec());
		assert_eq!(parse(&["--all", "--force"]).targets(), Variant::ALL.to_vec());
	}

	#[test]
	fn picked_variants_keep_dependency_order() {
		assert_eq!(
			parse(&["--dashboards", "--models"]).targets(),
			vec![Variant::Model, Variant::Dashboard]
		);
	}

	#[test]
	fn all_conflicts_with_single_variants() {
		let parsed =
			Args::try_parse_from(["lookout-worker", "--config", "lookout.toml", "--all", "--models"]);

		assert!(parsed.is_err());
	}
}
