use clap::Parser;

use lookout_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	lookout_eval::run(args).await
}
