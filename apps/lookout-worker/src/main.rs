use clap::Parser;

use lookout_worker::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	lookout_worker::run(args).await
}
