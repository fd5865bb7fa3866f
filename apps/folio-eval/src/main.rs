use clap::Parser;

use folio_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	folio_eval::run(args).await
}
