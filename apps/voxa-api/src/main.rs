use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = voxa_api::Args::parse();

	voxa_api::run(args).await
}
