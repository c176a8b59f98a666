use amdp_cli::{cli::Cli, logging};
use clap::Parser;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = amdp_cli::run(cli).await {
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
}
