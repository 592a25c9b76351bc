use clap::Parser;

use stackpilot::adapter::inbound::cli::command::{expand_shorthand, Cli};
use stackpilot::adapter::inbound::cli::output::{self, Mode};
use stackpilot::adapter::inbound::cli::{diagnostic, dispatch, paths};
use stackpilot::error::Result;
use stackpilot::infrastructure::config::Config;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_from(expand_shorthand(std::env::args_os()));
    output::configure(Mode::from_flags(cli.json, cli.quiet));

    if let Err(e) = run(&cli).await {
        if output::is_json() {
            output::error(&e.to_string());
        } else {
            eprintln!("{:?}", diagnostic::report(&e));
        }
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(paths::default_config())?,
    };
    config.logging.init(cli.verbose, cli.quiet);
    tracing::debug!(config = ?cli.config, "Configuration loaded");

    dispatch(cli, &config).await
}
