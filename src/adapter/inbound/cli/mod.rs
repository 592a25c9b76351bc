//! CLI module graph and command dispatch.

pub mod check;
pub mod command;
pub mod deploy;
pub mod diagnostic;
pub mod output;
pub mod paths;
pub mod serve;
pub mod services;
pub mod start;
pub mod status;

use crate::adapter::outbound::TmuxMultiplexer;
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::port::outbound::environment::ProcessEnv;

use command::{Cli, Commands};

/// Run the parsed command against a loaded configuration.
///
/// # Errors
///
/// Returns the handler's error; the caller renders it and picks the exit code.
pub async fn dispatch(cli: &Cli, config: &Config) -> Result<()> {
    let registry = config.registry()?;
    let env = ProcessEnv;

    match &cli.command {
        Commands::Start(args) => start::execute(args, &registry, &env).await,
        Commands::ServeAll(args) => serve::execute(args, config, &registry, &env).await,
        Commands::Deploy(args) => {
            let cwd = std::env::current_dir()?;
            deploy::execute(args, config, &registry, &env, &cwd).await
        }
        Commands::Services => services::execute(&registry),
        Commands::Check => check::execute(config, &registry, &env),
        Commands::Status => status::execute(&TmuxMultiplexer::new(), &config.session.name),
    }
}
