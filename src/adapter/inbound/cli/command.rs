//! Command-line interface definitions.
//!
//! `start-<service>` and `deploy-<service>` are accepted as shorthands for
//! `start <service>` and `deploy <service>`; [`expand_shorthand`] rewrites
//! them before clap sees the arguments.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Local dev sessions and Cloud Run deploys for the inference backend
#[derive(Parser, Debug)]
#[command(name = "stackpilot")]
#[command(version)]
pub struct Cli {
    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to the configuration file [default: ~/.stackpilot/config.toml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one service locally in the foreground
    Start(StartArgs),

    /// Run the local services together
    ServeAll(ServeArgs),

    /// Build, push and deploy a service to Cloud Run
    Deploy(DeployArgs),

    /// List registered services
    Services,

    /// Report local readiness: session services, environment, secrets, tools
    Check,

    /// Show whether the dev session is running
    Status,
}

#[derive(Parser, Debug)]
pub struct StartArgs {
    /// Service to start
    pub service: String,
}

/// How `serve-all` runs its services.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ServeMode {
    /// One tmux pane per service, tiled in a single session
    #[default]
    Session,
    /// Owned child processes with output in the log; Ctrl-C stops them all
    Group,
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Services in launch order [default: the configured session services]
    pub services: Vec<String>,

    /// Supervision backend
    #[arg(long, value_enum, default_value_t = ServeMode::Session)]
    pub mode: ServeMode,

    /// Session name, overriding the configured one
    #[arg(long)]
    pub session: Option<String>,

    /// Lay out the session without attaching to it (session mode only)
    #[arg(long)]
    pub detach: bool,
}

#[derive(Parser, Debug)]
pub struct DeployArgs {
    /// Service to deploy
    pub service: String,

    /// Print the resolved commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Subcommands with a `<verb>-<service>` shorthand.
const SHORTHAND_VERBS: &[&str] = &["start", "deploy"];

/// Global options that consume the following argument.
const VALUE_FLAGS: &[&str] = &["-c", "--config"];

/// Rewrite `start-<x>` / `deploy-<x>` into two arguments.
///
/// Only the subcommand position is considered, so a service or file named
/// `start-something` elsewhere on the line is left alone.
pub fn expand_shorthand<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();

    let mut index = 1;
    while index < args.len() {
        let Some(arg) = args[index].to_str() else {
            return args;
        };
        if VALUE_FLAGS.contains(&arg) {
            index += 2;
            continue;
        }
        if arg == "--" {
            return args;
        }
        if arg.starts_with('-') {
            index += 1;
            continue;
        }
        break;
    }

    let Some(expanded) = args
        .get(index)
        .and_then(|arg| arg.to_str())
        .and_then(split_shorthand)
    else {
        return args;
    };

    let (verb, service) = expanded;
    args.splice(index..=index, [OsString::from(verb), OsString::from(service)]);
    args
}

fn split_shorthand(arg: &str) -> Option<(&'static str, String)> {
    SHORTHAND_VERBS.iter().find_map(|verb| {
        arg.strip_prefix(verb)
            .and_then(|rest| rest.strip_prefix('-'))
            .filter(|service| !service.is_empty())
            .map(|service| (*verb, service.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(args: &[&str]) -> Vec<String> {
        expand_shorthand(args.iter().copied())
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect()
    }

    #[test]
    fn start_shorthand_is_rewritten() {
        assert_eq!(
            expand(&["stackpilot", "start-functions"]),
            vec!["stackpilot", "start", "functions"]
        );
    }

    #[test]
    fn deploy_shorthand_keeps_flags() {
        assert_eq!(
            expand(&["stackpilot", "-v", "deploy-llm-api", "--dry-run"]),
            vec!["stackpilot", "-v", "deploy", "llm-api", "--dry-run"]
        );
    }

    #[test]
    fn config_value_is_not_mistaken_for_subcommand() {
        assert_eq!(
            expand(&["stackpilot", "--config", "start-x.toml", "deploy-vector-db"]),
            vec!["stackpilot", "--config", "start-x.toml", "deploy", "vector-db"]
        );
    }

    #[test]
    fn regular_commands_are_untouched() {
        assert_eq!(
            expand(&["stackpilot", "serve-all", "start-x"]),
            vec!["stackpilot", "serve-all", "start-x"]
        );
        assert_eq!(expand(&["stackpilot", "start-"]), vec!["stackpilot", "start-"]);
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["stackpilot", "--json", "-vv", "services"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Services));
    }

    #[test]
    fn parse_serve_all_defaults() {
        let cli = Cli::try_parse_from(["stackpilot", "serve-all"]).unwrap();
        if let Commands::ServeAll(args) = cli.command {
            assert!(args.services.is_empty());
            assert_eq!(args.mode, ServeMode::Session);
            assert!(!args.detach);
        } else {
            panic!("Expected ServeAll command");
        }
    }

    #[test]
    fn parse_serve_all_group_with_services() {
        let cli = Cli::try_parse_from([
            "stackpilot",
            "serve-all",
            "vector-db",
            "functions",
            "--mode",
            "group",
        ])
        .unwrap();
        if let Commands::ServeAll(args) = cli.command {
            assert_eq!(args.services, vec!["vector-db", "functions"]);
            assert_eq!(args.mode, ServeMode::Group);
        } else {
            panic!("Expected ServeAll command");
        }
    }

    #[test]
    fn parse_deploy_flags() {
        let cli =
            Cli::try_parse_from(["stackpilot", "deploy", "llm-api", "--dry-run", "-y"]).unwrap();
        if let Commands::Deploy(args) = cli.command {
            assert_eq!(args.service, "llm-api");
            assert!(args.dry_run);
            assert!(args.yes);
        } else {
            panic!("Expected Deploy command");
        }
    }

    #[test]
    fn deploy_requires_service() {
        assert!(Cli::try_parse_from(["stackpilot", "deploy"]).is_err());
    }
}
