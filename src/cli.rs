//! CLI for the kryptos orchestrator
//!
//! One command today: `serve`, which is also the default when no subcommand
//! is given.

use clap::{Parser, Subcommand};

/// Kryptos orchestration service
#[derive(Parser, Debug)]
#[command(name = "kryptos")]
#[command(about = "Orchestrator for the kryptos multi-agent cryptography assistant")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the orchestration server (default)
    Serve {
        /// Listen port, overriding the configured value
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Run the parsed command.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve { port }) => crate::server::run(port).await,
        None => crate::server::run(None).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_port_override() {
        let cli = Cli::parse_from(["kryptos", "serve", "--port", "9000"]);
        match cli.command {
            Some(Commands::Serve { port }) => assert_eq!(port, Some(9000)),
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn test_no_subcommand_defaults_to_serve() {
        let cli = Cli::parse_from(["kryptos"]);
        assert!(cli.command.is_none());
    }
}
