//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "jobsync", version, about = "Job feed ingestion service")]
pub struct Cli {
    /// Path to a configuration file (skips layered config loading)
    #[arg(long, env = "JOBSYNC_CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the ingestion service: worker pool, cron scheduler, and
    /// stalled-run reconciler
    Serve,

    /// Run one import inline (no queue) and print the result as JSON
    Import {
        /// Import only this feed URL instead of all configured feeds
        #[arg(long)]
        feed: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve() {
        let cli = Cli::try_parse_from(["jobsync", "serve"]).unwrap();
        assert!(matches!(cli.command, Command::Serve));
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_import_with_feed() {
        let cli = Cli::try_parse_from([
            "jobsync",
            "import",
            "--feed",
            "https://feeds.test/a",
        ])
        .unwrap();
        match cli.command {
            Command::Import { feed } => {
                assert_eq!(feed.as_deref(), Some("https://feeds.test/a"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_global_config_flag() {
        let cli = Cli::try_parse_from(["jobsync", "serve", "--config", "jobsync.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("jobsync.toml")));
    }
}
