//! CLI argument definitions for flowsentry-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Flowsentry alert pipeline daemon.
///
/// Orchestrates the classifier registry, prediction cache, alert
/// stream, and analytics refresher, and manages their lifecycles.
#[derive(Parser, Debug)]
#[command(name = "flowsentry-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to flowsentry.toml configuration file.
    #[arg(short, long, default_value = "/etc/flowsentry/flowsentry.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Run the three-phase evaluation harness for one model
    /// (or "all" for every registered model), print the report
    /// as JSON, and exit.
    #[arg(long, value_name = "MODEL")]
    pub eval: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let cli = DaemonCli::parse_from(["flowsentry-daemon"]);
        assert_eq!(
            cli.config,
            PathBuf::from("/etc/flowsentry/flowsentry.toml")
        );
        assert!(!cli.validate);
        assert!(cli.eval.is_none());
    }

    #[test]
    fn parses_eval_flag() {
        let cli = DaemonCli::parse_from(["flowsentry-daemon", "--eval", "syn-flood"]);
        assert_eq!(cli.eval.as_deref(), Some("syn-flood"));
    }
}
