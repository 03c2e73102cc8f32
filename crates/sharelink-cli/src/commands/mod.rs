//! CLI command definitions and dispatch.

pub mod config;
pub mod inspect;
pub mod provision;
pub mod sql;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use sqlx::PgConnection;

use crate::output::OutputFormat;
use sharelink_core::config::{DEFAULT_CONFIG_FILE, DEFAULT_ENV_FILE, ProvisionConfig};
use sharelink_core::error::AppError;

/// Provision the share_links table, its indexes and row-level-security policies
#[derive(Debug, Parser)]
#[command(name = "sharelink", version, about, long_about = None)]
pub struct Cli {
    /// Env file holding DATABASE_URL
    #[arg(long, global = true, default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,

    /// Path to the optional TOML configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute (defaults to `provision`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the table, indexes and policies if missing, then verify
    Provision,
    /// Compare the live schema with the expected one
    Inspect,
    /// Print the provisioning SQL without connecting
    Sql,
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = load_config(&self.env_file, &self.config)?;
        crate::init_logging(&config.logging);
        tracing::debug!(
            env_file = %self.env_file.display(),
            config_file = %self.config,
            "Configuration loaded"
        );

        match &self.command {
            None | Some(Commands::Provision) => provision::execute(&config, self.format).await,
            Some(Commands::Inspect) => inspect::execute(&config, self.format).await,
            Some(Commands::Sql) => sql::execute(self.format),
            Some(Commands::Config(args)) => config::execute(args, &config, self.format),
        }
    }
}

/// Helper: load configuration from the env file and optional TOML file
pub fn load_config(env_file: &Path, config_path: &str) -> Result<ProvisionConfig, AppError> {
    ProvisionConfig::load(env_file, config_path)
}

/// Helper: open the single provisioning connection
pub async fn connect(config: &ProvisionConfig) -> Result<PgConnection, AppError> {
    let url = config.database_url()?;
    sharelink_database::connect(url, &config.database).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_provision() {
        let cli = Cli::try_parse_from(["sharelink"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.env_file, PathBuf::from(".env.local"));
        assert_eq!(cli.config, "config/provision.toml");
        assert_eq!(cli.format, OutputFormat::Table);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sharelink",
            "inspect",
            "--env-file",
            ".env.staging",
            "--format",
            "json",
        ])
        .unwrap();

        assert!(matches!(cli.command, Some(Commands::Inspect)));
        assert_eq!(cli.env_file, PathBuf::from(".env.staging"));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_config_subcommand() {
        let cli = Cli::try_parse_from(["sharelink", "config", "validate"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config(config::ConfigArgs {
                command: config::ConfigCommand::Validate
            }))
        ));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["sharelink", "--format", "yaml"]).is_err());
    }
}
