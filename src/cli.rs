//! Command-line interface.

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "pulmoscan")]
#[command(about = "Chest X-ray classification service with per-patient records and PDF reports")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API (default)
    Serve,

    /// Create an operator account
    CreateOperator {
        #[arg(long)]
        username: String,

        #[arg(long, default_value = "")]
        display_name: String,

        /// Read from the environment so it stays out of shell history
        #[arg(long, env = "PULMOSCAN_OPERATOR_PASSWORD", hide_env_values = true)]
        password: String,

        /// Grant access to every operator's records
        #[arg(long)]
        admin: bool,
    },
}
