//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::OutputFormat;

/// aq - SAML 2.0 attribute query client.
#[derive(Debug, Parser)]
#[command(name = "aq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to ~/.aq/aq.toml).
    #[arg(short, long, env = "AQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format (overrides config).
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the SOAP attribute query request without sending it.
    Build(QueryArgs),

    /// Send an attribute query and print the returned attributes.
    Query(QueryArgs),

    /// Show the IdP attribute service the query would be sent to.
    Endpoint,

    /// Configuration management.
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Subject and attributes of a query.
#[derive(Debug, Clone, clap::Args)]
pub struct QueryArgs {
    /// Subject name ID value.
    pub name_id: String,

    /// Attribute to request (repeatable). All attributes when omitted.
    #[arg(short, long = "attribute")]
    pub attributes: Vec<String>,

    /// Attribute name format URI for requested attributes.
    #[arg(long)]
    pub name_format: Option<String>,

    /// Destination URL (overrides the IdP metadata). `build` only.
    #[arg(long)]
    pub destination: Option<String>,
}

/// Config commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration with key material masked.
    Show,

    /// Print the configuration file path.
    Path,
}
