//! # aq
//!
//! SAML 2.0 attribute query client.

#![forbid(unsafe_code)]

use anyhow::Context;
use aq_cli::{
    cli::{Cli, Command},
    commands::{run_build, run_config, run_endpoint, run_query},
    config::CliConfig,
    output::error,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config =
        CliConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let format = cli.output.unwrap_or(config.output_format);

    let result = match cli.command {
        Command::Build(args) => run_build(args, &config),
        Command::Query(args) => run_query(args, &config, format).await,
        Command::Endpoint => run_endpoint(&config, format),
        Command::Config(cmd) => run_config(cmd, &config, format),
    };

    if let Err(e) = result {
        error(&e.to_string());
        std::process::exit(1);
    }
    Ok(())
}
