//! # aq-cli
//!
//! Command-line client for SAML 2.0 attribute queries.
//!
//! This crate provides:
//! - Building and printing signed SOAP attribute query requests
//! - Sending queries to an IdP attribute authority and printing the
//!   verified attributes
//! - Inspecting the resolved attribute service endpoint and configuration

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use config::CliConfig;
pub use error::{CliError, CliResult};
