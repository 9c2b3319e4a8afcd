//! Attribute service endpoint command.

use serde::Serialize;

use crate::config::OutputFormat;
use crate::output::output_single;
use crate::{CliConfig, CliError};

/// The attribute service a query would be sent to.
#[derive(Debug, Serialize)]
struct EndpointInfo<'a> {
    idp: &'a str,
    location: &'a str,
    services: usize,
}

/// Shows the IdP's SOAP attribute service.
pub fn run_endpoint(config: &CliConfig, format: OutputFormat) -> crate::CliResult<()> {
    let location = config.idp.attribute_query_endpoint().ok_or_else(|| {
        CliError::Config(format!(
            "IdP {:?} publishes no SOAP attribute service",
            config.idp.entity_id
        ))
    })?;

    if matches!(format, OutputFormat::Quiet) {
        println!("{location}");
        return Ok(());
    }

    let services = config
        .idp
        .attribute_authority_descriptors
        .iter()
        .map(|d| d.attribute_services.len())
        .sum();
    output_single(
        &EndpointInfo {
            idp: &config.idp.entity_id,
            location,
            services,
        },
        format,
    )
}
