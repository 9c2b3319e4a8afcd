//! Attribute query commands.

use aq_protocol_saml::Attribute;
use tracing::info;

use crate::cli::QueryArgs;
use crate::config::OutputFormat;
use crate::output::{attribute_rows, output_attributes};
use crate::{CliConfig, CliError};

/// Turns `--attribute` flags into requested attributes.
pub fn requested_attributes(args: &QueryArgs) -> Vec<Attribute> {
    args.attributes
        .iter()
        .map(|name| {
            let attribute = Attribute::new(name.as_str());
            match &args.name_format {
                Some(format) => attribute.with_format(format.as_str()),
                None => attribute,
            }
        })
        .collect()
}

/// Prints the SOAP request for a query without sending it.
pub fn run_build(args: QueryArgs, config: &CliConfig) -> crate::CliResult<()> {
    let sp = config.service_provider()?;
    let destination = args
        .destination
        .clone()
        .or_else(|| sp.attribute_query_endpoint().map(str::to_string))
        .ok_or_else(|| {
            CliError::Config(
                "IdP publishes no SOAP attribute service, pass --destination".to_string(),
            )
        })?;

    let attributes = requested_attributes(&args);
    let query = sp.make_attribute_query(&destination, &args.name_id, attributes)?;
    info!(id = %query.id, destination = %destination, "built attribute query");
    println!("{}", query.soap_request().to_xml()?);
    Ok(())
}

/// Sends a query and prints the returned attributes.
pub async fn run_query(
    args: QueryArgs,
    config: &CliConfig,
    format: OutputFormat,
) -> crate::CliResult<()> {
    if args.destination.is_some() {
        return Err(CliError::InvalidArgument(
            "--destination only applies to `build`; queries go to the IdP metadata endpoint"
                .to_string(),
        ));
    }

    let sp = config.service_provider()?;
    let assertion = sp
        .attribute_query(&args.name_id, requested_attributes(&args))
        .await?;
    info!(assertion = %assertion.id, "attribute query answered");
    output_attributes(&attribute_rows(&assertion), format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(attributes: &[&str], name_format: Option<&str>) -> QueryArgs {
        QueryArgs {
            name_id: "user@example.com".to_string(),
            attributes: attributes.iter().map(|a| (*a).to_string()).collect(),
            name_format: name_format.map(str::to_string),
            destination: None,
        }
    }

    #[test]
    fn attributes_carry_name_format() {
        let uri = "urn:oasis:names:tc:SAML:2.0:attrname-format:uri";
        let requested = requested_attributes(&args(&["urn:oid:2.5.4.42", "mail"], Some(uri)));
        assert_eq!(requested.len(), 2);
        assert_eq!(requested[0].name, "urn:oid:2.5.4.42");
        assert!(requested.iter().all(|a| a.name_format.as_deref() == Some(uri)));
        assert!(requested.iter().all(|a| a.values.is_empty()));
    }

    #[test]
    fn no_flags_requests_everything() {
        assert!(requested_attributes(&args(&[], None)).is_empty());
    }

    #[tokio::test]
    async fn query_rejects_destination_override() {
        let mut query = args(&[], None);
        query.destination = Some("https://elsewhere.example.com".to_string());
        let err = run_query(query, &CliConfig::default(), OutputFormat::Json)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }
}
