//! Response rejection over the wire.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aq_protocol_saml::xml::{StrictXmlValidator, XmlValidator};
use aq_protocol_saml::{AttributeQueryError, SamlResult, ValidationStage};

use crate::common::{sp_config, AttributeAuthority, Behavior};

/// Runs a query against `behavior` and returns the rejecting stage.
async fn rejected_stage(behavior: Behavior) -> anyhow::Result<(ValidationStage, String)> {
    let authority = AttributeAuthority::start(behavior).await?;
    let sp = authority.service_provider(sp_config())?;

    let err = sp
        .attribute_query("user@example.com", Vec::new())
        .await
        .expect_err("response must be rejected");
    let invalid = err
        .invalid_response()
        .ok_or_else(|| anyhow::anyhow!("expected a rejected response, got {err}"))?;
    Ok((invalid.inspect().stage(), err.to_string()))
}

/// Altering a signed attribute breaks the assertion digest.
#[tokio::test]
async fn test_tampered_assertion_is_rejected() -> anyhow::Result<()> {
    let (stage, message) = rejected_stage(Behavior::Tamper).await?;
    assert_eq!(stage, ValidationStage::Verification);
    assert_eq!(message, "parsing attribute query response: invalid response");
    Ok(())
}

/// The response issuer must be the IdP from metadata.
#[tokio::test]
async fn test_foreign_issuer_is_rejected() -> anyhow::Result<()> {
    let (stage, message) = rejected_stage(Behavior::ForeignIssuer).await?;
    assert_eq!(stage, ValidationStage::Issuer);
    assert!(!message.contains("evil"), "cause leaked: {message}");
    Ok(())
}

/// Duplicate attributes stop at the well-formedness gate.
#[tokio::test]
async fn test_duplicate_attribute_is_rejected() -> anyhow::Result<()> {
    let (stage, _) = rejected_stage(Behavior::DuplicateAttribute).await?;
    assert_eq!(stage, ValidationStage::WellFormedness);
    Ok(())
}

/// Records how often the gate runs, then defers to the strict validator.
#[derive(Default)]
struct CountingValidator {
    calls: AtomicUsize,
}

impl XmlValidator for CountingValidator {
    fn validate(&self, input: &[u8]) -> SamlResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StrictXmlValidator::new().validate(input)
    }
}

/// A replacement gate sees every response exactly once.
#[tokio::test]
async fn test_custom_xml_validator_is_consulted() -> anyhow::Result<()> {
    let authority = AttributeAuthority::start(Behavior::Answer).await?;
    let counter = Arc::new(CountingValidator::default());
    let sp = authority
        .service_provider(sp_config())?
        .with_xml_validator(counter.clone());

    sp.attribute_query("user@example.com", Vec::new()).await?;
    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

    let dup = AttributeAuthority::start(Behavior::DuplicateAttribute).await?;
    let sp = dup
        .service_provider(sp_config())?
        .with_xml_validator(counter.clone());
    let err = sp
        .attribute_query("user@example.com", Vec::new())
        .await
        .expect_err("duplicate attribute must fail");
    assert!(matches!(err, AttributeQueryError::Response(_)));
    assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
    Ok(())
}

/// Replaying an answer to a different query fails correlation.
#[tokio::test]
async fn test_replayed_response_fails_correlation() -> anyhow::Result<()> {
    let authority = AttributeAuthority::start(Behavior::Answer).await?;
    let sp = authority.service_provider(sp_config())?;

    let query = sp.make_attribute_query(&authority.url, "user@example.com", Vec::new())?;
    let body = query.soap_request().to_xml()?;
    let reply = post_query(&authority.url, body).await?;

    let other = sp.make_attribute_query(&authority.url, "user@example.com", Vec::new())?;
    let err = sp
        .parse_xml_attribute_query_response(reply.as_bytes(), &other.id)
        .expect_err("answer belongs to another query");
    assert_eq!(err.inspect().stage(), ValidationStage::Correlation);

    sp.parse_xml_attribute_query_response(reply.as_bytes(), &query.id)?;
    Ok(())
}

/// Posts `body` through the library transport and returns the reply text.
async fn post_query(url: &str, body: String) -> anyhow::Result<String> {
    use aq_protocol_saml::{HttpSoapTransport, SoapTransport};

    let transport = HttpSoapTransport::new(std::time::Duration::from_secs(5))?;
    let reply = transport.post(url, body).await?;
    anyhow::ensure!(reply.status == 200, "unexpected status {}", reply.status);
    Ok(String::from_utf8(reply.body)?)
}
