//! Attribute query round trips.
//!
//! Queries built by the service provider travel over HTTP to the stub
//! attribute authority and the signed answers come back through the full
//! validation pipeline.

use std::collections::HashSet;

use aq_protocol_saml::signature::XmlSignatureValidator;
use aq_protocol_saml::xml::Document;
use aq_protocol_saml::{Attribute, AttributeQueryError, NameIdFormat};

use crate::common::{
    parse_query, signing_sp_config, sp_config, AttributeAuthority, Behavior, Credentials,
    IDP_ENTITY_ID, SP_ENTITY_ID,
};

/// A signed query for a known subject returns its attributes.
#[tokio::test]
async fn test_signed_query_returns_attributes() -> anyhow::Result<()> {
    let authority = AttributeAuthority::start(Behavior::Answer).await?;
    let sp_credentials = Credentials::generate("sp.example.com")?;
    let sp = authority.service_provider(signing_sp_config(&sp_credentials))?;

    let assertion = sp.attribute_query("user@example.com", Vec::new()).await?;

    assert_eq!(assertion.issuer.value, IDP_ENTITY_ID);
    assert!(assertion.signed);
    assert_eq!(assertion.attribute_values("eduPersonPrincipalName"), vec!["jdoe"]);
    assert_eq!(assertion.attribute_values("mail"), vec!["jdoe@example.com"]);
    assert_eq!(
        assertion.attribute_values("eduPersonAffiliation"),
        vec!["staff", "member"]
    );
    Ok(())
}

/// The query on the wire is signed with the SP key and addressed correctly.
#[tokio::test]
async fn test_query_on_the_wire() -> anyhow::Result<()> {
    let authority = AttributeAuthority::start(Behavior::Answer).await?;
    let sp_credentials = Credentials::generate("sp.example.com")?;
    let sp = authority.service_provider(signing_sp_config(&sp_credentials))?;

    sp.attribute_query("user@example.com", vec![Attribute::new("mail")])
        .await?;

    let requests = authority.requests();
    assert_eq!(requests.len(), 1, "expected exactly one SOAP request");

    let query = parse_query(&requests[0])?;
    assert!(query.id.starts_with("id-"));
    assert_eq!(query.destination, authority.url);
    assert_eq!(query.issuer.value, SP_ENTITY_ID);
    assert_eq!(query.attributes.len(), 1);
    assert_eq!(query.attributes[0].name, "mail");

    let name_id = query
        .subject
        .name_id
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("query subject has no NameID"))?;
    assert_eq!(name_id.value, "user@example.com");
    assert_eq!(name_id.parsed_format(), NameIdFormat::Transient);
    assert_eq!(name_id.name_qualifier.as_deref(), Some(IDP_ENTITY_ID));
    assert_eq!(name_id.sp_name_qualifier.as_deref(), Some(SP_ENTITY_ID));

    let document = Document::parse(requests[0].as_bytes())?;
    let (element, scope) = document
        .find_path(&["Envelope", "Body", "AttributeQuery"])
        .ok_or_else(|| anyhow::anyhow!("no AttributeQuery in request"))?;
    XmlSignatureValidator::new(vec![sp_credentials.cert_der.clone()])?.verify(element, &scope)?;
    Ok(())
}

/// Only the requested attributes come back.
#[tokio::test]
async fn test_requested_attributes_only() -> anyhow::Result<()> {
    let authority = AttributeAuthority::start(Behavior::Answer).await?;
    let sp = authority.service_provider(sp_config())?;

    let assertion = sp
        .attribute_query("user@example.com", vec![Attribute::new("mail")])
        .await?;

    let names: Vec<_> = assertion.attributes().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["mail"]);
    Ok(())
}

/// A subject the authority does not know yields an assertion without
/// attributes, not an error.
#[tokio::test]
async fn test_unknown_subject_has_no_attributes() -> anyhow::Result<()> {
    let authority = AttributeAuthority::start(Behavior::Answer).await?;
    let sp = authority.service_provider(sp_config())?;

    let assertion = sp.attribute_query("nobody@example.com", Vec::new()).await?;
    assert_eq!(assertion.attributes().count(), 0);
    Ok(())
}

/// Non-200 answers are reported with their status code.
#[tokio::test]
async fn test_http_error_status() -> anyhow::Result<()> {
    let authority = AttributeAuthority::start(Behavior::HttpStatus(503)).await?;
    let sp = authority.service_provider(sp_config())?;

    let err = sp
        .attribute_query("user@example.com", Vec::new())
        .await
        .expect_err("503 must fail");

    assert!(matches!(err, AttributeQueryError::UnexpectedStatus(503)));
    assert_eq!(err.to_string(), "non-OK status code: 503");
    Ok(())
}

/// An unreachable authority fails in the transport.
#[tokio::test]
async fn test_unreachable_authority() -> anyhow::Result<()> {
    let authority = AttributeAuthority::start(Behavior::Answer).await?;
    let mut metadata = authority.metadata.clone();
    metadata.attribute_authority_descriptors[0].attribute_services[0].location =
        "http://127.0.0.1:1/aa".to_string();
    let sp = aq_protocol_saml::ServiceProvider::new(sp_config(), metadata)?;

    let err = sp
        .attribute_query("user@example.com", Vec::new())
        .await
        .expect_err("nothing listens on port 1");

    assert!(matches!(err, AttributeQueryError::Transport(_)));
    assert!(err.to_string().starts_with("making SOAP post request"));
    Ok(())
}

/// Query IDs never repeat.
#[tokio::test]
async fn test_query_ids_are_unique() -> anyhow::Result<()> {
    let authority = AttributeAuthority::start(Behavior::Answer).await?;
    let sp = authority.service_provider(sp_config())?;

    let mut ids = HashSet::new();
    for _ in 0..10_000 {
        let query = sp.make_attribute_query(&authority.url, "user@example.com", Vec::new())?;
        assert_eq!(query.id.len(), 43);
        assert!(ids.insert(query.id), "duplicate query ID");
    }
    Ok(())
}
