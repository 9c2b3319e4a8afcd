//! SOAP 1.1 envelope handling for the SAML SOAP binding.

use crate::error::{SamlError, SamlResult};
use crate::types::{Response, SAMLP_NS, SOAP_ENV_NS, XSI_NS};
use crate::xml::{Document, Element, Node};

/// Wraps `payload` in `soapenv:Envelope/soapenv:Body`.
#[must_use]
pub fn wrap_soap(payload: Element) -> Element {
    Element::new("soapenv", "Envelope", SOAP_ENV_NS)
        .with_namespace_decl("soapenv", SOAP_ENV_NS)
        .with_namespace_decl("xsi", XSI_NS)
        .with_child(Element::new("soapenv", "Body", SOAP_ENV_NS).with_child(payload))
}

/// Returns the single element inside `Envelope/Body`.
///
/// # Errors
///
/// Returns an error if the input does not parse, is not a SOAP envelope,
/// or the body holds no element or more than one.
pub fn unwrap_soap(input: &[u8]) -> SamlResult<Element> {
    let envelope = Document::parse(input)?.into_root();
    let body = soap_body(envelope)?;

    let count = body.child_elements().count();
    if count != 1 {
        return Err(SamlError::MissingElement(format!(
            "SOAP Body must contain exactly one element, found {count}"
        )));
    }
    let payload = body.children.into_iter().find_map(|node| match node {
        Node::Element(el) => Some(el),
        Node::Text(_) => None,
    });
    payload.ok_or_else(|| SamlError::MissingElement("SOAP Body payload".to_string()))
}

/// Decodes `soapenv:Envelope/soapenv:Body/samlp:Response` from a parsed
/// envelope, matching every level by namespace.
///
/// # Errors
///
/// Returns an error if any level is missing or in the wrong namespace, or
/// the response itself does not decode.
pub fn decode_response_envelope(envelope: &Element) -> SamlResult<Response> {
    if !envelope.is(SOAP_ENV_NS, "Envelope") {
        return Err(SamlError::InvalidResponse(format!(
            "expected soapenv:Envelope, found {}",
            envelope.qualified_name()
        )));
    }
    let body = envelope
        .find_child(SOAP_ENV_NS, "Body")
        .ok_or_else(|| SamlError::MissingElement("Envelope/Body".to_string()))?;
    let response = body
        .find_child(SAMLP_NS, "Response")
        .ok_or_else(|| SamlError::MissingElement("Envelope/Body/Response".to_string()))?;
    Response::from_element(response)
}

fn soap_body(envelope: Element) -> SamlResult<Element> {
    if !envelope.is(SOAP_ENV_NS, "Envelope") {
        return Err(SamlError::InvalidResponse(format!(
            "expected soapenv:Envelope, found {}",
            envelope.qualified_name()
        )));
    }
    envelope
        .children
        .into_iter()
        .find_map(|node| match node {
            Node::Element(el) if el.is(SOAP_ENV_NS, "Body") => Some(el),
            _ => None,
        })
        .ok_or_else(|| SamlError::MissingElement("Envelope/Body".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SAML_NS;

    #[test]
    fn wrap_declares_envelope_namespaces() {
        let envelope = wrap_soap(Element::new("saml", "Issuer", SAML_NS).with_text("sp"));
        let xml = envelope.to_xml().unwrap();
        assert!(xml.starts_with(
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><soapenv:Body>"#
        ));
    }

    #[test]
    fn unwrap_returns_payload() {
        let payload = Element::new("saml", "Issuer", SAML_NS)
            .with_namespace_decl("saml", SAML_NS)
            .with_text("sp");
        let xml = wrap_soap(payload.clone()).to_xml().unwrap();
        assert_eq!(unwrap_soap(xml.as_bytes()).unwrap(), payload);
    }

    #[test]
    fn unwrap_reports_missing_payload() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body> </s:Body></s:Envelope>"#;
        assert!(matches!(
            unwrap_soap(xml.as_bytes()),
            Err(SamlError::MissingElement(_))
        ));
    }

    #[test]
    fn unwrap_rejects_foreign_envelope() {
        let xml = r#"<s:Envelope xmlns:s="urn:not-soap"><s:Body><x/></s:Body></s:Envelope>"#;
        assert!(unwrap_soap(xml.as_bytes()).is_err());
    }

    #[test]
    fn decode_requires_namespaced_levels() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><Response/></s:Body></s:Envelope>"#;
        let doc = Document::parse(xml.as_bytes()).unwrap();
        assert!(matches!(
            decode_response_envelope(doc.root()),
            Err(SamlError::MissingElement(_))
        ));
    }
}
