//! SAML Response types.
//!
//! Response messages sent by an attribute authority to a service provider.

use chrono::{DateTime, Utc};

use super::{
    instant_attr, required_attr, Assertion, Issuer, Status, SAMLP_NS, SAML_NS, SAML_VERSION,
    XMLDSIG_NS,
};
use crate::error::{SamlError, SamlResult};
use crate::time::format_instant;
use crate::xml::Element;

/// SAML Response.
///
/// Decoded strictly by namespace: only `samlp:Response` with `saml:Issuer`,
/// `samlp:Status` and `saml:Assertion` children is recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Unique identifier for this response.
    pub id: String,

    /// Version of the SAML protocol.
    pub version: String,

    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,

    /// The issuing entity, if stated.
    pub issuer: Option<Issuer>,

    /// The ID of the request this response is for.
    pub in_response_to: Option<String>,

    /// The URL where this response was sent.
    pub destination: Option<String>,

    /// The consent obtained for this response.
    pub consent: Option<String>,

    /// The status of the response.
    pub status: Status,

    /// Plain assertions in document order.
    pub assertions: Vec<Assertion>,

    /// `saml:EncryptedAssertion` elements, kept verbatim for a decryptor.
    pub encrypted_assertions: Vec<Element>,

    /// Whether the response element carried a signature.
    pub signed: bool,
}

impl Response {
    /// Creates a success response answering `in_response_to`.
    #[must_use]
    pub fn success(
        id: impl Into<String>,
        issuer: Issuer,
        in_response_to: impl Into<String>,
        issue_instant: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            version: SAML_VERSION.to_string(),
            issue_instant,
            issuer: Some(issuer),
            in_response_to: Some(in_response_to.into()),
            destination: None,
            consent: None,
            status: Status::success(),
            assertions: Vec::new(),
            encrypted_assertions: Vec::new(),
            signed: false,
        }
    }

    /// Replaces the status.
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Adds an assertion to this response.
    #[must_use]
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Returns true if this response indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Builds the `samlp:Response` element.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("samlp", "Response", SAMLP_NS)
            .with_namespace_decl("samlp", SAMLP_NS)
            .with_namespace_decl("saml", SAML_NS)
            .with_attr("ID", self.id.clone())
            .with_attr("Version", self.version.clone())
            .with_attr("IssueInstant", format_instant(self.issue_instant));
        for (name, value) in [
            ("InResponseTo", &self.in_response_to),
            ("Destination", &self.destination),
            ("Consent", &self.consent),
        ] {
            if let Some(value) = value {
                el.set_attr(name, value.clone());
            }
        }
        if let Some(issuer) = &self.issuer {
            el.push_child(issuer.to_element());
        }
        el.push_child(self.status.to_element());
        for assertion in &self.assertions {
            el.push_child(assertion.to_element());
        }
        for encrypted in &self.encrypted_assertions {
            el.push_child(encrypted.clone());
        }
        el
    }

    /// Decodes a `samlp:Response` element.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is not a protocol response or a
    /// required part is missing or malformed.
    pub fn from_element(el: &Element) -> SamlResult<Self> {
        if !el.is(SAMLP_NS, "Response") {
            return Err(SamlError::InvalidResponse(format!(
                "expected samlp:Response, found {}",
                el.qualified_name()
            )));
        }

        let status = el
            .find_child(SAMLP_NS, "Status")
            .ok_or_else(|| SamlError::MissingElement("Response/Status".to_string()))?;
        let issue_instant = instant_attr(el, "IssueInstant")?
            .ok_or_else(|| SamlError::MissingElement("Response/@IssueInstant".to_string()))?;

        Ok(Self {
            id: required_attr(el, "ID")?.to_string(),
            version: required_attr(el, "Version")?.to_string(),
            issue_instant,
            issuer: el
                .find_child(SAML_NS, "Issuer")
                .map(Issuer::from_element)
                .transpose()?,
            in_response_to: el.attr("InResponseTo").map(str::to_string),
            destination: el.attr("Destination").map(str::to_string),
            consent: el.attr("Consent").map(str::to_string),
            status: Status::from_element(status)?,
            assertions: el
                .find_children(SAML_NS, "Assertion")
                .map(Assertion::from_element)
                .collect::<SamlResult<_>>()?,
            encrypted_assertions: el
                .find_children(SAML_NS, "EncryptedAssertion")
                .cloned()
                .collect(),
            signed: el.find_child(XMLDSIG_NS, "Signature").is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{status_codes, StatusCode};
    use crate::xml::Document;
    use chrono::TimeZone;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn sample() -> Response {
        Response::success(
            "r-1",
            Issuer::entity("https://idp.example.com"),
            "id-abc",
            instant(),
        )
        .with_assertion(Assertion::new(
            "a-1",
            Issuer::entity("https://idp.example.com"),
            instant(),
        ))
    }

    #[test]
    fn element_roundtrip_through_xml() {
        let response = sample();
        let xml = response.to_element().to_xml().unwrap();
        let decoded = Response::from_element(Document::parse(xml.as_bytes()).unwrap().root())
            .unwrap();
        assert_eq!(decoded, response);
        assert!(decoded.is_success());
    }

    #[test]
    fn issuer_is_optional() {
        let mut response = sample();
        response.issuer = None;
        let decoded = Response::from_element(&response.to_element()).unwrap();
        assert!(decoded.issuer.is_none());
    }

    #[test]
    fn decoding_requires_protocol_namespace() {
        let xml = r#"<Response xmlns="urn:oasis:names:tc:SAML:2.0:assertion" ID="r" Version="2.0" IssueInstant="2024-05-01T10:00:00Z"/>"#;
        let doc = Document::parse(xml.as_bytes()).unwrap();
        assert!(Response::from_element(doc.root()).is_err());
    }

    #[test]
    fn issuer_in_wrong_namespace_is_not_recognized() {
        let xml = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="r" Version="2.0" IssueInstant="2024-05-01T10:00:00Z"><samlp:Issuer>evil</samlp:Issuer><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status></samlp:Response>"#;
        let doc = Document::parse(xml.as_bytes()).unwrap();
        let response = Response::from_element(doc.root()).unwrap();
        assert!(response.issuer.is_none());
    }

    #[test]
    fn missing_status_is_rejected() {
        let mut el = sample().to_element();
        el.children
            .retain(|node| !matches!(node, crate::xml::Node::Element(e) if e.name == "Status"));
        assert!(matches!(
            Response::from_element(&el),
            Err(SamlError::MissingElement(_))
        ));
    }

    #[test]
    fn failure_status_is_decoded() {
        let response = sample().with_status(Status::with_code(
            StatusCode::requester().with_sub_status(StatusCode::new("custom:sub")),
        ));
        let decoded = Response::from_element(&response.to_element()).unwrap();
        assert!(!decoded.is_success());
        assert_eq!(
            decoded.status.code_chain(),
            format!("{} custom:sub", status_codes::REQUESTER)
        );
    }
}
