//! SAML AttributeQuery.
//!
//! A request from a service provider asking an attribute authority for
//! attributes of a subject (SAML core, section 3.3.2.3).

use chrono::{DateTime, Utc};

use super::{
    instant_attr, required_attr, Attribute, Issuer, Subject, SAMLP_NS, SAML_NS, XMLDSIG_NS,
};
use crate::error::{SamlError, SamlResult};
use crate::soap::wrap_soap;
use crate::time::format_instant;
use crate::xml::Element;

/// SAML AttributeQuery.
///
/// Once [`signature`](Self::signature) is set the query must not be changed:
/// the signature covers the canonical form of every other field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeQuery {
    /// Unique, unpredictable request identifier.
    pub id: String,

    /// Protocol version, always "2.0".
    pub version: String,

    /// When the query was created.
    pub issue_instant: DateTime<Utc>,

    /// Attribute service URL the query is sent to. Omitted when empty.
    pub destination: String,

    /// Consent URI. Omitted when unset or empty.
    pub consent: Option<String>,

    /// The requesting service provider.
    pub issuer: Issuer,

    /// Enveloped `ds:Signature`, present once signed.
    pub signature: Option<Element>,

    /// The subject whose attributes are requested.
    pub subject: Subject,

    /// Requested attributes; empty asks for everything the requester may see.
    pub attributes: Vec<Attribute>,
}

impl AttributeQuery {
    /// Builds the `samlp:AttributeQuery` element.
    ///
    /// Children appear as `Issuer`, `Signature`, `Subject`, then one
    /// `Attribute` per requested attribute.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("samlp", "AttributeQuery", SAMLP_NS)
            .with_namespace_decl("saml", SAML_NS)
            .with_namespace_decl("samlp", SAMLP_NS)
            .with_attr("ID", self.id.clone())
            .with_attr("Version", self.version.clone())
            .with_attr("IssueInstant", format_instant(self.issue_instant));
        if !self.destination.is_empty() {
            el.set_attr("Destination", self.destination.clone());
        }
        if let Some(consent) = self.consent.as_deref().filter(|c| !c.is_empty()) {
            el.set_attr("Consent", consent);
        }

        el.push_child(self.issuer.to_element());
        if let Some(signature) = &self.signature {
            el.push_child(signature.clone());
        }
        el.push_child(self.subject.to_element());
        for attribute in &self.attributes {
            el.push_child(attribute.to_element());
        }
        el
    }

    /// Returns the query inside a SOAP 1.1 envelope.
    #[must_use]
    pub fn soap_request(&self) -> Element {
        wrap_soap(self.to_element())
    }

    /// Decodes a `samlp:AttributeQuery` element.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is not an attribute query or a
    /// required part is missing or malformed.
    pub fn from_element(el: &Element) -> SamlResult<Self> {
        if !el.is(SAMLP_NS, "AttributeQuery") {
            return Err(SamlError::InvalidResponse(format!(
                "expected samlp:AttributeQuery, found {}",
                el.qualified_name()
            )));
        }

        let issuer = el
            .find_child(SAML_NS, "Issuer")
            .ok_or_else(|| SamlError::MissingElement("AttributeQuery/Issuer".to_string()))?;
        let subject = el
            .find_child(SAML_NS, "Subject")
            .ok_or_else(|| SamlError::MissingElement("AttributeQuery/Subject".to_string()))?;
        let issue_instant = instant_attr(el, "IssueInstant")?.ok_or_else(|| {
            SamlError::MissingElement("AttributeQuery/@IssueInstant".to_string())
        })?;

        Ok(Self {
            id: required_attr(el, "ID")?.to_string(),
            version: required_attr(el, "Version")?.to_string(),
            issue_instant,
            destination: el.attr("Destination").unwrap_or_default().to_string(),
            consent: el.attr("Consent").map(str::to_string),
            issuer: Issuer::from_element(issuer)?,
            signature: el.find_child(XMLDSIG_NS, "Signature").cloned(),
            subject: Subject::from_element(subject)?,
            attributes: el
                .find_children(SAML_NS, "Attribute")
                .map(Attribute::from_element)
                .collect::<SamlResult<_>>()?,
        })
    }
}
