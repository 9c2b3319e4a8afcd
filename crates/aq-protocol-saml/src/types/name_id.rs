//! SAML Name ID and Issuer types.
//!
//! Name identifiers are used to identify subjects in SAML assertions and
//! attribute queries; an issuer is a name identifier for the sending entity.

use serde::{Deserialize, Serialize};

use super::{NameIdFormat, SAML_NS};
use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

/// SAML Name ID.
///
/// Represents the identifier of a subject in a SAML assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    /// The actual identifier value.
    pub value: String,

    /// The format of the name identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// The security or administrative domain that qualifies the name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,

    /// The service provider's entity ID that qualifies the name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,

    /// A provider identifier for the SP that was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_provided_id: Option<String>,
}

impl NameId {
    /// Creates a new name ID with the given value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            name_qualifier: None,
            sp_name_qualifier: None,
            sp_provided_id: None,
        }
    }

    /// Creates a new transient name ID.
    #[must_use]
    pub fn transient(value: impl Into<String>) -> Self {
        Self::new(value).with_format(NameIdFormat::Transient)
    }

    /// Sets the format for this name ID.
    #[must_use]
    pub fn with_format(mut self, format: NameIdFormat) -> Self {
        self.format = Some(format.uri().to_string());
        self
    }

    /// Sets the name qualifier.
    #[must_use]
    pub fn with_name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.name_qualifier = Some(qualifier.into());
        self
    }

    /// Sets the SP name qualifier.
    #[must_use]
    pub fn with_sp_name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.sp_name_qualifier = Some(qualifier.into());
        self
    }

    /// Returns the parsed name ID format.
    ///
    /// A missing or unknown format reads as unspecified.
    #[must_use]
    pub fn parsed_format(&self) -> NameIdFormat {
        self.format
            .as_deref()
            .and_then(NameIdFormat::from_uri)
            .unwrap_or(NameIdFormat::Unspecified)
    }

    /// Builds the `saml:NameID` element. Empty qualifiers are omitted.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("saml", "NameID", SAML_NS);
        for (name, value) in [
            ("NameQualifier", &self.name_qualifier),
            ("SPNameQualifier", &self.sp_name_qualifier),
            ("Format", &self.format),
            ("SPProvidedID", &self.sp_provided_id),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                el.set_attr(name, value);
            }
        }
        el.with_text(self.value.clone())
    }

    /// Decodes a `saml:NameID` element.
    ///
    /// # Errors
    ///
    /// Returns an error if `el` is not a `NameID` in the assertion namespace.
    pub fn from_element(el: &Element) -> SamlResult<Self> {
        expect_element(el, "NameID")?;
        Ok(Self {
            value: el.text(),
            format: el.attr("Format").map(str::to_string),
            name_qualifier: el.attr("NameQualifier").map(str::to_string),
            sp_name_qualifier: el.attr("SPNameQualifier").map(str::to_string),
            sp_provided_id: el.attr("SPProvidedID").map(str::to_string),
        })
    }
}

/// The entity that produced a SAML message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    /// Entity identifier.
    pub value: String,

    /// Name identifier format, normally the entity format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Issuer {
    /// Creates an issuer in the `entity` name ID format.
    #[must_use]
    pub fn entity(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: Some(NameIdFormat::Entity.uri().to_string()),
        }
    }

    /// Builds the `saml:Issuer` element.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("saml", "Issuer", SAML_NS);
        if let Some(format) = self.format.as_deref().filter(|f| !f.is_empty()) {
            el.set_attr("Format", format);
        }
        el.with_text(self.value.clone())
    }

    /// Decodes a `saml:Issuer` element.
    ///
    /// # Errors
    ///
    /// Returns an error if `el` is not an `Issuer` in the assertion namespace.
    pub fn from_element(el: &Element) -> SamlResult<Self> {
        expect_element(el, "Issuer")?;
        Ok(Self {
            value: el.text(),
            format: el.attr("Format").map(str::to_string),
        })
    }
}

fn expect_element(el: &Element, name: &str) -> SamlResult<()> {
    if el.is(SAML_NS, name) {
        Ok(())
    } else {
        Err(SamlError::InvalidResponse(format!(
            "expected saml:{name}, found {}",
            el.qualified_name()
        )))
    }
}
