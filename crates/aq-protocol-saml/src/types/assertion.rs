//! SAML Assertion types.
//!
//! Assertions contain statements about a subject made by an issuer. An
//! attribute authority answers an attribute query with an assertion whose
//! attribute statements carry the requested values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    instant_attr, required_attr, Issuer, NameId, SAML_NS, SAML_VERSION, XMLDSIG_NS, XSI_NS, XS_NS,
};
use crate::error::{SamlError, SamlResult};
use crate::time::format_instant;
use crate::xml::Element;

/// SAML Assertion.
///
/// A package of information that supplies one or more statements made
/// by a SAML authority (the issuer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    /// Unique identifier for this assertion.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    pub version: String,

    /// Timestamp when this assertion was issued.
    pub issue_instant: DateTime<Utc>,

    /// The identity provider that issued this assertion.
    pub issuer: Issuer,

    /// The subject of this assertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,

    /// Conditions that must be evaluated for the assertion to be valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,

    /// Attribute statements about the subject.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_statements: Vec<AttributeStatement>,

    /// Whether the assertion element carried a signature.
    #[serde(skip)]
    pub signed: bool,
}

impl Assertion {
    /// Creates a new assertion.
    #[must_use]
    pub fn new(id: impl Into<String>, issuer: Issuer, issue_instant: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            version: SAML_VERSION.to_string(),
            issue_instant,
            issuer,
            subject: None,
            conditions: None,
            attribute_statements: Vec::new(),
            signed: false,
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Adds an attribute statement.
    #[must_use]
    pub fn with_attribute_statement(mut self, statement: AttributeStatement) -> Self {
        self.attribute_statements.push(statement);
        self
    }

    /// Iterates over the attributes of every attribute statement.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attribute_statements
            .iter()
            .flat_map(|statement| statement.attributes.iter())
    }

    /// Returns the values of the attributes whose `Name` or `FriendlyName`
    /// equals `name`, in document order.
    #[must_use]
    pub fn attribute_values(&self, name: &str) -> Vec<&str> {
        self.attributes()
            .filter(|attr| attr.name == name || attr.friendly_name.as_deref() == Some(name))
            .flat_map(|attr| attr.values.iter().map(|v| v.value.as_str()))
            .collect()
    }

    /// Builds the `saml:Assertion` element.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("saml", "Assertion", SAML_NS)
            .with_namespace_decl("saml", SAML_NS)
            .with_attr("ID", self.id.clone())
            .with_attr("Version", self.version.clone())
            .with_attr("IssueInstant", format_instant(self.issue_instant))
            .with_child(self.issuer.to_element());
        if let Some(subject) = &self.subject {
            el.push_child(subject.to_element());
        }
        if let Some(conditions) = &self.conditions {
            el.push_child(conditions.to_element());
        }
        for statement in &self.attribute_statements {
            el.push_child(statement.to_element());
        }
        el
    }

    /// Decodes a `saml:Assertion` element.
    ///
    /// Statements other than attribute statements are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is not an assertion or a required
    /// part is missing or malformed.
    pub fn from_element(el: &Element) -> SamlResult<Self> {
        if !el.is(SAML_NS, "Assertion") {
            return Err(SamlError::InvalidAssertion(format!(
                "expected saml:Assertion, found {}",
                el.qualified_name()
            )));
        }

        let issuer = el
            .find_child(SAML_NS, "Issuer")
            .ok_or_else(|| SamlError::MissingElement("Assertion/Issuer".to_string()))?;
        let issue_instant = instant_attr(el, "IssueInstant")?
            .ok_or_else(|| SamlError::MissingElement("Assertion/@IssueInstant".to_string()))?;

        Ok(Self {
            id: required_attr(el, "ID")?.to_string(),
            version: required_attr(el, "Version")?.to_string(),
            issue_instant,
            issuer: Issuer::from_element(issuer)?,
            subject: el
                .find_child(SAML_NS, "Subject")
                .map(Subject::from_element)
                .transpose()?,
            conditions: el
                .find_child(SAML_NS, "Conditions")
                .map(Conditions::from_element)
                .transpose()?,
            attribute_statements: el
                .find_children(SAML_NS, "AttributeStatement")
                .map(AttributeStatement::from_element)
                .collect::<SamlResult<_>>()?,
            signed: el.find_child(XMLDSIG_NS, "Signature").is_some(),
        })
    }
}

/// Subject of an assertion or query.
///
/// Identifies the principal that is the subject of all statements in the assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// The name identifier for the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id: Option<NameId>,

    /// Subject confirmation data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_confirmations: Vec<SubjectConfirmation>,
}

impl Subject {
    /// Creates a new subject with a name ID.
    #[must_use]
    pub fn new(name_id: NameId) -> Self {
        Self {
            name_id: Some(name_id),
            subject_confirmations: Vec::new(),
        }
    }

    /// Adds a subject confirmation.
    #[must_use]
    pub fn with_confirmation(mut self, confirmation: SubjectConfirmation) -> Self {
        self.subject_confirmations.push(confirmation);
        self
    }

    /// Builds the `saml:Subject` element.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("saml", "Subject", SAML_NS);
        if let Some(name_id) = &self.name_id {
            el.push_child(name_id.to_element());
        }
        for confirmation in &self.subject_confirmations {
            el.push_child(confirmation.to_element());
        }
        el
    }

    pub(crate) fn from_element(el: &Element) -> SamlResult<Self> {
        Ok(Self {
            name_id: el
                .find_child(SAML_NS, "NameID")
                .map(NameId::from_element)
                .transpose()?,
            subject_confirmations: el
                .find_children(SAML_NS, "SubjectConfirmation")
                .map(SubjectConfirmation::from_element)
                .collect::<SamlResult<_>>()?,
        })
    }
}

/// Subject confirmation.
///
/// Information that allows the assertion consumer to confirm the subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectConfirmation {
    /// The confirmation method.
    pub method: String,

    /// Additional confirmation data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_confirmation_data: Option<SubjectConfirmationData>,
}

impl SubjectConfirmation {
    /// Bearer confirmation method URI.
    pub const BEARER: &'static str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";

    /// Creates a bearer confirmation.
    #[must_use]
    pub fn bearer() -> Self {
        Self {
            method: Self::BEARER.to_string(),
            subject_confirmation_data: None,
        }
    }

    /// Sets the confirmation data.
    #[must_use]
    pub fn with_data(mut self, data: SubjectConfirmationData) -> Self {
        self.subject_confirmation_data = Some(data);
        self
    }

    fn to_element(&self) -> Element {
        let mut el = Element::new("saml", "SubjectConfirmation", SAML_NS)
            .with_attr("Method", self.method.clone());
        if let Some(data) = &self.subject_confirmation_data {
            el.push_child(data.to_element());
        }
        el
    }

    fn from_element(el: &Element) -> SamlResult<Self> {
        Ok(Self {
            method: required_attr(el, "Method")?.to_string(),
            subject_confirmation_data: el
                .find_child(SAML_NS, "SubjectConfirmationData")
                .map(SubjectConfirmationData::from_element)
                .transpose()?,
        })
    }
}

/// Subject confirmation data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectConfirmationData {
    /// The request ID that this assertion responds to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// Time after which the subject can no longer be confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Time before which the subject cannot be confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// The location to which the assertion can be presented.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,

    /// IP address of the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl SubjectConfirmationData {
    /// Creates confirmation data answering `request_id`, valid until
    /// `not_on_or_after`.
    #[must_use]
    pub fn for_request(request_id: impl Into<String>, not_on_or_after: DateTime<Utc>) -> Self {
        Self {
            in_response_to: Some(request_id.into()),
            not_on_or_after: Some(not_on_or_after),
            ..Self::default()
        }
    }

    fn to_element(&self) -> Element {
        let mut el = Element::new("saml", "SubjectConfirmationData", SAML_NS);
        if let Some(not_before) = self.not_before {
            el.set_attr("NotBefore", format_instant(not_before));
        }
        if let Some(not_on_or_after) = self.not_on_or_after {
            el.set_attr("NotOnOrAfter", format_instant(not_on_or_after));
        }
        if let Some(recipient) = &self.recipient {
            el.set_attr("Recipient", recipient.clone());
        }
        if let Some(in_response_to) = &self.in_response_to {
            el.set_attr("InResponseTo", in_response_to.clone());
        }
        if let Some(address) = &self.address {
            el.set_attr("Address", address.clone());
        }
        el
    }

    fn from_element(el: &Element) -> SamlResult<Self> {
        Ok(Self {
            in_response_to: el.attr("InResponseTo").map(str::to_string),
            not_on_or_after: instant_attr(el, "NotOnOrAfter")?,
            not_before: instant_attr(el, "NotBefore")?,
            recipient: el.attr("Recipient").map(str::to_string),
            address: el.attr("Address").map(str::to_string),
        })
    }
}

/// Conditions for assertion validity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    /// Time before which the assertion is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,

    /// Time at or after which the assertion is not valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Audience restrictions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audience_restrictions: Vec<AudienceRestriction>,
}

impl Conditions {
    /// Creates conditions valid from `not_before` until `not_on_or_after`.
    #[must_use]
    pub fn with_validity(not_before: DateTime<Utc>, not_on_or_after: DateTime<Utc>) -> Self {
        Self {
            not_before: Some(not_before),
            not_on_or_after: Some(not_on_or_after),
            audience_restrictions: Vec::new(),
        }
    }

    /// Adds an audience restriction.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience_restrictions.push(AudienceRestriction {
            audiences: vec![audience.into()],
        });
        self
    }

    fn to_element(&self) -> Element {
        let mut el = Element::new("saml", "Conditions", SAML_NS);
        if let Some(not_before) = self.not_before {
            el.set_attr("NotBefore", format_instant(not_before));
        }
        if let Some(not_on_or_after) = self.not_on_or_after {
            el.set_attr("NotOnOrAfter", format_instant(not_on_or_after));
        }
        for restriction in &self.audience_restrictions {
            let mut child = Element::new("saml", "AudienceRestriction", SAML_NS);
            for audience in &restriction.audiences {
                child.push_child(
                    Element::new("saml", "Audience", SAML_NS).with_text(audience.clone()),
                );
            }
            el.push_child(child);
        }
        el
    }

    fn from_element(el: &Element) -> SamlResult<Self> {
        Ok(Self {
            not_before: instant_attr(el, "NotBefore")?,
            not_on_or_after: instant_attr(el, "NotOnOrAfter")?,
            audience_restrictions: el
                .find_children(SAML_NS, "AudienceRestriction")
                .map(|restriction| AudienceRestriction {
                    audiences: restriction
                        .find_children(SAML_NS, "Audience")
                        .map(|a| a.text().trim().to_string())
                        .collect(),
                })
                .collect(),
        })
    }
}

/// Audience restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceRestriction {
    /// List of valid audiences.
    pub audiences: Vec<String>,
}

/// Attribute statement.
///
/// Contains attributes about the subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeStatement {
    /// List of attributes.
    pub attributes: Vec<Attribute>,
}

impl AttributeStatement {
    /// Creates a new empty attribute statement.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attr: Attribute) -> Self {
        self.attributes.push(attr);
        self
    }

    fn to_element(&self) -> Element {
        let mut el = Element::new("saml", "AttributeStatement", SAML_NS);
        for attr in &self.attributes {
            el.push_child(attr.to_element());
        }
        el
    }

    fn from_element(el: &Element) -> SamlResult<Self> {
        Ok(Self {
            attributes: el
                .find_children(SAML_NS, "Attribute")
                .map(Attribute::from_element)
                .collect::<SamlResult<_>>()?,
        })
    }
}

/// SAML Attribute.
///
/// In a query, an attribute without values asks for all of its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// The attribute name (typically a URI).
    pub name: String,

    /// The format of the attribute name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_format: Option<String>,

    /// A human-readable name for the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// The attribute values.
    #[serde(default)]
    pub values: Vec<AttributeValue>,
}

impl Attribute {
    /// Creates an attribute without values.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            name_format: None,
            friendly_name: None,
            values: Vec::new(),
        }
    }

    /// Creates a new attribute with a single `xs:string` value.
    #[must_use]
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name).with_value(AttributeValue::string(value))
    }

    /// Sets the friendly name.
    #[must_use]
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    /// Sets the name format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.name_format = Some(format.into());
        self
    }

    /// Appends a value.
    #[must_use]
    pub fn with_value(mut self, value: AttributeValue) -> Self {
        self.values.push(value);
        self
    }

    /// Builds the `saml:Attribute` element. Empty names and formats are omitted.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("saml", "Attribute", SAML_NS);
        if let Some(friendly_name) = self.friendly_name.as_deref().filter(|n| !n.is_empty()) {
            el.set_attr("FriendlyName", friendly_name);
        }
        if !self.name.is_empty() {
            el.set_attr("Name", self.name.clone());
        }
        if let Some(name_format) = self.name_format.as_deref().filter(|f| !f.is_empty()) {
            el.set_attr("NameFormat", name_format);
        }
        for value in &self.values {
            el.push_child(value.to_element());
        }
        el
    }

    pub(crate) fn from_element(el: &Element) -> SamlResult<Self> {
        Ok(Self {
            name: required_attr(el, "Name")?.to_string(),
            name_format: el.attr("NameFormat").map(str::to_string),
            friendly_name: el.attr("FriendlyName").map(str::to_string),
            values: el
                .find_children(SAML_NS, "AttributeValue")
                .map(|value| AttributeValue {
                    value_type: value.attr_ns(XSI_NS, "type").map(str::to_string),
                    value: value.text(),
                })
                .collect(),
        })
    }
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    /// The `xsi:type` of the value, such as `xs:string`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    /// Text content.
    pub value: String,
}

impl AttributeValue {
    /// Creates an `xs:string` value.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value_type: Some("xs:string".to_string()),
            value: value.into(),
        }
    }

    fn to_element(&self) -> Element {
        let el = Element::new("saml", "AttributeValue", SAML_NS);
        let el = match &self.value_type {
            Some(value_type) => el
                .with_namespace_decl("xs", XS_NS)
                .with_namespace_decl("xsi", XSI_NS)
                .with_ns_attr("xsi", "type", XSI_NS, value_type.clone()),
            None => el,
        };
        el.with_text(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NameIdFormat;
    use crate::xml::Document;
    use chrono::TimeZone;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn sample() -> Assertion {
        Assertion::new("a-1", Issuer::entity("https://idp.example.com"), instant())
            .with_subject(
                Subject::new(NameId::new("user@example.com").with_format(NameIdFormat::Email))
                    .with_confirmation(SubjectConfirmation::bearer().with_data(
                        SubjectConfirmationData::for_request(
                            "id-abc",
                            instant() + chrono::Duration::minutes(5),
                        ),
                    )),
            )
            .with_conditions(
                Conditions::with_validity(instant(), instant() + chrono::Duration::minutes(5))
                    .with_audience("https://sp.example.com"),
            )
            .with_attribute_statement(
                AttributeStatement::new()
                    .with_attribute(
                        Attribute::single("urn:oid:1.3.6.1.4.1.5923.1.1.1.6", "jdoe")
                            .with_friendly_name("eduPersonPrincipalName"),
                    )
                    .with_attribute(
                        Attribute::new("roles")
                            .with_value(AttributeValue::string("admin"))
                            .with_value(AttributeValue::string("user")),
                    ),
            )
    }

    #[test]
    fn attribute_values_match_name_or_friendly_name() {
        let assertion = sample();
        assert_eq!(assertion.attribute_values("eduPersonPrincipalName"), vec!["jdoe"]);
        assert_eq!(
            assertion.attribute_values("urn:oid:1.3.6.1.4.1.5923.1.1.1.6"),
            vec!["jdoe"]
        );
        assert_eq!(assertion.attribute_values("roles"), vec!["admin", "user"]);
        assert!(assertion.attribute_values("mail").is_empty());
    }

    #[test]
    fn element_roundtrip_through_xml() {
        let assertion = sample();
        let xml = assertion.to_element().to_xml().unwrap();
        let doc = Document::parse(xml.as_bytes()).unwrap();
        let decoded = Assertion::from_element(doc.root()).unwrap();
        assert_eq!(decoded, assertion);
    }

    #[test]
    fn attribute_element_layout() {
        let el = Attribute::new("urn:oid:0.9.2342.19200300.100.1.3")
            .with_friendly_name("mail")
            .with_format(crate::types::attribute_name_formats::URI)
            .to_element();
        assert_eq!(el.qualified_name(), "saml:Attribute");
        assert_eq!(el.attr("FriendlyName"), Some("mail"));
        assert_eq!(el.attr("Name"), Some("urn:oid:0.9.2342.19200300.100.1.3"));
        assert_eq!(el.child_elements().count(), 0);
    }

    #[test]
    fn typed_value_declares_schema_namespaces() {
        let el = AttributeValue::string("jdoe").to_element();
        assert_eq!(el.attr_ns(XSI_NS, "type"), Some("xs:string"));
        assert!(el.namespace_decls.iter().any(|(p, uri)| p == "xs" && uri == XS_NS));
    }

    #[test]
    fn missing_issue_instant_is_rejected() {
        let mut el = sample().to_element();
        el.attributes.retain(|a| a.name != "IssueInstant");
        assert!(matches!(
            Assertion::from_element(&el),
            Err(SamlError::MissingElement(_))
        ));
    }

    #[test]
    fn wrong_namespace_is_rejected() {
        let mut el = sample().to_element();
        el.namespace = Some("urn:other".to_string());
        assert!(Assertion::from_element(&el).is_err());
    }
}
