//! Service provider: builds, signs and sends attribute queries, and
//! validates the answers.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{SamlError, SamlResult};
use crate::metadata::IdpMetadata;
use crate::signature::{SignatureMethod, SigningContext, XmlSigner};
use crate::transport::{HttpSoapTransport, SoapTransport, TransportError};
use crate::types::{
    Assertion, Attribute, AttributeQuery, Issuer, NameId, NameIdFormat, Subject, SAML_VERSION,
    XMLDSIG_NS,
};
use crate::validator::{
    InvalidResponseError, ResponseValidator, ResponseVerifier, XmlResponseVerifier,
};
use crate::xml::XmlValidator;

fn default_http_timeout_secs() -> u64 {
    30
}

/// Service provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProviderConfig {
    /// Entity ID. When empty the metadata URL is used instead.
    #[serde(default)]
    pub entity_id: String,

    /// URL the SP publishes its metadata at.
    #[serde(default)]
    pub metadata_url: String,

    /// Name ID format URI for query subjects. Unset means transient; the
    /// unspecified format omits the `Format` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_id_format: Option<String>,

    /// Signature method URI. Queries are signed only when this is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_method: Option<String>,

    /// PEM private key (PKCS#8 or PKCS#1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_pem: Option<String>,

    /// PEM certificate embedded in signatures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_pem: Option<String>,

    /// Attribute service request timeout.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Accept SHA-1 signatures from the IdP.
    #[serde(default)]
    pub allow_sha1: bool,
}

impl Default for ServiceProviderConfig {
    fn default() -> Self {
        Self {
            entity_id: String::new(),
            metadata_url: String::new(),
            name_id_format: None,
            signature_method: None,
            private_key_pem: None,
            certificate_pem: None,
            http_timeout_secs: default_http_timeout_secs(),
            allow_sha1: false,
        }
    }
}

impl ServiceProviderConfig {
    /// Creates a configuration for `entity_id`.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            ..Self::default()
        }
    }

    /// Returns the entity ID, falling back to the metadata URL.
    #[must_use]
    pub fn effective_entity_id(&self) -> &str {
        if self.entity_id.is_empty() {
            &self.metadata_url
        } else {
            &self.entity_id
        }
    }

    /// Returns the `Format` written on query subjects, if any.
    #[must_use]
    pub fn subject_name_id_format(&self) -> Option<&str> {
        match self.name_id_format.as_deref() {
            None | Some("") => Some(NameIdFormat::Transient.uri()),
            Some(format) if format == NameIdFormat::Unspecified.uri() => None,
            Some(format) => Some(format),
        }
    }

    /// Parses the configured signature method.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown URI.
    pub fn parsed_signature_method(&self) -> SamlResult<Option<SignatureMethod>> {
        self.signature_method
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .map(|uri| {
                SignatureMethod::from_uri(uri).ok_or_else(|| {
                    SamlError::Config(format!("unsupported signature method {uri:?}"))
                })
            })
            .transpose()
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Attribute query failures.
#[derive(Debug, Error)]
pub enum AttributeQueryError {
    /// The SP or IdP configuration cannot support the query.
    #[error("{0}")]
    Config(String),

    /// The query could not be signed.
    #[error("signing attribute query: {0}")]
    Signing(#[source] SamlError),

    /// The SOAP request could not be serialized.
    #[error("writing to request buffer: {0}")]
    Serialize(#[source] SamlError),

    /// The request did not complete.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The attribute service answered with a status other than 200.
    #[error("non-OK status code: {0}")]
    UnexpectedStatus(u16),

    /// The response was rejected.
    #[error("parsing attribute query response: {0}")]
    Response(#[source] InvalidResponseError),
}

impl AttributeQueryError {
    /// Returns the rejected-response error, if that is what this is.
    #[must_use]
    pub const fn invalid_response(&self) -> Option<&InvalidResponseError> {
        match self {
            Self::Response(err) => Some(err),
            _ => None,
        }
    }
}

/// A SAML service provider acting as attribute requester.
///
/// Shared read-only; every operation takes `&self`.
#[derive(Clone)]
pub struct ServiceProvider {
    config: ServiceProviderConfig,
    idp: IdpMetadata,
    signature_method: Option<SignatureMethod>,
    signer: Option<Arc<dyn SigningContext>>,
    transport: Arc<dyn SoapTransport>,
    clock: Arc<dyn Clock>,
    validator: ResponseValidator,
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("entity_id", &self.config.effective_entity_id())
            .field("idp", &self.idp.entity_id)
            .field("signature_method", &self.signature_method)
            .finish_non_exhaustive()
    }
}

impl ServiceProvider {
    /// Creates a service provider from its configuration and the IdP's
    /// metadata.
    ///
    /// A signer is built when a private key is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the key, certificate or signature method is
    /// invalid, or the HTTP client cannot be created.
    pub fn new(config: ServiceProviderConfig, idp: IdpMetadata) -> SamlResult<Self> {
        let signature_method = config.parsed_signature_method()?;
        let signer = match (&config.private_key_pem, signature_method) {
            (Some(key), method) => {
                let mut signer = XmlSigner::from_pem(key, config.certificate_pem.as_deref())?;
                if let Some(method) = method {
                    signer = signer.with_signature_method(method)?;
                }
                Some(Arc::new(signer) as Arc<dyn SigningContext>)
            }
            (None, _) => None,
        };
        let transport = HttpSoapTransport::new(config.http_timeout())
            .map_err(|e| SamlError::Config(e.to_string()))?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let verifier = XmlResponseVerifier::new().allow_sha1(config.allow_sha1);
        let validator = ResponseValidator::new(Arc::new(verifier)).with_clock(clock.clone());

        Ok(Self {
            config,
            idp,
            signature_method,
            signer,
            transport: Arc::new(transport),
            clock,
            validator,
        })
    }

    /// Uses `signer` for queries. Queries are signed from now on.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn SigningContext>) -> Self {
        self.signature_method = Some(signer.signature_method());
        self.signer = Some(signer);
        self
    }

    /// Replaces the SOAP transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn SoapTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Replaces the time source used for queries and validation.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.validator = self.validator.with_clock(clock.clone());
        self.clock = clock;
        self
    }

    /// Replaces the well-formedness gate.
    #[must_use]
    pub fn with_xml_validator(mut self, xml_validator: Arc<dyn XmlValidator>) -> Self {
        self.validator = self.validator.with_xml_validator(xml_validator);
        self
    }

    /// Replaces the deep response verifier.
    #[must_use]
    pub fn with_response_verifier(mut self, verifier: Arc<dyn ResponseVerifier>) -> Self {
        self.validator = self.validator.with_verifier(verifier);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ServiceProviderConfig {
        &self.config
    }

    /// Returns the IdP metadata.
    #[must_use]
    pub const fn idp_metadata(&self) -> &IdpMetadata {
        &self.idp
    }

    /// Returns the IdP's SOAP attribute service URL.
    #[must_use]
    pub fn attribute_query_endpoint(&self) -> Option<&str> {
        self.idp.attribute_query_endpoint()
    }

    /// Builds a fresh query for `name_id`, signed when a signature method is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeQueryError::Signing`] if signing fails.
    pub fn make_attribute_query(
        &self,
        idp_url: &str,
        name_id: &str,
        attributes: Vec<Attribute>,
    ) -> Result<AttributeQuery, AttributeQueryError> {
        let sp_entity_id = self.config.effective_entity_id();
        let name_id = NameId {
            value: name_id.to_string(),
            format: self.config.subject_name_id_format().map(str::to_string),
            name_qualifier: Some(self.idp.entity_id.clone()),
            sp_name_qualifier: Some(sp_entity_id.to_string()),
            sp_provided_id: None,
        };

        let mut query = AttributeQuery {
            id: aq_crypto::generate_request_id(),
            version: SAML_VERSION.to_string(),
            issue_instant: self.clock.now(),
            destination: idp_url.to_string(),
            consent: None,
            issuer: Issuer::entity(sp_entity_id),
            signature: None,
            subject: Subject::new(name_id),
            attributes,
        };

        if self.signature_method.is_some() {
            self.sign_attribute_query(&mut query)
                .map_err(AttributeQueryError::Signing)?;
        }
        debug!(
            id = %query.id,
            destination = idp_url,
            signed = query.signature.is_some(),
            "attribute query built"
        );
        Ok(query)
    }

    /// Signs `query`, storing the enveloped signature in
    /// [`AttributeQuery::signature`].
    ///
    /// # Errors
    ///
    /// Returns an error if no private key is configured or signing fails.
    pub fn sign_attribute_query(&self, query: &mut AttributeQuery) -> SamlResult<()> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| SamlError::Config("no private key configured".to_string()))?;

        query.signature = None;
        let signed = signer.sign_enveloped(&query.to_element())?;
        let signature = signed
            .child_elements()
            .last()
            .filter(|el| el.is(XMLDSIG_NS, "Signature"))
            .ok_or_else(|| {
                SamlError::SignatureCreation("signature was not appended".to_string())
            })?;
        query.signature = Some(signature.clone());
        Ok(())
    }

    /// Validates a SOAP response to the query `request_id`.
    ///
    /// Rejections are logged with their stage and cause; the returned error
    /// reveals neither.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidResponseError`] if any validation stage fails.
    pub fn parse_xml_attribute_query_response(
        &self,
        raw: &[u8],
        request_id: &str,
    ) -> Result<Assertion, InvalidResponseError> {
        self.validator
            .validate(raw, request_id, &self.idp, self.config.effective_entity_id())
            .inspect_err(|err| {
                let diagnostics = err.inspect();
                warn!(
                    request_id,
                    stage = %diagnostics.stage(),
                    cause = %diagnostics.cause,
                    "attribute query response rejected"
                );
                trace!(response = diagnostics.response, "rejected response body");
            })
    }

    /// Queries the IdP's attribute service for `name_id` and returns the
    /// verified assertion.
    ///
    /// # Errors
    ///
    /// Returns an error if no SOAP attribute service is known, the query
    /// cannot be built or sent, the service does not answer 200, or the
    /// response is rejected.
    pub async fn attribute_query(
        &self,
        name_id: &str,
        attributes: Vec<Attribute>,
    ) -> Result<Assertion, AttributeQueryError> {
        let endpoint = match self.attribute_query_endpoint() {
            Some(url) if !url.trim().is_empty() => url,
            Some(_) => {
                return Err(AttributeQueryError::Config(format!(
                    "IdP {} SOAP attribute service has an empty location",
                    self.idp.entity_id
                )));
            }
            None => {
                return Err(AttributeQueryError::Config(format!(
                    "IdP {} publishes no SOAP attribute service",
                    self.idp.entity_id
                )));
            }
        };

        let query = self.make_attribute_query(endpoint, name_id, attributes)?;
        let body = query
            .soap_request()
            .to_xml()
            .map_err(AttributeQueryError::Serialize)?;

        let reply = self.transport.post(endpoint, body).await?;
        if reply.status != 200 {
            return Err(AttributeQueryError::UnexpectedStatus(reply.status));
        }

        self.parse_xml_attribute_query_response(&reply.body, &query.id)
            .map_err(AttributeQueryError::Response)
    }
}
