//! Identity provider metadata model.
//!
//! Only the pieces an attribute requester needs: the IdP's entity ID, its
//! attribute authority endpoints and the certificates it signs with. Reading
//! these from a metadata XML document is left to the caller.

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{SamlError, SamlResult};
use crate::types::SOAP_BINDING;

/// Identity provider metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpMetadata {
    /// The IdP's entity ID. Response and assertion issuers must equal it.
    pub entity_id: String,

    /// `AttributeAuthorityDescriptor` roles.
    #[serde(default)]
    pub attribute_authority_descriptors: Vec<AttributeAuthorityDescriptor>,

    /// Signing certificates, base64 DER as in `ds:X509Certificate`.
    #[serde(default)]
    pub signing_certificates: Vec<String>,
}

/// An attribute authority role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeAuthorityDescriptor {
    /// Endpoints accepting attribute queries.
    #[serde(default)]
    pub attribute_services: Vec<Endpoint>,
}

/// A protocol endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Binding URI.
    pub binding: String,
    /// Endpoint URL.
    pub location: String,
}

impl Endpoint {
    /// Creates a SOAP binding endpoint.
    #[must_use]
    pub fn soap(location: impl Into<String>) -> Self {
        Self {
            binding: SOAP_BINDING.to_string(),
            location: location.into(),
        }
    }
}

impl IdpMetadata {
    /// Creates metadata with a single SOAP attribute service.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, attribute_service: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            attribute_authority_descriptors: vec![AttributeAuthorityDescriptor {
                attribute_services: vec![Endpoint::soap(attribute_service)],
            }],
            signing_certificates: Vec::new(),
        }
    }

    /// Adds a DER signing certificate.
    #[must_use]
    pub fn with_signing_certificate(mut self, der: &[u8]) -> Self {
        self.signing_certificates
            .push(base64::engine::general_purpose::STANDARD.encode(der));
        self
    }

    /// Returns the first attribute service using the SOAP binding.
    ///
    /// Services are searched in document order across all attribute
    /// authority descriptors.
    #[must_use]
    pub fn attribute_query_endpoint(&self) -> Option<&str> {
        let mut candidates = self
            .attribute_authority_descriptors
            .iter()
            .flat_map(|d| &d.attribute_services)
            .filter(|s| s.binding == SOAP_BINDING);

        let first = candidates.next()?;
        let others = candidates.count();
        if others > 0 {
            warn!(
                idp = %self.entity_id,
                chosen = %first.location,
                ignored = others,
                "IdP publishes several SOAP attribute services, using the first"
            );
        }
        Some(first.location.as_str())
    }

    /// Decodes the signing certificates.
    ///
    /// # Errors
    ///
    /// Returns an error if a certificate is not valid base64.
    pub fn trusted_certificates(&self) -> SamlResult<Vec<Vec<u8>>> {
        self.signing_certificates
            .iter()
            .map(|cert| {
                let compact: String = cert.chars().filter(|c| !c.is_whitespace()).collect();
                base64::engine::general_purpose::STANDARD
                    .decode(compact)
                    .map_err(|e| SamlError::Config(format!("invalid IdP certificate: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_soap_service_wins() {
        let metadata = IdpMetadata {
            entity_id: "https://idp.example.com".to_string(),
            attribute_authority_descriptors: vec![
                AttributeAuthorityDescriptor {
                    attribute_services: vec![Endpoint {
                        binding: "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST".to_string(),
                        location: "https://idp.example.com/post".to_string(),
                    }],
                },
                AttributeAuthorityDescriptor {
                    attribute_services: vec![
                        Endpoint::soap("https://idp.example.com/soap/1"),
                        Endpoint::soap("https://idp.example.com/soap/2"),
                    ],
                },
            ],
            signing_certificates: Vec::new(),
        };
        assert_eq!(
            metadata.attribute_query_endpoint(),
            Some("https://idp.example.com/soap/1")
        );
    }

    #[test]
    fn no_soap_service() {
        let mut metadata = IdpMetadata::new("https://idp.example.com", "unused");
        metadata.attribute_authority_descriptors[0].attribute_services[0].binding =
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect".to_string();
        assert_eq!(metadata.attribute_query_endpoint(), None);
        assert_eq!(IdpMetadata::default().attribute_query_endpoint(), None);
    }

    #[test]
    fn certificates_decode_with_whitespace() {
        let mut metadata =
            IdpMetadata::new("idp", "https://idp/soap").with_signing_certificate(b"der");
        assert_eq!(metadata.trusted_certificates().unwrap(), vec![b"der".to_vec()]);

        metadata.signing_certificates[0] = "ZG\n Vy".to_string();
        assert_eq!(metadata.trusted_certificates().unwrap(), vec![b"der".to_vec()]);

        metadata.signing_certificates.push("***".to_string());
        assert!(matches!(
            metadata.trusted_certificates(),
            Err(SamlError::Config(_))
        ));
    }

    #[test]
    fn deserializes_from_json() {
        let metadata: IdpMetadata = serde_json::from_str(
            r#"{
                "entity_id": "https://idp.example.com",
                "attribute_authority_descriptors": [
                    {"attribute_services": [
                        {"binding": "urn:oasis:names:tc:SAML:2.0:bindings:SOAP",
                         "location": "https://idp.example.com/aa"}
                    ]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(metadata.attribute_query_endpoint(), Some("https://idp.example.com/aa"));
        assert!(metadata.signing_certificates.is_empty());
    }
}
