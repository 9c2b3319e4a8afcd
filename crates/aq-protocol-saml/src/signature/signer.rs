//! XML Signature creation.
//!
//! Produces enveloped signatures over a single element: one `Reference` to
//! the element's `ID`, the enveloped-signature and exclusive C14N
//! transforms, and the signer's certificate in `KeyInfo`.

use aq_crypto::{pem_to_der, SigningKey};
use base64::Engine;

use super::{DigestMethod, SignatureMethod, SigningContext};
use crate::error::{SamlError, SamlResult};
use crate::types::{canonicalization_algorithms, transform_algorithms, XMLDSIG_NS};
use crate::xml::{canonicalize, Element, Namespaces};

/// XML document signer.
///
/// Signs SAML messages with the configured private key.
pub struct XmlSigner {
    key: SigningKey,
    certificate_der: Option<Vec<u8>>,
    signature_method: SignatureMethod,
    digest_method: DigestMethod,
}

impl std::fmt::Debug for XmlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlSigner")
            .field("signature_method", &self.signature_method)
            .field("digest_method", &self.digest_method)
            .field("has_certificate", &self.certificate_der.is_some())
            .finish_non_exhaustive()
    }
}

impl XmlSigner {
    /// Creates a signer using the key's default algorithm.
    #[must_use]
    pub fn new(key: SigningKey, certificate_der: Option<Vec<u8>>) -> Self {
        let signature_method = SignatureMethod::from_crypto_algorithm(key.algorithm());
        Self {
            key,
            certificate_der,
            signature_method,
            digest_method: signature_method.digest_method(),
        }
    }

    /// Creates a new signer from PEM-encoded key and certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if either PEM block is malformed or the key type is
    /// not supported.
    pub fn from_pem(private_key_pem: &str, certificate_pem: Option<&str>) -> SamlResult<Self> {
        let key = SigningKey::from_pem(private_key_pem)?;
        let certificate_der = certificate_pem
            .map(|pem| {
                let block = pem_to_der(pem)?;
                if block.label == "CERTIFICATE" {
                    Ok(block.der)
                } else {
                    Err(SamlError::Config(format!(
                        "expected a CERTIFICATE PEM block, found {:?}",
                        block.label
                    )))
                }
            })
            .transpose()?;
        Ok(Self::new(key, certificate_der))
    }

    /// Switches to another signature method supported by the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot produce `method` signatures.
    /// SHA-1 is never used to sign.
    pub fn with_signature_method(mut self, method: SignatureMethod) -> SamlResult<Self> {
        if method.is_deprecated() {
            return Err(SamlError::Config(format!(
                "{} is accepted for verification only",
                method.uri()
            )));
        }
        self.key = self.key.with_algorithm(method.crypto_algorithm())?;
        self.signature_method = method;
        self.digest_method = method.digest_method();
        Ok(self)
    }

    /// Returns the DER certificate embedded in signatures, if any.
    #[must_use]
    pub fn certificate_der(&self) -> Option<&[u8]> {
        self.certificate_der.as_deref()
    }

    fn signed_info(&self, reference_id: &str, digest_b64: String) -> Element {
        let ds = |name: &str| Element::new("ds", name, XMLDSIG_NS);
        let transform = |algorithm: &str| ds("Transform").with_attr("Algorithm", algorithm);

        ds("SignedInfo")
            .with_child(
                ds("CanonicalizationMethod")
                    .with_attr("Algorithm", canonicalization_algorithms::EXCLUSIVE_C14N),
            )
            .with_child(ds("SignatureMethod").with_attr("Algorithm", self.signature_method.uri()))
            .with_child(
                ds("Reference")
                    .with_attr("URI", format!("#{reference_id}"))
                    .with_child(
                        ds("Transforms")
                            .with_child(transform(transform_algorithms::ENVELOPED_SIGNATURE))
                            .with_child(transform(transform_algorithms::EXCLUSIVE_C14N)),
                    )
                    .with_child(ds("DigestMethod").with_attr("Algorithm", self.digest_method.uri()))
                    .with_child(ds("DigestValue").with_text(digest_b64)),
            )
    }
}

impl SigningContext for XmlSigner {
    fn signature_method(&self) -> SignatureMethod {
        self.signature_method
    }

    fn sign_enveloped(&self, element: &Element) -> SamlResult<Element> {
        let reference_id = element
            .attr("ID")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SamlError::SignatureCreation("element has no ID".to_string()))?;
        let b64 = base64::engine::general_purpose::STANDARD;

        let canonical = canonicalize(&element.without_signature(), &Namespaces::new(), &[]);
        let digest = aq_crypto::digest(self.digest_method.hash_algorithm(), canonical.as_bytes());

        let signed_info = self.signed_info(reference_id, b64.encode(digest));
        let canonical_signed_info = canonicalize(&signed_info, &Namespaces::new(), &[]);
        let signature_value = self
            .key
            .sign(canonical_signed_info.as_bytes())
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;

        let mut signature = Element::new("ds", "Signature", XMLDSIG_NS)
            .with_namespace_decl("ds", XMLDSIG_NS)
            .with_child(signed_info)
            .with_child(
                Element::new("ds", "SignatureValue", XMLDSIG_NS)
                    .with_text(b64.encode(signature_value)),
            );
        if let Some(cert) = &self.certificate_der {
            signature.push_child(
                Element::new("ds", "KeyInfo", XMLDSIG_NS).with_child(
                    Element::new("ds", "X509Data", XMLDSIG_NS).with_child(
                        Element::new("ds", "X509Certificate", XMLDSIG_NS)
                            .with_text(b64.encode(cert)),
                    ),
                ),
            );
        }

        let mut signed = element.clone();
        signed.push_child(signature);
        Ok(signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SAMLP_NS;
    use rcgen::{generate_simple_self_signed, CertifiedKey};

    fn signer() -> XmlSigner {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec!["sp.example.com".to_string()]).unwrap();
        XmlSigner::from_pem(&key_pair.serialize_pem(), Some(&cert.pem())).unwrap()
    }

    fn query() -> Element {
        Element::new("samlp", "AttributeQuery", SAMLP_NS)
            .with_namespace_decl("samlp", SAMLP_NS)
            .with_attr("ID", "id-1")
    }

    #[test]
    fn signature_is_appended_last() {
        let signed = signer().sign_enveloped(&query()).unwrap();
        let last = signed.child_elements().last().unwrap();
        assert!(last.is(XMLDSIG_NS, "Signature"));
        assert!(last
            .find_child(XMLDSIG_NS, "KeyInfo")
            .and_then(|k| k.find_child(XMLDSIG_NS, "X509Data"))
            .and_then(|x| x.find_child(XMLDSIG_NS, "X509Certificate"))
            .is_some());
    }

    #[test]
    fn reference_targets_element_id() {
        let signed = signer().sign_enveloped(&query()).unwrap();
        let reference = signed
            .find_child(XMLDSIG_NS, "Signature")
            .and_then(|s| s.find_child(XMLDSIG_NS, "SignedInfo"))
            .and_then(|s| s.find_child(XMLDSIG_NS, "Reference"))
            .unwrap();
        assert_eq!(reference.attr("URI"), Some("#id-1"));
    }

    #[test]
    fn rcgen_keys_default_to_ecdsa_p256() {
        assert_eq!(signer().signature_method(), SignatureMethod::EcdsaSha256);
    }

    #[test]
    fn element_without_id_is_rejected() {
        let el = Element::new("samlp", "AttributeQuery", SAMLP_NS);
        assert!(matches!(
            signer().sign_enveloped(&el),
            Err(SamlError::SignatureCreation(_))
        ));
    }

    #[test]
    fn sha1_cannot_be_selected_for_signing() {
        assert!(signer().with_signature_method(SignatureMethod::RsaSha1).is_err());
        assert!(signer().with_signature_method(SignatureMethod::RsaSha256).is_err());
    }

    #[test]
    fn debug_hides_key_material() {
        let rendered = format!("{:?}", signer());
        assert!(rendered.contains("EcdsaSha256"));
        assert!(!rendered.contains("PRIVATE"));
    }
}
