//! XML Signature validation.
//!
//! Verifies an enveloped signature on the element it is a direct child of.
//! Only the shapes [`XmlSigner`](super::XmlSigner) and mainstream IdPs
//! produce are accepted: a single `Reference` to the parent's `ID`, the
//! enveloped-signature transform, and exclusive canonicalization.

use base64::Engine;

use super::{DigestMethod, SignatureMethod};
use crate::error::{SamlError, SamlResult};
use crate::types::{canonicalization_algorithms, transform_algorithms, XMLDSIG_NS};
use crate::xml::{canonicalize, Element, Namespaces};

/// Namespace of the `InclusiveNamespaces` element.
const EXC_C14N_NS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// XML signature validator.
///
/// Validates enveloped signatures against a fixed set of trusted
/// certificates.
#[derive(Debug, Clone)]
pub struct XmlSignatureValidator {
    /// Trusted certificates (DER) with their extracted public keys.
    trusted: Vec<(Vec<u8>, Vec<u8>)>,
    allow_sha1: bool,
}

impl XmlSignatureValidator {
    /// Creates a validator trusting the given DER certificates.
    ///
    /// # Errors
    ///
    /// Returns an error if a certificate cannot be parsed.
    pub fn new(certificates: Vec<Vec<u8>>) -> SamlResult<Self> {
        let trusted = certificates
            .into_iter()
            .map(|der| {
                let public_key = aq_crypto::public_key_from_certificate(&der)?;
                Ok((der, public_key))
            })
            .collect::<SamlResult<Vec<_>>>()?;
        Ok(Self {
            trusted,
            allow_sha1: false,
        })
    }

    /// Accepts RSA-SHA1 signatures and SHA-1 digests.
    #[must_use]
    pub const fn allow_sha1(mut self, allow: bool) -> Self {
        self.allow_sha1 = allow;
        self
    }

    /// Returns the number of trusted certificates.
    #[must_use]
    pub fn trusted_count(&self) -> usize {
        self.trusted.len()
    }

    /// Returns true if `element` has a direct `ds:Signature` child.
    #[must_use]
    pub fn is_signed(element: &Element) -> bool {
        element.find_child(XMLDSIG_NS, "Signature").is_some()
    }

    /// Verifies the enveloped signature on `element`.
    ///
    /// `inherited` holds the namespaces declared by the element's ancestors.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] if the element is unsigned,
    /// the signature does not follow the accepted profile, the digest does not
    /// match, or no trusted certificate verifies the signature value.
    pub fn verify(&self, element: &Element, inherited: &Namespaces) -> SamlResult<()> {
        let mut signatures = element.find_children(XMLDSIG_NS, "Signature");
        let signature = signatures.next().ok_or_else(|| invalid("element is not signed"))?;
        if signatures.next().is_some() {
            return Err(invalid("more than one Signature element"));
        }

        let signed_info = child(signature, "SignedInfo")?;
        let c14n_method = child(signed_info, "CanonicalizationMethod")?;
        if c14n_method.attr("Algorithm") != Some(canonicalization_algorithms::EXCLUSIVE_C14N) {
            return Err(invalid(format!(
                "unsupported canonicalization method {:?}",
                c14n_method.attr("Algorithm").unwrap_or_default()
            )));
        }

        let signature_method = child(signed_info, "SignatureMethod")?
            .attr("Algorithm")
            .and_then(SignatureMethod::from_uri)
            .ok_or_else(|| invalid("unsupported signature method"))?;
        if signature_method.is_deprecated() && !self.allow_sha1 {
            return Err(invalid(format!(
                "{} is not allowed",
                signature_method.uri()
            )));
        }

        self.verify_reference(element, inherited, signed_info)?;

        let element_scope = element.in_scope(inherited);
        let signed_info_scope = signature.in_scope(&element_scope);
        let canonical_signed_info = canonicalize(
            signed_info,
            &signed_info_scope,
            &inclusive_prefixes(c14n_method),
        );

        let signature_value = decode_base64(&child(signature, "SignatureValue")?.text())?;
        let algorithm = signature_method.crypto_algorithm();

        for public_key in self.candidate_keys(signature)? {
            if aq_crypto::verify(
                public_key,
                algorithm,
                canonical_signed_info.as_bytes(),
                &signature_value,
            )? {
                return Ok(());
            }
        }
        Err(invalid("signature value does not verify with a trusted certificate"))
    }

    fn verify_reference(
        &self,
        element: &Element,
        inherited: &Namespaces,
        signed_info: &Element,
    ) -> SamlResult<()> {
        let mut references = signed_info.find_children(XMLDSIG_NS, "Reference");
        let reference = references.next().ok_or_else(|| invalid("missing Reference"))?;
        if references.next().is_some() {
            return Err(invalid("more than one Reference"));
        }

        let id = element
            .attr("ID")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| invalid("signed element has no ID"))?;
        let expected_uri = format!("#{id}");
        if reference.attr("URI") != Some(expected_uri.as_str()) {
            return Err(invalid(format!(
                "Reference URI {:?} does not identify the signed element",
                reference.attr("URI").unwrap_or_default()
            )));
        }

        let mut enveloped = false;
        let mut prefixes = Vec::new();
        if let Some(transforms) = reference.find_child(XMLDSIG_NS, "Transforms") {
            for transform in transforms.find_children(XMLDSIG_NS, "Transform") {
                match transform.attr("Algorithm") {
                    Some(transform_algorithms::ENVELOPED_SIGNATURE) => enveloped = true,
                    Some(transform_algorithms::EXCLUSIVE_C14N) => {
                        prefixes.extend(inclusive_prefixes(transform));
                    }
                    other => {
                        return Err(invalid(format!(
                            "unsupported transform {:?}",
                            other.unwrap_or_default()
                        )));
                    }
                }
            }
        }
        if !enveloped {
            return Err(invalid("missing enveloped-signature transform"));
        }

        let digest_method = child(reference, "DigestMethod")?
            .attr("Algorithm")
            .and_then(DigestMethod::from_uri)
            .ok_or_else(|| invalid("unsupported digest method"))?;
        if digest_method.is_deprecated() && !self.allow_sha1 {
            return Err(invalid(format!("{} is not allowed", digest_method.uri())));
        }

        let expected = decode_base64(&child(reference, "DigestValue")?.text())?;
        let canonical = canonicalize(&element.without_signature(), inherited, &prefixes);
        let actual = aq_crypto::digest(digest_method.hash_algorithm(), canonical.as_bytes());
        if actual != expected {
            return Err(invalid("digest value mismatch"));
        }
        Ok(())
    }

    /// Keys to try: the embedded certificate's key if it is trusted, every
    /// trusted key if none is embedded.
    fn candidate_keys(&self, signature: &Element) -> SamlResult<Vec<&[u8]>> {
        let embedded = signature
            .find_child(XMLDSIG_NS, "KeyInfo")
            .and_then(|k| k.find_child(XMLDSIG_NS, "X509Data"))
            .and_then(|x| x.find_child(XMLDSIG_NS, "X509Certificate"));

        match embedded {
            Some(cert) => {
                let der = decode_base64(&cert.text())?;
                self.trusted
                    .iter()
                    .find(|(trusted, _)| *trusted == der)
                    .map(|(_, key)| vec![key.as_slice()])
                    .ok_or_else(|| invalid("embedded certificate is not trusted"))
            }
            None => Ok(self.trusted.iter().map(|(_, key)| key.as_slice()).collect()),
        }
    }
}

fn invalid(message: impl Into<String>) -> SamlError {
    SamlError::SignatureInvalid(message.into())
}

fn child<'a>(parent: &'a Element, name: &str) -> SamlResult<&'a Element> {
    parent
        .find_child(XMLDSIG_NS, name)
        .ok_or_else(|| invalid(format!("missing {name} in {}", parent.name)))
}

fn decode_base64(text: &str) -> SamlResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| invalid(format!("invalid base64: {e}")))
}

fn inclusive_prefixes(method: &Element) -> Vec<String> {
    method
        .find_child(EXC_C14N_NS, "InclusiveNamespaces")
        .and_then(|el| el.attr("PrefixList"))
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{SigningContext, XmlSigner};
    use crate::soap::wrap_soap;
    use crate::types::{SAMLP_NS, SAML_NS};
    use crate::xml::{Document, Node};
    use rcgen::{generate_simple_self_signed, CertifiedKey};

    struct Fixture {
        signer: XmlSigner,
        cert_der: Vec<u8>,
    }

    fn fixture() -> Fixture {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec!["idp.example.com".to_string()]).unwrap();
        let signer = XmlSigner::from_pem(&key_pair.serialize_pem(), Some(&cert.pem())).unwrap();
        Fixture {
            signer,
            cert_der: cert.der().to_vec(),
        }
    }

    fn response() -> Element {
        Element::new("samlp", "Response", SAMLP_NS)
            .with_namespace_decl("samlp", SAMLP_NS)
            .with_namespace_decl("saml", SAML_NS)
            .with_attr("ID", "id-response")
            .with_child(
                Element::new("saml", "Issuer", SAML_NS).with_text("https://idp.example.com"),
            )
    }

    fn reparse(element: &Element) -> Element {
        Document::parse(element.to_xml().unwrap().as_bytes())
            .unwrap()
            .into_root()
    }

    #[test]
    fn sign_then_verify() {
        let f = fixture();
        let signed = reparse(&f.signer.sign_enveloped(&response()).unwrap());
        let validator = XmlSignatureValidator::new(vec![f.cert_der]).unwrap();
        validator.verify(&signed, &Namespaces::new()).unwrap();
    }

    #[test]
    fn verifies_inside_soap_envelope() {
        let f = fixture();
        let envelope = wrap_soap(f.signer.sign_enveloped(&response()).unwrap());
        let doc = Document::parse(envelope.to_xml().unwrap().as_bytes()).unwrap();
        let (inner, scope) = doc.find_path(&["Envelope", "Body", "Response"]).unwrap();

        let validator = XmlSignatureValidator::new(vec![f.cert_der]).unwrap();
        validator.verify(inner, &scope).unwrap();
    }

    #[test]
    fn tampered_content_fails_digest() {
        let f = fixture();
        let mut signed = f.signer.sign_enveloped(&response()).unwrap();
        signed.children.insert(
            0,
            Node::Element(Element::new("saml", "Issuer", SAML_NS).with_text("evil")),
        );

        let validator = XmlSignatureValidator::new(vec![f.cert_der]).unwrap();
        let err = validator.verify(&signed, &Namespaces::new()).unwrap_err();
        assert!(err.to_string().contains("digest"));
    }

    #[test]
    fn untrusted_embedded_certificate_is_rejected() {
        let f = fixture();
        let other = fixture();
        let signed = f.signer.sign_enveloped(&response()).unwrap();

        let validator = XmlSignatureValidator::new(vec![other.cert_der]).unwrap();
        let err = validator.verify(&signed, &Namespaces::new()).unwrap_err();
        assert!(err.to_string().contains("not trusted"));
    }

    #[test]
    fn signature_without_key_info_tries_trusted_keys() {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec!["idp.example.com".to_string()]).unwrap();
        let signer = XmlSigner::from_pem(&key_pair.serialize_pem(), None).unwrap();
        let signed = signer.sign_enveloped(&response()).unwrap();

        let unrelated = fixture();
        let validator =
            XmlSignatureValidator::new(vec![unrelated.cert_der, cert.der().to_vec()]).unwrap();
        validator.verify(&signed, &Namespaces::new()).unwrap();
    }

    #[test]
    fn reference_must_target_signed_element() {
        let f = fixture();
        let mut signed = f.signer.sign_enveloped(&response()).unwrap();
        signed.set_attr("ID", "id-other");

        let validator = XmlSignatureValidator::new(vec![f.cert_der]).unwrap();
        let err = validator.verify(&signed, &Namespaces::new()).unwrap_err();
        assert!(err.to_string().contains("Reference URI"));
    }

    #[test]
    fn rejects_two_signatures() {
        let f = fixture();
        let signed = f.signer.sign_enveloped(&response()).unwrap();
        let extra = signed.find_child(XMLDSIG_NS, "Signature").unwrap().clone();
        let doubled = signed.with_child(extra);

        let validator = XmlSignatureValidator::new(vec![f.cert_der]).unwrap();
        assert!(validator.verify(&doubled, &Namespaces::new()).is_err());
    }

    #[test]
    fn unsigned_element_is_rejected() {
        let f = fixture();
        let validator = XmlSignatureValidator::new(vec![f.cert_der]).unwrap();
        assert!(!XmlSignatureValidator::is_signed(&response()));
        assert!(matches!(
            validator.verify(&response(), &Namespaces::new()),
            Err(SamlError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn invalid_certificate_is_rejected_up_front() {
        assert!(XmlSignatureValidator::new(vec![b"garbage".to_vec()]).is_err());
    }
}
