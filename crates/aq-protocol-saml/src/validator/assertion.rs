//! Default deep verifier: signatures, decryption and assertion conditions.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{AssertionDecryptor, ResponseVerifier, Verification, VerificationInput};
use crate::error::{SamlError, SamlResult};
use crate::signature::XmlSignatureValidator;
use crate::time::{after, before, delta, format_instant};
use crate::types::{Assertion, MAX_CLOCK_SKEW, MAX_ISSUE_DELAY, SAML_NS, SAML_VERSION};
use crate::xml::{Element, Node};

/// Verifies response and assertion signatures against the IdP's
/// certificates, then checks the assertion itself.
///
/// Exactly one assertion, plain or encrypted, must be present, and it must be
/// covered by a signature on either the response or the assertion. Checks
/// on `Recipient` and `Destination` are skipped: they name an assertion
/// consumer service, which an attribute query does not involve.
#[derive(Clone, Default)]
pub struct XmlResponseVerifier {
    decryptor: Option<Arc<dyn AssertionDecryptor>>,
    allow_sha1: bool,
}

impl std::fmt::Debug for XmlResponseVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlResponseVerifier")
            .field("has_decryptor", &self.decryptor.is_some())
            .field("allow_sha1", &self.allow_sha1)
            .finish()
    }
}

impl XmlResponseVerifier {
    /// Creates a verifier without a decryptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the decryptor for `saml:EncryptedAssertion`.
    #[must_use]
    pub fn with_decryptor(mut self, decryptor: Arc<dyn AssertionDecryptor>) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    /// Accepts SHA-1 based signatures.
    #[must_use]
    pub const fn allow_sha1(mut self, allow: bool) -> Self {
        self.allow_sha1 = allow;
        self
    }

    fn verify_response(
        &self,
        input: &VerificationInput<'_>,
        updated_response: &mut Option<String>,
    ) -> SamlResult<Assertion> {
        if input.response.version != SAML_VERSION {
            return Err(SamlError::InvalidResponse(format!(
                "unsupported response Version {:?}",
                input.response.version
            )));
        }

        let signatures = XmlSignatureValidator::new(input.idp.trusted_certificates()?)?
            .allow_sha1(self.allow_sha1);
        if signatures.trusted_count() == 0 {
            return Err(SamlError::Config(
                "IdP metadata lists no signing certificate".to_string(),
            ));
        }

        let response_signed = XmlSignatureValidator::is_signed(input.element);
        if response_signed {
            signatures.verify(input.element, input.inherited)?;
        }

        let plain: Vec<&Element> = input.element.find_children(SAML_NS, "Assertion").collect();
        let encrypted: Vec<&Element> = input
            .element
            .find_children(SAML_NS, "EncryptedAssertion")
            .collect();
        let found = plain.len() + encrypted.len();
        if found != 1 {
            return Err(SamlError::InvalidResponse(format!(
                "expected exactly one assertion, found {found}"
            )));
        }

        let decrypted;
        let assertion_el = match (plain.first(), encrypted.first()) {
            (Some(el), _) => *el,
            (None, Some(el)) => {
                let decryptor = self.decryptor.as_ref().ok_or_else(|| {
                    SamlError::Decryption(
                        "response holds an encrypted assertion but no decryptor is configured"
                            .to_string(),
                    )
                })?;
                decrypted = decryptor.decrypt(el)?;
                *updated_response =
                    Some(with_decrypted_assertion(input.element, &decrypted).to_xml()?);
                &decrypted
            }
            (None, None) => {
                return Err(SamlError::MissingElement("Response/Assertion".to_string()));
            }
        };

        let scope = input.element.in_scope(input.inherited);
        if XmlSignatureValidator::is_signed(assertion_el) {
            signatures.verify(assertion_el, &scope)?;
        } else if !response_signed {
            return Err(SamlError::SignatureInvalid(
                "neither the response nor the assertion is signed".to_string(),
            ));
        }

        let assertion = Assertion::from_element(assertion_el)?;
        if encrypted.is_empty()
            && input.response.assertions.first().map(|a| a.id.as_str())
                != Some(assertion.id.as_str())
        {
            return Err(SamlError::InvalidAssertion(
                "verified assertion is not the decoded assertion".to_string(),
            ));
        }

        check_assertion(&assertion, input)?;
        Ok(assertion)
    }
}

impl ResponseVerifier for XmlResponseVerifier {
    fn verify(&self, input: VerificationInput<'_>) -> Verification {
        let mut updated_response = None;
        let result = self.verify_response(&input, &mut updated_response);
        Verification {
            updated_response,
            result,
        }
    }
}

/// Returns a copy of `response` with its encrypted assertion replaced.
fn with_decrypted_assertion(response: &Element, assertion: &Element) -> Element {
    let mut copy = response.clone();
    for node in &mut copy.children {
        if let Node::Element(el) = node {
            if el.is(SAML_NS, "EncryptedAssertion") {
                *node = Node::Element(assertion.clone());
            }
        }
    }
    copy
}

fn expired(what: &str, at: DateTime<Utc>) -> SamlError {
    SamlError::ConditionsNotMet(format!("{what} expired at {}", format_instant(at)))
}

fn check_assertion(assertion: &Assertion, input: &VerificationInput<'_>) -> SamlResult<()> {
    let now = input.now;
    let skew = delta(MAX_CLOCK_SKEW);

    if assertion.version != SAML_VERSION {
        return Err(SamlError::InvalidAssertion(format!(
            "unsupported assertion Version {:?}",
            assertion.version
        )));
    }

    let issue_limit = after(assertion.issue_instant, delta(MAX_ISSUE_DELAY))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    if issue_limit < now {
        return Err(expired("assertion IssueInstant", issue_limit));
    }

    if assertion.issuer.value != input.idp.entity_id {
        return Err(SamlError::InvalidIssuer {
            expected: input.idp.entity_id.clone(),
            actual: assertion.issuer.value.clone(),
        });
    }

    let confirmations = assertion
        .subject
        .iter()
        .flat_map(|s| &s.subject_confirmations)
        .filter_map(|c| c.subject_confirmation_data.as_ref());
    for data in confirmations {
        if let Some(in_response_to) = data.in_response_to.as_deref() {
            if !input.possible_request_ids.contains(&in_response_to) {
                return Err(SamlError::InvalidAssertion(format!(
                    "SubjectConfirmationData InResponseTo {in_response_to:?} does not match a request"
                )));
            }
        }
        if let Some(not_on_or_after) = data.not_on_or_after {
            if after(not_on_or_after, skew).map_or(true, |limit| limit < now) {
                return Err(expired("SubjectConfirmationData", not_on_or_after));
            }
        }
    }

    if let Some(conditions) = &assertion.conditions {
        if let Some(not_before) = conditions.not_before {
            if before(not_before, skew).map_or(true, |start| start > now) {
                return Err(SamlError::AssertionNotYetValid);
            }
        }
        if let Some(not_on_or_after) = conditions.not_on_or_after {
            if after(not_on_or_after, skew).map_or(true, |limit| limit < now) {
                return Err(SamlError::AssertionExpired);
            }
        }
        if !conditions.audience_restrictions.is_empty()
            && !conditions
                .audience_restrictions
                .iter()
                .any(|r| r.audiences.iter().any(|a| a == input.sp_entity_id))
        {
            return Err(SamlError::InvalidAudience {
                expected: input.sp_entity_id.to_string(),
            });
        }
    }

    Ok(())
}
