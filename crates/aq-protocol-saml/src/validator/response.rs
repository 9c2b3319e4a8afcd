//! The staged response pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{
    BadStatusError, InvalidResponseError, ResponseVerifier, ValidationFailure, VerificationInput,
};
use crate::clock::{Clock, SystemClock};
use crate::metadata::IdpMetadata;
use crate::soap::decode_response_envelope;
use crate::time::{after, delta};
use crate::types::{Assertion, Response, MAX_ISSUE_DELAY, SAMLP_NS};
use crate::xml::{Document, StrictXmlValidator, XmlValidator};

/// Validates attribute query responses.
///
/// Holds no per-call state; share it freely.
#[derive(Clone)]
pub struct ResponseValidator {
    xml_validator: Arc<dyn XmlValidator>,
    verifier: Arc<dyn ResponseVerifier>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ResponseValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseValidator").finish_non_exhaustive()
    }
}

impl ResponseValidator {
    /// Creates a validator using the strict XML gate and the system clock.
    #[must_use]
    pub fn new(verifier: Arc<dyn ResponseVerifier>) -> Self {
        Self {
            xml_validator: Arc::new(StrictXmlValidator::new()),
            verifier,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the well-formedness gate.
    #[must_use]
    pub fn with_xml_validator(mut self, xml_validator: Arc<dyn XmlValidator>) -> Self {
        self.xml_validator = xml_validator;
        self
    }

    /// Replaces the deep verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn ResponseVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validates a SOAP-wrapped response to the query `request_id` and
    /// returns its verified assertion.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidResponseError`] naming the first failed stage.
    pub fn validate(
        &self,
        raw: &[u8],
        request_id: &str,
        idp: &IdpMetadata,
        sp_entity_id: &str,
    ) -> Result<Assertion, InvalidResponseError> {
        let now = self.clock.now();
        let reject = |response: String, cause: ValidationFailure| {
            InvalidResponseError::new(now, response, cause)
        };
        let original = || String::from_utf8_lossy(raw).into_owned();

        self.xml_validator
            .validate(raw)
            .map_err(|e| reject(original(), ValidationFailure::Malformed(e)))?;

        let response = Document::parse(raw)
            .and_then(|doc| decode_response_envelope(doc.root()))
            .map_err(|e| reject(original(), ValidationFailure::Unmarshal(e)))?;

        check_envelope(&response, request_id, now, idp).map_err(|e| reject(original(), e))?;

        let document = Document::parse(raw)
            .map_err(|e| reject(original(), ValidationFailure::Reparse(e)))?;
        let (element, inherited) = document
            .find_path(&["Envelope", "Body", "Response"])
            .filter(|(el, _)| {
                el.is(SAMLP_NS, "Response") && el.attr("ID") == Some(response.id.as_str())
            })
            .ok_or_else(|| reject(original(), ValidationFailure::MissingInnerResponse))?;

        let verification = self.verifier.verify(VerificationInput {
            response: &response,
            element,
            inherited: &inherited,
            possible_request_ids: &[request_id],
            now,
            idp,
            sp_entity_id,
        });
        verification.result.map_err(|e| {
            let text = verification.updated_response.unwrap_or_else(original);
            reject(text, ValidationFailure::Verification(e))
        })
    }
}

/// Stages 3 to 6: correlation, freshness, issuer and status.
fn check_envelope(
    response: &Response,
    request_id: &str,
    now: DateTime<Utc>,
    idp: &IdpMetadata,
) -> Result<(), ValidationFailure> {
    if response.in_response_to.as_deref().unwrap_or_default() != request_id {
        return Err(ValidationFailure::InResponseTo {
            expected: request_id.to_string(),
        });
    }

    // An unrepresentable limit counts as expired.
    let expired_at = after(response.issue_instant, delta(MAX_ISSUE_DELAY))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    if expired_at < now {
        return Err(ValidationFailure::Expired { expired_at });
    }

    if let Some(issuer) = &response.issuer {
        if issuer.value != idp.entity_id {
            return Err(ValidationFailure::IssuerMismatch {
                expected: idp.entity_id.clone(),
            });
        }
    }

    if !response.status.is_success() {
        return Err(ValidationFailure::BadStatus(BadStatusError {
            status: response.status.code_chain(),
        }));
    }
    Ok(())
}
