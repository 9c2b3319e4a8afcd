//! Attribute query response validation.
//!
//! [`ResponseValidator`] runs the staged pipeline over a raw SOAP response:
//!
//! 1. well-formedness ([`XmlValidator`](crate::xml::XmlValidator))
//! 2. namespace-strict decode of `Envelope/Body/Response`
//! 3. `InResponseTo` correlation with the query ID
//! 4. response `IssueInstant` freshness
//! 5. response issuer binding
//! 6. top-level status
//! 7. independent re-parse locating the inner `Response`
//! 8. deep verification ([`ResponseVerifier`]): signatures, the assertion
//!    and its conditions
//!
//! Every failure is reported as an [`InvalidResponseError`], whose public
//! text never says why. The cause is only reachable via
//! [`InvalidResponseError::inspect`].

mod assertion;
mod response;

pub use assertion::XmlResponseVerifier;
pub use response::ResponseValidator;

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::{SamlError, SamlResult};
use crate::metadata::IdpMetadata;
use crate::time::format_instant;
use crate::types::{Assertion, Response};
use crate::xml::{Element, Namespaces};

/// Pipeline stage that rejected a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationStage {
    /// Strict well-formedness gate.
    WellFormedness,
    /// Typed decode of the SOAP envelope.
    Unmarshal,
    /// `InResponseTo` against the request ID.
    Correlation,
    /// Response `IssueInstant` age.
    Freshness,
    /// Response issuer against IdP metadata.
    Issuer,
    /// Top-level status code.
    Status,
    /// Document re-parse for signature verification.
    Reparse,
    /// Signature, assertion and condition checks.
    Verification,
}

impl ValidationStage {
    /// Returns a short lowercase name, used as a log field.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WellFormedness => "well-formedness",
            Self::Unmarshal => "unmarshal",
            Self::Correlation => "correlation",
            Self::Freshness => "freshness",
            Self::Issuer => "issuer",
            Self::Status => "status",
            Self::Reparse => "reparse",
            Self::Verification => "verification",
        }
    }
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-success status returned by the attribute authority.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}")]
pub struct BadStatusError {
    /// Status code URIs from the top level down, space separated.
    pub status: String,
}

/// The private cause of an [`InvalidResponseError`].
#[derive(Debug, Error)]
pub enum ValidationFailure {
    /// The well-formedness gate refused the input.
    #[error("invalid xml: {0}")]
    Malformed(#[source] SamlError),

    /// The envelope or response could not be decoded.
    #[error("cannot unmarshal response: {0}")]
    Unmarshal(#[source] SamlError),

    /// `InResponseTo` differs from the request ID.
    #[error("`InResponseTo` does not match the attribute query request ID (expected {expected})")]
    InResponseTo {
        /// The request ID the response should answer.
        expected: String,
    },

    /// The response was issued too long ago.
    #[error("response IssueInstant expired at {}", instant(.expired_at))]
    Expired {
        /// `IssueInstant` plus the allowed delay.
        expired_at: DateTime<Utc>,
    },

    /// The response issuer is not the IdP.
    #[error("response Issuer does not match the IDP metadata (expected {expected:?})")]
    IssuerMismatch {
        /// The IdP entity ID.
        expected: String,
    },

    /// The status is not success.
    #[error(transparent)]
    BadStatus(BadStatusError),

    /// The re-parse failed.
    #[error("{0}")]
    Reparse(#[source] SamlError),

    /// The re-parsed document has no inner response matching the decoded one.
    #[error("missing inner Response")]
    MissingInnerResponse,

    /// Deep verification failed.
    #[error("{0}")]
    Verification(#[source] SamlError),
}

fn instant(at: &DateTime<Utc>) -> String {
    format_instant(*at)
}

impl ValidationFailure {
    /// Returns the stage this failure belongs to.
    #[must_use]
    pub const fn stage(&self) -> ValidationStage {
        match self {
            Self::Malformed(_) => ValidationStage::WellFormedness,
            Self::Unmarshal(_) => ValidationStage::Unmarshal,
            Self::InResponseTo { .. } => ValidationStage::Correlation,
            Self::Expired { .. } => ValidationStage::Freshness,
            Self::IssuerMismatch { .. } => ValidationStage::Issuer,
            Self::BadStatus(_) => ValidationStage::Status,
            Self::Reparse(_) | Self::MissingInnerResponse => ValidationStage::Reparse,
            Self::Verification(_) => ValidationStage::Verification,
        }
    }

    /// Returns the status error if the authority answered with a failure status.
    #[must_use]
    pub const fn bad_status(&self) -> Option<&BadStatusError> {
        match self {
            Self::BadStatus(status) => Some(status),
            _ => None,
        }
    }
}

/// A rejected response.
///
/// `Display` is always `"invalid response"` and `Debug` shows nothing else,
/// so the value can be returned to untrusted callers. Trusted code reads the
/// details through [`inspect`](Self::inspect).
pub struct InvalidResponseError {
    now: DateTime<Utc>,
    response: String,
    private_err: ValidationFailure,
}

impl InvalidResponseError {
    pub(crate) fn new(
        now: DateTime<Utc>,
        response: String,
        private_err: ValidationFailure,
    ) -> Self {
        Self {
            now,
            response,
            private_err,
        }
    }

    /// Returns the diagnostic view of this error.
    #[must_use]
    pub fn inspect(&self) -> ResponseDiagnostics<'_> {
        ResponseDiagnostics {
            now: self.now,
            response: &self.response,
            cause: &self.private_err,
        }
    }
}

impl fmt::Display for InvalidResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid response")
    }
}

impl fmt::Debug for InvalidResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidResponseError").finish_non_exhaustive()
    }
}

impl std::error::Error for InvalidResponseError {}

/// Diagnostic view of an [`InvalidResponseError`].
#[derive(Debug, Clone, Copy)]
pub struct ResponseDiagnostics<'a> {
    /// The time the response was validated at.
    pub now: DateTime<Utc>,
    /// The response text, or its decrypted form if decryption happened.
    pub response: &'a str,
    /// Why the response was rejected.
    pub cause: &'a ValidationFailure,
}

impl ResponseDiagnostics<'_> {
    /// Returns the rejecting stage.
    #[must_use]
    pub const fn stage(&self) -> ValidationStage {
        self.cause.stage()
    }
}

/// Inputs to deep verification.
#[derive(Debug, Clone, Copy)]
pub struct VerificationInput<'a> {
    /// The typed response from the decode stage.
    pub response: &'a Response,
    /// The `samlp:Response` element from the re-parse stage.
    pub element: &'a Element,
    /// Namespaces declared by the element's ancestors.
    pub inherited: &'a Namespaces,
    /// Request IDs an assertion may answer.
    pub possible_request_ids: &'a [&'a str],
    /// Validation time.
    pub now: DateTime<Utc>,
    /// The IdP the response must come from.
    pub idp: &'a IdpMetadata,
    /// Entity ID the assertion audience must include.
    pub sp_entity_id: &'a str,
}

/// Outcome of deep verification.
#[derive(Debug)]
pub struct Verification {
    /// The response text after decryption, if it changed.
    pub updated_response: Option<String>,
    /// The verified assertion.
    pub result: SamlResult<Assertion>,
}

impl Verification {
    /// A failure that did not change the response.
    #[must_use]
    pub const fn failed(error: SamlError) -> Self {
        Self {
            updated_response: None,
            result: Err(error),
        }
    }
}

/// Performs signature and assertion checks on a response that passed the
/// envelope-level stages.
pub trait ResponseVerifier: Send + Sync {
    /// Verifies the response and extracts its assertion.
    fn verify(&self, input: VerificationInput<'_>) -> Verification;
}

/// Decrypts `saml:EncryptedAssertion` elements.
pub trait AssertionDecryptor: Send + Sync {
    /// Returns the `saml:Assertion` inside `encrypted`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Decryption`] if the assertion cannot be
    /// decrypted.
    fn decrypt(&self, encrypted: &Element) -> SamlResult<Element>;
}
