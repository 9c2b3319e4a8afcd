//! XML Signature support for SAML.
//!
//! Enveloped signatures over a single element, referenced by its `ID`,
//! with the exclusive canonicalization profile SAML deployments use.
//!
//! # Signing Algorithms
//!
//! - RSA-SHA256 (default for RSA keys)
//! - RSA-SHA384
//! - RSA-SHA512
//! - ECDSA-SHA256
//! - ECDSA-SHA384
//!
//! RSA-SHA1 and SHA-1 digests are recognized for verification only, and only
//! when explicitly allowed.

mod signer;
mod validator;

pub use signer::*;
pub use validator::*;

use aq_crypto::{HashAlgorithm, SignatureAlgorithm};

use crate::error::SamlResult;
use crate::types::{digest_algorithms, signature_algorithms};
use crate::xml::Element;

/// XML signature method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignatureMethod {
    /// RSA with SHA-256.
    #[default]
    RsaSha256,
    /// RSA with SHA-384.
    RsaSha384,
    /// RSA with SHA-512.
    RsaSha512,
    /// ECDSA with SHA-256.
    EcdsaSha256,
    /// ECDSA with SHA-384.
    EcdsaSha384,
    /// Legacy RSA with SHA-1, verification only.
    RsaSha1,
}

impl SignatureMethod {
    /// Returns the URI for this signature method.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 => signature_algorithms::RSA_SHA256,
            Self::RsaSha384 => signature_algorithms::RSA_SHA384,
            Self::RsaSha512 => signature_algorithms::RSA_SHA512,
            Self::EcdsaSha256 => signature_algorithms::ECDSA_SHA256,
            Self::EcdsaSha384 => signature_algorithms::ECDSA_SHA384,
            Self::RsaSha1 => signature_algorithms::RSA_SHA1,
        }
    }

    /// Parses a signature method from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            signature_algorithms::RSA_SHA256 => Some(Self::RsaSha256),
            signature_algorithms::RSA_SHA384 => Some(Self::RsaSha384),
            signature_algorithms::RSA_SHA512 => Some(Self::RsaSha512),
            signature_algorithms::ECDSA_SHA256 => Some(Self::EcdsaSha256),
            signature_algorithms::ECDSA_SHA384 => Some(Self::EcdsaSha384),
            signature_algorithms::RSA_SHA1 => Some(Self::RsaSha1),
            _ => None,
        }
    }

    /// Returns the matching key algorithm.
    #[must_use]
    pub const fn crypto_algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::RsaSha256 => SignatureAlgorithm::Rs256,
            Self::RsaSha384 => SignatureAlgorithm::Rs384,
            Self::RsaSha512 => SignatureAlgorithm::Rs512,
            Self::EcdsaSha256 => SignatureAlgorithm::Es256,
            Self::EcdsaSha384 => SignatureAlgorithm::Es384,
            Self::RsaSha1 => SignatureAlgorithm::Rs1,
        }
    }

    /// Returns the signature method for a key algorithm.
    #[must_use]
    pub const fn from_crypto_algorithm(algorithm: SignatureAlgorithm) -> Self {
        match algorithm {
            SignatureAlgorithm::Rs256 => Self::RsaSha256,
            SignatureAlgorithm::Rs384 => Self::RsaSha384,
            SignatureAlgorithm::Rs512 => Self::RsaSha512,
            SignatureAlgorithm::Es256 => Self::EcdsaSha256,
            SignatureAlgorithm::Es384 => Self::EcdsaSha384,
            SignatureAlgorithm::Rs1 => Self::RsaSha1,
        }
    }

    /// Returns the digest method paired with this method when signing.
    #[must_use]
    pub const fn digest_method(&self) -> DigestMethod {
        match self.crypto_algorithm().hash_algorithm() {
            HashAlgorithm::Sha1 => DigestMethod::Sha1,
            HashAlgorithm::Sha256 => DigestMethod::Sha256,
            HashAlgorithm::Sha384 => DigestMethod::Sha384,
            HashAlgorithm::Sha512 => DigestMethod::Sha512,
        }
    }

    /// Returns true if this method uses a deprecated hash (SHA-1).
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::RsaSha1)
    }
}

/// Reference digest method.
///
/// Chosen independently of the signature method by the signer, so the
/// validator reads it from the `Reference` rather than deriving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestMethod {
    /// Legacy SHA-1, verification only.
    Sha1,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl DigestMethod {
    /// Returns the URI for this digest method.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Sha1 => digest_algorithms::SHA1,
            Self::Sha256 => digest_algorithms::SHA256,
            Self::Sha384 => digest_algorithms::SHA384,
            Self::Sha512 => digest_algorithms::SHA512,
        }
    }

    /// Parses a digest method from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            digest_algorithms::SHA1 => Some(Self::Sha1),
            digest_algorithms::SHA256 => Some(Self::Sha256),
            digest_algorithms::SHA384 => Some(Self::Sha384),
            digest_algorithms::SHA512 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Returns the hash algorithm.
    #[must_use]
    pub const fn hash_algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Sha1 => HashAlgorithm::Sha1,
            Self::Sha256 => HashAlgorithm::Sha256,
            Self::Sha384 => HashAlgorithm::Sha384,
            Self::Sha512 => HashAlgorithm::Sha512,
        }
    }

    /// Returns true for SHA-1.
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::Sha1)
    }
}

/// Produces enveloped signatures.
pub trait SigningContext: Send + Sync {
    /// The signature method written into `SignedInfo`.
    fn signature_method(&self) -> SignatureMethod;

    /// Returns a copy of `element` with a `ds:Signature` over it appended as
    /// the last child.
    ///
    /// # Errors
    ///
    /// Returns an error if the element has no `ID` or signing fails.
    fn sign_enveloped(&self, element: &Element) -> SamlResult<Element>;
}
