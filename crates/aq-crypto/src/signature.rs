//! Signature verification and certificate key extraction.

use aws_lc_rs::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use thiserror::Error;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::algorithm::SignatureAlgorithm;

/// Error type for cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Invalid key format.
    #[error("invalid key format: {0}")]
    InvalidKey(String),

    /// Invalid certificate.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Malformed PEM.
    #[error("invalid PEM: {0}")]
    Pem(String),

    /// Algorithm not supported.
    #[error("algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),
}

fn verification_algorithm(algorithm: SignatureAlgorithm) -> &'static dyn VerificationAlgorithm {
    match algorithm {
        SignatureAlgorithm::Rs1 => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        SignatureAlgorithm::Rs256 => &signature::RSA_PKCS1_2048_8192_SHA256,
        SignatureAlgorithm::Rs384 => &signature::RSA_PKCS1_2048_8192_SHA384,
        SignatureAlgorithm::Rs512 => &signature::RSA_PKCS1_2048_8192_SHA512,
        SignatureAlgorithm::Es256 => &signature::ECDSA_P256_SHA256_FIXED,
        SignatureAlgorithm::Es384 => &signature::ECDSA_P384_SHA384_FIXED,
    }
}

/// Verifies `sig` over `data` with a raw public key.
///
/// Returns `Ok(false)` for any signature that does not verify, including
/// a key of the wrong family for `algorithm`.
///
/// # Errors
///
/// Currently infallible; the `Result` leaves room for key formats that need
/// parsing.
pub fn verify(
    public_key: &[u8],
    algorithm: SignatureAlgorithm,
    data: &[u8],
    sig: &[u8],
) -> Result<bool, CryptoError> {
    let key = UnparsedPublicKey::new(verification_algorithm(algorithm), public_key);
    Ok(key.verify(data, sig).is_ok())
}

/// Extracts the subject public key from a DER certificate.
///
/// The returned bytes are in the form [`verify`] expects.
///
/// # Errors
///
/// Returns an error if the certificate cannot be parsed.
pub fn public_key_from_certificate(cert_der: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| CryptoError::InvalidCertificate(e.to_string()))?;
    Ok(cert.public_key().subject_public_key.data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SigningKey;

    fn self_signed() -> (Vec<u8>, SigningKey) {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["idp.example.com".to_string()]).unwrap();
        let key = SigningKey::from_pkcs8(&key_pair.serialize_der()).unwrap();
        (cert.der().to_vec(), key)
    }

    #[test]
    fn certificate_key_matches_signing_key() {
        let (cert_der, key) = self_signed();
        assert_eq!(public_key_from_certificate(&cert_der).unwrap(), key.public_key());
    }

    #[test]
    fn verify_with_certificate_key() {
        let (cert_der, key) = self_signed();
        let public_key = public_key_from_certificate(&cert_der).unwrap();
        let sig = key.sign(b"payload").unwrap();

        assert!(verify(&public_key, SignatureAlgorithm::Es256, b"payload", &sig).unwrap());
    }

    #[test]
    fn wrong_family_does_not_verify() {
        let (cert_der, key) = self_signed();
        let public_key = public_key_from_certificate(&cert_der).unwrap();
        let sig = key.sign(b"payload").unwrap();

        assert!(!verify(&public_key, SignatureAlgorithm::Rs256, b"payload", &sig).unwrap());
    }

    #[test]
    fn invalid_certificate_is_rejected() {
        assert!(matches!(
            public_key_from_certificate(b"not a certificate"),
            Err(CryptoError::InvalidCertificate(_))
        ));
    }

    #[test]
    fn error_messages() {
        let error = CryptoError::Signing("boom".to_string());
        assert_eq!(error.to_string(), "signing failed: boom");
    }
}
