//! Signing key management.
//!
//! Service provider keys arrive as PEM files. PKCS#8 (`PRIVATE KEY`) carries
//! either an RSA or an ECDSA key; PKCS#1 (`RSA PRIVATE KEY`) is RSA only.
//!
//! ## Supported Algorithms
//!
//! ### RSA
//! - RS256, RS384, RS512 (RSA PKCS#1 v1.5)
//!
//! ### ECDSA
//! - ES256 (P-256), ES384 (P-384), fixed-width signatures

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{
        self, EcdsaKeyPair, KeyPair, RsaKeyPair, ECDSA_P256_SHA256_FIXED_SIGNING,
        ECDSA_P384_SHA384_FIXED_SIGNING,
    },
};
use base64::Engine;

use crate::algorithm::SignatureAlgorithm;
use crate::signature::CryptoError;

/// A decoded PEM block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    /// The label between `-----BEGIN ` and `-----`.
    pub label: String,
    /// The decoded DER contents.
    pub der: Vec<u8>,
}

/// Decodes the first PEM block in `pem`.
///
/// Encapsulated header lines (`Proc-Type: ...`) are skipped.
///
/// # Errors
///
/// Returns an error if no complete block is found or the body is not base64.
pub fn pem_to_der(pem: &str) -> Result<PemBlock, CryptoError> {
    let mut lines = pem.lines().map(str::trim);

    let label = lines
        .by_ref()
        .find_map(|line| {
            line.strip_prefix("-----BEGIN ")
                .and_then(|rest| rest.strip_suffix("-----"))
        })
        .ok_or_else(|| CryptoError::Pem("no BEGIN line".to_string()))?
        .to_string();

    let end_line = format!("-----END {label}-----");
    let mut body = String::new();
    let mut terminated = false;
    for line in lines {
        if line == end_line {
            terminated = true;
            break;
        }
        if line.contains(':') || line.is_empty() {
            continue;
        }
        body.push_str(line);
    }

    if !terminated {
        return Err(CryptoError::Pem(format!("missing END line for {label}")));
    }

    let der = base64::engine::general_purpose::STANDARD
        .decode(body.as_bytes())
        .map_err(|e| CryptoError::Pem(format!("invalid base64 body: {e}")))?;

    Ok(PemBlock { label, der })
}

enum KeyMaterial {
    Rsa(RsaKeyPair),
    Ecdsa(EcdsaKeyPair),
}

/// Private key used to sign outgoing requests.
pub struct SigningKey {
    material: KeyMaterial,
    algorithm: SignatureAlgorithm,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Loads a key from a PKCS#8 DER document.
    ///
    /// ECDSA keys select ES256 or ES384 from their curve. RSA keys default to
    /// RS256; use [`SigningKey::with_algorithm`] to pick another digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the document holds no supported key.
    pub fn from_pkcs8(pkcs8_der: &[u8]) -> Result<Self, CryptoError> {
        if let Ok(key_pair) = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8_der) {
            return Ok(Self {
                material: KeyMaterial::Ecdsa(key_pair),
                algorithm: SignatureAlgorithm::Es256,
            });
        }
        if let Ok(key_pair) = EcdsaKeyPair::from_pkcs8(&ECDSA_P384_SHA384_FIXED_SIGNING, pkcs8_der) {
            return Ok(Self {
                material: KeyMaterial::Ecdsa(key_pair),
                algorithm: SignatureAlgorithm::Es384,
            });
        }

        let key_pair = RsaKeyPair::from_pkcs8(pkcs8_der)
            .map_err(|e| CryptoError::InvalidKey(format!("unsupported PKCS#8 key: {e}")))?;
        Ok(Self {
            material: KeyMaterial::Rsa(key_pair),
            algorithm: SignatureAlgorithm::Rs256,
        })
    }

    /// Loads an RSA key from a PKCS#1 `RSAPrivateKey` DER document.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid.
    pub fn from_rsa_der(der: &[u8]) -> Result<Self, CryptoError> {
        let key_pair = RsaKeyPair::from_der(der)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid RSA DER key: {e}")))?;
        Ok(Self {
            material: KeyMaterial::Rsa(key_pair),
            algorithm: SignatureAlgorithm::Rs256,
        })
    }

    /// Loads a key from PEM text.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM is malformed or holds no supported key.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let block = pem_to_der(pem)?;
        match block.label.as_str() {
            "PRIVATE KEY" => Self::from_pkcs8(&block.der),
            "RSA PRIVATE KEY" => Self::from_rsa_der(&block.der),
            other => Err(CryptoError::InvalidKey(format!(
                "unsupported PEM label {other:?}"
            ))),
        }
    }

    /// Overrides the signature algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm does not fit the key. RSA keys accept
    /// any RSA algorithm except SHA-1, ECDSA keys only the one matching their
    /// curve.
    pub fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Result<Self, CryptoError> {
        let compatible = match self.material {
            KeyMaterial::Rsa(_) => algorithm.is_rsa() && !algorithm.is_legacy(),
            KeyMaterial::Ecdsa(_) => algorithm == self.algorithm,
        };
        if !compatible {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "{} cannot be used with a {} key",
                algorithm.jwa_name(),
                self.algorithm.jwa_name()
            )));
        }
        self.algorithm = algorithm;
        Ok(self)
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Returns the public key bytes.
    ///
    /// RSA keys yield a PKCS#1 `RSAPublicKey`, ECDSA keys an uncompressed
    /// point, matching what [`crate::verify`] expects.
    #[must_use]
    pub fn public_key(&self) -> Vec<u8> {
        match &self.material {
            KeyMaterial::Rsa(key_pair) => key_pair.public_key().as_ref().to_vec(),
            KeyMaterial::Ecdsa(key_pair) => key_pair.public_key().as_ref().to_vec(),
        }
    }

    /// Signs the given data.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let rng = SystemRandom::new();

        match &self.material {
            KeyMaterial::Rsa(key_pair) => {
                let padding = match self.algorithm {
                    SignatureAlgorithm::Rs256 => &signature::RSA_PKCS1_SHA256,
                    SignatureAlgorithm::Rs384 => &signature::RSA_PKCS1_SHA384,
                    SignatureAlgorithm::Rs512 => &signature::RSA_PKCS1_SHA512,
                    other => {
                        return Err(CryptoError::UnsupportedAlgorithm(format!(
                            "{} not supported for RSA signing",
                            other.jwa_name()
                        )));
                    }
                };

                let mut sig = vec![0u8; key_pair.public_modulus_len()];
                key_pair
                    .sign(padding, &rng, data, &mut sig)
                    .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;
                Ok(sig)
            }
            KeyMaterial::Ecdsa(key_pair) => {
                let sig = key_pair
                    .sign(&rng, data)
                    .map_err(|e| CryptoError::Signing(format!("ECDSA signing failed: {e}")))?;
                Ok(sig.as_ref().to_vec())
            }
        }
    }
}
