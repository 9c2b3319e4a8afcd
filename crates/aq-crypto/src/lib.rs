//! # aq-crypto
//!
//! Cryptographic primitives for SAML attribute queries, built on aws-lc-rs.
//!
//! - Digests used by XML signatures (SHA-256, SHA-384, SHA-512)
//! - Unpredictable identifiers for protocol messages
//! - RSA and ECDSA signing keys loaded from PKCS#8 or PKCS#1 DER
//! - Signature verification against raw public keys or X.509 certificates

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod hash;
pub mod keys;
pub mod random;
pub mod signature;

pub use algorithm::{HashAlgorithm, SignatureAlgorithm};
pub use hash::{digest, sha256, sha384, sha512};
pub use keys::{pem_to_der, SigningKey};
pub use random::{generate_request_id, random_bytes};
pub use signature::{public_key_from_certificate, verify, CryptoError};
