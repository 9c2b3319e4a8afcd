//! Cryptographically secure random generation.
//!
//! Protocol message identifiers double as anti-forgery tokens: a response is
//! only accepted for the request whose `ID` it echoes, so identifiers must be
//! unguessable. Everything here draws from the thread-local CSPRNG.

use rand::Rng;

/// Number of random bytes behind a request identifier.
pub const REQUEST_ID_ENTROPY_BYTES: usize = 20;

/// Prefix of generated request identifiers.
///
/// `xs:ID` values must be NCNames and may not start with a digit.
pub const REQUEST_ID_PREFIX: &str = "id-";

/// Generates a cryptographically secure random byte array.
///
/// # Arguments
///
/// * `len` - Number of random bytes to generate
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a fresh protocol message identifier.
///
/// The identifier is `id-` followed by the lowercase hex encoding of
/// [`REQUEST_ID_ENTROPY_BYTES`] random bytes (160 bits of entropy), so it
/// always has the same width and never derives from time or a counter.
#[must_use]
pub fn generate_request_id() -> String {
    format!(
        "{REQUEST_ID_PREFIX}{}",
        hex::encode(random_bytes(REQUEST_ID_ENTROPY_BYTES))
    )
}
