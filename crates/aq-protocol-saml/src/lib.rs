//! SAML 2.0 attribute queries for service providers.
//!
//! A [`ServiceProvider`] asks an identity provider's attribute authority
//! about a subject over the SOAP binding and hands back the assertion once
//! it has passed validation:
//!
//! - **Query construction** - `samlp:AttributeQuery` with a fresh ID, the SP
//!   as issuer and a qualified `NameID`
//! - **XML signature** - enveloped, exclusive-c14n signatures on queries and
//!   verification of IdP signatures against metadata certificates
//! - **SOAP transport** - POST over HTTP, pluggable for tests
//! - **Response validation** - a staged pipeline whose failures are opaque
//!   to callers but fully inspectable for diagnostics
//!
//! # Architecture
//!
//! - [`types`] - SAML protocol and assertion types
//! - [`xml`] - element tree, parser, canonicalization and the strict gate
//! - [`signature`] - XML signature creation and verification
//! - [`soap`] - SOAP 1.1 envelopes
//! - [`metadata`] - the IdP facts a requester needs
//! - [`transport`] - SOAP over HTTP
//! - [`validator`] - response validation
//! - [`service_provider`] - the requester itself
//!
//! # Example
//!
//! ```rust,ignore
//! use aq_protocol_saml::{IdpMetadata, ServiceProvider, ServiceProviderConfig};
//!
//! let sp = ServiceProvider::new(
//!     ServiceProviderConfig::new("https://sp.example.com"),
//!     IdpMetadata::new("https://idp.example.com", "https://idp.example.com/aa"),
//! )?;
//! let assertion = sp.attribute_query("user@example.com", Vec::new()).await?;
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)
//! - [Exclusive XML Canonicalization](https://www.w3.org/TR/xml-exc-c14n/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod metadata;
pub mod service_provider;
pub mod signature;
pub mod soap;
pub mod time;
pub mod transport;
pub mod types;
pub mod validator;
pub mod xml;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{SamlError, SamlResult};
pub use metadata::{AttributeAuthorityDescriptor, Endpoint, IdpMetadata};
pub use service_provider::{AttributeQueryError, ServiceProvider, ServiceProviderConfig};
pub use transport::{HttpSoapTransport, SoapReply, SoapTransport, TransportError};
pub use types::*;
pub use validator::{
    InvalidResponseError, ResponseValidator, ResponseVerifier, ValidationStage,
    XmlResponseVerifier,
};
