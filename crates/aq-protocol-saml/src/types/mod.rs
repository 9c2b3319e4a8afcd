//! SAML 2.0 types and data structures.
//!
//! The attribute query sent by a service provider, the response returned by
//! an attribute authority, and the assertion it carries. Every type converts
//! to and from the namespace-aware [`Element`](crate::xml::Element) tree.

mod assertion;
mod attribute_query;
mod constants;
mod name_id;
mod response;
mod status;

pub use assertion::*;
pub use attribute_query::*;
pub use constants::*;
pub use name_id::*;
pub use response::*;
pub use status::*;

use chrono::{DateTime, Utc};

use crate::error::{SamlError, SamlResult};
use crate::time::parse_instant;
use crate::xml::Element;

/// Returns an unprefixed attribute or a `MissingElement` error naming it.
pub(crate) fn required_attr<'a>(el: &'a Element, name: &str) -> SamlResult<&'a str> {
    el.attr(name)
        .ok_or_else(|| SamlError::MissingElement(format!("{}/@{name}", el.name)))
}

/// Parses an optional `xs:dateTime` attribute.
pub(crate) fn instant_attr(el: &Element, name: &str) -> SamlResult<Option<DateTime<Utc>>> {
    el.attr(name).map(parse_instant).transpose()
}
