//! Strict well-formedness gate.
//!
//! Responses are checked here before any structural decoding so that inputs
//! which different parsers could read differently (duplicate attributes,
//! ambiguous names, DTD tricks) never reach the signature code.

use std::collections::HashSet;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use super::{attribute_value, normalize_line_endings, MAX_DEPTH};
use crate::error::{SamlError, SamlResult};

/// Validates raw XML before it is parsed.
pub trait XmlValidator: Send + Sync {
    /// Returns an error if `input` must not be processed further.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::MalformedXml`] describing the first violation.
    fn validate(&self, input: &[u8]) -> SamlResult<()>;
}

/// The default [`XmlValidator`].
///
/// Rejects non UTF-8 input, document type declarations, duplicate
/// attributes (including two prefixes bound to the same namespace), unbound
/// prefixes, names containing more than one colon, empty prefixed namespace
/// declarations, unknown entity references, multiple or missing root
/// elements, text outside the root element, unbalanced tags, and nesting
/// deeper than [`MAX_DEPTH`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictXmlValidator;

impl StrictXmlValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn malformed(message: impl Into<String>) -> SamlError {
    SamlError::MalformedXml(message.into())
}

impl XmlValidator for StrictXmlValidator {
    fn validate(&self, input: &[u8]) -> SamlResult<()> {
        let text =
            std::str::from_utf8(input).map_err(|e| malformed(format!("input is not UTF-8: {e}")))?;

        let mut reader = NsReader::from_str(text);
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = true;

        let mut depth = 0usize;
        let mut seen_root = false;

        loop {
            let (resolved, event) = reader
                .read_resolved_event()
                .map_err(|e| malformed(e.to_string()))?;
            let element_unbound = matches!(resolved, ResolveResult::Unknown(_));

            match event {
                Event::Start(start) | Event::Empty(start) if depth == 0 && seen_root => {
                    return Err(malformed(format!(
                        "second root element {:?}",
                        String::from_utf8_lossy(start.name().as_ref())
                    )));
                }
                Event::Start(_) | Event::Empty(_) if depth >= MAX_DEPTH => {
                    return Err(malformed(format!("elements nested deeper than {MAX_DEPTH}")));
                }
                Event::Start(start) => {
                    check_start(&reader, &start, element_unbound)?;
                    seen_root = true;
                    depth += 1;
                }
                Event::Empty(start) => {
                    check_start(&reader, &start, element_unbound)?;
                    seen_root = true;
                }
                Event::End(_) => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| malformed("end tag without start tag"))?;
                }
                Event::Text(content) => {
                    let raw = std::str::from_utf8(content.as_ref())
                        .map_err(|e| malformed(e.to_string()))?;
                    let normalized = normalize_line_endings(raw);
                    let value = quick_xml::escape::unescape(&normalized)
                        .map_err(|e| malformed(e.to_string()))?;
                    if depth == 0 && !value.trim().is_empty() {
                        return Err(malformed("text outside the root element"));
                    }
                }
                Event::CData(_) if depth == 0 => {
                    return Err(malformed("character data outside the root element"));
                }
                Event::DocType(_) => {
                    return Err(malformed("document type declarations are not allowed"));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if depth != 0 {
            return Err(malformed("unclosed element"));
        }
        if !seen_root {
            return Err(malformed("no root element"));
        }
        Ok(())
    }
}

fn check_name(name: &[u8]) -> SamlResult<()> {
    let colons = name.iter().filter(|&&b| b == b':').count();
    if colons > 1 || name.first() == Some(&b':') || name.last() == Some(&b':') {
        return Err(malformed(format!(
            "invalid qualified name {:?}",
            String::from_utf8_lossy(name)
        )));
    }
    Ok(())
}

fn check_start(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
    element_unbound: bool,
) -> SamlResult<()> {
    let name = start.name();
    check_name(name.as_ref())?;
    if element_unbound {
        return Err(malformed(format!(
            "element {:?} uses an unbound prefix",
            String::from_utf8_lossy(name.as_ref())
        )));
    }

    let mut raw_names = HashSet::new();
    let mut expanded_names = HashSet::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(e.to_string()))?;
        let key = attr.key.as_ref();
        check_name(key)?;

        if !raw_names.insert(key.to_vec()) {
            return Err(malformed(format!(
                "duplicate attribute {:?}",
                String::from_utf8_lossy(key)
            )));
        }

        let value = attribute_value(&attr.value).map_err(|e| malformed(e.to_string()))?;

        if key == b"xmlns" {
            continue;
        }
        if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            if value.is_empty() {
                return Err(malformed(format!(
                    "prefix {:?} bound to an empty namespace",
                    String::from_utf8_lossy(prefix)
                )));
            }
            continue;
        }

        let (resolved, local) = reader.resolve_attribute(attr.key);
        let namespace = match resolved {
            ResolveResult::Bound(ns) => ns.as_ref().to_vec(),
            ResolveResult::Unbound => Vec::new(),
            ResolveResult::Unknown(_) => {
                return Err(malformed(format!(
                    "attribute {:?} uses an unbound prefix",
                    String::from_utf8_lossy(key)
                )));
            }
        };
        if !expanded_names.insert((namespace, local.as_ref().to_vec())) {
            return Err(malformed(format!(
                "duplicate attribute {:?} after namespace resolution",
                String::from_utf8_lossy(key)
            )));
        }
    }

    Ok(())
}
