//! Exclusive XML canonicalization (without comments).
//!
//! <https://www.w3.org/TR/xml-exc-c14n/>

use std::collections::BTreeMap;

use super::{Element, Namespaces, Node};

/// Canonicalizes `element` as an apex node of a document subset.
///
/// `inherited` holds the namespaces in scope at the element's parent; it is
/// only consulted for prefixes listed in `inclusive_prefixes` (the
/// `InclusiveNamespaces PrefixList`, with `#default` for the default
/// namespace). Comments are never present in the tree, so the output matches
/// the `exc-c14n#` algorithm.
#[must_use]
pub fn canonicalize(
    element: &Element,
    inherited: &Namespaces,
    inclusive_prefixes: &[String],
) -> String {
    let mut out = String::new();
    write_element(element, inherited, &Namespaces::new(), inclusive_prefixes, &mut out);
    out
}

fn write_element(
    element: &Element,
    inherited: &Namespaces,
    rendered: &Namespaces,
    inclusive_prefixes: &[String],
    out: &mut String,
) {
    let scope = element.in_scope(inherited);

    // Visibly utilized prefixes, plus inclusive ones that are in scope.
    let mut utilized: BTreeMap<String, String> = BTreeMap::new();
    utilized.insert(
        element.prefix.clone().unwrap_or_default(),
        element.namespace.clone().unwrap_or_default(),
    );
    for attr in &element.attributes {
        if let (Some(prefix), Some(namespace)) = (&attr.prefix, &attr.namespace) {
            if prefix != "xml" {
                utilized.insert(prefix.clone(), namespace.clone());
            }
        }
    }
    for prefix in inclusive_prefixes {
        let key = if prefix == "#default" { "" } else { prefix.as_str() };
        if let Some(uri) = scope.get(key) {
            utilized.entry(key.to_string()).or_insert_with(|| uri.clone());
        }
    }

    let mut now_rendered = rendered.clone();
    let mut declarations = Vec::new();
    for (prefix, uri) in utilized {
        let current = rendered.get(&prefix).map(String::as_str);
        let needs_output = if prefix.is_empty() {
            current.unwrap_or("") != uri
        } else {
            current != Some(uri.as_str())
        };
        if needs_output {
            declarations.push((prefix.clone(), uri.clone()));
            now_rendered.insert(prefix, uri);
        }
    }

    let mut attributes: Vec<_> = element.attributes.iter().collect();
    attributes.sort_by(|a, b| {
        let a_key = (a.namespace.as_deref().unwrap_or(""), a.name.as_str());
        let b_key = (b.namespace.as_deref().unwrap_or(""), b.name.as_str());
        a_key.cmp(&b_key)
    });

    let qname = element.qualified_name();
    out.push('<');
    out.push_str(&qname);
    for (prefix, uri) in &declarations {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        out.push_str(&escape_attribute(uri));
        out.push('"');
    }
    for attr in attributes {
        out.push(' ');
        out.push_str(&attr.qualified_name());
        out.push_str("=\"");
        out.push_str(&escape_attribute(&attr.value));
        out.push('"');
    }
    out.push('>');

    for child in &element.children {
        match child {
            Node::Element(el) => write_element(el, &scope, &now_rendered, inclusive_prefixes, out),
            Node::Text(text) => out.push_str(&escape_text(text)),
        }
    }

    out.push_str("</");
    out.push_str(&qname);
    out.push('>');
}

/// Escapes character data the way canonical XML does.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
    out
}

/// Escapes an attribute value the way canonical XML does.
#[must_use]
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
    out
}
