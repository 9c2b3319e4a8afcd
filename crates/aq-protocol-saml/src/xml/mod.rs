//! Namespace-aware XML element tree.
//!
//! Every element and attribute carries its resolved namespace URI next to the
//! prefix it was written with, so matching is done on `(namespace, local
//! name)` and canonicalization can decide which declarations are visibly
//! utilized without consulting the original document.

mod c14n;
mod validate;

pub use c14n::{canonicalize, escape_attribute, escape_text};
pub use validate::{StrictXmlValidator, XmlValidator};

use std::borrow::Cow;
use std::collections::BTreeMap;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{QName, ResolveResult};
use quick_xml::{NsReader, Writer};

use crate::error::{SamlError, SamlResult};
use crate::types::XMLDSIG_NS;

/// Deepest element nesting accepted by [`Document::parse`] and
/// [`StrictXmlValidator`].
pub const MAX_DEPTH: usize = 256;

/// In-scope namespace bindings, keyed by prefix (`""` for the default namespace).
pub type Namespaces = BTreeMap<String, String>;

/// An attribute with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Prefix as written, if any.
    pub prefix: Option<String>,
    /// Local name.
    pub name: String,
    /// Namespace URI; unprefixed attributes have none.
    pub namespace: Option<String>,
    /// Normalized, unescaped value.
    pub value: String,
}

impl XmlAttribute {
    /// Returns `prefix:name` or `name`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.name)
    }
}

/// A child node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Child element.
    Element(Element),
    /// Character data (entities already expanded).
    Text(String),
}

/// An XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Prefix as written, if any.
    pub prefix: Option<String>,
    /// Local name.
    pub name: String,
    /// Resolved namespace URI.
    pub namespace: Option<String>,
    /// Namespace declarations made on this element, `("", uri)` for `xmlns`.
    pub namespace_decls: Vec<(String, String)>,
    /// Non-namespace attributes in document order.
    pub attributes: Vec<XmlAttribute>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
}

fn qualify(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{name}"),
        None => name.to_string(),
    }
}

impl Element {
    /// Creates a prefixed element in `namespace`.
    #[must_use]
    pub fn new(prefix: &str, name: &str, namespace: &str) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            namespace_decls: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates an element in no namespace.
    #[must_use]
    pub fn unqualified(name: &str) -> Self {
        Self {
            prefix: None,
            name: name.to_string(),
            namespace: None,
            namespace_decls: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Declares `xmlns:prefix` (or `xmlns` for an empty prefix) on this element.
    #[must_use]
    pub fn with_namespace_decl(mut self, prefix: &str, uri: &str) -> Self {
        self.namespace_decls.retain(|(p, _)| p != prefix);
        self.namespace_decls.push((prefix.to_string(), uri.to_string()));
        self
    }

    /// Sets an unprefixed attribute.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Sets a namespaced attribute such as `xsi:type`.
    #[must_use]
    pub fn with_ns_attr(
        mut self,
        prefix: &str,
        name: &str,
        namespace: &str,
        value: impl Into<String>,
    ) -> Self {
        self.attributes
            .retain(|a| !(a.namespace.as_deref() == Some(namespace) && a.name == name));
        self.attributes.push(XmlAttribute {
            prefix: Some(prefix.to_string()),
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            value: value.into(),
        });
        self
    }

    /// Appends a child element.
    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Appends a text node.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Sets or replaces an unprefixed attribute.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self
            .attributes
            .iter_mut()
            .find(|a| a.namespace.is_none() && a.name == name)
        {
            existing.value = value;
        } else {
            self.attributes.push(XmlAttribute {
                prefix: None,
                name: name.to_string(),
                namespace: None,
                value,
            });
        }
    }

    /// Appends a child element.
    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Returns `prefix:name` or `name`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.name)
    }

    /// Returns whether this element is `{namespace}name`.
    #[must_use]
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.name == name
    }

    /// Returns an unprefixed attribute value.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Returns a namespaced attribute value.
    #[must_use]
    pub fn attr_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Iterates over child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// Iterates over child elements named `{namespace}name`.
    pub fn find_children<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements().filter(move |el| el.is(namespace, name))
    }

    /// Returns the first child element named `{namespace}name`.
    #[must_use]
    pub fn find_child(&self, namespace: &str, name: &str) -> Option<&Element> {
        self.child_elements().find(|el| el.is(namespace, name))
    }

    /// Returns the concatenated direct text content.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Returns a copy with direct `ds:Signature` children removed.
    ///
    /// This is the enveloped-signature transform applied to the signed element.
    #[must_use]
    pub fn without_signature(&self) -> Self {
        let mut copy = self.clone();
        copy.children.retain(|node| match node {
            Node::Element(el) => !el.is(XMLDSIG_NS, "Signature"),
            Node::Text(_) => true,
        });
        copy
    }

    /// Returns `inherited` extended with the declarations made on this element.
    #[must_use]
    pub fn in_scope(&self, inherited: &Namespaces) -> Namespaces {
        let mut scope = inherited.clone();
        for (prefix, uri) in &self.namespace_decls {
            scope.insert(prefix.clone(), uri.clone());
        }
        scope
    }

    /// Serializes the element without an XML declaration.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails.
    pub fn to_xml(&self) -> SamlResult<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer)?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| SamlError::XmlSerialize(e.to_string()))
    }

    fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        let qname = self.qualified_name();
        let mut start = BytesStart::new(qname.as_str());

        for (prefix, uri) in &self.namespace_decls {
            let key = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{prefix}")
            };
            push_escaped_attribute(&mut start, &key, uri);
        }
        for attr in &self.attributes {
            push_escaped_attribute(&mut start, &attr.qualified_name(), &attr.value);
        }

        if self.children.is_empty() {
            return write_event(writer, Event::Empty(start));
        }

        write_event(writer, Event::Start(start))?;
        for child in &self.children {
            match child {
                Node::Element(el) => el.write_to(writer)?,
                Node::Text(text) => write_event(
                    writer,
                    Event::Text(BytesText::from_escaped(escape_text(text))),
                )?,
            }
        }
        write_event(writer, Event::End(BytesEnd::new(qname.as_str())))
    }
}

fn push_escaped_attribute(start: &mut BytesStart<'_>, key: &str, value: &str) {
    // Whitespace is escaped so a re-parse does not normalize it to spaces.
    start.push_attribute(Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(escape_attribute(value).into_bytes()),
    });
}

fn write_event<W: std::io::Write>(writer: &mut Writer<W>, event: Event<'_>) -> SamlResult<()> {
    writer
        .write_event(event)
        .map_err(|e| SamlError::XmlSerialize(e.to_string()))
}

/// A parsed XML document.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Wraps an element as a document root.
    #[must_use]
    pub const fn from_root(root: Element) -> Self {
        Self { root }
    }

    /// Parses a UTF-8 document.
    ///
    /// Comments and processing instructions are dropped. Document type
    /// declarations are refused outright.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a single well-formed element tree.
    pub fn parse(input: &[u8]) -> SamlResult<Self> {
        let text = std::str::from_utf8(input)
            .map_err(|e| SamlError::XmlParse(format!("input is not UTF-8: {e}")))?;

        let mut reader = NsReader::from_str(text);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let (resolved, event) = reader.read_resolved_event()?;
            let namespace = resolved_namespace(resolved)?;

            if matches!(event, Event::Start(_) | Event::Empty(_)) && stack.len() >= MAX_DEPTH {
                return Err(SamlError::XmlParse(format!(
                    "elements nested deeper than {MAX_DEPTH}"
                )));
            }

            match event {
                Event::Start(start) => {
                    stack.push(build_element(&reader, namespace, &start)?);
                }
                Event::Empty(start) => {
                    let el = build_element(&reader, namespace, &start)?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| SamlError::XmlParse("unexpected end tag".to_string()))?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::Text(text) => {
                    let raw = std::str::from_utf8(text.as_ref())
                        .map_err(|e| SamlError::XmlParse(e.to_string()))?;
                    let normalized = normalize_line_endings(raw);
                    let value = quick_xml::escape::unescape(&normalized)?.into_owned();
                    push_text(&mut stack, value)?;
                }
                Event::CData(data) => {
                    let value = String::from_utf8(data.into_inner().into_owned())
                        .map_err(|e| SamlError::XmlParse(e.to_string()))?;
                    push_text(&mut stack, normalize_line_endings(&value).into_owned())?;
                }
                Event::DocType(_) => {
                    return Err(SamlError::XmlParse(
                        "document type declarations are not allowed".to_string(),
                    ));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(SamlError::XmlParse("unclosed element".to_string()));
        }
        root.map(|root| Self { root })
            .ok_or_else(|| SamlError::XmlParse("document has no root element".to_string()))
    }

    /// Returns the root element.
    #[must_use]
    pub const fn root(&self) -> &Element {
        &self.root
    }

    /// Consumes the document, returning the root element.
    #[must_use]
    pub fn into_root(self) -> Element {
        self.root
    }

    /// Follows a path of local names starting at the root.
    ///
    /// `["Envelope", "Body", "Response"]` matches the root `Envelope`, its
    /// first `Body` child and that child's first `Response` child, whatever
    /// their namespaces. The namespaces in scope at the found element (its
    /// ancestors' declarations) are returned alongside it.
    #[must_use]
    pub fn find_path(&self, path: &[&str]) -> Option<(&Element, Namespaces)> {
        let (first, rest) = path.split_first()?;
        if self.root.name != *first {
            return None;
        }

        let mut current = &self.root;
        let mut scope = Namespaces::new();
        for name in rest {
            let next = current.child_elements().find(|el| el.name == *name)?;
            scope = current.in_scope(&scope);
            current = next;
        }
        Some((current, scope))
    }
}

fn resolved_namespace(resolved: ResolveResult<'_>) -> SamlResult<Option<String>> {
    match resolved {
        ResolveResult::Bound(ns) => std::str::from_utf8(ns.as_ref())
            .map(|uri| Some(uri.to_string()))
            .map_err(|e| SamlError::XmlParse(e.to_string())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(SamlError::XmlParse(format!(
            "unknown namespace prefix {:?}",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn build_element(
    reader: &NsReader<&[u8]>,
    namespace: Option<String>,
    start: &BytesStart<'_>,
) -> SamlResult<Element> {
    let qname = start.name();
    let prefix = qname
        .prefix()
        .map(|p| utf8(p.as_ref()))
        .transpose()?;
    let name = utf8(qname.local_name().as_ref())?;

    let mut el = Element {
        prefix,
        name,
        namespace,
        namespace_decls: Vec::new(),
        attributes: Vec::new(),
        children: Vec::new(),
    };

    for attr in start.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref();
        let value = attribute_value(&attr.value)?;

        if key == b"xmlns" {
            el.namespace_decls.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            el.namespace_decls.push((utf8(prefix)?, value));
        } else {
            let (resolved, local) = reader.resolve_attribute(attr.key);
            let namespace = resolved_namespace(resolved)?;
            el.attributes.push(XmlAttribute {
                prefix: attr.key.prefix().map(|p| utf8(p.as_ref())).transpose()?,
                name: utf8(local.as_ref())?,
                namespace,
                value,
            });
        }
    }

    Ok(el)
}

/// Applies attribute-value normalization, then expands references.
pub(crate) fn attribute_value(raw: &[u8]) -> SamlResult<String> {
    let raw = std::str::from_utf8(raw).map_err(|e| SamlError::XmlParse(e.to_string()))?;
    let normalized: String = normalize_line_endings(raw)
        .chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect();
    Ok(quick_xml::escape::unescape(&normalized)?.into_owned())
}

pub(crate) fn normalize_line_endings(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

fn utf8(bytes: &[u8]) -> SamlResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| SamlError::XmlParse(e.to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) -> SamlResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(el));
        Ok(())
    } else if root.is_some() {
        Err(SamlError::XmlParse("multiple root elements".to_string()))
    } else {
        *root = Some(el);
        Ok(())
    }
}

fn push_text(stack: &mut [Element], text: String) -> SamlResult<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Text(text));
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(SamlError::XmlParse("text outside the root element".to_string())),
    }
}
