//! SVG document tree – an owned, mutable copy of a parsed template.
//!
//! Parsing is delegated to `roxmltree`, which only offers a borrowed,
//! read-only view. The merge stage needs to rewrite text and splice in new
//! subtrees, so the parsed document is converted into the owned tree below.
//! `Clone` on [`Document`] is the per-page deep copy.
//!
//! Serialisation goes through `quick_xml::Writer`. Namespace prefixes are
//! resolved against the declarations in scope at write time, so elements
//! created by the merger (QR graphics, wrapping groups) land in the SVG
//! namespace regardless of how the template spelled it.

use std::borrow::Cow;

use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute as XmlAttribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName as XmlName;
use quick_xml::Writer;

use crate::error::MergeError;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

// ---------------------------------------------------------------------------
// Tree types
// ---------------------------------------------------------------------------

/// An expanded element or attribute name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    /// Namespace URI, if any.
    pub namespace: Option<String>,
    /// Prefix the source document used; only a hint for serialisation.
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    pub fn local(local: &str) -> Self {
        Self {
            namespace: None,
            prefix: None,
            local: local.to_string(),
        }
    }

    pub fn svg(local: &str) -> Self {
        Self {
            namespace: Some(SVG_NS.to_string()),
            prefix: None,
            local: local.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// A namespace declaration written on an element (`xmlns` / `xmlns:p`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub namespaces: Vec<NamespaceDecl>,
    pub children: Vec<Node>,
}

/// A parsed SVG document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element in the SVG namespace.
    pub fn svg(local: &str) -> Self {
        Self::new(QName::svg(local))
    }

    pub fn local_name(&self) -> &str {
        &self.name.local
    }

    /// True for `<local>` in the SVG namespace.
    pub fn is_svg(&self, local: &str) -> bool {
        self.name.local == local && self.name.namespace.as_deref() == Some(SVG_NS)
    }

    /// Value of an un-namespaced attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local == name)
            .map(|a| a.value.as_str())
    }

    /// Set an un-namespaced attribute, keeping its position if it exists.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name.namespace.is_none() && a.name.local == name)
        {
            Some(existing) => existing.value = value.to_string(),
            None => self.attributes.push(Attribute {
                name: QName::local(name),
                value: value.to_string(),
            }),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn push_element(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Replace the text that precedes the first child node, leaving child
    /// elements (and any text after them) alone.
    pub fn set_text(&mut self, text: &str) {
        match self.children.first_mut() {
            Some(Node::Text(existing)) => *existing = text.to_string(),
            _ => self.children.insert(0, Node::Text(text.to_string())),
        }
    }

    /// Concatenated text of this element and all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Child elements, skipping text and comments.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// All descendant elements (not including `self`) in document order.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }

    /// Child-index paths of every descendant matching `pred`, in document
    /// order. Indices address `children` (text and comment nodes included).
    pub fn find_paths<F>(&self, pred: F) -> Vec<Vec<usize>>
    where
        F: Fn(&Element) -> bool,
    {
        let mut out = Vec::new();
        let mut path = Vec::new();
        collect_paths(self, &pred, &mut path, &mut out);
        out
    }

    /// Descendant reached by following `path` from this element.
    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &index in path {
            current = match current.children.get_mut(index) {
                Some(Node::Element(e)) => e,
                _ => return None,
            };
        }
        Some(current)
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
            Node::Comment(_) => {}
        }
    }
}

fn collect_descendants<'a>(element: &'a Element, out: &mut Vec<&'a Element>) {
    for child in element.child_elements() {
        out.push(child);
        collect_descendants(child, out);
    }
}

fn collect_paths<F>(element: &Element, pred: &F, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>)
where
    F: Fn(&Element) -> bool,
{
    for (index, child) in element.children.iter().enumerate() {
        if let Node::Element(e) = child {
            path.push(index);
            if pred(e) {
                out.push(path.clone());
            }
            collect_paths(e, pred, path, out);
            path.pop();
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse an SVG (or any XML) string into an owned [`Document`].
pub fn parse_svg(text: &str) -> Result<Document, MergeError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(text, options)?;
    Ok(Document {
        root: convert_element(doc.root_element()),
    })
}

fn convert_element(node: roxmltree::Node<'_, '_>) -> Element {
    let tag = node.tag_name();
    let namespace = tag.namespace().map(str::to_string);
    let prefix = namespace
        .as_deref()
        .and_then(|uri| source_prefix(node, uri, true));

    let mut element = Element::new(QName {
        namespace,
        prefix,
        local: tag.name().to_string(),
    });
    element.namespaces = declared_namespaces(node);

    for attr in node.attributes() {
        let namespace = attr.namespace().map(str::to_string);
        let prefix = namespace
            .as_deref()
            .and_then(|uri| source_prefix(node, uri, false));
        element.attributes.push(Attribute {
            name: QName {
                namespace,
                prefix,
                local: attr.name().to_string(),
            },
            value: attr.value().to_string(),
        });
    }

    for child in node.children() {
        match child.node_type() {
            roxmltree::NodeType::Element => {
                element.children.push(Node::Element(convert_element(child)))
            }
            roxmltree::NodeType::Text => {
                if let Some(text) = child.text() {
                    element.children.push(Node::Text(text.to_string()));
                }
            }
            roxmltree::NodeType::Comment => {
                if let Some(text) = child.text() {
                    element.children.push(Node::Comment(text.to_string()));
                }
            }
            _ => {}
        }
    }

    element
}

/// Prefix bound to `uri` at `node`. Elements prefer the default namespace.
fn source_prefix(node: roxmltree::Node<'_, '_>, uri: &str, allow_default: bool) -> Option<String> {
    if uri == XML_NS {
        return Some("xml".to_string());
    }
    let mut named = None;
    for ns in node.namespaces() {
        if ns.uri() != uri {
            continue;
        }
        match ns.name() {
            None if allow_default => return None,
            None => {}
            Some(p) => {
                if named.is_none() {
                    named = Some(p.to_string());
                }
            }
        }
    }
    named
}

/// Namespaces in scope at `node` that were not in scope at its parent.
fn declared_namespaces(node: roxmltree::Node<'_, '_>) -> Vec<NamespaceDecl> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    node.namespaces()
        .filter(|ns| ns.uri() != XML_NS)
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| NamespaceDecl {
            prefix: ns.name().map(str::to_string),
            uri: ns.uri().to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Serialisation
// ---------------------------------------------------------------------------

impl Document {
    /// Serialise to an XML string, including the XML declaration.
    pub fn to_xml(&self) -> Result<String, MergeError> {
        let mut writer = Writer::new(Vec::new());
        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        emit(&mut writer, Event::Text(BytesText::from_escaped("\n")))?;
        let mut scope = Scope::default();
        write_element(&self.root, &mut scope, &mut writer)?;
        emit(&mut writer, Event::Text(BytesText::from_escaped("\n")))?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| MergeError::Serialize(e.to_string()))
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), MergeError> {
    writer
        .write_event(event)
        .map_err(|e| MergeError::Serialize(e.to_string()))
}

/// Namespace bindings visible at the element currently being written.
#[derive(Default)]
struct Scope {
    bindings: Vec<NamespaceDecl>,
    generated: usize,
}

impl Scope {
    fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix.as_deref() == prefix)
            .map(|b| b.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    fn is_bound(&self, prefix: Option<&str>, uri: &str) -> bool {
        self.resolve(prefix) == Some(uri)
    }

    /// A prefix currently bound to `uri`, `Some(None)` meaning the default.
    fn lookup(&self, uri: &str, allow_default: bool) -> Option<Option<&str>> {
        self.bindings
            .iter()
            .rev()
            .filter(|b| b.uri == uri)
            .filter(|b| allow_default || b.prefix.is_some())
            .map(|b| b.prefix.as_deref())
            .find(|p| self.is_bound(*p, uri))
    }

    fn bind(&mut self, decl: NamespaceDecl, extra: &mut Vec<NamespaceDecl>) {
        extra.push(decl.clone());
        self.bindings.push(decl);
    }
}

fn write_element(
    element: &Element,
    scope: &mut Scope,
    writer: &mut Writer<Vec<u8>>,
) -> Result<(), MergeError> {
    let mark = scope.bindings.len();
    scope.bindings.extend(element.namespaces.iter().cloned());
    let mut extra = Vec::new();

    let tag = element_name(&element.name, scope, &mut extra);
    let mut attrs = Vec::with_capacity(element.attributes.len());
    for attr in &element.attributes {
        attrs.push((attribute_name(&attr.name, scope, &mut extra), &attr.value));
    }

    let mut start = BytesStart::new(tag.as_str());
    for decl in element.namespaces.iter().chain(extra.iter()) {
        let key = match &decl.prefix {
            Some(p) => format!("xmlns:{p}"),
            None => "xmlns".to_string(),
        };
        start.push_attribute(escaped_attribute(&key, &decl.uri));
    }
    for (name, value) in &attrs {
        start.push_attribute(escaped_attribute(name, value));
    }

    if element.children.is_empty() {
        emit(writer, Event::Empty(start))?;
    } else {
        emit(writer, Event::Start(start))?;
        for child in &element.children {
            match child {
                Node::Element(e) => write_element(e, scope, writer)?,
                Node::Text(t) => {
                    let text = BytesText::from_escaped(escape_text(t));
                    emit(writer, Event::Text(text))?
                }
                Node::Comment(c) => {
                    emit(writer, Event::Comment(BytesText::from_escaped(c.as_str())))?
                }
            }
        }
        emit(writer, Event::End(BytesEnd::new(tag.as_str())))?;
    }

    scope.bindings.truncate(mark);
    Ok(())
}

fn element_name(name: &QName, scope: &mut Scope, extra: &mut Vec<NamespaceDecl>) -> String {
    let Some(uri) = name.namespace.as_deref() else {
        // An un-namespaced element under a default namespace needs it undone.
        if scope.resolve(None).is_some() {
            scope.bind(
                NamespaceDecl {
                    prefix: None,
                    uri: String::new(),
                },
                extra,
            );
        }
        return name.local.clone();
    };

    let prefix = match &name.prefix {
        Some(p) if scope.is_bound(Some(p.as_str()), uri) => Some(Some(p.clone())),
        None if scope.is_bound(None, uri) => Some(None),
        _ => scope.lookup(uri, true).map(|p| p.map(str::to_string)),
    };

    match prefix {
        Some(Some(p)) => format!("{p}:{}", name.local),
        Some(None) => name.local.clone(),
        None => {
            scope.bind(
                NamespaceDecl {
                    prefix: None,
                    uri: uri.to_string(),
                },
                extra,
            );
            name.local.clone()
        }
    }
}

fn attribute_name(name: &QName, scope: &mut Scope, extra: &mut Vec<NamespaceDecl>) -> String {
    let Some(uri) = name.namespace.as_deref() else {
        return name.local.clone();
    };
    if uri == XML_NS {
        return format!("xml:{}", name.local);
    }

    if let Some(p) = &name.prefix {
        if scope.is_bound(Some(p.as_str()), uri) {
            return format!("{p}:{}", name.local);
        }
    }
    if let Some(Some(p)) = scope.lookup(uri, false) {
        return format!("{p}:{}", name.local);
    }

    let prefix = match &name.prefix {
        Some(p) if scope.resolve(Some(p.as_str())).is_none() => p.clone(),
        _ => {
            scope.generated += 1;
            format!("ns{}", scope.generated)
        }
    };
    scope.bind(
        NamespaceDecl {
            prefix: Some(prefix.clone()),
            uri: uri.to_string(),
        },
        extra,
    );
    format!("{prefix}:{}", name.local)
}

/// Attribute with a pre-escaped value, so whitespace survives the parser's
/// attribute value normalisation.
fn escaped_attribute<'a>(name: &'a str, value: &str) -> XmlAttribute<'a> {
    XmlAttribute {
        key: XmlName(name.as_bytes()),
        value: Cow::Owned(escape_attr(value).into_bytes()),
    }
}

/// Carriage returns are written as references; a literal one would be
/// folded into `\n` by end-of-line handling.
fn escape_text(s: &str) -> String {
    escape(s).replace('\r', "&#13;")
}

fn escape_attr(s: &str) -> String {
    escape(s)
        .replace('\r', "&#13;")
        .replace('\n', "&#10;")
        .replace('\t', "&#9;")
}
