//! Owned SVG element tree.
//!
//! `roxmltree` gives a borrowed, read-only view of the input text. Every consumer of a cached
//! document needs a tree it can mutate independently, so the parse is converted into an owned
//! [`SvgElement`] once and cloned per consumer.

use crate::error::ParseError;
use indexmap::IndexMap;
use std::fmt::Write as _;

const NS_XML_URI: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SvgNode {
    Element(SvgElement),
    /// Character data. CDATA sections are folded into text by the parser.
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SvgElement {
    /// Qualified name as written (`svg`, `xlink:foo`).
    pub name: String,
    /// Attributes in document order, including `xmlns`/`xmlns:*` declarations.
    pub attrs: IndexMap<String, String>,
    pub children: Vec<SvgNode>,
}

impl SvgElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: SvgNode) -> Self {
        self.children.push(child);
        self
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Removes an attribute, keeping the order of the remaining ones.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attrs.shift_remove(name)
    }

    /// Direct child elements.
    pub fn elements(&self) -> impl Iterator<Item = &SvgElement> {
        self.children.iter().filter_map(|c| match c {
            SvgNode::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut SvgElement> {
        self.children.iter_mut().filter_map(|c| match c {
            SvgNode::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for c in &self.children {
            if let SvgNode::Text(t) = c {
                out.push_str(t);
            }
        }
        out
    }

    /// Depth-first search over this element and its descendants.
    pub fn find(&self, pred: &impl Fn(&SvgElement) -> bool) -> Option<&SvgElement> {
        if pred(self) {
            return Some(self);
        }
        self.elements().find_map(|c| c.find(pred))
    }

    /// Calls `f` on this element and then on every descendant element, in document order.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut SvgElement)) {
        f(self);
        for c in self.elements_mut() {
            c.visit_mut(f);
        }
    }

    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            let _ = write!(out, " {k}=\"");
            escape_xml_into(out, v);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for c in &self.children {
            match c {
                SvgNode::Element(el) => el.write_markup(out),
                SvgNode::Text(t) => escape_xml_into(out, t),
                SvgNode::Comment(t) => {
                    out.push_str("<!--");
                    out.push_str(t);
                    out.push_str("-->");
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl std::fmt::Display for SvgElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_markup())
    }
}

/// A parsed SVG document. Immutable once built; see [`SvgDocument::clone_root`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgDocument {
    root: SvgElement,
}

impl SvgDocument {
    /// Parses markup and keeps the first `<svg>` element (the document element in practice).
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut opts = roxmltree::ParsingOptions::default();
        opts.allow_dtd = true;
        let doc = roxmltree::Document::parse_with_options(text, opts).map_err(|e| ParseError {
            message: e.to_string(),
        })?;
        let root = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "svg")
            .ok_or_else(|| ParseError {
                message: "No SVG found in loaded contents".to_string(),
            })?;
        Ok(Self {
            root: build_element(root, None),
        })
    }

    pub fn from_root(root: SvgElement) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &SvgElement {
        &self.root
    }

    /// Returns a private copy of the root for a single consumer to mutate.
    pub fn clone_root(&self) -> SvgElement {
        self.root.clone()
    }
}

impl std::str::FromStr for SvgDocument {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn qualified_name(n: roxmltree::Node<'_, '_>, ns: Option<&str>, local: &str) -> String {
    let prefix = match ns {
        Some(NS_XML_URI) => Some("xml"),
        Some(uri) => n.lookup_prefix(uri),
        None => None,
    };
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}:{local}"),
        _ => local.to_string(),
    }
}

fn build_element(
    n: roxmltree::Node<'_, '_>,
    parent: Option<roxmltree::Node<'_, '_>>,
) -> SvgElement {
    let tag = n.tag_name();
    let mut el = SvgElement::new(qualified_name(n, tag.namespace(), tag.name()));

    // roxmltree reports every namespace in scope; only re-declare the ones this element adds.
    for ns in n.namespaces() {
        if ns.uri() == NS_XML_URI {
            continue;
        }
        let inherited = parent.is_some_and(|p| {
            p.namespaces()
                .any(|pns| pns.name() == ns.name() && pns.uri() == ns.uri())
        });
        if inherited {
            continue;
        }
        let key = match ns.name() {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        };
        el.set_attr(key, ns.uri());
    }

    for a in n.attributes() {
        el.set_attr(qualified_name(n, a.namespace(), a.name()), a.value());
    }

    for c in n.children() {
        if c.is_element() {
            el.children
                .push(SvgNode::Element(build_element(c, Some(n))));
        } else if c.is_text() {
            if let Some(t) = c.text() {
                match el.children.last_mut() {
                    Some(SvgNode::Text(prev)) => prev.push_str(t),
                    _ => el.children.push(SvgNode::Text(t.to_string())),
                }
            }
        } else if c.is_comment() {
            if let Some(t) = c.text() {
                el.children.push(SvgNode::Comment(t.to_string()));
            }
        }
    }
    el
}

pub(crate) fn escape_xml_into(out: &mut String, text: &str) {
    let bytes = text.as_bytes();
    let mut start = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        let esc = match b {
            b'&' => Some("&amp;"),
            b'<' => Some("&lt;"),
            b'>' => Some("&gt;"),
            b'"' => Some("&quot;"),
            _ => None,
        };
        let Some(esc) = esc else {
            continue;
        };
        if start < i {
            out.push_str(&text[start..i]);
        }
        out.push_str(esc);
        start = i + 1;
    }
    if start < text.len() {
        out.push_str(&text[start..]);
    }
}
