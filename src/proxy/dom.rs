//! Document-tree abstraction for the HTML rewriter.
//!
//! Wraps the `scraper` parse tree behind attribute-centric queries and
//! mutations, so the rewriter depends on "find elements with attribute X"
//! rather than on parser internals.

use ego_tree::NodeId;
use html5ever::{namespace_url, ns, LocalName, QualName};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("document has no root element")]
    NoRoot,
}

/// A parsed HTML document open for attribute-level rewriting.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse an HTML document. The parser is error-tolerant: malformed input
    /// yields a best-effort tree rather than a failure.
    pub fn parse(input: &str) -> Self {
        Self {
            html: Html::parse_document(input),
        }
    }

    /// Ids of every element carrying the named attribute, in document order.
    pub fn elements_with_attribute(&self, name: &str) -> Vec<NodeId> {
        let Ok(selector) = Selector::parse(&format!("[{name}]")) else {
            return Vec::new();
        };
        self.html.select(&selector).map(|el| el.id()).collect()
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        match self.html.tree.get(id)?.value() {
            Node::Element(el) => el.attr(name).map(str::to_string),
            _ => None,
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(mut node) = self.html.tree.get_mut(id) {
            if let Node::Element(el) = node.value() {
                el.attrs.insert(qualify(name), value.into());
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(mut node) = self.html.tree.get_mut(id) {
            if let Node::Element(el) = node.value() {
                el.attrs.retain(|key, _| key.local.as_ref() != name);
            }
        }
    }

    /// True when any ancestor of `id` is an `<svg>` element.
    pub fn has_svg_ancestor(&self, id: NodeId) -> bool {
        let Some(node) = self.html.tree.get(id) else {
            return false;
        };
        node.ancestors()
            .any(|a| matches!(a.value(), Node::Element(el) if el.name.local.as_ref() == "svg"))
    }

    /// Serialize back to an HTML string, preserving any doctype.
    pub fn serialize(&self) -> Result<String, SerializeError> {
        let mut out = String::new();
        for child in self.html.tree.root().children() {
            match child.value() {
                Node::Doctype(doctype) => {
                    out.push_str("<!DOCTYPE ");
                    out.push_str(&doctype.name);
                    out.push('>');
                }
                Node::Comment(comment) => {
                    out.push_str("<!--");
                    out.push_str(&comment.comment);
                    out.push_str("-->");
                }
                Node::Text(text) => out.push_str(&text.text),
                Node::Element(_) => {
                    let el = ElementRef::wrap(child).ok_or(SerializeError::NoRoot)?;
                    out.push_str(&el.html());
                }
                _ => {}
            }
        }
        if out.is_empty() {
            return Err(SerializeError::NoRoot);
        }
        Ok(out)
    }
}

fn qualify(name: &str) -> QualName {
    QualName::new(None, ns!(), LocalName::from(name))
}
