//! Generic tagged tree for XML-based project formats.
//!
//! A [`Node`] has ordered attributes and ordered children; a child is either
//! a nested node or a scalar `<Name>value</Name>` pair. Values stay
//! expressions until the tree is serialized, so paths are rendered relative
//! to the file they end up in.

use crate::expr::{Dialect, Expr, ExprFormatter, FormatError};
use indexmap::IndexMap;
use std::borrow::Cow;

/// Declaration written at the top of every XML file.
pub const XML_HEADER: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
    "<!-- This file was generated by bakery. Do not modify, all changes will be overwritten! -->\n",
);

/// A scalar value of an attribute or element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Rendered through the file's formatter.
    Expr(Expr),
    /// Rendered with the dialect's boolean tokens.
    Bool(bool),
    /// Written as is.
    Text(String),
}

impl From<Expr> for Value {
    fn from(value: Expr) -> Self {
        Self::Expr(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A child of a [`Node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    /// Nested element.
    Node(Node),
    /// `<name>value</name>`; omitted when the value renders empty.
    Value {
        /// Element name.
        name: String,
        /// Element content.
        value: Value,
    },
}

/// An XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Element name.
    pub name: String,
    attrs: IndexMap<String, Value>,
    text: Option<Value>,
    children: Vec<Child>,
}

impl Node {
    /// Element `name` without attributes or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: IndexMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Set attribute `key`.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Set the element's text content, written on the element's own line.
    /// Children are ignored once text is set.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<Value>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a nested element.
    pub fn add_node(&mut self, node: Self) {
        self.children.push(Child::Node(node));
    }

    /// Append a scalar element.
    pub fn add_value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.children.push(Child::Value {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Whether the element has children.
    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

fn escape_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>']) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    )
}

fn quote_attr(text: &str) -> String {
    let escaped = escape_text(text)
        .replace('"', "&quot;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;");
    format!("\"{escaped}\"")
}

/// Serializes [`Node`] trees with one expression formatter.
#[derive(Debug, Clone, Copy)]
pub struct XmlFormatter<'a, D: Dialect + ?Sized> {
    fmt: &'a ExprFormatter<'a, D>,
}

impl<'a, D: Dialect + ?Sized> XmlFormatter<'a, D> {
    /// Formatter rendering values through `fmt`.
    #[must_use]
    pub const fn new(fmt: &'a ExprFormatter<'a, D>) -> Self {
        Self { fmt }
    }

    /// Render `root` as a complete document, header included.
    ///
    /// # Errors
    ///
    /// Returns the first [`FormatError`] raised while rendering a value.
    pub fn format(&self, root: &Node) -> Result<String, FormatError> {
        let mut out = String::from(XML_HEADER);
        self.format_node(&mut out, root, "")?;
        Ok(out)
    }

    fn value(&self, value: &Value) -> Result<String, FormatError> {
        match value {
            Value::Expr(expr) => self.fmt.format(expr),
            Value::Bool(flag) => Ok(self.fmt.dialect().boolean(*flag).to_owned()),
            Value::Text(text) => Ok(text.clone()),
        }
    }

    fn format_node(&self, out: &mut String, node: &Node, indent: &str) -> Result<(), FormatError> {
        out.push_str(indent);
        out.push('<');
        out.push_str(&node.name);
        for (key, value) in &node.attrs {
            out.push(' ');
            out.push_str(key);
            out.push('=');
            out.push_str(&quote_attr(&self.value(value)?));
        }
        if let Some(text) = &node.text {
            let text = self.value(text)?;
            out.push_str(&format!(">{}</{}>\n", escape_text(&text), node.name));
            return Ok(());
        }
        if !node.has_children() {
            out.push_str(" />\n");
            return Ok(());
        }
        out.push_str(">\n");
        let inner = format!("{indent}  ");
        for child in &node.children {
            match child {
                Child::Node(nested) => self.format_node(out, nested, &inner)?,
                Child::Value { name, value } => {
                    let text = self.value(value)?;
                    if text.is_empty() {
                        continue;
                    }
                    out.push_str(&format!("{inner}<{name}>{}</{name}>\n", escape_text(&text)));
                }
            }
        }
        out.push_str(&format!("{indent}</{}>\n", node.name));
        Ok(())
    }
}
