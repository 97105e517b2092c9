//! Parse tree structures consumed by the generator.
//!
//! The grammar and tokenizer live outside this crate. A front-end hands over a
//! tree of [`ParseNode`] values, typically serialised as YAML, and the model
//! builder in [`crate::model`] walks it. Each node carries its token kind, the
//! token text for leaves, a source [`Position`], the inclusive token span it
//! was parsed from, and its children.
//!
//! ```rust
//! use bakery::ast::{ParseTreeFile, TokenKind};
//!
//! let yaml = concat!(
//!     "source_file: hello.bkl\n",
//!     "root:\n",
//!     "  kind: program\n",
//!     "  children:\n",
//!     "    - kind: target\n",
//!     "      children:\n",
//!     "        - { kind: id, text: exe }\n",
//!     "        - { kind: id, text: hello }\n",
//! );
//! let tree: ParseTreeFile = serde_saphyr::from_str(yaml).expect("parse");
//! assert_eq!(tree.root.kind, TokenKind::Program);
//! ```

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Location of a construct in an input file.
///
/// Every part is optional; the display form joins the known parts with `:`
/// and falls back to `<unknown>` when nothing is known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Position {
    /// Source file name.
    #[serde(default)]
    pub file: Option<Utf8PathBuf>,
    /// One-based line number.
    #[serde(default)]
    pub line: Option<u32>,
    /// Column on the line.
    #[serde(default)]
    pub column: Option<u32>,
}

impl Position {
    /// Position pointing at `line:column` in `file`.
    #[must_use]
    pub fn new(file: impl Into<Utf8PathBuf>, line: u32, column: u32) -> Self {
        Self {
            file: Some(file.into()),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Return a copy whose missing file name is replaced by `file`.
    #[must_use]
    pub fn or_file(&self, file: &Utf8PathBuf) -> Self {
        Self {
            file: self.file.clone().or_else(|| Some(file.clone())),
            line: self.line,
            column: self.column,
        }
    }

    /// Whether no part of the position is known.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        self.file.is_none() && self.line.is_none() && self.column.is_none()
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return f.write_str("<unknown>");
        }
        let mut sep = "";
        if let Some(file) = &self.file {
            write!(f, "{file}")?;
            sep = ":";
        }
        if let Some(line) = self.line {
            write!(f, "{sep}{line}")?;
            sep = ":";
        }
        if let Some(column) = self.column {
            write!(f, "{sep}{column}")?;
        }
        Ok(())
    }
}

/// Token kinds produced by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    /// Root of a module file.
    Program,
    /// Empty node.
    Nil,
    /// Literal value.
    Literal,
    /// Identifier (variable, target or target type name).
    Id,
    /// Explicit list of values.
    List,
    /// Explicit concatenation of fragments.
    Concat,
    /// Run of fragments not yet split into list items and concatenations.
    ListOrConcat,
    /// Reference to a variable; the single child is the identifier.
    VarReference,
    /// `var = value`
    Assign,
    /// `var += value`
    Append,
    /// `sources { ... }` and `headers { ... }`
    FilesList,
    /// Target definition: type identifier, name identifier, then content.
    Target,
    /// Conditional block: condition, then content.
    If,
    /// Boolean `&&`.
    And,
    /// Boolean `||`.
    Or,
    /// Boolean `!`.
    Not,
    /// Comparison `==`.
    Equal,
    /// Comparison `!=`.
    NotEqual,
}

/// A single node of the parse tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParseNode {
    /// Token kind selecting how the node is interpreted.
    pub kind: TokenKind,
    /// Token text for literals and identifiers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Where the node starts in the source file.
    #[serde(default)]
    pub pos: Position,
    /// Index of the first token covered by the node.
    #[serde(default)]
    pub start: usize,
    /// Index of the last token covered by the node (inclusive).
    #[serde(default)]
    pub stop: usize,
    /// Child nodes in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    /// Create a childless node of `kind` covering no particular tokens.
    #[must_use]
    pub const fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            text: None,
            pos: Position {
                file: None,
                line: None,
                column: None,
            },
            start: 0,
            stop: 0,
            children: Vec::new(),
        }
    }

    /// Leaf node carrying `text`.
    #[must_use]
    pub fn leaf(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(kind)
        }
    }

    /// Set the inclusive token span of the node.
    #[must_use]
    pub const fn with_span(mut self, start: usize, stop: usize) -> Self {
        self.start = start;
        self.stop = stop;
        self
    }

    /// Set the source position of the node.
    #[must_use]
    pub fn with_pos(mut self, pos: Position) -> Self {
        self.pos = pos;
        self
    }

    /// Replace the node's children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children = children;
        self
    }

    /// Token text, or the empty string for nodes without text.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// Child at `index`, if present.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<&Self> {
        self.children.get(index)
    }
}

/// One module's parse tree together with the file it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParseTreeFile {
    /// Path of the module's source file.
    pub source_file: Utf8PathBuf,
    /// Root node, normally of kind [`TokenKind::Program`].
    pub root: ParseNode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Position::new("a.bkl", 3, 7), "a.bkl:3:7")]
    #[case(Position { file: None, line: Some(4), column: None }, "4")]
    #[case(Position { file: Some("b.bkl".into()), line: None, column: Some(2) }, "b.bkl:2")]
    #[case(Position::default(), "<unknown>")]
    fn position_display_joins_known_parts(#[case] pos: Position, #[case] expected: &str) {
        assert_eq!(pos.to_string(), expected);
    }

    #[rstest]
    fn or_file_keeps_existing_file() {
        let fallback = Utf8PathBuf::from("other.bkl");
        let pos = Position::new("a.bkl", 1, 1).or_file(&fallback);
        assert_eq!(pos.file.as_ref().map(|p| p.as_str()), Some("a.bkl"));
        let pos = Position::default().or_file(&fallback);
        assert_eq!(pos.file.as_ref(), Some(&fallback));
    }
}
