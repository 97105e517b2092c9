//! Expression model.
//!
//! Property values, build commands and file lists are all represented as
//! [`Expr`] trees. The tree is backend-agnostic: it never embeds the syntax
//! of a particular build tool. Backends render it through an
//! [`ExprFormatter`] configured with their own [`Dialect`] and the
//! [`PathAnchors`] of the file being written.
//!
//! # Examples
//!
//! ```
//! use bakery::expr::{Anchor, Expr};
//!
//! let cflags = Expr::list(vec![
//!     Expr::literal("-O2"),
//!     Expr::concat(vec![Expr::literal("-I"), Expr::reference("INCDIR")]),
//! ]);
//! assert_eq!(cflags.items().len(), 2);
//!
//! let source = Expr::path_from_str(Anchor::TopSrcDir, "src/main.c");
//! assert!(matches!(source, Expr::Path(_)));
//! ```

mod anchors;
mod disambiguate;
mod format;

pub use anchors::{PathAnchors, normalize_path, relative_path};
pub use disambiguate::{DisambiguationError, SourceFragment, TokenSpan, disambiguate};
pub use format::{Dialect, ExprFormatter, FormatError};

use crate::ast::Position;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// A literal string value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Literal {
    /// Text of the literal.
    pub text: String,
    /// Where the literal was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
}

/// Reference to a named variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VarReference {
    /// Name of the referenced variable.
    pub var: String,
    /// Where the reference was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
}

/// Boolean and comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoolOperator {
    /// Both operands hold.
    And,
    /// Either operand holds.
    Or,
    /// Negation of the single operand.
    Not,
    /// Operands render to the same text.
    Equal,
    /// Operands render to different text.
    NotEqual,
}

impl Display for BoolOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Not => "!",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        })
    }
}

/// Boolean expression. `Not` carries only a left operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoolExpr {
    /// Operator combining the operands.
    pub operator: BoolOperator,
    /// First (or only) operand.
    pub left: Box<Expr>,
    /// Second operand; absent for [`BoolOperator::Not`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<Expr>>,
    /// Where the expression was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
}

/// Reference point a path value is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    /// Relative to the project's top source directory.
    TopSrcDir,
    /// Relative to the backend's build directory.
    BuildDir,
    /// Not anchored; rendered verbatim.
    Unanchored,
}

impl Display for Anchor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TopSrcDir => "@top_srcdir",
            Self::BuildDir => "@builddir",
            Self::Unanchored => "@none",
        })
    }
}

/// Path value made of components joined by the backend's separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathExpr {
    /// Directory the components are relative to.
    pub anchor: Anchor,
    /// Path components; each may itself be a concatenation.
    pub components: Vec<Expr>,
    /// Where the path was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
}

impl PathExpr {
    /// Position of the path, falling back to its components.
    #[must_use]
    pub fn position(&self) -> Option<&Position> {
        self.pos
            .as_ref()
            .or_else(|| self.components.iter().find_map(Expr::position))
    }

    /// Final component rendered as plain text, if it is literal.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        self.components.last().and_then(Expr::literal_text)
    }

    /// Extension of the final component, without the dot.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name()?;
        let (stem, ext) = name.rsplit_once('.')?;
        (!stem.is_empty()).then(|| ext.to_owned())
    }
}

/// A value in the project model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Expr {
    /// Literal text.
    Literal(Literal),
    /// Variable reference.
    Reference(VarReference),
    /// Ordered list of values.
    List {
        /// List items.
        items: Vec<Expr>,
    },
    /// Values joined without separator into one string.
    Concat {
        /// Concatenated fragments.
        items: Vec<Expr>,
    },
    /// Boolean or comparison expression.
    Bool(BoolExpr),
    /// Anchored path.
    Path(PathExpr),
}

impl Expr {
    /// Literal without a source position.
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(Literal {
            text: text.into(),
            pos: None,
        })
    }

    /// Literal written at `pos`.
    #[must_use]
    pub fn literal_at(text: impl Into<String>, pos: Position) -> Self {
        Self::Literal(Literal {
            text: text.into(),
            pos: Some(pos),
        })
    }

    /// Reference to `var` without a source position.
    #[must_use]
    pub fn reference(var: impl Into<String>) -> Self {
        Self::Reference(VarReference {
            var: var.into(),
            pos: None,
        })
    }

    /// Reference to `var` written at `pos`.
    #[must_use]
    pub fn reference_at(var: impl Into<String>, pos: Position) -> Self {
        Self::Reference(VarReference {
            var: var.into(),
            pos: Some(pos),
        })
    }

    /// List of `items`; single-fragment concatenations are collapsed.
    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List {
            items: items.into_iter().map(Self::collapse).collect(),
        }
    }

    /// The empty list.
    #[must_use]
    pub const fn empty_list() -> Self {
        Self::List { items: Vec::new() }
    }

    /// Concatenation of `items`. A single item is returned unwrapped.
    #[must_use]
    pub fn concat(mut items: Vec<Self>) -> Self {
        if items.len() == 1
            && let Some(only) = items.pop()
        {
            return only;
        }
        Self::Concat { items }
    }

    /// Path anchored at `anchor` made of `components`.
    #[must_use]
    pub const fn path(anchor: Anchor, components: Vec<Self>) -> Self {
        Self::Path(PathExpr {
            anchor,
            components,
            pos: None,
        })
    }

    /// Path built by splitting `path` on `/`.
    ///
    /// An absolute `path` keeps an empty first component so the rendered
    /// value still starts with the separator.
    #[must_use]
    pub fn path_from_str(anchor: Anchor, path: &str) -> Self {
        let root = path.starts_with('/').then(|| Self::literal(""));
        let components = root
            .into_iter()
            .chain(
                path.split('/')
                    .filter(|part| !part.is_empty() && *part != ".")
                    .map(Self::literal),
            )
            .collect();
        Self::path(anchor, components)
    }

    fn binary(operator: BoolOperator, left: Self, right: Self) -> Self {
        Self::Bool(BoolExpr {
            operator,
            left: Box::new(left),
            right: Some(Box::new(right)),
            pos: None,
        })
    }

    /// `left && right`
    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::binary(BoolOperator::And, left, right)
    }

    /// `left || right`
    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::binary(BoolOperator::Or, left, right)
    }

    /// `left == right`
    #[must_use]
    pub fn equal(left: Self, right: Self) -> Self {
        Self::binary(BoolOperator::Equal, left, right)
    }

    /// `left != right`
    #[must_use]
    pub fn not_equal(left: Self, right: Self) -> Self {
        Self::binary(BoolOperator::NotEqual, left, right)
    }

    /// `!operand`
    #[must_use]
    pub fn not(operand: Self) -> Self {
        Self::Bool(BoolExpr {
            operator: BoolOperator::Not,
            left: Box::new(operand),
            right: None,
            pos: None,
        })
    }

    fn collapse(self) -> Self {
        match self {
            Self::Concat { items } => Self::concat(items),
            other => other,
        }
    }

    /// First source position found in the expression, depth first.
    #[must_use]
    pub fn position(&self) -> Option<&Position> {
        match self {
            Self::Literal(lit) => lit.pos.as_ref(),
            Self::Reference(var) => var.pos.as_ref(),
            Self::List { items } | Self::Concat { items } => {
                items.iter().find_map(Self::position)
            }
            Self::Bool(b) => b.pos.as_ref().or_else(|| b.left.position()),
            Self::Path(p) => p.position(),
        }
    }

    /// Attach `pos` to a leaf that has no position yet.
    #[must_use]
    pub fn with_position_if_missing(self, pos: Option<Position>) -> Self {
        match (self, pos) {
            (Self::Literal(mut lit), Some(pos)) if lit.pos.is_none() => {
                lit.pos = Some(pos);
                Self::Literal(lit)
            }
            (Self::Reference(mut var), Some(pos)) if var.pos.is_none() => {
                var.pos = Some(pos);
                Self::Reference(var)
            }
            (Self::Path(mut path), Some(pos)) if path.pos.is_none() => {
                path.pos = Some(pos);
                Self::Path(path)
            }
            (other, _) => other,
        }
    }

    /// Items of a list, or the value itself for anything else.
    #[must_use]
    pub fn items(&self) -> &[Self] {
        match self {
            Self::List { items } => items,
            other => std::slice::from_ref(other),
        }
    }

    /// Whether the value is a list with no items.
    #[must_use]
    pub fn is_empty_list(&self) -> bool {
        matches!(self, Self::List { items } if items.is_empty())
    }

    /// Text of a plain literal.
    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(lit) => Some(lit.text.as_str()),
            _ => None,
        }
    }

    /// Text of a value built only from literals, concatenations and
    /// literal path components joined with `/`.
    #[must_use]
    pub fn literal_text(&self) -> Option<String> {
        match self {
            Self::Literal(lit) => Some(lit.text.clone()),
            Self::Concat { items } => items.iter().map(Self::literal_text).collect(),
            Self::Path(path) => {
                let parts: Option<Vec<String>> =
                    path.components.iter().map(Self::literal_text).collect();
                parts.map(|parts| parts.join("/"))
            }
            Self::Reference(_) | Self::List { .. } | Self::Bool(_) => None,
        }
    }

    /// Literal text of every list item, or `None` if any item is not literal.
    #[must_use]
    pub fn as_literal_list(&self) -> Option<Vec<String>> {
        self.items().iter().map(Self::literal_text).collect()
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Self::literal(value)
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Self::literal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn concat_of_one_collapses() {
        let expr = Expr::concat(vec![Expr::literal("foo")]);
        assert_eq!(expr, Expr::literal("foo"));
    }

    #[rstest]
    fn list_collapses_single_item_concatenations() {
        let expr = Expr::list(vec![Expr::Concat {
            items: vec![Expr::reference("X")],
        }]);
        assert_eq!(expr.items(), &[Expr::reference("X")]);
    }

    #[rstest]
    #[case(Expr::literal("a"), Some("a"))]
    #[case(Expr::concat(vec!["a".into(), "b".into()]), Some("ab"))]
    #[case(Expr::path_from_str(Anchor::TopSrcDir, "src/./a.c"), Some("src/a.c"))]
    #[case(Expr::concat(vec!["a".into(), Expr::reference("B")]), None)]
    fn literal_text_flattens_plain_values(#[case] expr: Expr, #[case] expected: Option<&str>) {
        assert_eq!(expr.literal_text().as_deref(), expected);
    }

    #[rstest]
    fn position_is_found_depth_first() {
        let pos = Position::new("m.bkl", 2, 4);
        let expr = Expr::list(vec![
            Expr::literal("a"),
            Expr::concat(vec![Expr::literal("b"), Expr::literal_at("c", pos.clone())]),
        ]);
        assert_eq!(expr.position(), Some(&pos));
    }

    #[rstest]
    #[case("main.c", Some("c"))]
    #[case("lib/archive.tar.gz", Some("gz"))]
    #[case("Makefile", None)]
    #[case(".hidden", None)]
    fn path_extension(#[case] path: &str, #[case] expected: Option<&str>) {
        let Expr::Path(path) = Expr::path_from_str(Anchor::TopSrcDir, path) else {
            panic!("expected a path");
        };
        assert_eq!(path.extension().as_deref(), expected);
    }
}
