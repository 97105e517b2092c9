//! Rendering expressions as backend text.
//!
//! [`ExprFormatter`] walks an [`Expr`] tree and defers every
//! backend-specific decision to a [`Dialect`]: how variables are referenced,
//! how literal text is escaped, what separates list items, and whether (and
//! how) conditions can be expressed. Path values are rendered relative to the
//! output file through the formatter's [`PathAnchors`].

// Module-level suppression for version-dependent lint false positives from
// miette/thiserror derive macros. FIXME: remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use super::{BoolExpr, BoolOperator, Expr, PathAnchors, PathExpr};
use crate::ast::Position;
use camino::Utf8PathBuf;
use miette::Diagnostic;
use std::borrow::Cow;
use thiserror::Error;

/// Errors raised while rendering an expression.
#[derive(Debug, Error, Diagnostic)]
pub enum FormatError {
    /// An anchor directory cannot be reached relative to the output file.
    #[error("{pos}: cannot express `{path}` relative to `{base}`")]
    #[diagnostic(
        code(bakery::format::relativize),
        help("keep output files and sources on the same root, or use absolute paths")
    )]
    Relativize {
        /// Directory that had to be reached.
        path: Utf8PathBuf,
        /// Directory of the output file.
        base: Utf8PathBuf,
        /// Position of the offending expression.
        pos: Position,
    },

    /// A condition reached a backend that cannot represent conditions.
    #[error("{pos}: conditional expressions cannot be written to {dialect} output")]
    #[diagnostic(code(bakery::format::unsupported_condition))]
    UnsupportedCondition {
        /// Name of the dialect that rejected the condition.
        dialect: String,
        /// Position of the condition.
        pos: Position,
    },

    /// A path used as a file location contains non-literal parts.
    #[error("{pos}: file locations must be literal paths")]
    #[diagnostic(
        code(bakery::format::non_literal_path),
        help("variable references cannot be resolved when choosing where to write a file")
    )]
    NonLiteralPath {
        /// Position of the path.
        pos: Position,
    },

    /// A build-directory path was rendered without a build directory.
    #[error("{pos}: path is relative to the build directory, but none is configured here")]
    #[diagnostic(code(bakery::format::missing_build_dir))]
    MissingBuildDir {
        /// Position of the path.
        pos: Position,
    },
}

/// Backend-specific rendering hooks.
pub trait Dialect {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Syntax for referencing variable `var`.
    fn reference(&self, var: &str) -> String;

    /// Escape literal text for the backend.
    fn escape_literal<'a>(&self, text: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }

    /// Separator placed between list items.
    fn list_separator(&self) -> &str {
        " "
    }

    /// Render `operator` applied to already rendered operands, or `None`
    /// when the backend cannot express conditions.
    fn condition(&self, _operator: BoolOperator, _left: &str, _right: Option<&str>) -> Option<String> {
        None
    }

    /// Token for a scalar boolean value.
    fn boolean(&self, value: bool) -> &'static str {
        if value { "true" } else { "false" }
    }
}

/// Renders expressions for one output file.
#[derive(Debug, Clone, Copy)]
pub struct ExprFormatter<'a, D: Dialect + ?Sized> {
    dialect: &'a D,
    anchors: &'a PathAnchors,
}

impl<'a, D: Dialect + ?Sized> ExprFormatter<'a, D> {
    /// Formatter using `dialect` for a file described by `anchors`.
    #[must_use]
    pub const fn new(dialect: &'a D, anchors: &'a PathAnchors) -> Self {
        Self { dialect, anchors }
    }

    /// The dialect this formatter renders for.
    #[must_use]
    pub const fn dialect(&self) -> &'a D {
        self.dialect
    }

    /// Anchors of the output file.
    #[must_use]
    pub const fn anchors(&self) -> &'a PathAnchors {
        self.anchors
    }

    /// Render `expr` as backend text.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] if a path cannot be relativized or a
    /// condition reaches a dialect without condition support.
    pub fn format(&self, expr: &Expr) -> Result<String, FormatError> {
        match expr {
            Expr::Literal(lit) => Ok(self.dialect.escape_literal(&lit.text).into_owned()),
            Expr::Reference(var) => Ok(self.dialect.reference(&var.var)),
            Expr::List { items } => {
                let parts = self.format_all(items)?;
                Ok(parts.join(self.dialect.list_separator()))
            }
            Expr::Concat { items } => Ok(self.format_all(items)?.concat()),
            Expr::Bool(b) => self.format_bool(b),
            Expr::Path(path) => self.format_path(path),
        }
    }

    /// Render every expression in `exprs`, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns the first [`FormatError`] encountered.
    pub fn format_all(&self, exprs: &[Expr]) -> Result<Vec<String>, FormatError> {
        exprs.iter().map(|e| self.format(e)).collect()
    }

    fn format_bool(&self, expr: &BoolExpr) -> Result<String, FormatError> {
        let left = self.format(&expr.left)?;
        let right = expr.right.as_deref().map(|r| self.format(r)).transpose()?;
        self.dialect
            .condition(expr.operator, &left, right.as_deref())
            .ok_or_else(|| FormatError::UnsupportedCondition {
                dialect: self.dialect.name().to_owned(),
                pos: expr
                    .pos
                    .clone()
                    .or_else(|| expr.left.position().cloned())
                    .unwrap_or_default(),
            })
    }

    fn format_path(&self, path: &PathExpr) -> Result<String, FormatError> {
        let pos = path.position().cloned().unwrap_or_default();
        let mut parts = self
            .anchors
            .prefix_components(path.anchor, &pos)?
            .unwrap_or_default();
        parts.extend(self.format_all(&path.components)?);
        if parts.is_empty() {
            return Ok(String::from("."));
        }
        let mut sep = [0_u8; 4];
        Ok(parts.join(&*self.anchors.dirsep.encode_utf8(&mut sep)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Anchor, normalize_path};
    use camino::Utf8Path;
    use rstest::rstest;

    struct Plain;

    impl Dialect for Plain {
        fn name(&self) -> &str {
            "plain"
        }

        fn reference(&self, var: &str) -> String {
            format!("$({var})")
        }
    }

    struct Semicolons;

    impl Dialect for Semicolons {
        fn name(&self) -> &str {
            "semicolons"
        }

        fn reference(&self, var: &str) -> String {
            format!("%{var}%")
        }

        fn list_separator(&self) -> &str {
            ";"
        }

        fn condition(&self, operator: BoolOperator, left: &str, right: Option<&str>) -> Option<String> {
            Some(match right {
                Some(right) => format!("{left} {operator} {right}"),
                None => format!("{operator}{left}"),
            })
        }
    }

    fn anchors() -> PathAnchors {
        PathAnchors::new('/', "/proj/build", "/proj")
    }

    #[rstest]
    #[case(Expr::literal("a b"), "a b")]
    #[case(Expr::reference("CC"), "$(CC)")]
    #[case(Expr::list(vec!["a".into(), "b".into()]), "a b")]
    #[case(Expr::concat(vec!["-I".into(), Expr::reference("INC")]), "-I$(INC)")]
    #[case(Expr::path_from_str(Anchor::TopSrcDir, "src/a.c"), "../src/a.c")]
    #[case(Expr::path_from_str(Anchor::Unanchored, "/usr/include"), "/usr/include")]
    #[case(Expr::path(Anchor::TopSrcDir, Vec::new()), "..")]
    fn formats_each_variant(#[case] expr: Expr, #[case] expected: &str) {
        let anchors = anchors();
        let fmt = ExprFormatter::new(&Plain, &anchors);
        assert_eq!(fmt.format(&expr).expect("format"), expected);
    }

    #[rstest]
    fn list_separator_comes_from_dialect() {
        let anchors = anchors();
        let fmt = ExprFormatter::new(&Semicolons, &anchors);
        let expr = Expr::list(vec!["A".into(), Expr::reference("B")]);
        assert_eq!(fmt.format(&expr).expect("format"), "A;%B%");
    }

    #[rstest]
    fn path_uses_configured_separator() {
        let anchors = PathAnchors::new('\\', "/proj/vc", "/proj");
        let fmt = ExprFormatter::new(&Plain, &anchors);
        let expr = Expr::path_from_str(Anchor::TopSrcDir, "src/a.c");
        assert_eq!(fmt.format(&expr).expect("format"), "..\\src\\a.c");
    }

    #[rstest]
    fn path_in_output_directory_renders_as_dot() {
        let anchors = PathAnchors::new('/', "/proj", "/proj");
        let fmt = ExprFormatter::new(&Plain, &anchors);
        let expr = Expr::path(Anchor::TopSrcDir, Vec::new());
        assert_eq!(fmt.format(&expr).expect("format"), ".");
    }

    #[rstest]
    fn conditions_are_rejected_without_support() {
        let anchors = anchors();
        let fmt = ExprFormatter::new(&Plain, &anchors);
        let pos = Position::new("m.bkl", 7, 3);
        let cond = Expr::equal(Expr::reference_at("X", pos.clone()), "1".into());
        let err = fmt.format(&cond).expect_err("plain has no conditions");
        match err {
            FormatError::UnsupportedCondition { dialect, pos: at } => {
                assert_eq!(dialect, "plain");
                assert_eq!(at, pos);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    fn conditions_render_through_dialect() {
        let anchors = anchors();
        let fmt = ExprFormatter::new(&Semicolons, &anchors);
        let cond = Expr::and(
            Expr::equal(Expr::reference("A"), "1".into()),
            Expr::not(Expr::reference("B")),
        );
        assert_eq!(fmt.format(&cond).expect("format"), "%A% == 1 && !%B%");
    }

    #[rstest]
    fn unrelated_roots_report_position() {
        let anchors = PathAnchors::new('/', "build", "/proj");
        let fmt = ExprFormatter::new(&Plain, &anchors);
        let pos = Position::new("m.bkl", 2, 1);
        let mut expr = Expr::path_from_str(Anchor::TopSrcDir, "a.c");
        if let Expr::Path(path) = &mut expr {
            path.pos = Some(pos.clone());
        }
        let err = fmt.format(&expr).expect_err("different roots");
        assert!(matches!(err, FormatError::Relativize { pos: at, .. } if at == pos));
    }

    #[rstest]
    #[case("/proj", "/proj/build/gnu", "src/app/main.c")]
    #[case("/proj", "/proj", "main.c")]
    #[case("/proj/sub", "/elsewhere/out", "x/y.h")]
    #[case("proj", "out/deep", "a/b.c")]
    fn relativized_paths_resolve_back_to_their_source(
        #[case] top: &str,
        #[case] out: &str,
        #[case] path: &str,
    ) {
        let anchors = PathAnchors::new('/', out, top);
        let fmt = ExprFormatter::new(&Plain, &anchors);
        let rendered = fmt
            .format(&Expr::path_from_str(Anchor::TopSrcDir, path))
            .expect("format");
        let resolved = normalize_path(&Utf8Path::new(out).join(&rendered)).expect("normalize");
        let expected = normalize_path(&Utf8Path::new(top).join(path)).expect("normalize");
        assert_eq!(resolved, expected);
    }
}
