//! Splitting runs of parsed fragments into lists and concatenations.
//!
//! The grammar cannot tell `foo bar` (two list items) from `foo$(bar)` (one
//! concatenated string) because whitespace is not a token. It hands over the
//! fragments with their token spans instead, and adjacency of those spans
//! decides the structure.

use super::Expr;
use crate::ast::Position;
use miette::Diagnostic;
use thiserror::Error;

/// Inclusive range of token indices a fragment was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenSpan {
    /// First token index.
    pub start: usize,
    /// Last token index.
    pub stop: usize,
}

impl TokenSpan {
    /// Span covering tokens `start..=stop`.
    #[must_use]
    pub const fn new(start: usize, stop: usize) -> Self {
        Self { start, stop }
    }

    /// Whether `next` starts on the token right after this span ends.
    #[must_use]
    pub fn is_adjacent_to(&self, next: &Self) -> bool {
        self.stop.checked_add(1) == Some(next.start)
    }
}

/// A parsed value together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFragment {
    /// The fragment's value.
    pub value: Expr,
    /// Tokens the fragment covers.
    pub span: TokenSpan,
    /// Source position of the fragment.
    pub pos: Option<Position>,
}

impl SourceFragment {
    /// Fragment spanning `start..=stop` without a separate position.
    #[must_use]
    pub const fn new(value: Expr, start: usize, stop: usize) -> Self {
        Self {
            value,
            span: TokenSpan::new(start, stop),
            pos: None,
        }
    }

    /// Attach the fragment's source position.
    #[must_use]
    pub fn at(mut self, pos: Position) -> Self {
        self.pos = Some(pos);
        self
    }
}

/// Violations of the disambiguation pass's input contract.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum DisambiguationError {
    /// The front-end produced a list-or-concatenation node with no fragments.
    #[error("list or concatenation node has no fragments")]
    #[diagnostic(
        code(bakery::expr::empty_fragment_sequence),
        help("this indicates a bug in the parser front-end, not in the project file")
    )]
    EmptySequence,
}

/// Group `fragments` into concatenations of token-adjacent runs.
///
/// A run of one fragment stays as that fragment; a single run is returned
/// as-is; several runs become a [`Expr::List`] in source order.
///
/// # Errors
///
/// Returns [`DisambiguationError::EmptySequence`] when `fragments` is empty.
///
/// # Examples
///
/// ```
/// use bakery::expr::{Expr, SourceFragment, disambiguate};
///
/// // foo bar$(zar)
/// let expr = disambiguate(vec![
///     SourceFragment::new(Expr::literal("foo"), 0, 0),
///     SourceFragment::new(Expr::literal("bar"), 2, 2),
///     SourceFragment::new(Expr::reference("zar"), 3, 5),
/// ])
/// .expect("non-empty input");
/// assert_eq!(
///     expr,
///     Expr::list(vec![
///         Expr::literal("foo"),
///         Expr::concat(vec![Expr::literal("bar"), Expr::reference("zar")]),
///     ])
/// );
/// ```
pub fn disambiguate(
    fragments: impl IntoIterator<Item = SourceFragment>,
) -> Result<Expr, DisambiguationError> {
    let mut runs: Vec<Vec<Expr>> = Vec::new();
    let mut previous: Option<TokenSpan> = None;
    for fragment in fragments {
        let value = fragment.value.with_position_if_missing(fragment.pos);
        match (previous, runs.last_mut()) {
            (Some(prev), Some(run)) if prev.is_adjacent_to(&fragment.span) => run.push(value),
            _ => runs.push(vec![value]),
        }
        previous = Some(fragment.span);
    }

    let mut groups: Vec<Expr> = runs.into_iter().map(Expr::concat).collect();
    if groups.len() > 1 {
        return Ok(Expr::List { items: groups });
    }
    groups.pop().ok_or(DisambiguationError::EmptySequence)
}
