//! Error types for the project model.
//!
//! This submodule isolates derive-macro-affected code to scope lint
//! suppressions narrowly.

// Scoped suppression for version-dependent lint false positives from
// miette/thiserror derive macros.
// FIXME(rust-lang/rust#130021): remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use crate::ast::{Position, TokenKind};
use crate::expr::DisambiguationError;
use miette::Diagnostic;
use thiserror::Error;

/// Errors detected while building or querying the project model.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum ModelError {
    /// A variable name that is neither a known property nor a user variable.
    #[error("{pos}: unknown property `{name}` on {owner}")]
    #[diagnostic(code(bakery::model::unknown_property))]
    UnknownProperty {
        /// Name that was looked up.
        name: String,
        /// Entity the lookup was made on.
        owner: String,
        /// Where the lookup originated.
        pos: Position,
    },

    /// A target was declared with a type the generator does not know.
    #[error("{pos}: unknown target type `{kind}`")]
    #[diagnostic(
        code(bakery::model::unknown_target_kind),
        help("known target types are `exe`, `library` and `action`")
    )]
    UnknownTargetKind {
        /// Type name as written.
        kind: String,
        /// Position of the target declaration.
        pos: Position,
    },

    /// Two targets in one module share a name.
    #[error("{pos}: target `{name}` is already defined in this module")]
    #[diagnostic(code(bakery::model::duplicate_target))]
    DuplicateTarget {
        /// Name of the target.
        name: String,
        /// Position of the second declaration.
        pos: Position,
    },

    /// A dependency names a target that does not exist.
    #[error("{pos}: target `{target}` depends on unknown target `{id}`")]
    #[diagnostic(code(bakery::model::unknown_dependency))]
    UnknownDependency {
        /// Missing target identifier.
        id: String,
        /// Target declaring the dependency.
        target: String,
        /// Position of the `deps` value.
        pos: Position,
    },

    /// Assignment to a property that only the generator may set.
    #[error("{pos}: property `{name}` is read-only")]
    #[diagnostic(code(bakery::model::read_only))]
    ReadOnly {
        /// Property name.
        name: String,
        /// Position of the assignment.
        pos: Position,
    },

    /// A value that does not fit the property's type.
    #[error("{pos}: invalid value for `{name}`: {reason}")]
    #[diagnostic(code(bakery::model::invalid_value))]
    InvalidValue {
        /// Property name.
        name: String,
        /// What was wrong with the value.
        reason: String,
        /// Position of the value.
        pos: Position,
    },

    /// A property whose value is only known during generation was read
    /// while it is unknown.
    #[error("{pos}: value of `{name}` is not known here")]
    #[diagnostic(code(bakery::model::undetermined))]
    Undetermined {
        /// Property name.
        name: String,
        /// Where the value was needed.
        pos: Position,
    },

    /// An `if` condition that cannot be evaluated while building the model.
    #[error("{pos}: condition cannot be evaluated while loading the project")]
    #[diagnostic(
        code(bakery::model::undetermined_condition),
        help("conditions may only compare literal values and variables that are already set")
    )]
    UndeterminedCondition {
        /// Position of the condition.
        pos: Position,
    },

    /// The parse tree does not have the shape the model builder expects.
    #[error("{pos}: malformed `{kind:?}` node: {reason}")]
    #[diagnostic(
        code(bakery::model::malformed_tree),
        help("the parse tree was produced by an incompatible front-end")
    )]
    MalformedTree {
        /// Kind of the offending node.
        kind: TokenKind,
        /// What was missing or unexpected.
        reason: String,
        /// Position of the node.
        pos: Position,
    },

    /// A list-or-concatenation node could not be split into values.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Disambiguation(#[from] DisambiguationError),
}

