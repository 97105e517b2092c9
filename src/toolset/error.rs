//! Errors raised while generating build files.

// Scoped suppression for version-dependent lint false positives from
// miette/thiserror derive macros.
// FIXME(rust-lang/rust#130021): remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use crate::ast::Position;
use crate::expr::FormatError;
use crate::model::ModelError;
use camino::Utf8PathBuf;
use miette::Diagnostic;
use std::io;
use thiserror::Error;

/// Errors that abort one output file.
#[derive(Debug, Error, Diagnostic)]
pub enum GenerateError {
    /// A value of the model could not be resolved.
    #[error("failed to generate {owner}: {source}")]
    #[diagnostic(code(bakery::generate::model))]
    Model {
        /// Entity being generated, e.g. "target `app` in module `a.bkl`".
        owner: String,
        /// Underlying model error.
        #[source]
        source: ModelError,
    },

    /// A value could not be rendered for the output file.
    #[error("failed to generate {owner}: {source}")]
    #[diagnostic(code(bakery::generate::format))]
    Format {
        /// Entity being generated.
        owner: String,
        /// Underlying formatting error.
        #[source]
        source: FormatError,
    },

    /// A build node without a name must have exactly one output.
    #[error("{pos}: target `{target}` produced a build node with {count} outputs; exactly one is required")]
    #[diagnostic(code(bakery::generate::ambiguous_output))]
    AmbiguousOutput {
        /// Target owning the node.
        target: String,
        /// Number of outputs found.
        count: usize,
        /// Position of the target declaration.
        pos: Position,
    },

    /// An output file could not be written.
    #[error("failed to write `{path}`")]
    #[diagnostic(code(bakery::generate::io))]
    Io {
        /// Destination of the file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}
