//! Error types for the runner module.
//!
//! This submodule isolates derive-macro-affected code to scope lint suppressions
//! narrowly. The `unused_assignments` lint fires in some Rust versions due to
//! thiserror/miette derive macro expansion.

// Scoped suppression for version-dependent lint false positives from
// miette/thiserror derive macros. The unused_assignments lint fires in some
// Rust versions but not others. Since `#[expect]` fails when the lint doesn't
// fire, and `unfulfilled_lint_expectations` cannot be expected, we must use
// `#[allow]` here.
// FIXME(rust-lang/rust#130021): remove once upstream is fixed.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use camino::Utf8PathBuf;
use miette::Diagnostic;
use std::io;
use thiserror::Error;

/// Errors raised while running the generator.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// An input file could not be read.
    #[error("failed to read `{path}`")]
    #[diagnostic(code(bakery::runner::read_input))]
    ReadInput {
        /// The input that was attempted.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An input file is not a serialised parse tree.
    #[error("`{path}` is not a valid parse tree: {message}")]
    #[diagnostic(
        code(bakery::runner::parse_input),
        help("inputs are YAML documents with `source_file` and `root` keys")
    )]
    ParseInput {
        /// The offending input.
        path: Utf8PathBuf,
        /// Deserializer message.
        message: String,
    },

    /// Errors were reported while loading or generating.
    #[error("{count} error(s) reported; see the log above")]
    #[diagnostic(code(bakery::runner::failed))]
    Failed {
        /// Number of distinct errors reported.
        count: usize,
    },
}
