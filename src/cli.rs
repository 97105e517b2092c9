//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure. Everything a project needs to
//! configure beyond this lives in properties of the project files.

use crate::toolset::Backend;
use camino::Utf8PathBuf;
use clap::Parser;

/// Generate makefiles and Visual Studio projects from one project
/// description.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Parse trees of the modules to load, in order (YAML).
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<Utf8PathBuf>,

    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<Utf8PathBuf>,

    /// Generate files for this toolset only; may be repeated. `gnu` and
    /// `vs2010` are generated when omitted.
    #[arg(short = 't', long = "toolset", value_name = "TOOLSET")]
    pub toolsets: Vec<Backend>,

    /// Project name used to derive stable identifiers; defaults to the name
    /// of the first input.
    #[arg(long, value_name = "NAME")]
    pub project_name: Option<String>,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Log the loaded project model as JSON.
    #[arg(long)]
    pub dump_model: bool,
}

impl Cli {
    /// Toolsets to generate, in the order given; the default toolsets when
    /// none was requested.
    #[must_use]
    pub fn requested_toolsets(&self) -> Vec<Backend> {
        if self.toolsets.is_empty() {
            return Backend::DEFAULT.to_vec();
        }
        let mut toolsets = Vec::with_capacity(self.toolsets.len());
        for backend in &self.toolsets {
            if !toolsets.contains(backend) {
                toolsets.push(*backend);
            }
        }
        toolsets
    }
}
