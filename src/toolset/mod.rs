//! Toolsets: lowering the model into native build files.
//!
//! Every [`Backend`] runs the same pipeline. Each target of a module is asked
//! for its build graph ([`TargetKind::build_subgraph`]), the graph is lowered
//! to rendered text by [`lower::lower_target`], and the backend serializes the
//! lowered nodes into its own format. Output files are committed atomically;
//! an error aborts only the file it occurred in and is collected in the
//! [`GenerationReport`].

mod error;
pub mod lower;
mod makefile;
mod subgraph;
mod vs2010;
pub mod xml;

pub use error::GenerateError;
pub use makefile::MakeDialect;
pub use vs2010::MsBuildDialect;

use crate::expr::Expr;
use crate::model::{Module, ModelError, Owner, Project, TargetKind};
use crate::output::{CommitOutcome, OutputFile};
use crate::props::{PropertiesRegistry, Property, Scope};
use camino::Utf8PathBuf;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// A concrete build-file dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// GNU make makefiles.
    Gnu,
    /// Visual Studio 2010 projects and solutions.
    Vs2010,
    /// Visual Studio 2012 projects and solutions.
    Vs2012,
}

impl Backend {
    /// Every backend, in registration order.
    pub const ALL: [Self; 3] = [Self::Gnu, Self::Vs2010, Self::Vs2012];

    /// Backends generated when none is requested. Visual Studio 2012 writes
    /// the same file names as 2010, so it only runs on request.
    pub const DEFAULT: [Self; 2] = [Self::Gnu, Self::Vs2010];

    /// Names of every backend, as accepted in project files.
    pub const NAMES: &'static [&'static str] = &["gnu", "vs2010", "vs2012"];

    /// Name used in project files and on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gnu => "gnu",
            Self::Vs2010 => "vs2010",
            Self::Vs2012 => "vs2012",
        }
    }

    /// Properties this backend adds to `scope`.
    #[must_use]
    pub fn properties(self, scope: Scope) -> Vec<Property> {
        match self {
            Self::Gnu => makefile::properties(scope),
            Self::Vs2010 => vs2010::properties(&vs2010::VS2010, scope),
            Self::Vs2012 => vs2010::properties(&vs2010::VS2012, scope),
        }
    }

    /// Whether the backend writes Visual Studio projects.
    #[must_use]
    pub const fn is_visual_studio(self) -> bool {
        matches!(self, Self::Vs2010 | Self::Vs2012)
    }

    /// Whether variable references are replaced by their values before
    /// rendering, because the native format has no variables of its own.
    #[must_use]
    pub const fn expands_references(self) -> bool {
        self.is_visual_studio()
    }

    /// Generate every file of `project` for this backend.
    #[must_use]
    pub fn generate(self, project: &Project, registry: &PropertiesRegistry) -> GenerationReport {
        generate(project, registry, self)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|backend| backend.name() == s)
            .ok_or_else(|| format!("unknown toolset `{s}` (expected one of: {})", Self::NAMES.join(", ")))
    }
}

/// What a build node produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutput {
    /// A named node such as a phony target or a project.
    Named(Expr),
    /// Output files; backends accept exactly one.
    Outputs(Vec<Expr>),
}

/// One deliverable of a target in backend-neutral form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildNode {
    /// Name or outputs of the node.
    pub output: NodeOutput,
    /// Inputs the node depends on, in order.
    pub inputs: Vec<Expr>,
    /// Commands run to build the node, in order.
    pub commands: Vec<Expr>,
}

impl BuildNode {
    /// Node called `name`.
    #[must_use]
    pub const fn named(name: Expr) -> Self {
        Self {
            output: NodeOutput::Named(name),
            inputs: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Node producing `outputs`.
    #[must_use]
    pub const fn producing(outputs: Vec<Expr>) -> Self {
        Self {
            output: NodeOutput::Outputs(outputs),
            inputs: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Set the node's inputs.
    #[must_use]
    pub fn with_inputs(mut self, inputs: Vec<Expr>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Set the node's commands.
    #[must_use]
    pub fn with_commands(mut self, commands: Vec<Expr>) -> Self {
        self.commands = commands;
        self
    }
}

/// Outcome of generating a project for one backend.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Files created or replaced.
    pub written: Vec<Utf8PathBuf>,
    /// Files whose content was already current.
    pub unchanged: Vec<Utf8PathBuf>,
    /// Every error, in the order encountered.
    pub errors: Vec<GenerateError>,
}

impl GenerationReport {
    /// Whether no error occurred.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    fn commit(&mut self, file: OutputFile) {
        let path = file.path().to_owned();
        match file.commit() {
            Ok(CommitOutcome::Written) => self.written.push(path),
            Ok(CommitOutcome::Unchanged) => self.unchanged.push(path),
            Err(source) => self.errors.push(GenerateError::Io { path, source }),
        }
    }

    fn record(&mut self, result: Result<OutputFile, GenerateError>) {
        match result {
            Ok(file) => self.commit(file),
            Err(err) => self.errors.push(err),
        }
    }
}

fn module_uses(owner: Owner<'_>, registry: &PropertiesRegistry, backend: Backend) -> Result<bool, ModelError> {
    let toolsets = owner.value(registry, "toolsets")?;
    let names = toolsets.as_literal_list().unwrap_or_default();
    Ok(names.is_empty() || names.iter().any(|name| name == backend.name()))
}

/// Generate every module of `project` that uses `backend`.
///
/// A module uses a backend when its `toolsets` property lists it or is
/// empty. Modules that failed to load are skipped.
#[must_use]
pub fn generate(project: &Project, registry: &PropertiesRegistry, backend: Backend) -> GenerationReport {
    let mut report = GenerationReport::default();
    for module in &project.modules {
        if !module.complete {
            debug!(module = %module.source_file, %backend, "skipping module with load errors");
            continue;
        }
        let owner = Owner::Module { project, module };
        match module_uses(owner, registry, backend) {
            Ok(true) => generate_module(project, module, registry, backend, &mut report),
            Ok(false) => debug!(module = %module.source_file, %backend, "module does not use toolset"),
            Err(source) => report.errors.push(GenerateError::Model {
                owner: owner.to_string(),
                source,
            }),
        }
    }
    report
}

fn generate_module(
    project: &Project,
    module: &Module,
    registry: &PropertiesRegistry,
    backend: Backend,
    report: &mut GenerationReport,
) {
    debug!(module = %module.source_file, %backend, "generating module");
    match backend {
        Backend::Gnu => match makefile::generate_module(project, module, registry) {
            Ok(file) => report.commit(file),
            Err(errors) => report.errors.extend(errors),
        },
        Backend::Vs2010 => vs2010::generate_module(&vs2010::VS2010, project, module, registry, report),
        Backend::Vs2012 => vs2010::generate_module(&vs2010::VS2012, project, module, registry, report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("gnu", Some(Backend::Gnu))]
    #[case("vs2010", Some(Backend::Vs2010))]
    #[case("vs2012", Some(Backend::Vs2012))]
    #[case("xcode", None)]
    fn parses_backend_names(#[case] name: &str, #[case] expected: Option<Backend>) {
        assert_eq!(name.parse::<Backend>().ok(), expected);
    }

    #[rstest]
    fn names_match_variants() {
        let names: Vec<_> = Backend::ALL.iter().map(|b| b.name()).collect();
        assert_eq!(names, Backend::NAMES);
    }
}
