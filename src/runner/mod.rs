//! CLI execution logic.
//!
//! This module keeps `main` minimal by providing a single entry point. The
//! runner loads every input parse tree, builds the project model once per
//! requested toolset (so `toolset` is known while `if` blocks are decided),
//! generates the toolset's files for every module that loaded cleanly and
//! reports every error before failing.

mod error;

pub use error::RunnerError;

use crate::ast::ParseTreeFile;
use crate::cli::Cli;
use crate::model::Project;
use crate::model::from_tree::{LoadedProject, load_project};
use crate::props::PropertiesRegistry;
use crate::toolset::Backend;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use std::fs;
use tracing::{debug, error, info};

/// Execute the generator as configured by `cli`.
///
/// # Errors
///
/// Returns an error if an input cannot be loaded or if any error was
/// reported while building the model or writing output files.
pub fn run(cli: &Cli) -> Result<()> {
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to `{dir}`"))?;
        debug!("Changed directory to {dir}");
    }
    let trees = cli
        .inputs
        .iter()
        .map(|path| load_tree(path))
        .collect::<Result<Vec<_>, RunnerError>>()?;
    let (name, top_srcdir) = project_identity(cli, &trees);
    info!(project = %name, top_srcdir = %top_srcdir, "loaded {} module(s)", trees.len());

    let registry = PropertiesRegistry::with_all_backends();
    let mut messages = Vec::new();
    for backend in cli.requested_toolsets() {
        messages.extend(generate(cli, &trees, &registry, backend, &name, &top_srcdir)?);
    }

    let messages: Vec<String> = messages.into_iter().unique().collect();
    for message in &messages {
        error!("{message}");
    }
    if messages.is_empty() {
        Ok(())
    } else {
        Err(RunnerError::Failed {
            count: messages.len(),
        }
        .into())
    }
}

/// Run one toolset, returning the messages of every error it reported.
fn generate(
    cli: &Cli,
    trees: &[ParseTreeFile],
    registry: &PropertiesRegistry,
    backend: Backend,
    name: &str,
    top_srcdir: &Utf8Path,
) -> Result<Vec<String>> {
    debug!(%backend, "generating");
    let LoadedProject { project, errors } = load_project(
        Project::new(name, top_srcdir).with_toolset(backend),
        trees,
        registry,
    );
    let mut messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    if cli.dump_model {
        let json = serde_json::to_string_pretty(&project).context("serialise project model")?;
        debug!(%backend, "project model:\n{json}");
    }
    let report = backend.generate(&project, registry);
    info!(
        %backend,
        written = report.written.len(),
        unchanged = report.unchanged.len(),
        "generation finished"
    );
    messages.extend(report.errors.iter().map(|err| error_chain(err)));
    Ok(messages)
}

/// `err` followed by its sources, separated by `: `.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Read and parse the parse tree stored at `path`.
///
/// A relative `source_file` is taken relative to the directory of `path`.
fn load_tree(path: &Utf8Path) -> Result<ParseTreeFile, RunnerError> {
    let text = fs::read_to_string(path).map_err(|source| RunnerError::ReadInput {
        path: path.to_owned(),
        source,
    })?;
    let mut tree: ParseTreeFile =
        serde_saphyr::from_str(&text).map_err(|err| RunnerError::ParseInput {
            path: path.to_owned(),
            message: err.to_string(),
        })?;
    if tree.source_file.is_relative()
        && let Some(dir) = path.parent()
    {
        tree.source_file = dir.join(&tree.source_file);
    }
    debug!(input = %path, source_file = %tree.source_file, "read parse tree");
    Ok(tree)
}

/// Project name and top source directory: the name given on the command
/// line or the first module's stem, and the first module's directory.
fn project_identity(cli: &Cli, trees: &[ParseTreeFile]) -> (String, Utf8PathBuf) {
    let first = trees.first().map(|tree| tree.source_file.as_path());
    let top_srcdir = first
        .and_then(Utf8Path::parent)
        .map(Utf8Path::to_path_buf)
        .unwrap_or_default();
    let name = cli.project_name.clone().unwrap_or_else(|| {
        first
            .and_then(Utf8Path::file_stem)
            .unwrap_or("project")
            .to_owned()
    });
    (name, top_srcdir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    fn relative_source_files_follow_their_input() {
        let dir = tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        let input = root.join("hello.yml");
        fs::write(&input, "source_file: hello.bkl\nroot:\n  kind: program\n").expect("write input");
        let tree = load_tree(&input).expect("valid tree");
        assert_eq!(tree.source_file, root.join("hello.bkl"));
    }

    #[rstest]
    fn malformed_inputs_name_the_file() {
        let dir = tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        let input = root.join("bad.yml");
        fs::write(&input, "root: [").expect("write input");
        let err = load_tree(&input).expect_err("invalid YAML");
        assert!(matches!(err, RunnerError::ParseInput { ref path, .. } if *path == input));
    }

    #[rstest]
    #[case(&["bakery", "sub/hello.yml"], "hello")]
    #[case(&["bakery", "--project-name", "demo", "sub/hello.yml"], "demo")]
    fn project_identity_defaults_to_first_module(#[case] args: &[&str], #[case] expected: &str) {
        let cli = Cli::try_parse_from(args).expect("valid arguments");
        let tree = ParseTreeFile {
            source_file: Utf8PathBuf::from("sub/hello.bkl"),
            root: crate::ast::ParseNode::new(crate::ast::TokenKind::Program),
        };
        let (name, top) = project_identity(&cli, &[tree]);
        assert_eq!(name, expected);
        assert_eq!(top, Utf8PathBuf::from("sub"));
    }

    #[rstest]
    fn error_chain_appends_sources() {
        let err = crate::toolset::GenerateError::Io {
            path: Utf8PathBuf::from("out/GNUmakefile"),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(error_chain(&err), "failed to write `out/GNUmakefile`: disk full");
    }
}
