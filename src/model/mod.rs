//! Project model.
//!
//! A [`Project`] owns ordered [`Module`]s, each of which owns ordered
//! [`Target`]s and variable assignments. The model is built once from parse
//! trees by [`from_tree`] and is read-only afterwards: generation renders it
//! but never changes it. Values are looked up through an [`Owner`], which
//! falls back to property defaults and to enclosing scopes.

mod error;
pub mod from_tree;
mod kind;
mod owner;

pub use error::ModelError;
pub use kind::TargetKind;
pub use owner::Owner;

use crate::ast::Position;
use crate::expr::Expr;
use crate::props::anchored_path;
use crate::toolset::Backend;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Serialize;

/// Variables of one entity in assignment order.
pub type Variables = IndexMap<String, Variable>;

/// An assigned value together with where it was assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    /// The assigned value.
    pub value: Expr,
    /// Position of the assignment.
    pub pos: Position,
}

impl Variable {
    /// Value assigned at `pos`.
    #[must_use]
    pub const fn new(value: Expr, pos: Position) -> Self {
        Self { value, pos }
    }
}

/// A buildable deliverable declared in a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    /// Target name, unique within the project.
    pub name: String,
    /// Kind selecting properties and build behaviour.
    pub kind: TargetKind,
    /// Explicitly assigned properties.
    pub variables: Variables,
    /// Position of the declaration.
    pub pos: Position,
}

impl Target {
    /// Target `name` of `kind` declared at `pos`, with nothing assigned.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: TargetKind, pos: Position) -> Self {
        Self {
            name: name.into(),
            kind,
            variables: Variables::new(),
            pos,
        }
    }
}

/// One input file of the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    /// File the module was read from.
    pub source_file: Utf8PathBuf,
    /// Directory of the source file relative to the project's top source
    /// directory, or absolute when it lies elsewhere.
    pub srcdir: Utf8PathBuf,
    /// Module-level assignments, including user variables.
    pub variables: Variables,
    /// Targets in declaration order.
    pub targets: IndexMap<String, Target>,
    /// Whether the module loaded without errors. Incomplete modules stay in
    /// the project so other modules can refer to their targets, but no
    /// output is generated for them.
    pub complete: bool,
}

impl Module {
    /// Module read from `source_file` in a project rooted at `top_srcdir`.
    #[must_use]
    pub fn new(source_file: impl Into<Utf8PathBuf>, top_srcdir: &Utf8Path) -> Self {
        let source_file = source_file.into();
        let dir = source_file.parent().unwrap_or_else(|| Utf8Path::new(""));
        let srcdir = crate::expr::relative_path(dir, top_srcdir).unwrap_or_else(|| dir.to_owned());
        Self {
            source_file,
            srcdir,
            variables: Variables::new(),
            targets: IndexMap::new(),
            complete: true,
        }
    }

    /// File name of the source file without its extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        self.source_file.file_stem().unwrap_or("project")
    }

    /// Path value for `file` placed beside the module's source file.
    #[must_use]
    pub fn path_beside_source(&self, file: &str) -> Expr {
        anchored_path(&self.srcdir, file)
    }
}

/// The whole project: every module loaded for one generator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    /// Project name, used to derive stable identifiers.
    pub name: String,
    /// Directory paths in the model are anchored at.
    pub top_srcdir: Utf8PathBuf,
    /// Project-level values set by the generator.
    pub variables: Variables,
    /// Modules in load order.
    pub modules: Vec<Module>,
}

impl Project {
    /// Empty project `name` rooted at `top_srcdir`.
    #[must_use]
    pub fn new(name: impl Into<String>, top_srcdir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            name: name.into(),
            top_srcdir: top_srcdir.into(),
            variables: Variables::new(),
            modules: Vec::new(),
        }
    }

    /// Fix the value of the read-only `toolset` property.
    #[must_use]
    pub fn with_toolset(mut self, backend: Backend) -> Self {
        self.variables.insert(
            String::from("toolset"),
            Variable::new(Expr::literal(backend.name()), Position::default()),
        );
        self
    }

    /// Find the target called `id` in any module.
    #[must_use]
    pub fn get_target(&self, id: &str) -> Option<(&Module, &Target)> {
        self.modules
            .iter()
            .find_map(|module| module.targets.get(id).map(|target| (module, target)))
    }

    /// Owner for project-level lookups.
    #[must_use]
    pub const fn owner(&self) -> Owner<'_> {
        Owner::Project(self)
    }
}
