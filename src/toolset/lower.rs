//! Rendering a target's build graph into backend text.
//!
//! Lowering is shared by every backend: the target's nodes are obtained from
//! [`TargetKind::build_subgraph`](crate::model::TargetKind::build_subgraph),
//! each node's name, inputs and commands are rendered through the backend's
//! [`ExprFormatter`], and the target's `deps` become dependency edges naming
//! the `id` of each referenced target.

use super::{Backend, GenerateError, NodeOutput};
use crate::expr::{Dialect, Expr, ExprFormatter};
use crate::model::{Module, ModelError, Owner, Project, Target};
use crate::props::PropertiesRegistry;
use std::borrow::Cow;
use tracing::debug;

/// A dependency edge of a lowered node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweredDep {
    /// Name of the referenced target.
    pub target: String,
    /// Rendered `id` of the referenced target.
    pub id: String,
}

/// A build node with every value rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweredNode {
    /// Node name, or its sole output.
    pub name: String,
    /// Rendered inputs, in order.
    pub inputs: Vec<String>,
    /// Rendered commands, in order.
    pub commands: Vec<String>,
    /// One edge per `deps` entry of the owning target, in order.
    pub deps: Vec<LoweredDep>,
}

impl LoweredNode {
    /// Inputs followed by dependency ids.
    pub fn prerequisites(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .map(String::as_str)
            .chain(self.deps.iter().map(|dep| dep.id.as_str()))
    }
}

/// Description of `owner` used in error messages.
pub(crate) fn describe(owner: Owner<'_>) -> String {
    match owner {
        Owner::Target { module, .. } => format!("{owner} in module `{}`", module.source_file),
        Owner::Module { .. } | Owner::Project(_) => owner.to_string(),
    }
}

/// Names and unrendered ids of the targets `owner` depends on.
fn dependency_ids(owner: Owner<'_>, registry: &PropertiesRegistry) -> Result<Vec<(String, Expr)>, ModelError> {
    let project = owner.project();
    let deps = owner.value(registry, "deps")?;
    let pos = deps.position().cloned().unwrap_or_else(|| owner.position());
    let Some(names) = deps.as_literal_list() else {
        return Err(ModelError::InvalidValue {
            name: String::from("deps"),
            reason: String::from("dependencies must be literal target names"),
            pos,
        });
    };
    let target_name = match owner {
        Owner::Target { target, .. } => target.name.clone(),
        Owner::Module { .. } | Owner::Project(_) => owner.to_string(),
    };
    names
        .into_iter()
        .map(|id| {
            let Some((module, target)) = project.get_target(&id) else {
                return Err(ModelError::UnknownDependency {
                    id,
                    target: target_name.clone(),
                    pos: pos.clone(),
                });
            };
            let dep = Owner::Target {
                project,
                module,
                target,
            };
            let value = dep.value(registry, "id")?.into_owned();
            Ok((id, value))
        })
        .collect()
}

struct Renderer<'a, 'f, D: Dialect + ?Sized> {
    owner: Owner<'a>,
    registry: &'a PropertiesRegistry,
    expand: bool,
    fmt: &'f ExprFormatter<'f, D>,
}

impl<D: Dialect + ?Sized> Renderer<'_, '_, D> {
    fn model_error(&self, source: ModelError) -> GenerateError {
        GenerateError::Model {
            owner: describe(self.owner),
            source,
        }
    }

    fn render(&self, expr: &Expr) -> Result<String, GenerateError> {
        let value = if self.expand {
            Cow::Owned(
                self.owner
                    .expand(self.registry, expr)
                    .map_err(|err| self.model_error(err))?,
            )
        } else {
            Cow::Borrowed(expr)
        };
        self.fmt
            .format(&value)
            .map_err(|source| GenerateError::Format {
                owner: describe(self.owner),
                source,
            })
    }

    fn render_all(&self, exprs: &[Expr]) -> Result<Vec<String>, GenerateError> {
        exprs.iter().map(|expr| self.render(expr)).collect()
    }
}

fn node_name(output: NodeOutput, target: &Target) -> Result<Expr, GenerateError> {
    match output {
        NodeOutput::Named(name) => Ok(name),
        NodeOutput::Outputs(outputs) => match <[Expr; 1]>::try_from(outputs) {
            Ok([only]) => Ok(only),
            Err(outputs) => Err(GenerateError::AmbiguousOutput {
                target: target.name.clone(),
                count: outputs.len(),
                pos: target.pos.clone(),
            }),
        },
    }
}

/// Lower every build node of `target` for `backend`, rendering through
/// `fmt`.
///
/// # Errors
///
/// Fails when a value cannot be resolved or rendered, when a dependency
/// names an unknown target, or when a node has zero or several unnamed
/// outputs.
pub fn lower_target<D: Dialect + ?Sized>(
    project: &Project,
    module: &Module,
    target: &Target,
    registry: &PropertiesRegistry,
    backend: Backend,
    fmt: &ExprFormatter<'_, D>,
) -> Result<Vec<LoweredNode>, GenerateError> {
    debug!(target = %target.name, %backend, "lowering target");
    let owner = Owner::Target {
        project,
        module,
        target,
    };
    let renderer = Renderer {
        owner,
        registry,
        expand: backend.expands_references(),
        fmt,
    };
    let nodes = target
        .kind
        .build_subgraph(backend, owner, registry)
        .map_err(|err| renderer.model_error(err))?;
    let deps = dependency_ids(owner, registry)
        .map_err(|err| renderer.model_error(err))?
        .into_iter()
        .map(|(name, id)| {
            Ok(LoweredDep {
                target: name,
                id: renderer.render(&id)?,
            })
        })
        .collect::<Result<Vec<_>, GenerateError>>()?;
    nodes
        .into_iter()
        .map(|node| {
            let name = node_name(node.output, target)?;
            Ok(LoweredNode {
                name: renderer.render(&name)?,
                inputs: renderer.render_all(&node.inputs)?,
                commands: renderer.render_all(&node.commands)?,
                deps: deps.clone(),
            })
        })
        .collect()
}
