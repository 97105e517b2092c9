//! Build graphs of each target kind.

use super::{Backend, BuildNode};
use crate::expr::{Expr, PathExpr};
use crate::model::{ModelError, Owner, TargetKind};
use crate::props::PropertiesRegistry;

fn items(owner: Owner<'_>, registry: &PropertiesRegistry, name: &str) -> Result<Vec<Expr>, ModelError> {
    Ok(owner.value(registry, name)?.items().to_vec())
}

fn prefixed(prefix: &str, values: Vec<Expr>) -> impl Iterator<Item = Expr> + '_ {
    values
        .into_iter()
        .map(move |value| Expr::concat(vec![Expr::literal(prefix), value]))
}

/// `-D` and `-I` flags of a compiling target.
fn compile_flags(owner: Owner<'_>, registry: &PropertiesRegistry) -> Result<Vec<Expr>, ModelError> {
    let mut flags: Vec<Expr> = prefixed("-D", items(owner, registry, "defines")?).collect();
    flags.extend(prefixed("-I", items(owner, registry, "includedirs")?));
    Ok(flags)
}

fn object_name(source: &str) -> String {
    let stem = source.rsplit_once('.').map_or(source, |(stem, _)| stem);
    format!("{stem}.o")
}

/// Object file compiled from `source`, placed beside the source so that
/// sources with the same name in different directories stay apart.
fn object_for(owner: Owner<'_>, source: &Expr) -> Result<Expr, ModelError> {
    let invalid = || ModelError::InvalidValue {
        name: String::from("sources"),
        reason: String::from("object file names need literal source file names"),
        pos: source.position().cloned().unwrap_or_else(|| owner.position()),
    };
    match source {
        Expr::Path(path) => {
            let name = path.file_name().ok_or_else(invalid)?;
            let mut components = path.components.clone();
            components.pop();
            components.push(Expr::literal(object_name(&name)));
            Ok(Expr::Path(PathExpr {
                anchor: path.anchor,
                components,
                pos: path.pos.clone(),
            }))
        }
        other => {
            let name = other.literal_text().ok_or_else(invalid)?;
            Ok(beside_module(owner, &object_name(&name)))
        }
    }
}

fn beside_module(owner: Owner<'_>, file: &str) -> Expr {
    match owner {
        Owner::Target { module, .. } | Owner::Module { module, .. } => module.path_beside_source(file),
        Owner::Project(_) => Expr::literal(file),
    }
}

/// Archives built by the library targets `owner` depends on.
fn linked_libraries(owner: Owner<'_>, registry: &PropertiesRegistry) -> Result<Vec<Expr>, ModelError> {
    let project = owner.project();
    let deps = owner.value(registry, "deps")?;
    Ok(deps
        .as_literal_list()
        .unwrap_or_default()
        .iter()
        .filter_map(|id| project.get_target(id))
        .filter(|(_, target)| target.kind == TargetKind::Library)
        .map(|(module, target)| module.path_beside_source(&format!("lib{}.a", target.name)))
        .collect())
}

impl TargetKind {
    /// Nodes that build a target of this kind with `backend`.
    ///
    /// `owner` must be the target itself; values are looked up through it so
    /// that module and project assignments apply. Targets producing files
    /// with `gnu` also get a command-free node named by their `id`, so that
    /// `deps` edges resolve wherever the makefile is written.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] when a property the graph needs cannot be
    /// resolved.
    pub fn build_subgraph(
        self,
        backend: Backend,
        owner: Owner<'_>,
        registry: &PropertiesRegistry,
    ) -> Result<Vec<BuildNode>, ModelError> {
        let id = owner.value(registry, "id")?.into_owned();
        if !self.compiles_sources() {
            let commands = items(owner, registry, "commands")?;
            return Ok(vec![BuildNode::named(id).with_commands(commands)]);
        }
        let sources = items(owner, registry, "sources")?;
        let mut inputs = sources.clone();
        inputs.extend(items(owner, registry, "headers")?);
        if backend.is_visual_studio() {
            return Ok(vec![BuildNode::named(id).with_inputs(inputs)]);
        }

        let name = id.literal_text().unwrap_or_default();
        let flags = compile_flags(owner, registry)?;
        if self == Self::Exe {
            let output = beside_module(owner, &name);
            let mut command = vec![Expr::reference("CC"), Expr::literal("-o"), output.clone()];
            command.extend(flags);
            command.extend(sources);
            command.extend(linked_libraries(owner, registry)?);
            return Ok(vec![
                BuildNode::producing(vec![output.clone()])
                    .with_inputs(inputs)
                    .with_commands(vec![Expr::list(command)]),
                BuildNode::named(id).with_inputs(vec![output]),
            ]);
        }

        let archive = beside_module(owner, &format!("lib{name}.a"));
        let mut commands = Vec::with_capacity(sources.len() + 1);
        let mut objects = Vec::with_capacity(sources.len());
        for source in sources {
            let object = object_for(owner, &source)?;
            let mut compile = vec![
                Expr::reference("CC"),
                Expr::literal("-c"),
                Expr::literal("-o"),
                object.clone(),
            ];
            compile.extend(flags.iter().cloned());
            compile.push(source);
            commands.push(Expr::list(compile));
            objects.push(object);
        }
        let mut archive_command = vec![
            Expr::reference("AR"),
            owner.value(registry, "gnu.arflags")?.into_owned(),
            archive.clone(),
        ];
        archive_command.extend(objects);
        commands.push(Expr::list(archive_command));
        Ok(vec![
            BuildNode::producing(vec![archive.clone()])
                .with_inputs(inputs)
                .with_commands(commands),
            BuildNode::named(id).with_inputs(vec![archive]),
        ])
    }
}
