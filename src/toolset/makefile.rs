//! GNU make backend.
//!
//! One makefile is written per module. User variables of the module become
//! make variable definitions and every lowered node becomes a rule:
//!
//! ```text
//! exe1: a.c b.c lib1
//! 	$(CC) -o exe1 a.c b.c liblib1.a
//! ```
//!
//! Variable references stay references (`$(NAME)`) so make resolves them.

use super::{Backend, GenerateError};
use super::lower::{LoweredNode, describe, lower_target};
use crate::expr::{Dialect, Expr, ExprFormatter, PathAnchors};
use crate::model::{Module, ModelError, Owner, Project, TargetKind};
use crate::output::OutputFile;
use crate::props::{PropertiesRegistry, Property, PropertyType, Scope};
use itertools::Itertools;
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

/// Expression dialect of makefiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeDialect;

impl Dialect for MakeDialect {
    fn name(&self) -> &str {
        "gnu make"
    }

    fn reference(&self, var: &str) -> String {
        format!("$({var})")
    }

    fn escape_literal<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if text.contains('$') {
            Cow::Owned(text.replace('$', "$$"))
        } else {
            Cow::Borrowed(text)
        }
    }
}

fn makefile_beside_source(owner: Owner<'_>) -> Expr {
    match owner {
        Owner::Module { module, .. } | Owner::Target { module, .. } => {
            module.path_beside_source("GNUmakefile")
        }
        Owner::Project(_) => Expr::empty_list(),
    }
}

pub(super) fn properties(scope: Scope) -> Vec<Property> {
    match scope {
        Scope::Module => vec![
            Property::new(
                "gnu.makefile",
                PropertyType::Path,
                "Name of the output makefile; `GNUmakefile` beside the module by default.",
            )
            .derived(makefile_beside_source),
        ],
        Scope::Kind(TargetKind::Library) => vec![
            Property::new(
                "gnu.arflags",
                PropertyType::String,
                "Flags passed to the archiver when creating the library.",
            )
            .with_default(Expr::literal("rcu")),
        ],
        Scope::Project | Scope::AllTargets | Scope::Kind(_) => Vec::new(),
    }
}

/// `# `-prefixed comment block.
struct Comment<'a>(&'a str);

impl Display for Comment<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for line in self.0.lines() {
            writeln!(f, "# {line}")?;
        }
        Ok(())
    }
}

/// `NAME = value` definition; continuation lines are tab-indented.
struct Definition<'a> {
    name: &'a str,
    value: &'a str,
}

impl Display for Definition<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} = {}", self.name, self.value.lines().join(" \\\n\t"))
    }
}

/// Rule for one lowered node.
struct Rule<'a>(&'a LoweredNode);

impl Display for Rule<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.0.name)?;
        for prerequisite in self.0.prerequisites() {
            write!(f, " {prerequisite}")?;
        }
        for command in &self.0.commands {
            write!(f, "\n\t{command}")?;
        }
        write!(f, "\n\n")
    }
}

fn is_property(registry: &PropertiesRegistry, name: &str) -> bool {
    registry.get_module_property(name).is_some() || registry.get_project_property(name).is_some()
}

/// Whether `node` only names a file of the same name, as the alias of a
/// target built in the makefile's own directory does.
fn names_itself(node: &LoweredNode) -> bool {
    node.commands.is_empty() && node.inputs.iter().any(|input| *input == node.name)
}

/// Render the makefile of `module`.
///
/// # Errors
///
/// Fails when the makefile location cannot be resolved, or with every error
/// raised while rendering definitions and lowering targets; nothing of the
/// file is written in that case.
pub(super) fn generate_module(
    project: &Project,
    module: &Module,
    registry: &PropertiesRegistry,
) -> Result<OutputFile, Vec<GenerateError>> {
    let owner = Owner::Module { project, module };
    let model_error = |source| GenerateError::Model {
        owner: describe(owner),
        source,
    };
    let format_error = |source| GenerateError::Format {
        owner: describe(owner),
        source,
    };

    let value = owner
        .value(registry, "gnu.makefile")
        .map_err(|err| vec![model_error(err)])?;
    let Expr::Path(location) = value.as_ref() else {
        return Err(vec![model_error(ModelError::InvalidValue {
            name: String::from("gnu.makefile"),
            reason: String::from("expected a path"),
            pos: owner.position(),
        })]);
    };
    let path = PathAnchors::new('/', "", project.top_srcdir.clone())
        .native_path(location)
        .map_err(|err| vec![format_error(err)])?;
    let outdir = path.parent().map(ToOwned::to_owned).unwrap_or_default();
    let anchors = PathAnchors::new('/', outdir, project.top_srcdir.clone());
    let fmt = ExprFormatter::new(&MakeDialect, &anchors);

    let mut file = OutputFile::new(path);
    let mut errors = Vec::new();
    let source_name = module.source_file.file_name().unwrap_or(module.source_file.as_str());
    file.write(
        &Comment(&format!(
            "This file was generated by bakery from {source_name}.\nDo not modify, all changes will be overwritten!"
        ))
        .to_string(),
    );
    file.write("\n");

    let mut wrote_definitions = false;
    for (name, var) in &module.variables {
        if is_property(registry, name) {
            continue;
        }
        match fmt.format(&var.value) {
            Ok(value) => {
                file.write(&Definition { name, value: &value }.to_string());
                wrote_definitions = true;
            }
            Err(err) => errors.push(format_error(err)),
        }
    }
    if wrote_definitions {
        file.write("\n");
    }

    for target in module.targets.values() {
        match lower_target(project, module, target, registry, Backend::Gnu, &fmt) {
            Ok(nodes) => {
                for node in nodes.iter().filter(|node| !names_itself(node)) {
                    file.write(&Rule(node).to_string());
                }
            }
            Err(err) => errors.push(err),
        }
    }
    if errors.is_empty() {
        Ok(file)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Position;
    use crate::expr::Anchor;
    use crate::model::{Target, Variable};
    use crate::toolset::lower::LoweredDep;
    use camino::{Utf8Path, Utf8PathBuf};
    use rstest::rstest;

    fn assign(variables: &mut crate::model::Variables, name: &str, value: Expr) {
        variables.insert(name.to_owned(), Variable::new(value, Position::default()));
    }

    #[rstest]
    fn rule_lists_inputs_then_dependencies() {
        let node = LoweredNode {
            name: String::from("exe1"),
            inputs: vec![String::from("a.c"), String::from("b.c")],
            commands: vec![String::from("$(CC) -o exe1 a.c b.c")],
            deps: vec![LoweredDep {
                target: String::from("lib1"),
                id: String::from("lib1"),
            }],
        };
        assert_eq!(
            Rule(&node).to_string(),
            concat!("exe1: a.c b.c lib1\n", "\t$(CC) -o exe1 a.c b.c\n", "\n")
        );
    }

    #[rstest]
    fn rule_without_prerequisites_or_commands() {
        let node = LoweredNode {
            name: String::from("all"),
            inputs: Vec::new(),
            commands: Vec::new(),
            deps: Vec::new(),
        };
        assert_eq!(Rule(&node).to_string(), "all:\n\n");
    }

    #[rstest]
    fn multi_line_definitions_continue_with_tabs() {
        let def = Definition {
            name: "FILES",
            value: "a.c\nb.c",
        };
        assert_eq!(def.to_string(), "FILES = a.c \\\n\tb.c\n");
    }

    #[rstest]
    fn comments_prefix_every_line() {
        assert_eq!(Comment("one\ntwo").to_string(), "# one\n# two\n");
    }

    #[rstest]
    #[case(Expr::literal("echo $HOME"), "echo $$HOME")]
    #[case(Expr::reference("CC"), "$(CC)")]
    fn make_dialect_escapes_and_references(#[case] expr: Expr, #[case] expected: &str) {
        let anchors = PathAnchors::new('/', "", "");
        let fmt = ExprFormatter::new(&MakeDialect, &anchors);
        assert_eq!(fmt.format(&expr).expect("renderable"), expected);
    }

    #[rstest]
    fn conditions_cannot_be_written() {
        let anchors = PathAnchors::new('/', "", "");
        let fmt = ExprFormatter::new(&MakeDialect, &anchors);
        let cond = Expr::equal(Expr::reference("toolset"), Expr::literal("gnu"));
        assert!(fmt.format(&cond).is_err());
    }

    #[rstest]
    fn module_renders_header_definitions_and_rules() {
        let mut project = Project::new("hello", "/p").with_toolset(Backend::Gnu);
        let mut module = Module::new("/p/hello.bkl", Utf8Path::new("/p"));
        assign(&mut module.variables, "OPT", Expr::literal("-O2"));
        assign(&mut module.variables, "toolsets", Expr::list(vec!["gnu".into()]));
        let mut exe = Target::new("exe1", TargetKind::Exe, Position::default());
        assign(
            &mut exe.variables,
            "sources",
            Expr::list(vec![
                Expr::path_from_str(Anchor::TopSrcDir, "a.c"),
                Expr::path_from_str(Anchor::TopSrcDir, "b.c"),
            ]),
        );
        module.targets.insert(String::from("exe1"), exe);
        project.modules.push(module);

        let registry = PropertiesRegistry::with_all_backends();
        let file = generate_module(&project, &project.modules[0], &registry).expect("generated");
        assert_eq!(file.path(), Utf8PathBuf::from("/p/GNUmakefile"));
        assert_eq!(
            file.content(),
            concat!(
                "# This file was generated by bakery from hello.bkl.\n",
                "# Do not modify, all changes will be overwritten!\n",
                "\n",
                "OPT = -O2\n",
                "\n",
                "exe1: a.c b.c\n",
                "\t$(CC) -o exe1 a.c b.c\n",
                "\n",
            )
        );
    }

    #[rstest]
    fn makefile_location_can_be_overridden() {
        let mut project = Project::new("hello", "/p").with_toolset(Backend::Gnu);
        let mut module = Module::new("/p/hello.bkl", Utf8Path::new("/p"));
        assign(
            &mut module.variables,
            "gnu.makefile",
            Expr::path_from_str(Anchor::TopSrcDir, "build/Makefile"),
        );
        let mut exe = Target::new("app", TargetKind::Exe, Position::default());
        assign(
            &mut exe.variables,
            "sources",
            Expr::list(vec![Expr::path_from_str(Anchor::TopSrcDir, "src/main.c")]),
        );
        module.targets.insert(String::from("app"), exe);
        project.modules.push(module);

        let registry = PropertiesRegistry::with_all_backends();
        let file = generate_module(&project, &project.modules[0], &registry).expect("generated");
        assert_eq!(file.path(), Utf8PathBuf::from("/p/build/Makefile"));
        assert!(file.content().contains("../app: ../src/main.c\n"));
    }

    fn exe(name: &str, source: &str) -> Target {
        let mut target = Target::new(name, TargetKind::Exe, Position::default());
        assign(
            &mut target.variables,
            "sources",
            Expr::list(vec![Expr::path_from_str(Anchor::TopSrcDir, source)]),
        );
        target
    }

    #[rstest]
    fn dependencies_on_executables_resolve_under_an_overridden_makefile() {
        let mut project = Project::new("hello", "/p").with_toolset(Backend::Gnu);
        let mut module = Module::new("/p/hello.bkl", Utf8Path::new("/p"));
        assign(
            &mut module.variables,
            "gnu.makefile",
            Expr::path_from_str(Anchor::TopSrcDir, "build/Makefile"),
        );
        let mut docs = Target::new("docs", TargetKind::Action, Position::default());
        assign(&mut docs.variables, "commands", Expr::list(vec!["doxygen".into()]));
        assign(&mut docs.variables, "deps", Expr::list(vec!["app".into()]));
        for target in [exe("app", "main.c"), docs] {
            module.targets.insert(target.name.clone(), target);
        }
        project.modules.push(module);

        let registry = PropertiesRegistry::with_all_backends();
        let file = generate_module(&project, &project.modules[0], &registry).expect("generated");
        let content = file.content();
        assert!(content.contains("../app: ../main.c\n"), "{content}");
        assert!(content.contains("app: ../app\n\n"), "{content}");
        assert!(content.contains("docs: app\n\tdoxygen\n"), "{content}");
    }

    #[rstest]
    fn aliases_naming_their_own_output_are_left_out() {
        let mut project = Project::new("hello", "/p").with_toolset(Backend::Gnu);
        let mut module = Module::new("/p/hello.bkl", Utf8Path::new("/p"));
        module.targets.insert(String::from("app"), exe("app", "main.c"));
        project.modules.push(module);

        let registry = PropertiesRegistry::with_all_backends();
        let file = generate_module(&project, &project.modules[0], &registry).expect("generated");
        assert_eq!(file.content().matches("app:").count(), 1);
        assert!(!file.content().contains("app: app"));
    }

    #[rstest]
    fn every_failing_target_is_reported() {
        let mut project = Project::new("hello", "/p").with_toolset(Backend::Gnu);
        let mut module = Module::new("/p/hello.bkl", Utf8Path::new("/p"));
        for (name, missing) in [("x", "ghost1"), ("y", "ghost2")] {
            let mut target = exe(name, "main.c");
            assign(&mut target.variables, "deps", Expr::list(vec![missing.into()]));
            module.targets.insert(name.to_owned(), target);
        }
        project.modules.push(module);

        let registry = PropertiesRegistry::with_all_backends();
        let errors = generate_module(&project, &project.modules[0], &registry).expect_err("unknown deps");
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("ghost1") && messages[1].contains("ghost2"), "{messages:?}");
    }
}
