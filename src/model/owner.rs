//! Value lookup on projects, modules and targets.

use super::{Module, ModelError, Project, Target, Variables};
use crate::ast::Position;
use crate::expr::{BoolExpr, Expr, PathExpr};
use crate::props::{PropertiesRegistry, Property, PropertyDefault};
use std::borrow::Cow;
use std::fmt;

/// The entity a value is looked up on, with its enclosing scopes.
#[derive(Debug, Clone, Copy)]
pub enum Owner<'a> {
    /// The project itself.
    Project(&'a Project),
    /// A module of `project`.
    Module {
        /// Enclosing project.
        project: &'a Project,
        /// The module.
        module: &'a Module,
    },
    /// A target of `module`.
    Target {
        /// Enclosing project.
        project: &'a Project,
        /// Enclosing module.
        module: &'a Module,
        /// The target.
        target: &'a Target,
    },
}

impl<'a> Owner<'a> {
    /// The project the owner belongs to.
    #[must_use]
    pub const fn project(&self) -> &'a Project {
        match *self {
            Self::Project(project)
            | Self::Module { project, .. }
            | Self::Target { project, .. } => project,
        }
    }

    /// The enclosing scope, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<Self> {
        match *self {
            Self::Project(_) => None,
            Self::Module { project, .. } => Some(Self::Project(project)),
            Self::Target {
                project, module, ..
            } => Some(Self::Module { project, module }),
        }
    }

    /// Explicitly assigned values of the owner itself.
    #[must_use]
    pub const fn variables(&self) -> &'a Variables {
        match *self {
            Self::Project(project) => &project.variables,
            Self::Module { module, .. } => &module.variables,
            Self::Target { target, .. } => &target.variables,
        }
    }

    /// Best position for diagnostics about the owner.
    #[must_use]
    pub fn position(&self) -> Position {
        match *self {
            Self::Project(_) => Position::default(),
            Self::Module { module, .. } => Position {
                file: Some(module.source_file.clone()),
                line: None,
                column: None,
            },
            Self::Target { target, .. } => target.pos.clone(),
        }
    }

    /// Declaration of property `name` in the owner's own scope.
    #[must_use]
    pub fn property<'r>(&self, registry: &'r PropertiesRegistry, name: &str) -> Option<&'r Property> {
        match *self {
            Self::Project(_) => registry.get_project_property(name),
            Self::Module { .. } => registry.get_module_property(name),
            Self::Target { target, .. } => registry.get_target_property(target.kind, name),
        }
    }

    /// Value of `name`: the explicit assignment, then the property default,
    /// then the same lookup on the enclosing scopes.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Undetermined`] for a property whose value is not
    /// known yet and [`ModelError::UnknownProperty`] when no scope knows
    /// `name`.
    pub fn value(&self, registry: &PropertiesRegistry, name: &str) -> Result<Cow<'a, Expr>, ModelError> {
        let mut scope = Some(*self);
        while let Some(current) = scope {
            if let Some(var) = current.variables().get(name) {
                return Ok(Cow::Borrowed(&var.value));
            }
            if let Some(prop) = current.property(registry, name) {
                return match &prop.default {
                    PropertyDefault::Constant(expr) => Ok(Cow::Owned(expr.clone())),
                    PropertyDefault::Derived(derive) => Ok(Cow::Owned(derive(current))),
                    PropertyDefault::Undetermined => Err(ModelError::Undetermined {
                        name: name.to_owned(),
                        pos: self.position(),
                    }),
                };
            }
            scope = current.parent();
        }
        Err(ModelError::UnknownProperty {
            name: name.to_owned(),
            owner: self.to_string(),
            pos: self.position(),
        })
    }

    /// Value of `name` if it is set or has a known default, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownProperty`] when no scope knows `name`.
    pub fn optional_value(
        &self,
        registry: &PropertiesRegistry,
        name: &str,
    ) -> Result<Option<Cow<'a, Expr>>, ModelError> {
        match self.value(registry, name) {
            Ok(value) => Ok(Some(value)),
            Err(ModelError::Undetermined { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }

    /// Replace every variable reference in `expr` by the referenced value,
    /// recursively.
    ///
    /// # Errors
    ///
    /// Fails when a referenced name is unknown or undetermined, or when a
    /// variable refers to itself.
    pub fn expand(&self, registry: &PropertiesRegistry, expr: &Expr) -> Result<Expr, ModelError> {
        let mut stack = Vec::new();
        self.expand_with(registry, expr, &mut stack)
    }

    fn expand_with(
        &self,
        registry: &PropertiesRegistry,
        expr: &Expr,
        stack: &mut Vec<String>,
    ) -> Result<Expr, ModelError> {
        let expand_all = |items: &[Expr], stack: &mut Vec<String>| {
            items
                .iter()
                .map(|item| self.expand_with(registry, item, stack))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(match expr {
            Expr::Literal(_) => expr.clone(),
            Expr::Reference(var) => {
                if stack.contains(&var.var) {
                    return Err(ModelError::InvalidValue {
                        name: var.var.clone(),
                        reason: String::from("variable refers to itself"),
                        pos: var.pos.clone().unwrap_or_else(|| self.position()),
                    });
                }
                let value = self.value(registry, &var.var).map_err(|err| match err {
                    ModelError::UnknownProperty { name, owner, pos } => {
                        ModelError::UnknownProperty {
                            name,
                            owner,
                            pos: var.pos.clone().unwrap_or(pos),
                        }
                    }
                    other => other,
                })?;
                stack.push(var.var.clone());
                let expanded = self.expand_with(registry, &value, stack);
                stack.pop();
                expanded?
            }
            Expr::List { items } => Expr::list(expand_all(items, stack)?),
            Expr::Concat { items } => Expr::concat(expand_all(items, stack)?),
            Expr::Bool(b) => Expr::Bool(BoolExpr {
                operator: b.operator,
                left: Box::new(self.expand_with(registry, &b.left, stack)?),
                right: b
                    .right
                    .as_deref()
                    .map(|r| self.expand_with(registry, r, stack).map(Box::new))
                    .transpose()?,
                pos: b.pos.clone(),
            }),
            Expr::Path(p) => Expr::Path(PathExpr {
                anchor: p.anchor,
                components: expand_all(&p.components, stack)?,
                pos: p.pos.clone(),
            }),
        })
    }
}

impl fmt::Display for Owner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project(project) => write!(f, "project `{}`", project.name),
            Self::Module { module, .. } => write!(f, "module `{}`", module.source_file),
            Self::Target { target, .. } => write!(f, "target `{}`", target.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TargetKind, Variable};
    use crate::toolset::Backend;
    use camino::Utf8Path;
    use rstest::{fixture, rstest};

    #[fixture]
    fn project() -> Project {
        let mut project = Project::new("demo", "/p").with_toolset(Backend::Gnu);
        let mut module = Module::new("/p/demo.bkl", Utf8Path::new("/p"));
        module.variables.insert(
            String::from("WARN"),
            Variable::new(Expr::literal("-Wall"), Position::default()),
        );
        module.variables.insert(
            String::from("FLAGS"),
            Variable::new(
                Expr::list(vec![Expr::reference("WARN"), "-O2".into()]),
                Position::default(),
            ),
        );
        module.variables.insert(
            String::from("LOOP"),
            Variable::new(Expr::reference("LOOP"), Position::default()),
        );
        let mut target = Target::new("app", TargetKind::Exe, Position::new("demo.bkl", 3, 1));
        target.variables.insert(
            String::from("defines"),
            Variable::new(Expr::list(vec!["A".into()]), Position::default()),
        );
        module.targets.insert(String::from("app"), target);
        project.modules.push(module);
        project
    }

    fn target_owner(project: &Project) -> Owner<'_> {
        let module = &project.modules[0];
        Owner::Target {
            project,
            module,
            target: &module.targets["app"],
        }
    }

    #[rstest]
    fn explicit_values_win(project: Project) {
        let registry = PropertiesRegistry::with_all_backends();
        let owner = target_owner(&project);
        let value = owner.value(&registry, "defines").expect("assigned");
        assert!(matches!(value, Cow::Borrowed(_)));
        assert_eq!(value.as_literal_list(), Some(vec![String::from("A")]));
    }

    #[rstest]
    #[case("id", "app")]
    #[case("toolset", "gnu")]
    fn defaults_and_enclosing_scopes_apply(
        project: Project,
        #[case] name: &str,
        #[case] expected: &str,
    ) {
        let registry = PropertiesRegistry::with_all_backends();
        let owner = target_owner(&project);
        let value = owner.value(&registry, name).expect("resolvable");
        assert_eq!(value.literal_text().as_deref(), Some(expected));
    }

    #[rstest]
    fn unknown_names_are_reported_with_owner(project: Project) {
        let registry = PropertiesRegistry::with_all_backends();
        let err = target_owner(&project)
            .value(&registry, "nope")
            .expect_err("unknown");
        assert_eq!(
            err.to_string(),
            "demo.bkl:3:1: unknown property `nope` on target `app`"
        );
    }

    #[rstest]
    fn toolset_is_undetermined_without_backend() {
        let project = Project::new("demo", "/p");
        let registry = PropertiesRegistry::with_all_backends();
        let err = project
            .owner()
            .value(&registry, "toolset")
            .expect_err("not fixed yet");
        assert!(matches!(err, ModelError::Undetermined { .. }));
        assert!(
            project
                .owner()
                .optional_value(&registry, "toolset")
                .expect("known property")
                .is_none()
        );
    }

    #[rstest]
    fn expansion_follows_references(project: Project) {
        let registry = PropertiesRegistry::with_all_backends();
        let owner = target_owner(&project);
        let expanded = owner
            .expand(&registry, &Expr::reference("FLAGS"))
            .expect("expandable");
        assert_eq!(
            expanded,
            Expr::list(vec![Expr::literal("-Wall"), Expr::literal("-O2")])
        );
    }

    #[rstest]
    fn self_reference_is_rejected(project: Project) {
        let registry = PropertiesRegistry::with_all_backends();
        let err = target_owner(&project)
            .expand(&registry, &Expr::reference("LOOP"))
            .expect_err("cycle");
        assert!(matches!(err, ModelError::InvalidValue { ref name, .. } if name == "LOOP"));
    }
}
