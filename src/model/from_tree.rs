//! Build the project model from parse trees.
//!
//! Statements are processed in source order. Assignments are validated
//! against the [`PropertiesRegistry`]; module-level names that are not
//! properties become user variables. `if` blocks are decided while loading,
//! so their conditions may only depend on literals and values that are
//! already known (including the `toolset` the project is loaded for).
//!
//! Errors do not stop loading: the offending statement is skipped, the module
//! is marked incomplete and every error is returned together with the project
//! once all modules have been read.

use super::{Module, ModelError, Owner, Project, Target, TargetKind, Variable, Variables};
use crate::ast::{ParseNode, ParseTreeFile, Position, TokenKind};
use crate::expr::{BoolExpr, BoolOperator, Expr, SourceFragment, disambiguate};
use crate::props::{PropertiesRegistry, PropertyType};
use camino::Utf8PathBuf;
use tracing::debug;

/// A project together with the errors found while loading it.
#[derive(Debug)]
pub struct LoadedProject {
    /// Every module, including incomplete ones.
    pub project: Project,
    /// Errors across all modules, in the order found.
    pub errors: Vec<ModelError>,
}

impl LoadedProject {
    /// The project if no module reported an error.
    ///
    /// # Errors
    ///
    /// Returns every [`ModelError`] found across all modules.
    pub fn into_result(self) -> Result<Project, Vec<ModelError>> {
        if self.errors.is_empty() {
            Ok(self.project)
        } else {
            Err(self.errors)
        }
    }
}

/// Load every parse tree in `trees` into `project`, one module per tree.
///
/// Modules that reported errors are kept but marked incomplete.
///
/// # Examples
///
/// ```
/// use bakery::ast::{ParseNode, ParseTreeFile, TokenKind};
/// use bakery::model::{Project, from_tree::load_project};
/// use bakery::props::PropertiesRegistry;
///
/// let target = ParseNode::new(TokenKind::Target).with_children(vec![
///     ParseNode::leaf(TokenKind::Id, "exe"),
///     ParseNode::leaf(TokenKind::Id, "hello"),
/// ]);
/// let tree = ParseTreeFile {
///     source_file: "hello.bkl".into(),
///     root: ParseNode::new(TokenKind::Program).with_children(vec![target]),
/// };
/// let registry = PropertiesRegistry::with_all_backends();
/// let project = load_project(Project::new("hello", ""), &[tree], &registry)
///     .into_result()
///     .expect("valid project");
/// assert!(project.get_target("hello").is_some());
/// ```
#[must_use]
pub fn load_project(
    mut project: Project,
    trees: &[ParseTreeFile],
    registry: &PropertiesRegistry,
) -> LoadedProject {
    let mut errors = Vec::new();
    for tree in trees {
        debug!(file = %tree.source_file, "loading module");
        let before = errors.len();
        let mut module = ModuleLoader::new(&project, registry, tree, &mut errors).load(&tree.root);
        module.complete = errors.len() == before;
        project.modules.push(module);
    }
    LoadedProject { project, errors }
}

struct ModuleLoader<'a> {
    project: &'a Project,
    registry: &'a PropertiesRegistry,
    file: &'a Utf8PathBuf,
    module: Module,
    errors: &'a mut Vec<ModelError>,
}

fn malformed(node: &ParseNode, pos: Position, reason: &str) -> ModelError {
    ModelError::MalformedTree {
        kind: node.kind,
        reason: reason.to_owned(),
        pos,
    }
}

impl<'a> ModuleLoader<'a> {
    fn new(
        project: &'a Project,
        registry: &'a PropertiesRegistry,
        tree: &'a ParseTreeFile,
        errors: &'a mut Vec<ModelError>,
    ) -> Self {
        Self {
            project,
            registry,
            file: &tree.source_file,
            module: Module::new(tree.source_file.clone(), &project.top_srcdir),
            errors,
        }
    }

    fn load(mut self, root: &ParseNode) -> Module {
        if root.kind == TokenKind::Program {
            for statement in &root.children {
                self.statement(statement, None);
            }
        } else {
            let err = malformed(root, self.pos(root), "expected a program node");
            self.errors.push(err);
        }
        self.module
    }

    fn pos(&self, node: &ParseNode) -> Position {
        node.pos.or_file(self.file)
    }

    fn child<'n>(&self, node: &'n ParseNode, index: usize) -> Result<&'n ParseNode, ModelError> {
        node.child(index)
            .ok_or_else(|| malformed(node, self.pos(node), &format!("missing child {index}")))
    }

    fn identifier(&self, node: &ParseNode, index: usize) -> Result<String, ModelError> {
        let child = self.child(node, index)?;
        match (child.kind, child.text.as_deref()) {
            (TokenKind::Id | TokenKind::Literal, Some(text)) if !text.is_empty() => {
                Ok(text.to_owned())
            }
            _ => Err(malformed(child, self.pos(child), "expected an identifier")),
        }
    }

    fn statement(&mut self, node: &ParseNode, target: Option<&str>) {
        if let Err(err) = self.try_statement(node, target) {
            debug!(error = %err, "skipping statement");
            self.errors.push(err);
        }
    }

    fn try_statement(&mut self, node: &ParseNode, target: Option<&str>) -> Result<(), ModelError> {
        match node.kind {
            TokenKind::Nil => Ok(()),
            TokenKind::Assign | TokenKind::Append => {
                let name = self.identifier(node, 0)?;
                let value = self.expr(self.child(node, 1)?)?;
                let append = node.kind == TokenKind::Append;
                self.assign(target, &name, value, self.pos(node), append)
            }
            TokenKind::FilesList => {
                if target.is_none() {
                    return Err(malformed(node, self.pos(node), "file lists belong inside a target"));
                }
                let name = self.identifier(node, 0)?;
                let value = self.expr(self.child(node, 1)?)?;
                self.assign(target, &name, value, self.pos(node), true)
            }
            TokenKind::Target => {
                if target.is_some() {
                    return Err(malformed(node, self.pos(node), "targets cannot be nested"));
                }
                self.target(node)
            }
            TokenKind::If => {
                let condition = self.expr(self.child(node, 0)?)?;
                if self.evaluate(&condition, target, &self.pos(node))? {
                    for statement in node.children.iter().skip(1) {
                        self.statement(statement, target);
                    }
                }
                Ok(())
            }
            _ => Err(malformed(node, self.pos(node), "expected a statement")),
        }
    }

    fn target(&mut self, node: &ParseNode) -> Result<(), ModelError> {
        let pos = self.pos(node);
        let kind_name = self.identifier(node, 0)?;
        let name = self.identifier(node, 1)?;
        let kind: TargetKind = kind_name.parse().map_err(|_| ModelError::UnknownTargetKind {
            kind: kind_name.clone(),
            pos: pos.clone(),
        })?;
        if self.module.targets.contains_key(&name) || self.project.get_target(&name).is_some() {
            return Err(ModelError::DuplicateTarget { name, pos });
        }
        debug!(target = %name, %kind, "declared target");
        self.module
            .targets
            .insert(name.clone(), Target::new(name.clone(), kind, pos));
        for statement in node.children.iter().skip(2) {
            self.statement(statement, Some(name.as_str()));
        }
        Ok(())
    }

    fn variables_mut(&mut self, target: Option<&str>) -> Option<&mut Variables> {
        match target {
            Some(name) => self.module.targets.get_mut(name).map(|t| &mut t.variables),
            None => Some(&mut self.module.variables),
        }
    }

    fn assign(
        &mut self,
        target: Option<&str>,
        name: &str,
        value: Expr,
        pos: Position,
        append: bool,
    ) -> Result<(), ModelError> {
        let prop = match target {
            Some(target_name) => {
                let kind = self
                    .module
                    .targets
                    .get(target_name)
                    .map(|t| t.kind)
                    .ok_or_else(|| ModelError::UnknownProperty {
                        name: name.to_owned(),
                        owner: format!("target `{target_name}`"),
                        pos: pos.clone(),
                    })?;
                let prop = self.registry.get_target_property(kind, name);
                if prop.is_none() {
                    return Err(ModelError::UnknownProperty {
                        name: name.to_owned(),
                        owner: format!("target `{target_name}`"),
                        pos,
                    });
                }
                prop
            }
            None => self
                .registry
                .get_module_property(name)
                .or_else(|| self.registry.get_project_property(name)),
        };
        if prop.is_some_and(|p| p.read_only) {
            return Err(ModelError::ReadOnly {
                name: name.to_owned(),
                pos,
            });
        }
        let value = value.with_position_if_missing(Some(pos.clone()));
        let mut value = match prop {
            Some(prop) => prop.ty.normalize(name, value, &self.module.srcdir)?,
            None => value,
        };
        if append {
            if prop.is_some_and(|p| !matches!(p.ty, PropertyType::List(_))) {
                return Err(ModelError::InvalidValue {
                    name: name.to_owned(),
                    reason: String::from("only list values can be appended to"),
                    pos,
                });
            }
            let existing = self
                .variables_mut(target)
                .and_then(|vars| vars.get(name))
                .map(|var| var.value.items().to_vec())
                .unwrap_or_default();
            value = Expr::list(existing.into_iter().chain(value.items().iter().cloned()).collect());
        }
        if let Some(vars) = self.variables_mut(target) {
            vars.insert(name.to_owned(), Variable::new(value, pos));
        }
        Ok(())
    }

    fn evaluate(&self, condition: &Expr, target: Option<&str>, pos: &Position) -> Result<bool, ModelError> {
        let module = &self.module;
        let owner = match target.and_then(|name| module.targets.get(name)) {
            Some(target) => Owner::Target {
                project: self.project,
                module,
                target,
            },
            None => Owner::Module {
                project: self.project,
                module,
            },
        };
        self.truth(owner, condition, pos)
    }

    fn truth(&self, owner: Owner<'_>, condition: &Expr, pos: &Position) -> Result<bool, ModelError> {
        let Expr::Bool(b) = condition else {
            return match self.text(owner, condition, pos)?.as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" | "" => Ok(false),
                _ => Err(ModelError::UndeterminedCondition { pos: pos.clone() }),
            };
        };
        let right = || {
            b.right
                .as_deref()
                .ok_or_else(|| ModelError::UndeterminedCondition { pos: pos.clone() })
        };
        Ok(match b.operator {
            BoolOperator::And => self.truth(owner, &b.left, pos)? && self.truth(owner, right()?, pos)?,
            BoolOperator::Or => self.truth(owner, &b.left, pos)? || self.truth(owner, right()?, pos)?,
            BoolOperator::Not => !self.truth(owner, &b.left, pos)?,
            BoolOperator::Equal => self.text(owner, &b.left, pos)? == self.text(owner, right()?, pos)?,
            BoolOperator::NotEqual => {
                self.text(owner, &b.left, pos)? != self.text(owner, right()?, pos)?
            }
        })
    }

    fn text(&self, owner: Owner<'_>, value: &Expr, pos: &Position) -> Result<String, ModelError> {
        let undetermined = || ModelError::UndeterminedCondition { pos: pos.clone() };
        let expanded = owner.expand(self.registry, value).map_err(|err| match err {
            ModelError::Undetermined { .. } => undetermined(),
            other => other,
        })?;
        match expanded {
            Expr::List { ref items } if items.is_empty() => Ok(String::new()),
            other => other.literal_text().ok_or_else(undetermined),
        }
    }

    fn expr(&self, node: &ParseNode) -> Result<Expr, ModelError> {
        let pos = self.pos(node);
        let children = |node: &ParseNode| {
            node.children
                .iter()
                .map(|c| self.expr(c))
                .collect::<Result<Vec<_>, _>>()
        };
        match node.kind {
            TokenKind::Literal | TokenKind::Id => Ok(Expr::literal_at(node.text(), pos)),
            TokenKind::VarReference => {
                let name = match node.text.as_deref() {
                    Some(text) if !text.is_empty() => text.to_owned(),
                    _ => self.identifier(node, 0)?,
                };
                Ok(Expr::reference_at(name, pos))
            }
            TokenKind::List => Ok(Expr::list(children(node)?)),
            TokenKind::Concat => Ok(Expr::concat(children(node)?)),
            TokenKind::ListOrConcat => {
                let fragments = node
                    .children
                    .iter()
                    .map(|c| {
                        self.expr(c)
                            .map(|value| SourceFragment::new(value, c.start, c.stop).at(self.pos(c)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(disambiguate(fragments)?)
            }
            TokenKind::Not => Ok(Expr::Bool(BoolExpr {
                operator: BoolOperator::Not,
                left: Box::new(self.expr(self.child(node, 0)?)?),
                right: None,
                pos: Some(pos),
            })),
            TokenKind::And | TokenKind::Or | TokenKind::Equal | TokenKind::NotEqual => {
                let operator = match node.kind {
                    TokenKind::And => BoolOperator::And,
                    TokenKind::Or => BoolOperator::Or,
                    TokenKind::Equal => BoolOperator::Equal,
                    _ => BoolOperator::NotEqual,
                };
                Ok(Expr::Bool(BoolExpr {
                    operator,
                    left: Box::new(self.expr(self.child(node, 0)?)?),
                    right: Some(Box::new(self.expr(self.child(node, 1)?)?)),
                    pos: Some(pos),
                }))
            }
            TokenKind::Nil => Ok(Expr::empty_list()),
            _ => Err(malformed(node, pos, "expected a value")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Anchor;
    use crate::toolset::Backend;
    use rstest::rstest;

    fn id(text: &str) -> ParseNode {
        ParseNode::leaf(TokenKind::Id, text)
    }

    fn lit(text: &str, at: usize) -> ParseNode {
        ParseNode::leaf(TokenKind::Literal, text).with_span(at, at)
    }

    fn node(kind: TokenKind, children: Vec<ParseNode>) -> ParseNode {
        ParseNode::new(kind).with_children(children)
    }

    fn assign(name: &str, value: ParseNode) -> ParseNode {
        node(TokenKind::Assign, vec![id(name), value])
    }

    fn reference(name: &str) -> ParseNode {
        node(TokenKind::VarReference, vec![id(name)])
    }

    fn load(statements: Vec<ParseNode>, toolset: Option<Backend>) -> Result<Project, Vec<ModelError>> {
        let tree = ParseTreeFile {
            source_file: Utf8PathBuf::from("/p/demo.bkl"),
            root: node(TokenKind::Program, statements),
        };
        let mut project = Project::new("demo", "/p");
        if let Some(backend) = toolset {
            project = project.with_toolset(backend);
        }
        load_project(project, &[tree], &PropertiesRegistry::with_all_backends()).into_result()
    }

    #[rstest]
    fn targets_collect_sources_and_properties() {
        let sources = node(
            TokenKind::ListOrConcat,
            vec![lit("a.c", 0), lit("b.c", 2)],
        );
        let target = node(
            TokenKind::Target,
            vec![
                id("exe"),
                id("exe1"),
                node(TokenKind::FilesList, vec![id("sources"), sources]),
                assign("defines", lit("DEBUG", 5)),
            ],
        );
        let project = load(vec![target], None).expect("valid");
        let (_, exe) = project.get_target("exe1").expect("declared");
        assert_eq!(exe.kind, TargetKind::Exe);
        let sources = &exe.variables["sources"].value;
        assert_eq!(sources.items().len(), 2);
        assert!(
            sources
                .items()
                .iter()
                .all(|s| matches!(s, Expr::Path(p) if p.anchor == Anchor::TopSrcDir))
        );
        assert_eq!(
            exe.variables["defines"].value.as_literal_list(),
            Some(vec![String::from("DEBUG")])
        );
    }

    #[rstest]
    fn unknown_module_names_become_user_variables() {
        let project = load(vec![assign("CFLAGS", lit("-O2", 0))], None).expect("valid");
        assert_eq!(
            project.modules[0].variables["CFLAGS"].value.as_literal(),
            Some("-O2")
        );
    }

    #[rstest]
    fn append_extends_existing_lists() {
        let project = load(
            vec![
                assign("toolsets", lit("gnu", 0)),
                node(TokenKind::Append, vec![id("toolsets"), lit("vs2010", 4)]),
            ],
            None,
        )
        .expect("valid");
        assert_eq!(
            project.modules[0].variables["toolsets"].value.as_literal_list(),
            Some(vec![String::from("gnu"), String::from("vs2010")])
        );
    }

    #[rstest]
    #[case(Some(Backend::Gnu), Some("gnu-only"))]
    #[case(Some(Backend::Vs2010), None)]
    fn toolset_conditions_are_decided_while_loading(
        #[case] toolset: Option<Backend>,
        #[case] expected: Option<&str>,
    ) {
        let condition = node(TokenKind::Equal, vec![reference("toolset"), lit("gnu", 3)]);
        let block = node(TokenKind::If, vec![condition, assign("EXTRA", lit("gnu-only", 6))]);
        let project = load(vec![block], toolset).expect("valid");
        let extra = project.modules[0].variables.get("EXTRA");
        assert_eq!(extra.and_then(|v| v.value.as_literal()), expected);
    }

    #[rstest]
    fn undetermined_conditions_are_reported() {
        let condition = node(TokenKind::Equal, vec![reference("toolset"), lit("gnu", 3)]);
        let block = node(TokenKind::If, vec![condition]);
        let errors = load(vec![block], None).expect_err("toolset unknown");
        assert!(matches!(errors[..], [ModelError::UndeterminedCondition { .. }]));
    }

    #[rstest]
    fn every_error_is_collected() {
        let bad_kind = node(TokenKind::Target, vec![id("dll"), id("x")]);
        let read_only = node(
            TokenKind::Target,
            vec![id("exe"), id("app"), assign("id", lit("other", 0))],
        );
        let unknown = node(
            TokenKind::Target,
            vec![id("action"), id("run"), assign("sources", lit("a.c", 0))],
        );
        let duplicate = node(TokenKind::Target, vec![id("exe"), id("app")]);
        let errors = load(vec![bad_kind, read_only, unknown, duplicate], None)
            .expect_err("four problems");
        assert!(matches!(
            errors[..],
            [
                ModelError::UnknownTargetKind { .. },
                ModelError::ReadOnly { .. },
                ModelError::UnknownProperty { .. },
                ModelError::DuplicateTarget { .. },
            ]
        ));
    }

    #[rstest]
    fn failing_modules_are_kept_but_incomplete() {
        let good = ParseTreeFile {
            source_file: Utf8PathBuf::from("/p/a/good.bkl"),
            root: node(TokenKind::Program, vec![node(TokenKind::Target, vec![id("exe"), id("app")])]),
        };
        let bad = ParseTreeFile {
            source_file: Utf8PathBuf::from("/p/b/bad.bkl"),
            root: node(
                TokenKind::Program,
                vec![node(
                    TokenKind::Target,
                    vec![id("exe"), id("broken"), assign("nosuch", lit("1", 0))],
                )],
            ),
        };
        let loaded = load_project(
            Project::new("demo", "/p"),
            &[good, bad],
            &PropertiesRegistry::with_all_backends(),
        );
        assert!(matches!(loaded.errors[..], [ModelError::UnknownProperty { .. }]));
        let complete: Vec<bool> = loaded.project.modules.iter().map(|m| m.complete).collect();
        assert_eq!(complete, [true, false]);
        assert!(loaded.project.get_target("broken").is_some());
    }

    #[rstest]
    fn positions_inherit_the_module_file() {
        let target = node(TokenKind::Target, vec![id("exe"), id("app")])
            .with_pos(Position {
                file: None,
                line: Some(4),
                column: Some(1),
            });
        let project = load(vec![target], None).expect("valid");
        let (_, app) = project.get_target("app").expect("declared");
        assert_eq!(app.pos.to_string(), "/p/demo.bkl:4:1");
    }
}
