//! Property declarations and the scoped property registry.
//!
//! A [`Property`] declares a named, typed attribute that may be assigned on a
//! project, a module, or a target. Declarations come from three places: the
//! built-in set in this module, each [`TargetKind`]'s own properties, and the
//! extensions contributed by every registered [`Backend`]. The
//! [`PropertiesRegistry`] merges them lazily, once per scope.

mod registry;

pub use registry::{PropertiesDict, PropertiesRegistry};

use crate::expr::{Anchor, Expr, Literal, normalize_path};
use crate::model::{ModelError, Owner, TargetKind};
use crate::toolset::Backend;
use camino::Utf8Path;
use std::fmt;

/// Granularity a property is legal at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The whole project.
    Project,
    /// A module (one input file).
    Module,
    /// Every target regardless of kind.
    AllTargets,
    /// Targets of one kind.
    Kind(TargetKind),
}

/// Type of a property's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    /// Filesystem path, stored anchored at the top source directory.
    Path,
    /// Identifier such as a target name.
    Id,
    /// One of a fixed set of names.
    Enum(&'static [&'static str]),
    /// List whose items all have the inner type.
    List(Box<Self>),
    /// `true` or `false`.
    Bool,
    /// Arbitrary text.
    String,
}

impl PropertyType {
    /// List of `item` values.
    #[must_use]
    pub fn list_of(item: Self) -> Self {
        Self::List(Box::new(item))
    }

    /// Validate `value` assigned to property `name` and coerce it to the
    /// canonical representation of this type.
    ///
    /// Relative paths are interpreted relative to `srcdir`, the declaring
    /// module's directory expressed relative to the top source directory.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidValue`] when the value does not fit.
    pub fn normalize(&self, name: &str, value: Expr, srcdir: &Utf8Path) -> Result<Expr, ModelError> {
        let invalid = |reason: String, value: &Expr| ModelError::InvalidValue {
            name: name.to_owned(),
            reason,
            pos: value.position().cloned().unwrap_or_default(),
        };
        match self {
            Self::List(item) => {
                let items = match value {
                    Expr::List { items } => items,
                    single => vec![single],
                };
                let normalized = items
                    .into_iter()
                    .map(|v| item.normalize(name, v, srcdir))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::list(normalized))
            }
            _ if matches!(value, Expr::List { .. }) && !value.is_empty_list() => {
                Err(invalid(String::from("expected a single value, not a list"), &value))
            }
            Self::Id => match value.literal_text() {
                Some(text) if is_identifier(&text) => Ok(relabel(&value, text)),
                _ => Err(invalid(String::from("expected an identifier"), &value)),
            },
            Self::Enum(allowed) => match value.literal_text() {
                Some(text) if allowed.contains(&text.as_str()) => Ok(relabel(&value, text)),
                _ => Err(invalid(
                    format!("expected one of: {}", allowed.join(", ")),
                    &value,
                )),
            },
            Self::Bool => match value.literal_text().as_deref() {
                Some(text @ ("true" | "false")) => Ok(relabel(&value, text.to_owned())),
                _ => Err(invalid(String::from("expected `true` or `false`"), &value)),
            },
            Self::String => match value {
                Expr::Bool(_) => Err(invalid(String::from("expected text"), &value)),
                other => Ok(other),
            },
            Self::Path => {
                let pos = value.position().cloned().unwrap_or_default();
                to_path(value, srcdir).ok_or_else(|| ModelError::InvalidValue {
                    name: name.to_owned(),
                    reason: String::from("expected a path"),
                    pos,
                })
            }
        }
    }
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn relabel(original: &Expr, text: String) -> Expr {
    Expr::Literal(Literal {
        text,
        pos: original.position().cloned(),
    })
}

fn to_path(value: Expr, srcdir: &Utf8Path) -> Option<Expr> {
    let pos = value.position().cloned();
    let path = match value {
        Expr::Path(_) => return Some(value),
        Expr::List { .. } | Expr::Bool(_) => return None,
        ref other => match other.literal_text() {
            Some(text) => anchored_path(srcdir, &text),
            None => {
                let mut components = split_components(srcdir.as_str());
                let own = split_path(other);
                let anchor = if own.first().is_some_and(is_root_marker) {
                    components.clear();
                    Anchor::Unanchored
                } else if srcdir.is_absolute() {
                    Anchor::Unanchored
                } else {
                    Anchor::TopSrcDir
                };
                components.extend(own);
                Expr::path(anchor, components)
            }
        },
    };
    Some(path.with_position_if_missing(pos))
}

/// Path value for `text` written in a module whose directory is `srcdir`.
pub(crate) fn anchored_path(srcdir: &Utf8Path, text: &str) -> Expr {
    let joined = srcdir.join(text);
    let normalized = normalize_path(&joined).unwrap_or(joined);
    let anchor = if normalized.is_absolute() {
        Anchor::Unanchored
    } else {
        Anchor::TopSrcDir
    };
    Expr::path_from_str(anchor, normalized.as_str())
}

fn split_components(path: &str) -> Vec<Expr> {
    match Expr::path_from_str(Anchor::Unanchored, path) {
        Expr::Path(p) => p.components,
        _ => Vec::new(),
    }
}

fn is_root_marker(component: &Expr) -> bool {
    component.literal_text().is_some_and(|t| t.is_empty())
}

/// Split a concatenation into path components at `/` in its literal parts.
fn split_path(value: &Expr) -> Vec<Expr> {
    let items = match value {
        Expr::Concat { items } => items.clone(),
        other => vec![other.clone()],
    };
    let mut components: Vec<Expr> = Vec::new();
    let mut current: Vec<Expr> = Vec::new();
    for item in items {
        let Expr::Literal(lit) = item else {
            current.push(item);
            continue;
        };
        let mut parts = lit.text.split('/');
        let push_part = |current: &mut Vec<Expr>, part: &str| {
            if !part.is_empty() {
                current.push(Expr::Literal(Literal {
                    text: part.to_owned(),
                    pos: lit.pos.clone(),
                }));
            }
        };
        if let Some(first) = parts.next() {
            push_part(&mut current, first);
        }
        for part in parts {
            components.push(Expr::concat(std::mem::take(&mut current)));
            push_part(&mut current, part);
        }
    }
    components.push(Expr::concat(current));
    components
        .into_iter()
        .enumerate()
        .filter(|(index, c)| match c.literal_text().as_deref() {
            Some(".") => false,
            Some("") => *index == 0,
            _ => true,
        })
        .map(|(_, c)| c)
        .collect()
}

/// Default value of a property that was never assigned.
#[derive(Clone)]
pub enum PropertyDefault {
    /// The same value for every owner.
    Constant(Expr),
    /// Computed from the owning project, module or target.
    Derived(fn(Owner<'_>) -> Expr),
    /// Only known while generating for a particular backend.
    Undetermined,
}

impl fmt::Debug for PropertyDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(expr) => f.debug_tuple("Constant").field(expr).finish(),
            Self::Derived(_) => f.write_str("Derived(..)"),
            Self::Undetermined => f.write_str("Undetermined"),
        }
    }
}

/// Declaration of a named, typed attribute.
#[derive(Debug, Clone)]
pub struct Property {
    /// Name used in assignments.
    pub name: &'static str,
    /// Value type.
    pub ty: PropertyType,
    /// Value used when nothing is assigned.
    pub default: PropertyDefault,
    /// Whether only the generator may set the value.
    pub read_only: bool,
    /// One-line description.
    pub doc: &'static str,
    /// Backends that contributed the property; empty for built-ins.
    pub backends: Vec<Backend>,
    /// Scope the property was registered in.
    pub scope: Scope,
}

impl Property {
    /// Declare property `name` of type `ty`.
    ///
    /// Lists default to the empty list, everything else is undetermined
    /// until a default is supplied.
    #[must_use]
    pub fn new(name: &'static str, ty: PropertyType, doc: &'static str) -> Self {
        let default = match ty {
            PropertyType::List(_) => PropertyDefault::Constant(Expr::empty_list()),
            _ => PropertyDefault::Undetermined,
        };
        Self {
            name,
            ty,
            default,
            read_only: false,
            doc,
            backends: Vec::new(),
            scope: Scope::Project,
        }
    }

    /// Use `value` as the default.
    #[must_use]
    pub fn with_default(mut self, value: Expr) -> Self {
        self.default = PropertyDefault::Constant(value);
        self
    }

    /// Compute the default from the owner.
    #[must_use]
    pub fn derived(mut self, derive: fn(Owner<'_>) -> Expr) -> Self {
        self.default = PropertyDefault::Derived(derive);
        self
    }

    /// Forbid assignments from project files.
    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub(crate) fn registered(mut self, scope: Scope, backend: Option<Backend>) -> Self {
        self.scope = scope;
        self.backends = backend.into_iter().collect();
        self
    }
}

fn target_name(owner: Owner<'_>) -> Expr {
    match owner {
        Owner::Target { target, .. } => Expr::literal_at(target.name.clone(), target.pos.clone()),
        Owner::Module { .. } | Owner::Project(_) => Expr::empty_list(),
    }
}

/// Built-in project properties.
#[must_use]
pub fn std_project_props() -> Vec<Property> {
    vec![
        Property::new(
            "toolset",
            PropertyType::Enum(Backend::NAMES),
            "The toolset files are being generated for; set by the generator.",
        )
        .read_only(),
    ]
}

/// Built-in module properties.
#[must_use]
pub fn std_module_props() -> Vec<Property> {
    vec![Property::new(
        "toolsets",
        PropertyType::list_of(PropertyType::Enum(Backend::NAMES)),
        "Toolsets to generate files for; all of them when empty.",
    )]
}

/// Built-in properties of every target.
#[must_use]
pub fn std_target_props() -> Vec<Property> {
    vec![
        Property::new("id", PropertyType::Id, "Target's unique name (ID).")
            .derived(target_name)
            .read_only(),
        Property::new(
            "deps",
            PropertyType::list_of(PropertyType::Id),
            "Target's dependencies (list of IDs).",
        ),
    ]
}
