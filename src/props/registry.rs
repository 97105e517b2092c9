//! Lazily populated registry of legal properties.

use super::{Property, Scope, std_module_props, std_project_props, std_target_props};
use crate::model::TargetKind;
use crate::toolset::Backend;
use indexmap::IndexMap;
use std::sync::OnceLock;
use tracing::debug;

/// Properties of one scope keyed by name, in declaration order.
pub type PropertiesDict = IndexMap<&'static str, Property>;

#[derive(Debug, Default)]
struct PerKind {
    exe: OnceLock<PropertiesDict>,
    library: OnceLock<PropertiesDict>,
    action: OnceLock<PropertiesDict>,
}

impl PerKind {
    const fn slot(&self, kind: TargetKind) -> &OnceLock<PropertiesDict> {
        match kind {
            TargetKind::Exe => &self.exe,
            TargetKind::Library => &self.library,
            TargetKind::Action => &self.action,
        }
    }
}

/// Registry answering which properties are legal where.
///
/// Each scope is populated on first lookup or enumeration and never changes
/// afterwards, so enumeration order is stable for the lifetime of the
/// registry even if more backends are registered later.
///
/// # Examples
///
/// ```
/// use bakery::model::TargetKind;
/// use bakery::props::PropertiesRegistry;
/// use bakery::toolset::Backend;
///
/// let registry = PropertiesRegistry::new([Backend::Gnu]);
/// assert!(registry.get_target_property(TargetKind::Exe, "deps").is_some());
/// assert!(registry.get_module_property("gnu.makefile").is_some());
/// assert!(registry.get_module_property("no-such-thing").is_none());
/// ```
#[derive(Debug, Default)]
pub struct PropertiesRegistry {
    backends: Vec<Backend>,
    project: OnceLock<PropertiesDict>,
    module: OnceLock<PropertiesDict>,
    all_targets: OnceLock<PropertiesDict>,
    kinds: PerKind,
}

impl PropertiesRegistry {
    /// Registry merging built-ins with the declarations of `backends`, in
    /// the given order.
    #[must_use]
    pub fn new(backends: impl IntoIterator<Item = Backend>) -> Self {
        let mut registry = Self::default();
        for backend in backends {
            registry.register(backend);
        }
        registry
    }

    /// Registry with every known backend registered.
    #[must_use]
    pub fn with_all_backends() -> Self {
        Self::new(Backend::ALL)
    }

    /// Register `backend`. Scopes populated earlier keep their contents.
    pub fn register(&mut self, backend: Backend) {
        if !self.backends.contains(&backend) {
            self.backends.push(backend);
        }
    }

    /// Backends in registration order.
    #[must_use]
    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    fn fill(
        &self,
        scope: Scope,
        builtins: Vec<Property>,
        contributed: impl Fn(Backend) -> Vec<Property>,
    ) -> PropertiesDict {
        debug!(?scope, "populating property scope");
        let mut dict = PropertiesDict::new();
        for prop in builtins {
            let prop = prop.registered(scope, None);
            dict.insert(prop.name, prop);
        }
        for &backend in &self.backends {
            for prop in contributed(backend) {
                let prop = prop.registered(scope, Some(backend));
                dict.insert(prop.name, prop);
            }
        }
        dict
    }

    fn project_dict(&self) -> &PropertiesDict {
        self.project.get_or_init(|| {
            self.fill(Scope::Project, std_project_props(), |b| {
                b.properties(Scope::Project)
            })
        })
    }

    fn module_dict(&self) -> &PropertiesDict {
        self.module.get_or_init(|| {
            self.fill(Scope::Module, std_module_props(), |b| {
                b.properties(Scope::Module)
            })
        })
    }

    fn all_targets_dict(&self) -> &PropertiesDict {
        self.all_targets.get_or_init(|| {
            self.fill(Scope::AllTargets, std_target_props(), |b| {
                b.properties(Scope::AllTargets)
            })
        })
    }

    fn kind_dict(&self, kind: TargetKind) -> &PropertiesDict {
        self.kinds.slot(kind).get_or_init(|| {
            let scope = Scope::Kind(kind);
            self.fill(scope, kind.properties(), |b| b.properties(scope))
        })
    }

    /// Project property `name`, if declared.
    #[must_use]
    pub fn get_project_property(&self, name: &str) -> Option<&Property> {
        self.project_dict().get(name)
    }

    /// Module property `name`, if declared.
    #[must_use]
    pub fn get_module_property(&self, name: &str) -> Option<&Property> {
        self.module_dict().get(name)
    }

    /// Property `name` of targets of `kind`, if declared. Properties common
    /// to all targets take precedence.
    #[must_use]
    pub fn get_target_property(&self, kind: TargetKind, name: &str) -> Option<&Property> {
        self.all_targets_dict()
            .get(name)
            .or_else(|| self.kind_dict(kind).get(name))
    }

    /// Every project property in declaration order.
    pub fn project_properties(&self) -> impl Iterator<Item = &Property> {
        self.project_dict().values()
    }

    /// Every module property in declaration order.
    pub fn module_properties(&self) -> impl Iterator<Item = &Property> {
        self.module_dict().values()
    }

    /// Every property of targets of `kind`: properties common to all
    /// targets first, then the kind's own.
    pub fn target_properties(&self, kind: TargetKind) -> impl Iterator<Item = &Property> {
        self.all_targets_dict()
            .values()
            .chain(self.kind_dict(kind).values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn names<'a>(props: impl Iterator<Item = &'a Property>) -> Vec<&'static str> {
        props.map(|p| p.name).collect()
    }

    #[rstest]
    fn builtins_come_before_contributions() {
        let registry = PropertiesRegistry::new([Backend::Gnu, Backend::Vs2010]);
        assert_eq!(
            names(registry.module_properties()),
            vec!["toolsets", "gnu.makefile", "vs2010.solutionfile"]
        );
        let exe = names(registry.target_properties(TargetKind::Exe));
        assert_eq!(&exe[..4], &["id", "deps", "vs2010.projectfile", "vs2010.guid"]);
        assert_eq!(exe.last(), Some(&"vs2010.subsystem"));
    }

    #[rstest]
    fn contributed_properties_are_tagged() {
        let registry = PropertiesRegistry::new([Backend::Gnu]);
        let prop = registry
            .get_target_property(TargetKind::Library, "gnu.arflags")
            .expect("declared by gnu");
        assert_eq!(prop.backends, vec![Backend::Gnu]);
        assert_eq!(prop.scope, Scope::Kind(TargetKind::Library));
        let id = registry
            .get_target_property(TargetKind::Library, "id")
            .expect("built-in");
        assert!(id.backends.is_empty());
        assert!(id.read_only);
    }

    #[rstest]
    fn visual_studio_versions_declare_their_own_properties() {
        let registry = PropertiesRegistry::new([Backend::Vs2012]);
        assert_eq!(names(registry.module_properties()), vec!["toolsets", "vs2012.solutionfile"]);
        let guid = registry
            .get_target_property(TargetKind::Exe, "vs2012.guid")
            .expect("declared by vs2012");
        assert_eq!(guid.backends, vec![Backend::Vs2012]);
        assert!(registry.get_target_property(TargetKind::Exe, "vs2010.guid").is_none());
    }

    #[rstest]
    fn unknown_names_are_absent() {
        let registry = PropertiesRegistry::with_all_backends();
        assert!(registry.get_project_property("sources").is_none());
        assert!(registry.get_target_property(TargetKind::Action, "sources").is_none());
        assert!(registry.get_target_property(TargetKind::Exe, "gnu.arflags").is_none());
    }

    #[rstest]
    fn scopes_are_populated_once() {
        let mut registry = PropertiesRegistry::new([Backend::Gnu]);
        let first: Vec<*const Property> =
            registry.module_properties().map(std::ptr::from_ref).collect();
        registry.register(Backend::Vs2010);
        let second: Vec<*const Property> =
            registry.module_properties().map(std::ptr::from_ref).collect();
        assert_eq!(first, second);
        assert!(registry.get_module_property("vs2010.solutionfile").is_none());
        // Scopes not yet populated see the later registration.
        assert!(
            registry
                .get_target_property(TargetKind::Exe, "vs2010.guid")
                .is_some()
        );
    }

    #[rstest]
    fn concurrent_first_access_populates_once() {
        let registry = PropertiesRegistry::with_all_backends();
        let addresses = |registry: &PropertiesRegistry| -> Vec<usize> {
            registry
                .target_properties(TargetKind::Exe)
                .map(|p| std::ptr::from_ref(p).addr())
                .collect()
        };
        let seen: Vec<Vec<usize>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| addresses(&registry)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("thread completes"))
                .collect()
        });
        let expected = addresses(&registry);
        assert!(!expected.is_empty());
        assert!(seen.iter().all(|addrs| *addrs == expected));
    }

    #[rstest]
    fn registering_twice_is_ignored() {
        let mut registry = PropertiesRegistry::new([Backend::Gnu]);
        registry.register(Backend::Gnu);
        assert_eq!(registry.backends(), &[Backend::Gnu]);
    }
}
