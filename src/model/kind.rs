//! Target kinds and the properties each declares.

use crate::props::{Property, PropertyType};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Kind of a target, selecting its properties and its build graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Executable program.
    Exe,
    /// Static library.
    Library,
    /// Named sequence of shell commands.
    Action,
}

impl TargetKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 3] = [Self::Exe, Self::Library, Self::Action];

    /// Name used in project files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Exe => "exe",
            Self::Library => "library",
            Self::Action => "action",
        }
    }

    /// Whether targets of this kind compile sources.
    #[must_use]
    pub const fn compiles_sources(self) -> bool {
        matches!(self, Self::Exe | Self::Library)
    }

    /// Properties declared by this kind.
    #[must_use]
    pub fn properties(self) -> Vec<Property> {
        match self {
            Self::Exe | Self::Library => vec![
                Property::new(
                    "sources",
                    PropertyType::list_of(PropertyType::Path),
                    "Source files compiled into the target.",
                ),
                Property::new(
                    "headers",
                    PropertyType::list_of(PropertyType::Path),
                    "Header files belonging to the target.",
                ),
                Property::new(
                    "defines",
                    PropertyType::list_of(PropertyType::String),
                    "Preprocessor macros defined when compiling.",
                ),
                Property::new(
                    "includedirs",
                    PropertyType::list_of(PropertyType::Path),
                    "Directories searched for included headers.",
                ),
            ],
            Self::Action => vec![Property::new(
                "commands",
                PropertyType::list_of(PropertyType::String),
                "Shell commands run in order.",
            )],
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown target type `{s}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("exe", Some(TargetKind::Exe))]
    #[case("library", Some(TargetKind::Library))]
    #[case("action", Some(TargetKind::Action))]
    #[case("dll", None)]
    fn parses_kind_names(#[case] name: &str, #[case] expected: Option<TargetKind>) {
        assert_eq!(name.parse::<TargetKind>().ok(), expected);
    }

    #[rstest]
    fn actions_do_not_declare_sources() {
        let names: Vec<_> = TargetKind::Action
            .properties()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["commands"]);
    }
}
