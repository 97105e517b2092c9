//! Path anchors and lexical path arithmetic.
//!
//! Paths in the model are stored relative to an [`Anchor`]. When an output
//! file is written, its [`PathAnchors`] say where that file lives and where
//! each anchor points, so the same path value can be rendered relative to a
//! makefile next to the sources or a project file somewhere else.

use super::{Anchor, FormatError, PathExpr};
use crate::ast::Position;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Locations used to render path values for one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAnchors {
    /// Separator placed between rendered path components.
    pub dirsep: char,
    /// Directory containing the output file.
    pub outdir: Utf8PathBuf,
    /// Directory [`Anchor::TopSrcDir`] paths are relative to.
    pub top_srcdir: Utf8PathBuf,
    /// Directory [`Anchor::BuildDir`] paths are relative to, if any.
    pub builddir: Option<Utf8PathBuf>,
}

impl PathAnchors {
    /// Anchors for an output file in `outdir` of a project rooted at
    /// `top_srcdir`.
    #[must_use]
    pub fn new(
        dirsep: char,
        outdir: impl Into<Utf8PathBuf>,
        top_srcdir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            dirsep,
            outdir: outdir.into(),
            top_srcdir: top_srcdir.into(),
            builddir: None,
        }
    }

    /// Set the build directory used for [`Anchor::BuildDir`] paths.
    #[must_use]
    pub fn with_builddir(mut self, builddir: impl Into<Utf8PathBuf>) -> Self {
        self.builddir = Some(builddir.into());
        self
    }

    fn anchor_dir(&self, anchor: Anchor, pos: &Position) -> Result<Option<&Utf8Path>, FormatError> {
        match anchor {
            Anchor::TopSrcDir => Ok(Some(self.top_srcdir.as_path())),
            Anchor::BuildDir => self
                .builddir
                .as_deref()
                .map(Some)
                .ok_or_else(|| FormatError::MissingBuildDir { pos: pos.clone() }),
            Anchor::Unanchored => Ok(None),
        }
    }

    /// Components leading from the output directory to `anchor`, or `None`
    /// for unanchored paths.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Relativize`] when the anchor cannot be reached
    /// from the output directory by a relative path, and
    /// [`FormatError::MissingBuildDir`] for [`Anchor::BuildDir`] without a
    /// configured build directory.
    pub fn prefix_components(
        &self,
        anchor: Anchor,
        pos: &Position,
    ) -> Result<Option<Vec<String>>, FormatError> {
        let Some(dir) = self.anchor_dir(anchor, pos)? else {
            return Ok(None);
        };
        let relative =
            relative_path(dir, &self.outdir).ok_or_else(|| FormatError::Relativize {
                path: dir.to_owned(),
                base: self.outdir.clone(),
                pos: pos.clone(),
            })?;
        Ok(Some(
            relative
                .components()
                .map(|c| c.as_str().to_owned())
                .collect(),
        ))
    }

    /// Native location of `path`, joined onto its anchor directory.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::NonLiteralPath`] when a component is not plain
    /// text and [`FormatError::MissingBuildDir`] for build directory paths
    /// without a build directory.
    pub fn native_path(&self, path: &PathExpr) -> Result<Utf8PathBuf, FormatError> {
        let pos = path.position().cloned().unwrap_or_default();
        let mut native = self
            .anchor_dir(path.anchor, &pos)?
            .map(Utf8Path::to_path_buf)
            .unwrap_or_default();
        let parts = path
            .components
            .iter()
            .map(|component| {
                component
                    .literal_text()
                    .ok_or_else(|| FormatError::NonLiteralPath { pos: pos.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        native.push(parts.join("/"));
        Ok(normalize_path(&native).unwrap_or(native))
    }
}

/// Lexically normalise `path`, dropping `.` and folding `..` into the
/// preceding component.
///
/// Returns `None` when an absolute path climbs above its root. Leading `..`
/// components of a relative path are kept.
#[must_use]
pub fn normalize_path(path: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut out: Vec<Utf8Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => match out.last() {
                Some(Utf8Component::Normal(_)) => {
                    out.pop();
                }
                Some(Utf8Component::RootDir | Utf8Component::Prefix(_)) => return None,
                Some(Utf8Component::ParentDir | Utf8Component::CurDir) | None => {
                    out.push(component);
                }
            },
            other => out.push(other),
        }
    }
    Some(out.iter().map(|c| c.as_str()).collect())
}

fn root_of(path: &Utf8Path) -> Vec<Utf8Component<'_>> {
    path.components()
        .take_while(|c| matches!(c, Utf8Component::Prefix(_) | Utf8Component::RootDir))
        .collect()
}

/// Relative path leading from directory `base` to `target`.
///
/// Both paths are normalised first. The result is empty when they are the
/// same directory. Returns `None` when no relative path exists: the paths
/// have different roots, or `base` climbs out through `..` further than
/// `target` does, so the directory names in between are unknown.
///
/// # Examples
///
/// ```
/// use bakery::expr::relative_path;
/// use camino::Utf8Path;
///
/// let rel = relative_path(Utf8Path::new("/src/app"), Utf8Path::new("/src/build"));
/// assert_eq!(rel.as_deref().map(|p| p.as_str()), Some("../app"));
/// ```
#[must_use]
pub fn relative_path(target: &Utf8Path, base: &Utf8Path) -> Option<Utf8PathBuf> {
    let target = normalize_path(target)?;
    let base = normalize_path(base)?;
    if root_of(&target) != root_of(&base) {
        return None;
    }
    let mut target_rest = target.components().peekable();
    let mut base_rest = base.components().peekable();
    while let (Some(t), Some(b)) = (target_rest.peek(), base_rest.peek()) {
        if t != b {
            break;
        }
        target_rest.next();
        base_rest.next();
    }
    let mut out = Utf8PathBuf::new();
    for component in base_rest {
        if !matches!(component, Utf8Component::Normal(_)) {
            return None;
        }
        out.push("..");
    }
    for component in target_rest {
        out.push(component.as_str());
    }
    Some(out)
}
