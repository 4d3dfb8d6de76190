//! Path guard: resolves model-supplied paths inside the sandbox root

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// A path resolved outside the sandbox, or one whose containment could not be proven.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("path `{attempted_path}` escapes the sandbox")]
pub struct EscapeError {
    /// The path exactly as the caller supplied it
    pub attempted_path: String,
}

impl EscapeError {
    fn new(attempted_path: &str) -> Self {
        Self {
            attempted_path: attempted_path.to_string(),
        }
    }
}

/// Why a path could not be resolved.
///
/// Only [`ResolveError::Escape`] means the path points outside the root.
/// A lexically contained path that merely cannot be walked (a regular file
/// used as a directory, a permission error) is [`ResolveError::Io`].
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Escape(#[from] EscapeError),

    #[error("cannot resolve `{attempted_path}`: {source}")]
    Io {
        attempted_path: String,
        source: io::Error,
    },
}

impl ResolveError {
    pub fn is_escape(&self) -> bool {
        matches!(self, ResolveError::Escape(_))
    }
}

/// The single directory outside of which no tool may act.
///
/// Cloning is cheap; all clones share the same canonical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot {
    path: Arc<PathBuf>,
}

impl SandboxRoot {
    /// Canonicalize `dir` and use it as the sandbox root.
    ///
    /// Fails if the directory does not exist or is not a directory.
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let canonical = dir.as_ref().canonicalize()?;
        if !canonical.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("sandbox root {} is not a directory", canonical.display()),
            ));
        }
        Ok(Self {
            path: Arc::new(canonical),
        })
    }

    /// The canonical absolute root path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve `relative` against the root.
    ///
    /// `relative` may contain `..`, be absolute, or traverse symlinks. The
    /// returned path is absolute, has every existing component resolved,
    /// and is guaranteed to lie under the root. An empty path resolves to
    /// the root itself.
    ///
    /// Dangling symlinks and symlink loops count as escapes, since their
    /// target cannot be checked.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ResolveError> {
        if relative.is_empty() {
            return Ok(self.path.to_path_buf());
        }

        // Path::join replaces the base when `relative` is absolute, which the
        // containment check below then rejects unless it points inside.
        let joined = normalize_lexically(&self.path.join(relative));
        if !is_within(&self.path, &joined) {
            return Err(EscapeError::new(relative).into());
        }

        let resolved = resolve_existing_prefix(&joined).map_err(|e| match e.kind() {
            io::ErrorKind::NotADirectory | io::ErrorKind::PermissionDenied => ResolveError::Io {
                attempted_path: relative.to_string(),
                source: e,
            },
            _ => EscapeError::new(relative).into(),
        })?;
        if !is_within(&self.path, &resolved) {
            return Err(EscapeError::new(relative).into());
        }
        Ok(resolved)
    }

    /// Express an already-resolved path relative to the root.
    pub fn relative_to_root<'a>(&self, resolved: &'a Path) -> Option<&'a Path> {
        resolved.strip_prefix(self.path.as_path()).ok()
    }
}

/// Component-wise containment: `/work/a` is within `/work`, `/work-evil/a` is not.
pub fn is_within(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}

/// Collapse `.` and `..` without touching the filesystem.
///
/// `..` at the filesystem root stays at the root.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Canonicalize the longest existing ancestor of `path` and re-append the rest.
///
/// The trailing components do not exist yet (e.g. a file about to be
/// written), so there is nothing to follow. A trailing component that exists
/// only as a dangling symlink is refused: writing through it would land
/// wherever the link points.
fn resolve_existing_prefix(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut missing = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut canonical) => {
                for part in missing.iter().rev() {
                    canonical.push(part);
                }
                return Ok(canonical);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if existing.symlink_metadata().is_ok() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "dangling symlink in path",
                    ));
                }
                let Some(name) = existing.file_name().map(|n| n.to_os_string()) else {
                    return Err(e);
                };
                missing.push(name);
                if !existing.pop() {
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
    }
}
