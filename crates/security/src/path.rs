//! Path containment — filesystem sandboxing to the workspace directory.
//!
//! Every path a workspace tool touches must resolve inside the workspace
//! root. Resolution is symlink-aware: the candidate (or its nearest existing
//! ancestor) is canonicalized before the prefix check, so a symlink pointing
//! out of the workspace is caught even when the raw path looks contained.

use std::path::{Component, Path, PathBuf};

/// Error returned when path containment fails.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("Path '{path}' escapes the workspace")]
    WorkspaceEscape { path: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Failed to resolve path '{path}': {reason}")]
    ResolveFailed { path: String, reason: String },
}

/// Resolve `path` (absolute or workspace-relative) and verify it lies inside
/// `root`. Returns the resolved absolute path on success.
///
/// Checks, in order:
/// 1. Raw `..` components are rejected outright
/// 2. The candidate is joined onto the root and lexically normalized
/// 3. The candidate (or, for paths that don't exist yet, its nearest
///    existing ancestor) is canonicalized to resolve symlinks
/// 4. The canonical result must start with the canonical root
pub fn resolve_within(root: &Path, path: &str) -> Result<PathBuf, SecurityError> {
    let requested = Path::new(path);
    if requested
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(SecurityError::PathTraversal { path: path.into() });
    }

    let canonical_root = root
        .canonicalize()
        .map_err(|e| SecurityError::ResolveFailed {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;

    let candidate = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        canonical_root.join(requested)
    };

    let resolved = canonicalize_allowing_new(&candidate, path)?;

    if !resolved.starts_with(&canonical_root) {
        return Err(SecurityError::WorkspaceEscape { path: path.into() });
    }
    Ok(resolved)
}

/// Resolve a sub-workspace directory for delegation: `sub` is a relative
/// path under `root`; the result must stay inside `root`.
pub fn resolve_sub_workspace(root: &Path, sub: &str) -> Result<PathBuf, SecurityError> {
    if Path::new(sub).is_absolute() {
        return Err(SecurityError::WorkspaceEscape { path: sub.into() });
    }
    resolve_within(root, sub)
}

/// Canonicalize a path that may not exist yet. For missing files the nearest
/// existing ancestor is canonicalized and the remaining components appended.
fn canonicalize_allowing_new(candidate: &Path, original: &str) -> Result<PathBuf, SecurityError> {
    if candidate.exists() {
        return candidate
            .canonicalize()
            .map_err(|e| SecurityError::ResolveFailed {
                path: original.into(),
                reason: e.to_string(),
            });
    }

    let mut existing = candidate.to_path_buf();
    let mut remainder = Vec::new();
    while !existing.exists() {
        match existing.file_name() {
            Some(name) => {
                remainder.push(name.to_os_string());
                existing.pop();
            }
            None => {
                return Err(SecurityError::ResolveFailed {
                    path: original.into(),
                    reason: "no existing ancestor".into(),
                });
            }
        }
    }

    let mut resolved = existing
        .canonicalize()
        .map_err(|e| SecurityError::ResolveFailed {
            path: original.into(),
            reason: e.to_string(),
        })?;
    for part in remainder.iter().rev() {
        resolved.push(part);
    }
    Ok(resolved)
}
