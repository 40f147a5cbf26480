//! Skill id validation and confinement of skill paths to their install root.

use std::path::{Component, Path, PathBuf};

use crate::{
    error::{Error, Result},
    render::SKILL_FILE,
};

/// `^[a-z0-9]([a-z0-9-]*[a-z0-9])?$`
pub fn is_safe_id(id: &str) -> bool {
    let bytes = id.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    alnum(first) && alnum(last) && bytes.iter().all(|b| alnum(b) || *b == b'-')
}

/// Fails with [`Error::UnsafeId`] unless [`is_safe_id`] accepts `id`.
pub fn ensure_safe_id(id: &str) -> Result<()> {
    if is_safe_id(id) {
        Ok(())
    } else {
        Err(Error::UnsafeId { id: id.to_string() })
    }
}

/// Resolve `id` under the absolute form of `root`.
///
/// The result must sit strictly below `root`; anything else is an error, the
/// path is never clamped back into bounds.
pub fn resolve_child_path(root: &Path, id: &str) -> Result<PathBuf> {
    let root = normalize(&std::path::absolute(root)?);
    let candidate = normalize(&root.join(id));
    if candidate != root && candidate.starts_with(&root) {
        Ok(candidate)
    } else {
        Err(Error::PathEscape {
            root,
            id: id.to_string(),
        })
    }
}

/// `<root>/<id>/SKILL.md`, after both the id and the confinement checks.
pub fn skill_file_path(root: &Path, id: &str) -> Result<PathBuf> {
    ensure_safe_id(id)?;
    Ok(resolve_child_path(root, id)?.join(SKILL_FILE))
}

/// Lexically fold `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                out.pop();
            },
            Component::Normal(_) | Component::RootDir | Component::Prefix(_) => {
                out.push(component.as_os_str());
            },
        }
    }
    out
}
