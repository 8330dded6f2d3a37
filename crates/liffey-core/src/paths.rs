//! Path helpers shared by the resolver and the rule matcher.

use std::path::{Component, Path, PathBuf};

/// Fold `.` and `..` components without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize a path that is known to exist, without UNC prefixes on
/// Windows. Falls back to the input when canonicalization fails.
pub(crate) fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Append an extension string, dot included, to a path.
pub(crate) fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut joined = path.as_os_str().to_owned();
    joined.push(ext);
    PathBuf::from(joined)
}
