//! Utility functions shared across the crate.

use std::path::{Component, Path, PathBuf};

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Join `relative` onto `base` and normalize the result lexically.
///
/// `.` components are dropped and `..` removes the previous component, without
/// touching the filesystem. An absolute `relative` replaces `base`.
pub fn resolve_path(base: &Path, relative: &str) -> PathBuf {
    normalize(&base.join(relative))
}

/// Lexical path normalization (no symlink resolution).
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Path of the editable table of contents mirror written next to `output`.
pub fn toc_document_path(output: &Path, extension: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("report");
    output.with_file_name(format!("{stem}_toc.{extension}"))
}
