//! Wire name resolution for deployed files
//!
//! The receiving side stores a file under the name it is sent with, so the
//! name is always relative to the deployment root and uses `/` separators.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

use crate::{Error, Result};

/// Compute the wire-visible name of `file` relative to `root`.
///
/// Relative `file` paths are resolved against `root`. Both paths are
/// normalized lexically first, so `..` components cannot escape the root.
/// All leading `/` characters are stripped from the result.
///
/// # Errors
/// * [`Error::PathResolution`] if `file` does not lie below `root`
/// * [`Error::EmptyRelativePath`] if nothing is left after stripping
pub fn relative_name(root: &Utf8Path, file: &Utf8Path) -> Result<String> {
    let absolute = if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    };

    let root_norm = normalize_lexically(root);
    let file_norm = normalize_lexically(&absolute);

    let relative = file_norm
        .strip_prefix(&root_norm)
        .map_err(|_| Error::path_resolution(file.as_str(), root.as_str()))?;

    let joined = relative
        .components()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("/");

    let name = joined.trim_start_matches('/');
    if name.is_empty() {
        return Err(Error::empty_relative_path(file.as_str()));
    }

    Ok(name.to_string())
}

/// Fold `.` and `..` components without touching the filesystem
fn normalize_lexically(path: &Utf8Path) -> Utf8PathBuf {
    let mut parts: Vec<Utf8Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => match parts.last() {
                Some(Utf8Component::Normal(_)) => {
                    parts.pop();
                }
                // `/..` is `/`
                Some(Utf8Component::RootDir) | Some(Utf8Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            _ => parts.push(component),
        }
    }

    parts.iter().map(|c| c.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> &'static Utf8Path {
        Utf8Path::new("/work/project")
    }

    #[test]
    fn test_absolute_file_inside_root() {
        let name = relative_name(root(), Utf8Path::new("/work/project/src/main.rs")).unwrap();
        assert_eq!(name, "src/main.rs");
    }

    #[test]
    fn test_relative_file_is_resolved_against_root() {
        let name = relative_name(root(), Utf8Path::new("docs/./index.html")).unwrap();
        assert_eq!(name, "docs/index.html");
    }

    #[test]
    fn test_repeated_separators_are_stripped() {
        let name = relative_name(root(), Utf8Path::new("/work/project///a//b.txt")).unwrap();
        assert_eq!(name, "a/b.txt");
    }

    #[test]
    fn test_file_outside_root_fails() {
        for file in [
            "/etc/passwd",
            "/work/projectile/a.txt",
            "/work/project/../other/a.txt",
            "../escape.txt",
        ] {
            let err = relative_name(root(), Utf8Path::new(file)).unwrap_err();
            assert!(
                matches!(err, Error::PathResolution { .. }),
                "expected PathResolution for {file}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_root_itself_is_empty() {
        for file in ["/work/project", "/work/project/", "/work/project//", "/work/project/./"] {
            let err = relative_name(root(), Utf8Path::new(file)).unwrap_err();
            assert!(
                matches!(err, Error::EmptyRelativePath { .. }),
                "expected EmptyRelativePath for {file}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_parent_components_inside_root() {
        let name = relative_name(root(), Utf8Path::new("/work/project/a/../b/c.txt")).unwrap();
        assert_eq!(name, "b/c.txt");
    }

    #[test]
    fn test_name_never_starts_with_separator() {
        let name = relative_name(Utf8Path::new("/"), Utf8Path::new("//srv/file")).unwrap();
        assert_eq!(name, "srv/file");
        assert!(!name.starts_with('/'));
    }
}
