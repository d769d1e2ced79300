//! Scope and key normalization for path-prefixed keyspaces
//!
//! Keys are `/`-separated regardless of platform. A scope names a subtree
//! of the keyspace; normalized it always reads `/…/` with single slashes
//! at both ends.

use std::path::Path;

/// Normalize a scope into a `/…/` prefix
///
/// Runs of leading and trailing slashes collapse to one; interior
/// separators are kept as given. The empty scope and `/` both normalize
/// to `/`.
pub fn normalize_scope(scope: &str) -> String {
    let trimmed = scope.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

/// Rewrite an absolute path under `root` into a prefixed key
///
/// Strips the root, converts backslash separators, trims leading slashes
/// and prepends the normalized scope prefix.
pub fn key_under_scope(prefix: &str, root: &Path, path: &Path) -> String {
    let full = path.to_string_lossy();
    let base = root.to_string_lossy();
    let rel = full.strip_prefix(base.as_ref()).unwrap_or(&full);
    let rel = rel.replace('\\', "/");
    let rel = rel.trim_start_matches('/');
    format!("{}{}", prefix, rel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize_scope() {
        assert_eq!(normalize_scope("/"), "/");
        assert_eq!(normalize_scope(""), "/");
        assert_eq!(normalize_scope("docs"), "/docs/");
        assert_eq!(normalize_scope("/docs"), "/docs/");
        assert_eq!(normalize_scope("//docs///"), "/docs/");
        assert_eq!(normalize_scope("/docs/sub/"), "/docs/sub/");
    }

    #[test]
    fn test_key_under_scope() {
        let root = PathBuf::from("/srv/data");
        let path = PathBuf::from("/srv/data/docs/a.txt");
        assert_eq!(key_under_scope("/", &root, &path), "/docs/a.txt");
        assert_eq!(
            key_under_scope("/docs/", &root, &PathBuf::from("/srv/data/a.txt")),
            "/docs/a.txt"
        );
    }

    #[test]
    fn test_key_under_scope_backslashes() {
        let root = PathBuf::from("C:/data");
        let path = PathBuf::from(r"C:/data\docs\a.txt");
        assert_eq!(key_under_scope("/", &root, &path), "/docs/a.txt");
    }

    #[test]
    fn test_key_outside_root_kept_whole() {
        let root = PathBuf::from("/srv/data");
        let path = PathBuf::from("/elsewhere/a.txt");
        assert_eq!(key_under_scope("/", &root, &path), "/elsewhere/a.txt");
    }
}
