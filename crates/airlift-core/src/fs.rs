use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Accessor for the site content directory.
///
/// All item paths are relative to one base directory and are normalized
/// before use, so a transfer can never read or write outside it.
#[derive(Debug, Clone)]
pub struct ContentRoot {
    base: PathBuf,
}

impl ContentRoot {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolves a relative path against the base. An empty path resolves to
    /// the base itself.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        Ok(self.base.join(normalize_relative(rel)?))
    }

    /// The forward-slash relative path of an absolute path under the base.
    pub fn relative_of(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.base).ok()?;
        let parts: Vec<&str> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect();
        Some(parts.join("/"))
    }

    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.base)
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.resolve(rel).map(|p| p.exists()).unwrap_or(false)
    }

    pub fn is_dir(&self, rel: &str) -> bool {
        self.resolve(rel).map(|p| p.is_dir()).unwrap_or(false)
    }

    /// Immediate children of a directory as relative paths, sorted by name.
    pub fn children(&self, rel: &str) -> Result<Vec<String>> {
        let abs = self.resolve(rel)?;
        let mut names = Vec::new();

        for entry in fs::read_dir(&abs)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        let prefix = rel.trim_matches('/');
        Ok(names
            .into_iter()
            .map(|name| {
                if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                }
            })
            .collect())
    }

    pub fn read(&self, rel: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(rel)?)?)
    }

    /// Writes a file, creating any missing parent directories first.
    pub fn write_creating_parents(&self, rel: &str, bytes: &[u8]) -> Result<PathBuf> {
        let abs = self.resolve(rel)?;
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&abs, bytes)?;
        Ok(abs)
    }
}

fn normalize_relative(path: &str) -> Result<PathBuf> {
    let trimmed = path.trim_start_matches('/');

    let rel = Path::new(trimmed);
    for component in rel.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidPath(path.to_string()));
            }
            _ => {}
        }
    }

    Ok(rel.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_rejects_traversal() {
        let root = ContentRoot::new("/srv/site");

        let err = root.resolve("../outside").expect_err("traversal must fail");
        assert!(matches!(err, Error::InvalidPath(_)));
        assert!(root.resolve("a/../../b").is_err());
    }

    #[test]
    fn test_resolve_trims_leading_slash() {
        let root = ContentRoot::new("/srv/site");
        let path = root.resolve("/uploads/a.txt").unwrap();
        assert_eq!(path, PathBuf::from("/srv/site/uploads/a.txt"));
    }

    #[test]
    fn test_empty_path_is_the_base() {
        let root = ContentRoot::new("/srv/site");
        assert_eq!(root.resolve("").unwrap(), PathBuf::from("/srv/site"));
    }

    #[test]
    fn test_relative_of_round_trip() {
        let root = ContentRoot::new("/srv/site");
        let abs = root.resolve("uploads/2024/img.png").unwrap();
        assert_eq!(root.relative_of(&abs).unwrap(), "uploads/2024/img.png");
        assert!(root.relative_of(Path::new("/etc/passwd")).is_none());
    }

    #[test]
    fn test_children_sorted_with_prefix() {
        let dir = tempdir().unwrap();
        let root = ContentRoot::new(dir.path());
        root.write_creating_parents("sub/b.txt", b"b").unwrap();
        root.write_creating_parents("sub/a.txt", b"a").unwrap();
        fs::create_dir_all(dir.path().join("sub/nested")).unwrap();

        let children = root.children("sub").unwrap();
        assert_eq!(children, vec!["sub/a.txt", "sub/b.txt", "sub/nested"]);
    }

    #[test]
    fn test_write_creates_parents() {
        let dir = tempdir().unwrap();
        let root = ContentRoot::new(dir.path());

        let abs = root
            .write_creating_parents("deep/tree/file.txt", b"hello")
            .unwrap();
        assert_eq!(fs::read(abs).unwrap(), b"hello");
        assert_eq!(root.read("deep/tree/file.txt").unwrap(), b"hello");
    }
}
