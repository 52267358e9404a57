use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A resolvable byte-source location for a declared asset name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocation {
    pub path: PathBuf,
}

impl AssetLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| format!("reading asset {}", self.path.display()))
    }
}

/// Host capability mapping a user-typed asset name to a byte-source
/// location, or `None` if the name does not resolve. Shared read-only by
/// all viewport instances; owns no viewport state.
pub trait AssetResolver {
    fn resolve(&self, name: &str) -> Option<AssetLocation>;

    /// Companion lookup (wavefront material libraries). Defaults to plain
    /// resolution of the companion name.
    fn resolve_companion(&self, name: &str) -> Option<AssetLocation> {
        self.resolve(name)
    }
}

/// Resolver over a directory tree: the asset name is interpreted as a
/// path relative to the root, with a recursive basename search as the
/// fallback for vault-style short links.
pub struct FolderResolver {
    root: PathBuf,
}

impl FolderResolver {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn find_by_basename(&self, name: &str) -> Option<PathBuf> {
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir).ok()?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if path.file_name().is_some_and(|file| file == name) {
                    return Some(path);
                }
            }
        }
        None
    }
}

impl AssetResolver for FolderResolver {
    fn resolve(&self, name: &str) -> Option<AssetLocation> {
        let direct = self.root.join(name);
        if direct.is_file() {
            return Some(AssetLocation::new(direct));
        }
        self.find_by_basename(name).map(AssetLocation::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_resolver_finds_nested_assets() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nested = dir.path().join("meshes");
        fs::create_dir_all(&nested).expect("nested dir");
        fs::write(nested.join("part.stl"), b"solid part\nendsolid part\n").expect("asset write");

        let resolver = FolderResolver::new(dir.path());
        let hit = resolver.resolve("part.stl").expect("basename search should hit");
        assert!(hit.path.ends_with("meshes/part.stl"));
        assert!(resolver.resolve("missing.stl").is_none());
        assert!(!hit.read().expect("asset read").is_empty());
    }
}
