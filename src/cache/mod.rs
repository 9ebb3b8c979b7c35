//! Content-addressed filesystem cache (C4).
//!
//! Flat store under `<root>/<kind>/<hash[0:2]>/<hash>`, full lowercase-hex
//! SHA-256 so the cache can span every asset kind across every library
//! with a namespace wide enough to bound collision risk. Writes go
//! through a temp-then-rename pattern, the same as the per-variant
//! image store this generalizes.

use std::path::{Path, PathBuf};

use mediarch_common::Result;
use sha2::{Digest, Sha256};

/// Which cache subdirectory (and DB table) a blob belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Image,
    Video,
    Audio,
    Text,
}

impl CacheKind {
    pub(crate) fn dirname(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
        }
    }
}

/// Filesystem-backed content-addressed store rooted at a configured directory.
#[derive(Clone)]
pub struct ContentCache {
    root: PathBuf,
}

impl ContentCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The cache's root directory, for callers that need to walk it directly.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full SHA-256 hex digest of `bytes`.
    pub fn hash_of(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// Path a blob of the given hash would live at, whether or not it exists.
    pub fn path_for(&self, kind: CacheKind, hash: &str) -> PathBuf {
        let prefix = &hash[..hash.len().min(2)];
        self.root.join(kind.dirname()).join(prefix).join(hash)
    }

    /// Write `bytes` into the cache if not already present. Returns the
    /// content hash and final path. Idempotent: if the hash already exists
    /// on disk, the existing file is left untouched and no write occurs.
    pub fn put(&self, kind: CacheKind, bytes: &[u8]) -> Result<(String, PathBuf)> {
        let hash = Self::hash_of(bytes);
        let final_path = self.path_for(kind, &hash);

        if final_path.exists() {
            return Ok((hash, final_path));
        }

        let dir = final_path.parent().expect("path_for always has a parent");
        std::fs::create_dir_all(dir)?;

        let tmp_path = dir.join(format!("{hash}.tmp.{}", std::process::id()));
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, &final_path)?;

        Ok((hash, final_path))
    }

    /// Look up a blob's path by hash, if present on disk.
    pub fn get(&self, kind: CacheKind, hash: &str) -> Option<PathBuf> {
        let path = self.path_for(kind, hash);
        path.exists().then_some(path)
    }

    /// Remove a blob from disk. Caller must have already confirmed no live
    /// reference remains (the database inventory is the source of truth).
    pub fn delete(&self, kind: CacheKind, hash: &str) -> Result<()> {
        let path = self.path_for(kind, hash);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// True if `path` lies within `root`, after canonicalizing both — used by
/// the publisher to double-check a cache path before copying it out.
pub fn is_within(root: &Path, path: &Path) -> bool {
    match (root.canonicalize(), path.canonicalize()) {
        (Ok(root), Ok(path)) => path.starts_with(root),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_64_hex_chars() {
        let hash = ContentCache::hash_of(b"hello world");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().to_path_buf());

        let (hash1, path1) = cache.put(CacheKind::Image, b"poster bytes").unwrap();
        let (hash2, path2) = cache.put(CacheKind::Image, b"poster bytes").unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(path1, path2);
        assert!(path1.exists());
    }

    #[test]
    fn different_bytes_land_at_different_paths() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().to_path_buf());

        let (_, path1) = cache.put(CacheKind::Image, b"a").unwrap();
        let (_, path2) = cache.put(CacheKind::Image, b"b").unwrap();
        assert_ne!(path1, path2);
    }

    #[test]
    fn get_returns_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().to_path_buf());
        assert!(cache.get(CacheKind::Image, "deadbeef").is_none());
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().to_path_buf());

        let (hash, path) = cache.put(CacheKind::Text, b"<nfo/>").unwrap();
        assert!(path.exists());

        cache.delete(CacheKind::Text, &hash).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn path_uses_two_char_prefix_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().to_path_buf());
        let path = cache.path_for(CacheKind::Image, "abcdef0123456789");
        assert_eq!(path.parent().unwrap().file_name().unwrap(), "ab");
    }

    #[test]
    fn is_within_rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let file = outside.path().join("evil");
        std::fs::write(&file, b"x").unwrap();
        assert!(!is_within(dir.path(), &file));
    }
}
