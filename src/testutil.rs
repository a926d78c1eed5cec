//! Scratch directory trees for unit tests.

use std::fs;
use std::path::{Path, PathBuf};

/// A uniquely named directory under the system temp dir, removed on drop.
pub struct TempTree {
    root: PathBuf,
}

impl TempTree {
    pub fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("imsm-platform-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        // Canonical root so canonicalized paths compare equal in assertions.
        let root = fs::canonicalize(&dir).unwrap();
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn write(&self, rel: &str, contents: &[u8]) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    /// Create `link` pointing at the absolute path of `target`.
    pub fn symlink(&self, target: &str, link: &str) -> PathBuf {
        let link_path = self.path(link);
        if let Some(parent) = link_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        std::os::unix::fs::symlink(self.path(target), &link_path).unwrap();
        link_path
    }
}

impl Drop for TempTree {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}
