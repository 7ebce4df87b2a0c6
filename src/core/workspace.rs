//! Disposable work areas for source checkouts.
//!
//! Each trigger gets a fresh, uniquely named directory under the configured
//! work root; the name embeds the revision so concurrent runs cannot collide
//! and stray directories are attributable. A work area is never reused, and
//! it is removed on every pipeline outcome: explicitly via [`WorkArea::cleanup`]
//! on the normal paths, and by the owned `TempDir` drop if a panic or early
//! return skips the explicit call.

use std::path::Path;

use anyhow::{Context, Result};
use tempfile::TempDir;

/// How many characters of the revision end up in the directory name
const REVISION_PREFIX_LEN: usize = 12;

/// An exclusively owned checkout directory for one pipeline run
#[derive(Debug)]
pub struct WorkArea {
    dir: TempDir,
}

impl WorkArea {
    /// Create a fresh work area under `work_root` for the given revision
    pub async fn create(work_root: &Path, revision: &str) -> Result<Self> {
        tokio::fs::create_dir_all(work_root)
            .await
            .with_context(|| format!("Failed to create work root: {}", work_root.display()))?;

        let short = &revision[..revision.len().min(REVISION_PREFIX_LEN)];
        let dir = tempfile::Builder::new()
            .prefix(&format!("molt-{}-", short))
            .tempdir_in(work_root)
            .with_context(|| format!("Failed to create work area in {}", work_root.display()))?;

        Ok(Self { dir })
    }

    /// Path of the checkout directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the work area, reporting any I/O failure.
    ///
    /// Dropping a `WorkArea` also removes it, silently; the explicit call is
    /// for the orchestrator's normal paths where a failed removal should at
    /// least be logged.
    pub fn cleanup(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .with_context(|| format!("Failed to remove work area: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_work_areas_are_uniquely_named() {
        let root = TempDir::new().unwrap();
        let rev = "a1b2c3d4e5f60718293a4b5c6d7e8f9011223344";

        let a = WorkArea::create(root.path(), rev).await.unwrap();
        let b = WorkArea::create(root.path(), rev).await.unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.path().exists());
        assert!(b.path().exists());
    }

    #[tokio::test]
    async fn test_name_embeds_revision() {
        let root = TempDir::new().unwrap();
        let area = WorkArea::create(root.path(), "deadbeef00112233").await.unwrap();

        let name = area.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("molt-deadbeef0011-"), "got {}", name);
    }

    #[tokio::test]
    async fn test_short_revision_is_not_truncated_past_end() {
        let root = TempDir::new().unwrap();
        let area = WorkArea::create(root.path(), "ab12").await.unwrap();

        let name = area.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("molt-ab12-"));
    }

    #[tokio::test]
    async fn test_cleanup_removes_directory() {
        let root = TempDir::new().unwrap();
        let area = WorkArea::create(root.path(), "cafebabe").await.unwrap();
        let path = area.path().to_path_buf();

        tokio::fs::write(path.join("file.txt"), b"contents").await.unwrap();
        area.cleanup().unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = TempDir::new().unwrap();
        let path = {
            let area = WorkArea::create(root.path(), "cafebabe").await.unwrap();
            area.path().to_path_buf()
        };

        assert!(!path.exists());
    }
}
