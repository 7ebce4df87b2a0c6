//! Atomic installation of a built artifact.
//!
//! The canonical binary name may be the file the running instance was
//! launched from, so the new content is never written into it in place.
//! Instead the artifact is streamed to a uniquely named temp file in the
//! deployment directory (same filesystem), made executable, synced, and then
//! renamed over the canonical name. A reader racing the install sees either
//! the entirely old or the entirely new file, never a truncated one.
//!
//! An advisory lock on a sidecar file serializes installs across processes;
//! within one process the deploy queue already serializes runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Sidecar lock file name inside the deployment directory
const LOCK_FILE: &str = ".molt.lock";

/// Install `artifact` into `deploy_dir` under `binary_name`.
///
/// Returns the installed path. On any failure the previous binary, if one
/// existed, is untouched and still executable.
pub async fn install(artifact: &Path, deploy_dir: &Path, binary_name: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(deploy_dir)
        .await
        .with_context(|| format!("Failed to create deploy dir: {}", deploy_dir.display()))?;

    let _lock = DeployLock::acquire(deploy_dir).await?;

    let installed_path = deploy_dir.join(binary_name);
    let staging_path = deploy_dir.join(format!(".{}.{}.tmp", binary_name, Uuid::new_v4().simple()));

    let result = stage_and_rename(artifact, &staging_path, &installed_path).await;
    if result.is_err() {
        // best effort: don't leave staging litter next to the binary
        let _ = tokio::fs::remove_file(&staging_path).await;
    }

    result.map(|_| installed_path)
}

/// Copy to the staging name, fix permissions, then rename into place
async fn stage_and_rename(artifact: &Path, staging: &Path, installed: &Path) -> Result<()> {
    let mut src = tokio::fs::File::open(artifact)
        .await
        .context("could not open built binary")?;

    let mut dst = tokio::fs::File::create(staging)
        .await
        .context("could not create destination binary")?;

    tokio::io::copy(&mut src, &mut dst)
        .await
        .context("could not copy binary to destination")?;

    dst.flush().await.context("could not flush destination binary")?;
    // contents must be durable before the rename makes them visible
    dst.sync_all()
        .await
        .context("could not sync destination binary")?;
    drop(dst);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(staging, std::fs::Permissions::from_mode(0o555))
            .await
            .context("could not make new binary executable")?;
    }

    tokio::fs::rename(staging, installed)
        .await
        .context("could not move new binary into place")?;

    Ok(())
}

/// Exclusive advisory lock over the deployment directory
struct DeployLock {
    file: std::fs::File,
}

impl DeployLock {
    async fn acquire(deploy_dir: &Path) -> Result<Self> {
        let lock_path = deploy_dir.join(LOCK_FILE);

        // lock_exclusive blocks, so take it off the async runtime
        let file = tokio::task::spawn_blocking(move || -> Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .open(&lock_path)
                .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
            file.lock_exclusive().context("Failed to lock deploy dir")?;
            Ok(file)
        })
        .await
        .context("lock acquisition task failed")??;

        Ok(Self { file })
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
