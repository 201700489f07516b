/// Ephemeral execution workspace
///
/// Every execution gets its own temp directory holding a copy of the kata's
/// assets plus the staged `entry.<ext>`. The kata directory is never written
/// to, so concurrent runs against one kata cannot see each other's code.
/// The directory is removed when the `Workspace` is dropped, on every path.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Directories that are never copied. `node_modules` is linked instead on unix.
const SKIPPED_DIRS: &[&str] = &[".git", "dist", "__pycache__", "node_modules"];

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Copy `kata_dir` into a fresh temp directory and write `user_code` as `entry_file`.
    pub async fn stage(kata_dir: &Path, entry_file: &str, user_code: &str) -> Result<Self> {
        let kata_dir = kata_dir.to_path_buf();
        let entry_file = entry_file.to_string();
        let user_code = user_code.to_string();

        tokio::task::spawn_blocking(move || Self::stage_blocking(&kata_dir, &entry_file, &user_code))
            .await
            .context("Workspace staging task failed")?
    }

    /// Empty workspace holding a single file. Used for syntax checks.
    pub async fn scratch(file_name: &str, contents: &str) -> Result<Self> {
        let dir = new_temp_dir()?;
        let path = dir.path().join(file_name);
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(Self { dir })
    }

    fn stage_blocking(kata_dir: &Path, entry_file: &str, user_code: &str) -> Result<Self> {
        let dir = new_temp_dir()?;
        copy_dir(kata_dir, dir.path())
            .with_context(|| format!("Failed to copy kata assets from {}", kata_dir.display()))?;

        let entry_path = dir.path().join(entry_file);
        fs::write(&entry_path, user_code)
            .with_context(|| format!("Failed to write {}", entry_path.display()))?;

        debug!(
            kata_dir = %kata_dir.display(),
            workspace = %dir.path().display(),
            "Staged submission"
        );
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Path as a string for environment variables like `PYTHONPATH`
    pub fn path_string(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }
}

fn new_temp_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("kata-run-")
        .tempdir()
        .context("Failed to create temporary workspace")
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        let source = entry.path();
        let target = to.join(&name);
        let mut file_type = entry.file_type()?;

        if file_type.is_symlink() {
            let resolved = match fs::metadata(&source) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %source.display(), error = %e, "Skipping dangling symlink");
                    continue;
                }
            };
            // Linked directories are re-linked to their real path, never walked
            if resolved.is_dir() {
                if name == "node_modules" || !SKIPPED_DIRS.iter().any(|skip| name == *skip) {
                    link_dir(&fs::canonicalize(&source)?, &target)?;
                }
                continue;
            }
            file_type = resolved.file_type();
        }

        if file_type.is_dir() {
            if name == "node_modules" {
                link_dir(&source, &target)?;
                continue;
            }
            if SKIPPED_DIRS.iter().any(|skip| name == *skip) {
                continue;
            }
            fs::create_dir_all(&target)?;
            copy_dir(&source, &target)?;
        } else if file_type.is_file() {
            fs::copy(&source, &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn link_dir(source: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(source, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn link_dir(_source: &Path, _target: &Path) -> Result<()> {
    Ok(())
}
