use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;

/// File-system operations the engine needs, including the convergent
/// write that makes the whole run idempotent.
pub trait FileSystem: Send + Sync {
    fn write_file(&self, path: &Path, contents: &[u8]) -> anyhow::Result<()>;

    fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>>;

    /// Write `contents` to `path` only if it differs from what is already
    /// there, reporting whether a write happened. A missing file always
    /// counts as different.
    fn converge_file_contents(&self, path: &Path, contents: &[u8]) -> anyhow::Result<bool>;

    /// Final target of `path` after following symlinks; a regular file
    /// resolves to itself.
    fn read_and_follow_link(&self, path: &Path) -> anyhow::Result<PathBuf>;

    fn copy_file(&self, from: &Path, to: &Path) -> anyhow::Result<()>;

    /// Point `link` at `target`, replacing any existing file or link.
    fn symlink(&self, target: &Path, link: &Path) -> anyhow::Result<()>;
}

/// `std::fs`-backed implementation used on real hosts.
pub struct HostFs;

impl HostFs {
    fn ensure_parent(path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        Ok(())
    }
}

impl FileSystem for HostFs {
    fn write_file(&self, path: &Path, contents: &[u8]) -> anyhow::Result<()> {
        Self::ensure_parent(path)?;
        std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
    }

    fn read_file(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))
    }

    fn converge_file_contents(&self, path: &Path, contents: &[u8]) -> anyhow::Result<bool> {
        match std::fs::read(path) {
            Ok(current) if current == contents => return Ok(false),
            Ok(_) => (),
            Err(error) if error.kind() == ErrorKind::NotFound => (),
            Err(error) => {
                return Err(error).with_context(|| format!("reading {}", path.display()))
            }
        }
        self.write_file(path, contents)?;
        Ok(true)
    }

    fn read_and_follow_link(&self, path: &Path) -> anyhow::Result<PathBuf> {
        std::fs::canonicalize(path).with_context(|| format!("resolving {}", path.display()))
    }

    fn copy_file(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
        Self::ensure_parent(to)?;
        std::fs::copy(from, to)
            .with_context(|| format!("copying {} to {}", from.display(), to.display()))?;
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> anyhow::Result<()> {
        Self::ensure_parent(link)?;
        // Remove a previous file or link so repeated convergence succeeds.
        match std::fs::symlink_metadata(link) {
            Ok(_) => std::fs::remove_file(link)
                .with_context(|| format!("removing {}", link.display()))?,
            Err(error) if error.kind() == ErrorKind::NotFound => (),
            Err(error) => {
                return Err(error).with_context(|| format!("inspecting {}", link.display()))
            }
        }
        std::os::unix::fs::symlink(target, link)
            .with_context(|| format!("linking {} to {}", link.display(), target.display()))
    }
}
