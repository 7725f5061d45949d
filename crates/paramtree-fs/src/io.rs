//! Reading config files and replacing them in one step

use crate::{Error, NormalizedPath, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replaces the file at `path` with `content`.
///
/// Readers see either the old file or the new one. Missing directories
/// are created first.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    let target = path.to_native();
    if let Some(dir) = target.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }

    let staged = Staged::beside(&target);
    staged.fill(content)?;
    staged.commit(&target)?;

    tracing::debug!(path = %path, bytes = content.len(), "replaced file");
    Ok(())
}

pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native = path.to_native();
    fs::read_to_string(&native).map_err(|e| Error::io(native, e))
}

/// Hidden sibling of the target that becomes the target on commit.
///
/// Removed on drop unless the commit went through.
struct Staged {
    path: PathBuf,
    committed: bool,
}

impl Staged {
    fn beside(target: &Path) -> Self {
        let name = target
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        Self {
            path: target.with_file_name(format!(".{name}.{}.tmp", std::process::id())),
            committed: false,
        }
    }

    fn fill(&self, content: &[u8]) -> Result<()> {
        let mut file = File::create(&self.path).map_err(|e| Error::io(&self.path, e))?;
        FileExt::lock_exclusive(&file).map_err(|_| Error::Locked {
            path: self.path.clone(),
        })?;
        file.write_all(content)
            .and_then(|()| file.sync_all())
            .map_err(|e| Error::io(&self.path, e))?;
        FileExt::unlock(&file).map_err(|e| Error::io(&self.path, e))
    }

    fn commit(mut self, target: &Path) -> Result<()> {
        fs::rename(&self.path, target).map_err(|e| Error::io(target, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        if !self.committed && fs::remove_file(&self.path).is_ok() {
            tracing::debug!(path = %self.path.display(), "discarded staged file");
        }
    }
}
