//! Write-to-temp-then-rename file replacement.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::StoreError;

/// `<path><suffix>`, keeping the original extension.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// First of `<path><suffix>`, `<path><suffix>.1`, `<path><suffix>.2`, ... that does not exist.
pub(crate) fn unused_sibling(path: &Path, suffix: &str) -> PathBuf {
    let first = sibling(path, suffix);
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| sibling(path, &format!("{suffix}.{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// Rejects relative paths.
pub(crate) fn require_absolute(path: &Path) -> Result<(), StoreError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(StoreError::InvalidPath {
            path: path.to_path_buf(),
        })
    }
}

/// Removes the temp file on drop unless the rename went through.
struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp file");
                }
            }
        }
    }
}

/// Replaces `path` with `contents` via `<path>.tmp` and a rename.
///
/// On any failure the temp file is removed and `path` is left untouched.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let tmp_path = sibling(path, ".tmp");
    let mut guard = TempGuard {
        path: tmp_path.clone(),
        armed: true,
    };

    {
        let mut file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        file.sync_all().map_err(|e| StoreError::io(&tmp_path, e))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))?;
    guard.armed = false;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

/// Like [`write_atomic`], creating missing parent directories first.
pub(crate) fn write_atomic_creating_dirs(path: &Path, contents: &str) -> Result<(), StoreError> {
    require_absolute(path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    write_atomic(path, contents)
}
