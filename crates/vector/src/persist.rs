use soundalike_common::{Result, SoundalikeError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `bytes` to a temporary file next to `path`.
///
/// Nothing is visible at `path` until the returned file is persisted, so an
/// abandoned write leaves the previous contents untouched.
pub(crate) fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(dir).map_err(|e| {
        SoundalikeError::file_system(format!("Failed to create {}: {}", dir.display(), e))
    })?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Rename a staged file into place
pub(crate) fn commit(tmp: NamedTempFile, path: &Path) -> Result<()> {
    tmp.persist(path).map_err(|e| {
        SoundalikeError::file_system(format!("Failed to replace {}: {}", path.display(), e))
    })?;
    Ok(())
}

/// Atomically replace `path` with `bytes`
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    commit(stage(path, bytes)?, path)
}

/// Read a persisted file, reporting a missing file as a file system error
pub(crate) fn read_to_string(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        SoundalikeError::file_system(format!(
            "Failed to read {} {}: {} (run `soundalike build` first?)",
            what,
            path.display(),
            e
        ))
    })
}
