//! Helpers shared by the file-backed stores.

use rpc_cache_api::{CacheError, CacheResult};
use std::path::{Path, PathBuf};

/// Ensure `name` can be used as a file stem inside the store directory.
///
/// Only ascii alphanumerics, `-`, `_` and `.` are accepted, and the name
/// must not start with a `.`, so a name can never address a path outside
/// of the directory.
pub fn check_file_stem(name: &str) -> CacheResult<()> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(CacheError::other(format!("invalid store name: {name:?}")))
    }
}

/// The json file used for `name` within `dir`.
pub fn json_path(dir: &Path, name: &str) -> CacheResult<PathBuf> {
    check_file_stem(name)?;
    Ok(dir.join(format!("{name}.json")))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Read a file, treating a missing file as `None`.
pub async fn read_optional(path: &Path) -> CacheResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::other_src(
            format!("read {}", path.display()),
            e,
        )),
    }
}

/// Replace the content of a file by writing a sibling and renaming it
/// into place.
pub async fn write_replace(path: &Path, data: String) -> CacheResult<()> {
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, data).await.map_err(|e| {
        CacheError::other_src(format!("write {}", tmp.display()), e)
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        CacheError::other_src(format!("rename {}", path.display()), e)
    })
}

/// Blocking counterpart of [read_optional].
pub fn read_optional_sync(path: &Path) -> CacheResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::other_src(
            format!("read {}", path.display()),
            e,
        )),
    }
}

/// Blocking counterpart of [write_replace].
pub fn write_replace_sync(path: &Path, data: String) -> CacheResult<()> {
    let tmp = tmp_path(path);
    std::fs::write(&tmp, data).map_err(|e| {
        CacheError::other_src(format!("write {}", tmp.display()), e)
    })?;
    std::fs::rename(&tmp, path).map_err(|e| {
        CacheError::other_src(format!("rename {}", path.display()), e)
    })
}
