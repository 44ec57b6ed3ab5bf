use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::conf::C_REGEX_PATH_SEGMENT_ILLEGAL;
use crate::spec::StoreError;

////////////////////////////////////////////////////////////////////////////////
// #region PathSegments

static REGEX_PATH_SEGMENT_ILLEGAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(C_REGEX_PATH_SEGMENT_ILLEGAL).expect("path segment pattern is valid")
});

/// Make `value` usable as a single directory name.
///
/// Reserved characters become `_`, surrounding whitespace and trailing dots
/// are dropped. Names that end up empty or made only of dots are rejected.
pub fn sanitize_path_segment(value: &str) -> Result<String, StoreError> {
    let c_segment = REGEX_PATH_SEGMENT_ILLEGAL.replace_all(value.trim(), "_");
    let c_segment = c_segment.trim().trim_end_matches('.').trim_end();
    if c_segment.is_empty() || c_segment.chars().all(|chr| chr == '.') {
        return Err(StoreError::InvalidTrainNo(value.to_string()));
    }
    Ok(c_segment.to_string())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

fn _absolutize_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

pub(crate) fn validate_destination_path_safety(
    path_dst_item: &Path,
    path_dir_dst_root: &Path,
) -> Result<(), StoreError> {
    let path_dir_dst_root_abs = _absolutize_path(path_dir_dst_root);
    let path_dst_item_abs = _absolutize_path(path_dst_item);

    if !path_dst_item_abs.starts_with(&path_dir_dst_root_abs) {
        return Err(StoreError::UnsafeDestination(format!(
            "Unsafe destination path escapes store root: {} (root={})",
            path_dst_item.display(),
            path_dir_dst_root.display()
        )));
    }

    match fs::symlink_metadata(&path_dir_dst_root_abs) {
        Ok(meta_root) if meta_root.file_type().is_symlink() => {
            return Err(StoreError::UnsafeDestination(format!(
                "Store root path must not be a symbolic link: {}",
                path_dir_dst_root.display()
            )));
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(StoreError::io("inspect", path_dir_dst_root, e)),
    }

    let path_rel = path_dst_item_abs
        .strip_prefix(&path_dir_dst_root_abs)
        .map_err(|_| {
            StoreError::UnsafeDestination(format!(
                "Unsafe destination path escapes store root: {} (root={})",
                path_dst_item.display(),
                path_dir_dst_root.display()
            ))
        })?;
    let mut path_cursor = path_dir_dst_root_abs.clone();
    for part_rel in path_rel.components() {
        path_cursor.push(part_rel.as_os_str());
        match fs::symlink_metadata(&path_cursor) {
            Ok(meta_cursor) => {
                if meta_cursor.file_type().is_symlink() {
                    return Err(StoreError::UnsafeDestination(format!(
                        "Unsafe destination path traverses symlink component: {}",
                        path_cursor.display()
                    )));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io("inspect", path_cursor, e)),
        }
    }

    Ok(())
}

/// Number of directories from `path_dir` upwards that do not exist yet.
pub(crate) fn count_missing_dirs(path_dir: &Path) -> u64 {
    path_dir
        .ancestors()
        .take_while(|path| !path.as_os_str().is_empty() && !path.exists())
        .count() as u64
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileTransfer

/// Move `path_file_src` to `path_file_dst`, copying across filesystems.
pub(crate) fn move_file(path_file_src: &Path, path_file_dst: &Path) -> Result<(), StoreError> {
    match fs::rename(path_file_src, path_file_dst) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(
                src = %path_file_src.display(),
                error = %e,
                "rename failed, falling back to copy"
            );
            copy_file_with_metadata(path_file_src, path_file_dst)
                .map_err(|e| StoreError::io("copy", path_file_dst, e))?;
            fs::remove_file(path_file_src).map_err(|e| StoreError::io("remove", path_file_src, e))
        }
    }
}

pub(crate) fn copy_file_with_metadata(
    path_file_src: &Path,
    path_file_dst: &Path,
) -> Result<(), io::Error> {
    fs::copy(path_file_src, path_file_dst)?;
    #[cfg(target_os = "linux")]
    {
        apply_metadata_linux(path_file_src, path_file_dst)?;
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn apply_metadata_linux(path_file_src: &Path, path_file_dst: &Path) -> Result<(), io::Error> {
    use filetime::{FileTime, set_file_times};

    let stat_src = fs::metadata(path_file_src)?;
    fs::set_permissions(path_file_dst, stat_src.permissions())?;

    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_file_dst, file_time_access, file_time_modify)?;

    copy_xattrs_linux(path_file_src, path_file_dst);
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_file_src: &Path, path_file_dst: &Path) {
    let Ok(iter_xattr_names) = xattr::list(path_file_src) else {
        return;
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() else {
            continue;
        };
        let _ = xattr::set(path_file_dst, &name, &raw_value);
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
