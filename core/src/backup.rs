use chrono::Local;
use log::{info, warn};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const BACKUP_DIR_NAME: &str = "backup";

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WriteOutcome {
    pub backup_path: Option<PathBuf>,
    pub final_path: PathBuf,
    pub bytes_written: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("target path has no parent directory: {0}")]
    NoParent(PathBuf),
    #[error("failed to create backup of {path}: {reason}")]
    BackupCreate { path: PathBuf, reason: String },
}

/// Copy `target` into a sibling `backup/` folder as `{yyyyMMdd_HHmmss}_{name}`.
pub fn create_backup(target: &Path) -> Result<PathBuf, BackupError> {
    let parent = target
        .parent()
        .ok_or_else(|| BackupError::NoParent(target.to_path_buf()))?;
    let file_name = target
        .file_name()
        .ok_or_else(|| BackupError::NoParent(target.to_path_buf()))?;

    let backup_dir = parent.join(BACKUP_DIR_NAME);
    fs::create_dir_all(&backup_dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let backup_path = backup_dir.join(format!("{timestamp}_{}", file_name.to_string_lossy()));
    fs::copy(target, &backup_path).map_err(|err| BackupError::BackupCreate {
        path: target.to_path_buf(),
        reason: err.to_string(),
    })?;

    info!("backup written to {}", backup_path.display());
    Ok(backup_path)
}

/// Write `contents` to `target` through a temp file and rename.
///
/// When `backup` is set and the target already exists, a copy is taken first.
/// A failed backup is logged and does not stop the write.
pub fn write_with_backup(
    target: &Path,
    contents: &[u8],
    backup: bool,
) -> Result<WriteOutcome, BackupError> {
    let parent = target
        .parent()
        .ok_or_else(|| BackupError::NoParent(target.to_path_buf()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)?;
    }

    let backup_path = if backup && target.exists() {
        match create_backup(target) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!("continuing without backup: {err}");
                None
            }
        }
    } else {
        None
    };

    let temp_path = build_temp_path(target);
    if let Err(err) = write_and_swap(&temp_path, target, contents) {
        if temp_path.exists() {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                warn!("could not remove {}: {cleanup}", temp_path.display());
            }
        }
        return Err(err);
    }

    Ok(WriteOutcome {
        backup_path,
        final_path: target.to_path_buf(),
        bytes_written: contents.len(),
    })
}

fn write_and_swap(temp_path: &Path, target: &Path, contents: &[u8]) -> Result<(), BackupError> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    #[cfg(target_os = "windows")]
    {
        use std::io::ErrorKind;
        if let Err(err) = fs::rename(temp_path, target) {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(target)?;
                fs::rename(temp_path, target)?;
            } else {
                return Err(BackupError::Io(err));
            }
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        fs::rename(temp_path, target)?;
    }

    Ok(())
}

fn build_temp_path(target: &Path) -> PathBuf {
    let mut temp = target.to_path_buf();
    let suffix = format!(".tmp{}", std::process::id());
    match temp.file_name() {
        Some(name) => {
            let mut os_string = name.to_os_string();
            os_string.push(suffix);
            temp.set_file_name(os_string);
        }
        None => temp.push(format!("temp{suffix}")),
    }
    temp
}
