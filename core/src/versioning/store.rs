use super::diff::{compare_versions, ComparisonResult};
use super::{file_name_of, FileVersion};
use crate::formats::LocalizationEntry;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_KEEP_COUNT: usize = 5;
pub const CURRENT_VERSION_LABEL: &str = "Current";
const VERSIONS_DIR_NAME: &str = "Versions";
const HISTORY_RULE: &str = "=================================================";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot storage error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Snapshots stored as `{root}/{project}/{file stem}_{game version}_{id}.json`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn default_root() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(crate::APP_DIR_NAME).join(VERSIONS_DIR_NAME))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.root.join(sanitize_component(project_id))
    }

    pub fn create_snapshot(
        &self,
        project_id: &str,
        file_path: &Path,
        game_version: &str,
        entries: Vec<LocalizationEntry>,
        notes: &str,
    ) -> Result<FileVersion, SnapshotError> {
        let version = FileVersion::capture(file_path, game_version, entries, notes);
        self.save(project_id, &version)?;
        Ok(version)
    }

    pub fn save(&self, project_id: &str, version: &FileVersion) -> Result<PathBuf, SnapshotError> {
        let dir = self.project_dir(project_id);
        fs::create_dir_all(&dir)?;

        let stem = version
            .file_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let path = dir.join(format!(
            "{}_{}_{}.json",
            sanitize_component(&stem),
            sanitize_component(&version.game_version),
            version.id
        ));
        fs::write(&path, serde_json::to_string_pretty(version)?)?;
        debug!("snapshot {} saved to {}", version.id, path.display());
        Ok(path)
    }

    pub fn load(&self, project_id: &str, id: Uuid) -> Result<Option<FileVersion>, SnapshotError> {
        match self.find_snapshot_file(project_id, id)? {
            Some(path) => Ok(Some(read_snapshot(&path)?)),
            None => Ok(None),
        }
    }

    /// Every readable snapshot of the project, newest first.
    pub fn all_snapshots(&self, project_id: &str) -> Result<Vec<FileVersion>, SnapshotError> {
        let mut versions: Vec<_> = self
            .read_project(project_id)?
            .into_iter()
            .map(|(_, version)| version)
            .collect();
        versions.sort_by(|a, b| b.import_date.cmp(&a.import_date));
        Ok(versions)
    }

    /// Snapshots of one file, newest first. `file` may be a path or a bare name.
    pub fn file_history(
        &self,
        project_id: &str,
        file: &Path,
    ) -> Result<Vec<FileVersion>, SnapshotError> {
        let wanted = file_name_of(file);
        Ok(self
            .all_snapshots(project_id)?
            .into_iter()
            .filter(|version| version.file_name() == wanted)
            .collect())
    }

    pub fn latest_snapshot(
        &self,
        project_id: &str,
        file: &Path,
    ) -> Result<Option<FileVersion>, SnapshotError> {
        Ok(self.file_history(project_id, file)?.into_iter().next())
    }

    /// Returns whether a snapshot was removed.
    pub fn delete_snapshot(&self, project_id: &str, id: Uuid) -> Result<bool, SnapshotError> {
        match self.find_snapshot_file(project_id, id)? {
            Some(path) => {
                fs::remove_file(path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Keep the newest `keep` snapshots of each file. Returns how many were deleted.
    pub fn cleanup_old_snapshots(
        &self,
        project_id: &str,
        keep: usize,
    ) -> Result<usize, SnapshotError> {
        let mut by_file: HashMap<String, Vec<(PathBuf, FileVersion)>> = HashMap::new();
        for (path, version) in self.read_project(project_id)? {
            by_file.entry(version.file_name()).or_default().push((path, version));
        }

        let mut removed = 0;
        for (_, mut versions) in by_file {
            versions.sort_by(|a, b| b.1.import_date.cmp(&a.1.import_date));
            for (path, _) in versions.into_iter().skip(keep) {
                fs::remove_file(path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// True when there is no snapshot of the file yet or its content hash differs.
    pub fn has_file_changed(
        &self,
        project_id: &str,
        file_path: &Path,
        entries: &[LocalizationEntry],
    ) -> Result<bool, SnapshotError> {
        let current = super::entries_hash(entries);
        Ok(self
            .latest_snapshot(project_id, file_path)?
            .map_or(true, |latest| latest.file_hash != current))
    }

    /// Diff `entries` against the newest snapshot of the file without storing
    /// them. `None` when the file has no snapshot.
    pub fn compare_with_latest(
        &self,
        project_id: &str,
        file_path: &Path,
        entries: Vec<LocalizationEntry>,
        existing_translations: Option<&HashMap<String, String>>,
    ) -> Result<Option<ComparisonResult>, SnapshotError> {
        let Some(latest) = self.latest_snapshot(project_id, file_path)? else {
            return Ok(None);
        };
        let current = FileVersion::capture(file_path, CURRENT_VERSION_LABEL, entries, "");
        Ok(Some(compare_versions(&latest, &current, existing_translations)))
    }

    pub fn version_history_report(&self, project_id: &str) -> Result<String, SnapshotError> {
        let snapshots = self.all_snapshots(project_id)?;
        let mut by_file: BTreeMap<String, Vec<&FileVersion>> = BTreeMap::new();
        for version in &snapshots {
            by_file.entry(version.file_name()).or_default().push(version);
        }

        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_history(&mut out, project_id, snapshots.len(), &by_file);
        Ok(out)
    }

    fn find_snapshot_file(
        &self,
        project_id: &str,
        id: Uuid,
    ) -> Result<Option<PathBuf>, SnapshotError> {
        let suffix = format!("_{id}.json");
        Ok(self
            .snapshot_files(project_id)?
            .into_iter()
            .find(|path| file_name_of(path).ends_with(&suffix)))
    }

    fn snapshot_files(&self, project_id: &str) -> Result<Vec<PathBuf>, SnapshotError> {
        let dir = self.project_dir(project_id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Snapshots that fail to parse are logged and skipped.
    fn read_project(&self, project_id: &str) -> Result<Vec<(PathBuf, FileVersion)>, SnapshotError> {
        let mut versions = Vec::new();
        for path in self.snapshot_files(project_id)? {
            match read_snapshot(&path) {
                Ok(version) => versions.push((path, version)),
                Err(err) => warn!("skipping snapshot {}: {err}", path.display()),
            }
        }
        Ok(versions)
    }
}

fn write_history(
    out: &mut String,
    project_id: &str,
    total: usize,
    by_file: &BTreeMap<String, Vec<&FileVersion>>,
) -> std::fmt::Result {
    writeln!(out, "{HISTORY_RULE}")?;
    writeln!(out, "VERSION HISTORY REPORT")?;
    writeln!(out, "{HISTORY_RULE}")?;
    writeln!(out)?;
    writeln!(out, "Project ID: {project_id}")?;
    writeln!(out, "Total Snapshots: {total}")?;
    writeln!(out, "Files Tracked: {}", by_file.len())?;
    writeln!(out)?;
    for (file, versions) in by_file {
        writeln!(out, "FILE: {file}")?;
        writeln!(out, "Versions: {}", versions.len())?;
        for version in versions {
            let hash_prefix = version.file_hash.get(..8).unwrap_or(&version.file_hash);
            writeln!(
                out,
                "  - v{} - {}",
                version.game_version,
                version.import_date.format("%Y-%m-%d %H:%M")
            )?;
            writeln!(
                out,
                "    Entries: {}, Hash: {hash_prefix}...",
                version.entries.len()
            )?;
            if !version.notes.trim().is_empty() {
                writeln!(out, "    Notes: {}", version.notes)?;
            }
        }
        writeln!(out)?;
    }
    writeln!(out, "{HISTORY_RULE}")
}

fn read_snapshot(path: &Path) -> Result<FileVersion, SnapshotError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "unknown".to_string(),
        _ => cleaned,
    }
}
