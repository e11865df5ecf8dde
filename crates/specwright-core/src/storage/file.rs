use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::StorageConfig;
use crate::session::SessionRecord;
use crate::status::ProjectStatus;

use super::error::StorageError;
use super::{check_project_id, FileAccess, Storage};

/// [`FileAccess`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

impl FileAccess for LocalFiles {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
            }
        }

        // Write beside the target and rename so readers never see a torn file
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents).map_err(|e| StorageError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))?;

        Ok(())
    }

    fn list_dirs(&self, path: &Path) -> Result<Vec<String>, StorageError> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(path).map_err(|e| StorageError::io(path, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(path, e))?;
            let entry_path = entry.path();
            if entry_path.is_dir() {
                if let Some(name) = entry_path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// File-based storage implementation.
///
/// Stores each project under the configured projects directory:
/// ```text
/// <root>/projects/{project-id}/
///   brief.md                       # Written by the user
///   questions/*.json               # Generated question sets
///   documents/*.md                 # Generated documents
///   .specwright/
///     status.json                  # Phase progression record
///     sessions.json                # Assistant session ids per agent
/// ```
pub struct FileStorage<F: FileAccess = LocalFiles> {
    config: StorageConfig,
    files: F,
}

impl FileStorage<LocalFiles> {
    /// Creates a new FileStorage rooted at the current directory.
    pub fn new() -> Self {
        Self::with_config(StorageConfig::default())
    }

    /// Creates a new FileStorage with custom configuration.
    pub fn with_config(config: StorageConfig) -> Self {
        Self::with_files(config, LocalFiles)
    }
}

impl Default for FileStorage<LocalFiles> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FileAccess> FileStorage<F> {
    /// Creates a storage over a custom file access implementation.
    pub fn with_files(config: StorageConfig, files: F) -> Self {
        Self { config, files }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn status_file(&self, project_id: &str) -> Result<PathBuf, StorageError> {
        check_project_id(project_id)?;
        Ok(self
            .config
            .state_path(project_id)
            .join(&self.config.status_file))
    }

    fn sessions_file(&self, project_id: &str) -> Result<PathBuf, StorageError> {
        check_project_id(project_id)?;
        Ok(self
            .config
            .state_path(project_id)
            .join(&self.config.sessions_file))
    }

    fn load_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StorageError> {
        let Some(json) = self.files.read(path)? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&json).map_err(|e| StorageError::json(path, e))?;
        Ok(Some(value))
    }

    fn save_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(value)?;
        self.files.write(path, &json)?;
        debug!(path = %path.display(), "record saved");
        Ok(())
    }
}

impl<F: FileAccess> Storage for FileStorage<F> {
    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.config.project_path(project_id)
    }

    fn artifact_exists(&self, project_id: &str, artifact: &str) -> bool {
        check_project_id(project_id).is_ok()
            && self.files.exists(&self.project_dir(project_id).join(artifact))
    }

    fn load_status(&self, project_id: &str) -> Result<Option<ProjectStatus>, StorageError> {
        self.load_json(&self.status_file(project_id)?)
    }

    fn save_status(&self, status: &ProjectStatus) -> Result<(), StorageError> {
        self.save_json(&self.status_file(&status.project_id)?, status)
    }

    fn load_sessions(&self, project_id: &str) -> Result<Option<SessionRecord>, StorageError> {
        self.load_json(&self.sessions_file(project_id)?)
    }

    fn save_sessions(&self, record: &SessionRecord) -> Result<(), StorageError> {
        self.save_json(&self.sessions_file(&record.project_id)?, record)
    }

    fn list_projects(&self) -> Result<Vec<String>, StorageError> {
        let ids = self
            .files
            .list_dirs(&self.config.projects_path())?
            .into_iter()
            .filter(|id| {
                self.status_file(id)
                    .is_ok_and(|path| self.files.exists(&path))
            })
            .collect();
        Ok(ids)
    }
}
