mod error;
mod file;

pub use error::StorageError;
pub use file::{FileStorage, LocalFiles};

use std::path::{Path, PathBuf};

use crate::session::SessionRecord;
use crate::status::ProjectStatus;

/// Checks that a project id names a single directory under the projects
/// root. The reserved scoping id passes.
pub fn check_project_id(id: &str) -> Result<(), StorageError> {
    let valid = !id.is_empty() && !id.starts_with('.') && !id.contains(['/', '\\', ':', '\0']);
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidProjectId(id.to_string()))
    }
}

/// Raw file access consumed by the storage layer.
///
/// Implementations decide where bytes live; the state machine only ever
/// asks whether a file exists, reads it whole, or replaces it whole.
pub trait FileAccess {
    /// Returns true if a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Reads a file, returning None if it does not exist.
    fn read(&self, path: &Path) -> Result<Option<String>, StorageError>;

    /// Replaces a file's contents, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &str) -> Result<(), StorageError>;

    /// Lists the names of directories directly under `path`.
    fn list_dirs(&self, path: &Path) -> Result<Vec<String>, StorageError>;
}

/// Trait for project record storage backends.
///
/// Records are loaded and saved wholesale; there are no partial updates and
/// no locking. Concurrent writers race and the last write wins. Every
/// operation that touches a record rejects ids failing [`check_project_id`].
pub trait Storage {
    /// Directory holding a project's documents and artifacts.
    fn project_dir(&self, project_id: &str) -> PathBuf;

    /// Returns true if a project-relative artifact exists.
    fn artifact_exists(&self, project_id: &str, artifact: &str) -> bool;

    /// Loads a project's status record, or None if it has none.
    fn load_status(&self, project_id: &str) -> Result<Option<ProjectStatus>, StorageError>;

    /// Saves a project's status record.
    fn save_status(&self, status: &ProjectStatus) -> Result<(), StorageError>;

    /// Loads a project's session record, or None if it has none.
    fn load_sessions(&self, project_id: &str) -> Result<Option<SessionRecord>, StorageError>;

    /// Saves a project's session record.
    fn save_sessions(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Lists the ids of all projects with a status record.
    fn list_projects(&self) -> Result<Vec<String>, StorageError>;
}
