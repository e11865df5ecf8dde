use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog;
use crate::phase::{AgentPhase, AgentRole, ProjectPhase};
use crate::session::{SessionStore, SCOPING_PROJECT_ID};
use crate::status::{Confirmation, ProjectSettings, ProjectStatus, ProjectSummary, TransitionError};
use crate::storage::{self, Storage, StorageError};
use crate::validator::{self, ValidationReport};
use crate::workflow::{ComposedPrompt, WorkflowError, WorkflowRegistry};

/// Manages projects and their phase progression.
///
/// Every operation loads the status record, applies one transition and
/// saves it back. Nothing is cached between calls, so several processes may
/// drive the same project; the last write wins.
pub struct ProjectManager<S: Storage> {
    storage: S,
    registry: WorkflowRegistry,
    settings: ProjectSettings,
}

/// Result of a validate-and-recover pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryOutcome {
    pub status: ProjectStatus,
    /// The failed validation that triggered a rewrite, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,
}

impl RecoveryOutcome {
    pub fn recovered(&self) -> bool {
        self.report.is_some()
    }
}

/// The prompt for a project's current phase.
#[derive(Debug, Clone)]
pub struct PhasePrompt {
    pub phase: AgentPhase,
    pub prompt: ComposedPrompt,
    /// Open assistant conversation for the phase's agent.
    pub session_id: Option<String>,
}

impl<S: Storage> ProjectManager<S> {
    /// Creates a new ProjectManager with the given storage backend.
    pub fn new(storage: S) -> Self {
        Self::with_settings(storage, ProjectSettings::default())
    }

    /// Creates a manager whose new projects get `settings`.
    pub fn with_settings(storage: S, settings: ProjectSettings) -> Self {
        Self {
            storage,
            registry: WorkflowRegistry::builtin(),
            settings,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Session ids stored beside this manager's projects.
    pub fn sessions(&self) -> SessionStore<'_, S> {
        SessionStore::new(&self.storage)
    }

    /// Creates a project and persists its initial status.
    ///
    /// Without an explicit id the next free zero-padded number is used.
    pub fn create_project(&self, id: Option<&str>) -> Result<ProjectStatus, ManagerError> {
        let id = match id {
            Some(id) => {
                check_project_id(id)?;
                id.to_string()
            }
            None => self.next_project_id()?,
        };

        match self.storage.load_status(&id) {
            Ok(None) => {}
            Ok(Some(_)) | Err(StorageError::Json { .. }) => {
                return Err(StorageError::ProjectExists(id).into());
            }
            Err(e) => return Err(e.into()),
        }

        let status = ProjectStatus::with_settings(&id, self.settings.clone());
        self.storage.save_status(&status)?;
        info!(project = %id, "project created");
        Ok(status)
    }

    /// Gets a project's status, failing if it has none.
    pub fn get_status(&self, id: &str) -> Result<ProjectStatus, ManagerError> {
        self.storage
            .load_status(id)?
            .ok_or_else(|| StorageError::ProjectNotFound(id.to_string()).into())
    }

    /// Gets a project's status, or a fresh initial one.
    ///
    /// An unreadable record is treated as absent. Operations that mutate a
    /// project require an existing record instead, so a mistyped id never
    /// creates one.
    pub fn load_or_init_status(&self, id: &str) -> Result<ProjectStatus, ManagerError> {
        check_project_id(id)?;
        Ok(self
            .read_status(id)?
            .unwrap_or_else(|| ProjectStatus::with_settings(id, self.settings.clone())))
    }

    /// Lists all projects, most recently updated first.
    pub fn list_projects(&self) -> Result<Vec<ProjectSummary>, ManagerError> {
        let mut summaries = Vec::new();
        for id in self.storage.list_projects()? {
            if let Some(status) = self.read_status(&id)? {
                summaries.push(status.to_summary());
            }
        }
        summaries.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
        Ok(summaries)
    }

    /// Starts `phase`, which must be the project's current phase.
    pub fn begin_phase(&self, id: &str, phase: AgentPhase) -> Result<ProjectStatus, ManagerError> {
        let mut status = self.load_existing(id)?;
        self.auto_recover(&mut status)?;
        if status.begin_phase(phase.agent(), phase.phase())? {
            self.storage.save_status(&status)?;
        }
        Ok(status)
    }

    /// Records that the user is reviewing a human phase.
    pub fn mark_user_reviewing(
        &self,
        id: &str,
        phase: AgentPhase,
    ) -> Result<ProjectStatus, ManagerError> {
        let mut status = self.load_existing(id)?;
        if status.mark_user_reviewing(phase.agent(), phase.phase())? {
            self.storage.save_status(&status)?;
        }
        Ok(status)
    }

    /// Completes `phase` and advances the project.
    ///
    /// A generate phase only completes once its output is on disk, whoever
    /// confirms it.
    pub fn complete_phase(
        &self,
        id: &str,
        phase: AgentPhase,
        confirmation: Confirmation,
    ) -> Result<ProjectStatus, ManagerError> {
        let mut status = self.load_existing(id)?;
        if status.current_phase == ProjectPhase::At(phase) {
            if let Some(artifact) = catalog::produced_artifact(phase) {
                if !self.storage.artifact_exists(id, artifact) {
                    return Err(ManagerError::MissingOutput { phase, artifact });
                }
            }
        }
        if status.complete_phase(phase.agent(), phase.phase(), confirmation)? {
            self.storage.save_status(&status)?;
        }
        Ok(status)
    }

    /// Checks a claimed phase against disk evidence and the recorded state.
    ///
    /// Missing artifacts take precedence. When the artifacts are all there
    /// but the claim differs from the recorded phase, the report is invalid
    /// and suggests the recorded phase (or its own fallback if the recorded
    /// phase lacks evidence). Without a status record only evidence counts.
    pub fn validate_current_phase(
        &self,
        id: &str,
        claimed: ProjectPhase,
    ) -> Result<ValidationReport, ManagerError> {
        let report = validator::validate_phase(claimed, |a| self.storage.artifact_exists(id, a));
        if !report.is_valid {
            return Ok(report);
        }

        let Some(status) = self.read_status(id)? else {
            return Ok(report);
        };
        let recorded = status.current_phase;
        if recorded == claimed {
            return Ok(report);
        }

        let suggested = validator::validate_phase(recorded, |a| self.storage.artifact_exists(id, a))
            .suggested_phase
            .unwrap_or(recorded);
        Ok(ValidationReport {
            is_valid: false,
            reason: Some(format!("claimed {claimed} but the recorded phase is {recorded}")),
            missing_files: Vec::new(),
            suggested_phase: Some(suggested),
        })
    }

    /// Validates the recorded phase and rewinds it if evidence is missing.
    ///
    /// A consistent status is returned untouched and is not rewritten.
    pub fn validate_and_recover_phase(&self, id: &str) -> Result<RecoveryOutcome, ManagerError> {
        let mut status = self.load_or_init_status(id)?;
        let report = validator::recover(&mut status, |a| self.storage.artifact_exists(id, a));
        if report.is_some() {
            self.storage.save_status(&status)?;
        }
        Ok(RecoveryOutcome { status, report })
    }

    /// Completes the current generate phase if its output is on disk.
    ///
    /// Returns the completed phase, or None if there was nothing to sync.
    pub fn sync_generated_output(&self, id: &str) -> Result<Option<AgentPhase>, ManagerError> {
        let mut status = self.load_existing(id)?;
        let Some((phase, artifact)) = pending_output(&status) else {
            return Ok(None);
        };
        if !self.storage.artifact_exists(id, artifact) {
            return Ok(None);
        }

        status.complete_phase(phase.agent(), phase.phase(), Confirmation::OutputDetected)?;
        self.storage.save_status(&status)?;
        info!(project = %id, %phase, artifact, "generated output detected");
        Ok(Some(phase))
    }

    /// The current generate phase and the file it is expected to write.
    pub fn pending_output(&self, id: &str) -> Result<Option<(AgentPhase, PathBuf)>, ManagerError> {
        let status = self.load_existing(id)?;
        Ok(pending_output(&status)
            .map(|(phase, artifact)| (phase, self.storage.project_dir(id).join(artifact))))
    }

    /// Resets `agent` and every later agent.
    pub fn reset_agent(&self, id: &str, agent: AgentRole) -> Result<ProjectStatus, ManagerError> {
        let mut status = self.load_existing(id)?;
        status.reset_agent(agent);
        self.storage.save_status(&status)?;
        Ok(status)
    }

    /// Adds assistant spend to a project's totals.
    pub fn record_cost(
        &self,
        id: &str,
        agent: AgentRole,
        usd: f64,
    ) -> Result<ProjectStatus, ManagerError> {
        let mut status = self.load_existing(id)?;
        status.record_cost(agent, usd)?;
        self.storage.save_status(&status)?;
        Ok(status)
    }

    /// Builds a prompt for a leaf workflow against a project's directory.
    pub fn build_prompt(
        &self,
        workflow: &str,
        id: &str,
        request: &str,
    ) -> Result<ComposedPrompt, ManagerError> {
        let project_dir = self.storage.project_dir(id);
        Ok(self
            .registry
            .build_prompt(workflow, &project_dir.display().to_string(), request)?)
    }

    /// Builds the prompt that drives the project's current phase.
    ///
    /// Human phases have no workflow and are rejected.
    pub fn prompt_for_current_phase(
        &self,
        id: &str,
        request: &str,
    ) -> Result<PhasePrompt, ManagerError> {
        let mut status = self.load_existing(id)?;
        self.auto_recover(&mut status)?;

        let ProjectPhase::At(phase) = status.current_phase else {
            return Err(ManagerError::ProjectComplete(id.to_string()));
        };
        let workflow = catalog::workflow_for(phase)
            .ok_or(ManagerError::NoWorkflowForPhase(status.current_phase))?;

        Ok(PhasePrompt {
            phase,
            prompt: self.build_prompt(workflow, id, request)?,
            session_id: self.sessions().get_agent_session(id, phase.agent())?,
        })
    }

    /// Loads the status of a project that must already exist.
    ///
    /// A malformed record still counts as an existing project and is
    /// replaced by a fresh initial status.
    fn load_existing(&self, id: &str) -> Result<ProjectStatus, ManagerError> {
        check_project_id(id)?;
        match self.storage.load_status(id) {
            Ok(Some(status)) => Ok(status),
            Ok(None) => Err(StorageError::ProjectNotFound(id.to_string()).into()),
            Err(e @ StorageError::Json { .. }) => {
                warn!(project = %id, error = %e, "replacing unreadable status record");
                Ok(ProjectStatus::with_settings(id, self.settings.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Loads a status record, treating a malformed one as absent.
    fn read_status(&self, id: &str) -> Result<Option<ProjectStatus>, ManagerError> {
        match self.storage.load_status(id) {
            Ok(status) => Ok(status),
            Err(e @ StorageError::Json { .. }) => {
                warn!(project = %id, error = %e, "ignoring unreadable status record");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Recovers and persists `status` when the project opts in.
    fn auto_recover(&self, status: &mut ProjectStatus) -> Result<(), ManagerError> {
        if !status.settings().auto_recover {
            return Ok(());
        }
        let id = status.project_id.clone();
        if validator::recover(status, |a| self.storage.artifact_exists(&id, a)).is_some() {
            self.storage.save_status(status)?;
        }
        Ok(())
    }

    fn next_project_id(&self) -> Result<String, ManagerError> {
        let next = self
            .storage
            .list_projects()?
            .iter()
            .filter_map(|id| id.parse::<u32>().ok())
            .max();
        let next = match next {
            None => 1,
            Some(n) => n
                .checked_add(1)
                .ok_or_else(|| ManagerError::InvalidProjectId(n.to_string()))?,
        };
        Ok(format!("{next:03}"))
    }
}

fn pending_output(status: &ProjectStatus) -> Option<(AgentPhase, &'static str)> {
    match status.current_phase {
        ProjectPhase::At(phase) => catalog::produced_artifact(phase).map(|a| (phase, a)),
        ProjectPhase::Complete => None,
    }
}

/// Project ids must be storable and must not collide with the scoping
/// record.
fn check_project_id(id: &str) -> Result<(), ManagerError> {
    if storage::check_project_id(id).is_ok() && id != SCOPING_PROJECT_ID {
        Ok(())
    } else {
        Err(ManagerError::InvalidProjectId(id.to_string()))
    }
}

/// Errors that can occur in ProjectManager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Phase {0} is driven by the user and has no workflow")]
    NoWorkflowForPhase(ProjectPhase),

    #[error("Project {0} is complete")]
    ProjectComplete(String),

    #[error("Invalid project id: {0:?}")]
    InvalidProjectId(String),

    #[error("Phase {phase} has not written {artifact}")]
    MissingOutput {
        phase: AgentPhase,
        artifact: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::storage::FileStorage;
    use tempfile::TempDir;

    fn create_test_manager() -> (ProjectManager<FileStorage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::with_config(StorageConfig::rooted(temp_dir.path()));
        let manager = ProjectManager::new(storage);
        (manager, temp_dir)
    }

    #[test]
    fn test_create_project_assigns_ids() {
        let (manager, _temp) = create_test_manager();

        assert_eq!(manager.create_project(None).unwrap().project_id, "001");
        assert_eq!(manager.create_project(None).unwrap().project_id, "002");
        assert_eq!(manager.create_project(Some("042")).unwrap().project_id, "042");
        assert_eq!(manager.create_project(None).unwrap().project_id, "043");

        assert!(matches!(
            manager.create_project(Some("042")),
            Err(ManagerError::Storage(StorageError::ProjectExists(_)))
        ));
    }

    #[test]
    fn test_rejects_bad_ids() {
        let (manager, _temp) = create_test_manager();
        for id in ["", "../x", "a/b", "a\\b", ".hidden", "c:", SCOPING_PROJECT_ID] {
            assert!(matches!(
                manager.create_project(Some(id)),
                Err(ManagerError::InvalidProjectId(_))
            ));
        }
    }

    #[test]
    fn test_next_id_stops_at_u32_max() {
        let (manager, _temp) = create_test_manager();
        manager.create_project(Some("4294967295")).unwrap();

        assert!(matches!(
            manager.create_project(None),
            Err(ManagerError::InvalidProjectId(_))
        ));
        assert_eq!(manager.list_projects().unwrap().len(), 1);
    }

    #[test]
    fn test_get_missing_project() {
        let (manager, _temp) = create_test_manager();
        assert!(matches!(
            manager.get_status("404"),
            Err(ManagerError::Storage(StorageError::ProjectNotFound(_)))
        ));
    }

    #[test]
    fn test_human_phase_has_no_workflow() {
        let (manager, temp) = create_test_manager();
        manager.create_project(Some("001")).unwrap();

        let questions = temp.path().join("projects/001/questions");
        std::fs::create_dir_all(&questions).unwrap();
        std::fs::write(questions.join("pm_questions.json"), "[]").unwrap();
        assert_eq!(
            manager.sync_generated_output("001").unwrap(),
            Some("pm-questions-generate".parse().unwrap())
        );

        let err = manager.prompt_for_current_phase("001", "x").unwrap_err();
        assert!(matches!(err, ManagerError::NoWorkflowForPhase(_)));
    }
}
