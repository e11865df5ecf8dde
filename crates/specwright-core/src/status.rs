use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{DEFAULT_ASSISTANT, STATUS_VERSION};
use crate::phase::{
    AgentPhase, AgentRole, CurrentAgent, PhaseName, PhaseParseError, PhaseStatus, ProjectPhase,
};

/// Progress of a single phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRecord {
    pub status: PhaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Overall progress of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentState {
    #[default]
    NotStarted,
    InProgress,
    Complete,
}

/// Where one agent stands in its four phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub status: AgentState,
    /// First phase that is not complete, or None when the agent is done.
    pub current_phase: Option<PhaseName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub phases: BTreeMap<PhaseName, PhaseRecord>,
}

impl AgentStatus {
    /// Creates a status with every phase not started.
    pub fn new(agent: AgentRole) -> Self {
        Self {
            status: AgentState::NotStarted,
            current_phase: Some(agent.phases()[0]),
            completed_at: None,
            phases: agent
                .phases()
                .into_iter()
                .map(|phase| (phase, PhaseRecord::default()))
                .collect(),
        }
    }

    pub fn phase(&self, phase: PhaseName) -> PhaseStatus {
        self.phases
            .get(&phase)
            .map(|record| record.status)
            .unwrap_or_default()
    }

    pub fn is_complete(&self) -> bool {
        self.status == AgentState::Complete
    }

    fn record_mut(&mut self, phase: PhaseName) -> &mut PhaseRecord {
        self.phases.entry(phase).or_default()
    }

    /// Recomputes `current_phase`, `status` and `completed_at` from the phases.
    fn refresh(&mut self, agent: AgentRole, now: DateTime<Utc>) {
        self.current_phase = agent
            .phases()
            .into_iter()
            .find(|phase| !self.phase(*phase).is_complete());

        let any_started = agent
            .phases()
            .into_iter()
            .any(|phase| self.phase(phase) != PhaseStatus::NotStarted);

        self.status = match self.current_phase {
            None => AgentState::Complete,
            Some(_) if any_started => AgentState::InProgress,
            Some(_) => AgentState::NotStarted,
        };

        if self.status == AgentState::Complete {
            self.completed_at.get_or_insert(now);
        } else {
            self.completed_at = None;
        }
    }
}

/// Status of the three agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agents {
    pub pm: AgentStatus,
    pub ux: AgentStatus,
    pub engineer: AgentStatus,
}

impl Agents {
    fn new() -> Self {
        Self {
            pm: AgentStatus::new(AgentRole::Pm),
            ux: AgentStatus::new(AgentRole::Ux),
            engineer: AgentStatus::new(AgentRole::Engineer),
        }
    }

    pub fn get(&self, agent: AgentRole) -> &AgentStatus {
        match agent {
            AgentRole::Pm => &self.pm,
            AgentRole::Ux => &self.ux,
            AgentRole::Engineer => &self.engineer,
        }
    }

    fn get_mut(&mut self, agent: AgentRole) -> &mut AgentStatus {
        match agent {
            AgentRole::Pm => &mut self.pm,
            AgentRole::Ux => &mut self.ux,
            AgentRole::Engineer => &mut self.engineer,
        }
    }
}

/// Append-only audit record. Only `completed_at` is ever filled in later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseHistoryEntry {
    pub phase: ProjectPhase,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: PhaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Per-project preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    /// Name of the external assistant that receives prompts.
    pub assistant: String,
    /// Run validation and recovery before resuming work on a project.
    pub auto_recover: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            assistant: DEFAULT_ASSISTANT.to_string(),
            auto_recover: true,
        }
    }
}

/// Assistant spend, as reported by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CostTracking {
    pub total_usd: f64,
    pub by_agent: BTreeMap<AgentRole, f64>,
}

/// How a phase completion was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The user explicitly confirmed the phase is done.
    User,
    /// The phase's declared output appeared on disk.
    OutputDetected,
}

/// The persisted record of a project's progress.
///
/// Single source of truth for phase progression. `current_agent` and
/// `current_phase` are always derived from the agents' phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    pub version: String,
    pub project_id: String,
    pub current_agent: CurrentAgent,
    pub current_phase: ProjectPhase,
    pub agents: Agents,
    #[serde(default)]
    pub history: Vec<PhaseHistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<ProjectSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_tracking: Option<CostTracking>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl ProjectStatus {
    /// Creates the initial status for a project.
    ///
    /// The project starts at `pm-questions-generate` with every phase not
    /// started and an empty history.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self::with_settings(project_id, ProjectSettings::default())
    }

    pub fn with_settings(project_id: impl Into<String>, settings: ProjectSettings) -> Self {
        let now = Utc::now();
        Self {
            version: STATUS_VERSION.to_string(),
            project_id: project_id.into(),
            current_agent: CurrentAgent::Agent(AgentRole::Pm),
            current_phase: ProjectPhase::first(),
            agents: Agents::new(),
            history: Vec::new(),
            settings: Some(settings),
            cost_tracking: Some(CostTracking::default()),
            created_at: now,
            last_updated_at: now,
        }
    }

    pub fn phase_status(&self, agent: AgentRole, phase: PhaseName) -> PhaseStatus {
        self.agents.get(agent).phase(phase)
    }

    pub fn is_complete(&self) -> bool {
        self.current_phase == ProjectPhase::Complete
    }

    pub fn settings(&self) -> ProjectSettings {
        self.settings.clone().unwrap_or_default()
    }

    /// Starts the current phase.
    ///
    /// Generate phases move to `ai-working`, human phases to `awaiting-user`.
    /// Returns false if the phase was already started.
    pub fn begin_phase(
        &mut self,
        agent: AgentRole,
        phase: PhaseName,
    ) -> Result<bool, TransitionError> {
        let target = self.ensure_current(agent, phase)?;
        if self.phase_status(agent, phase) != PhaseStatus::NotStarted {
            return Ok(false);
        }

        let status = if phase.requires_user() {
            PhaseStatus::AwaitingUser
        } else {
            PhaseStatus::AiWorking
        };
        self.start(target, status);
        debug!(project = %self.project_id, phase = %target, ?status, "phase started");
        Ok(true)
    }

    /// Moves a human phase from `awaiting-user` to `user-reviewing`.
    pub fn mark_user_reviewing(
        &mut self,
        agent: AgentRole,
        phase: PhaseName,
    ) -> Result<bool, TransitionError> {
        let target = self.ensure_current(agent, phase)?;
        if !phase.requires_user() {
            return Err(TransitionError::NotAUserPhase(target.into()));
        }

        match self.phase_status(agent, phase) {
            PhaseStatus::UserReviewing => Ok(false),
            PhaseStatus::NotStarted => {
                self.start(target, PhaseStatus::UserReviewing);
                Ok(true)
            }
            _ => {
                self.agents.get_mut(agent).record_mut(phase).status = PhaseStatus::UserReviewing;
                self.touch(Utc::now());
                Ok(true)
            }
        }
    }

    /// Completes the current phase and advances the cursor.
    ///
    /// Completing an already complete phase is a no-op and returns false.
    /// Human phases only complete with [`Confirmation::User`].
    pub fn complete_phase(
        &mut self,
        agent: AgentRole,
        phase: PhaseName,
        confirmation: Confirmation,
    ) -> Result<bool, TransitionError> {
        let target = AgentPhase::new(agent, phase)?;
        if self.phase_status(agent, phase).is_complete() {
            return Ok(false);
        }
        self.ensure_current(agent, phase)?;
        if phase.requires_user() && confirmation != Confirmation::User {
            return Err(TransitionError::ConfirmationRequired(target.into()));
        }

        let now = Utc::now();
        let record = self.agents.get_mut(agent).record_mut(phase);
        record.status = PhaseStatus::Complete;
        let started_at = *record.started_at.get_or_insert(now);
        record.completed_at = Some(now);

        let target = ProjectPhase::from(target);
        if let Some(open) = self
            .history
            .iter_mut()
            .rev()
            .find(|entry| entry.phase == target && entry.completed_at.is_none())
        {
            open.completed_at = Some(now);
        }
        self.history.push(PhaseHistoryEntry {
            phase: target,
            started_at,
            completed_at: Some(now),
            status: PhaseStatus::Complete,
            note: None,
        });

        let previous_agent = self.current_agent;
        self.refresh(now);
        self.touch(now);

        debug!(project = %self.project_id, phase = %target, "phase complete");
        if self.current_agent != previous_agent {
            info!(
                project = %self.project_id,
                from = %previous_agent,
                to = %self.current_agent,
                "agent complete"
            );
        }
        Ok(true)
    }

    /// Resets `agent` and every later agent to not started.
    ///
    /// This is the only way to move the cursor backwards besides recovery.
    pub fn reset_agent(&mut self, agent: AgentRole) {
        let now = Utc::now();
        for role in AgentRole::ALL.into_iter().filter(|role| *role >= agent) {
            *self.agents.get_mut(role) = AgentStatus::new(role);
        }
        self.history.push(PhaseHistoryEntry {
            phase: agent.first_phase().into(),
            started_at: now,
            completed_at: Some(now),
            status: PhaseStatus::NotStarted,
            note: Some(format!("reset {agent} and later agents")),
        });
        self.refresh(now);
        self.touch(now);
        info!(project = %self.project_id, %agent, "agent reset");
    }

    /// Adds assistant spend to the running totals.
    pub fn record_cost(&mut self, agent: AgentRole, usd: f64) -> Result<(), TransitionError> {
        if !usd.is_finite() || usd < 0.0 {
            return Err(TransitionError::InvalidCost(usd));
        }
        let tracking = self.cost_tracking.get_or_insert_with(CostTracking::default);
        tracking.total_usd += usd;
        *tracking.by_agent.entry(agent).or_insert(0.0) += usd;
        self.touch(Utc::now());
        Ok(())
    }

    /// Rewrites phase statuses so that `target` becomes the current phase.
    ///
    /// Phases before `target` are complete; `target` and everything after it
    /// are reset. A history entry carrying `note` documents the rewrite.
    pub(crate) fn rewind_to(&mut self, target: ProjectPhase, note: String) {
        let now = Utc::now();
        for phase in ProjectPhase::sequence() {
            let ProjectPhase::At(p) = phase else {
                continue;
            };
            let record = self.agents.get_mut(p.agent()).record_mut(p.phase());
            if phase < target {
                if !record.status.is_complete() {
                    record.status = PhaseStatus::Complete;
                    record.started_at.get_or_insert(now);
                    record.completed_at = Some(now);
                }
            } else {
                *record = PhaseRecord::default();
            }
        }
        self.history.push(PhaseHistoryEntry {
            phase: target,
            started_at: now,
            completed_at: Some(now),
            status: PhaseStatus::NotStarted,
            note: Some(note),
        });
        self.refresh(now);
        self.touch(now);
    }

    /// Returns the phase if it is the project's current one.
    fn ensure_current(
        &self,
        agent: AgentRole,
        phase: PhaseName,
    ) -> Result<AgentPhase, TransitionError> {
        let target = AgentPhase::new(agent, phase)?;
        if self.current_phase != ProjectPhase::At(target) {
            return Err(TransitionError::OutOfOrder {
                requested: target.into(),
                current: self.current_phase,
            });
        }
        Ok(target)
    }

    fn start(&mut self, target: AgentPhase, status: PhaseStatus) {
        let now = Utc::now();
        let record = self.agents.get_mut(target.agent()).record_mut(target.phase());
        record.status = status;
        record.started_at = Some(now);
        self.history.push(PhaseHistoryEntry {
            phase: target.into(),
            started_at: now,
            completed_at: None,
            status,
            note: None,
        });
        self.refresh(now);
        self.touch(now);
    }

    /// Recomputes every agent and the project cursor.
    fn refresh(&mut self, now: DateTime<Utc>) {
        for agent in AgentRole::ALL {
            self.agents.get_mut(agent).refresh(agent, now);
        }

        let current = AgentRole::ALL
            .into_iter()
            .find_map(|agent| self.agents.get(agent).current_phase.map(|phase| (agent, phase)));

        match current {
            Some((agent, phase)) => {
                self.current_agent = CurrentAgent::Agent(agent);
                self.current_phase = AgentPhase::new(agent, phase)
                    .map(ProjectPhase::At)
                    .unwrap_or(ProjectPhase::Complete);
            }
            None => {
                self.current_agent = CurrentAgent::Complete;
                self.current_phase = ProjectPhase::Complete;
            }
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated_at = now;
    }

    /// Converts the status to a summary (for listings).
    pub fn to_summary(&self) -> ProjectSummary {
        ProjectSummary {
            project_id: self.project_id.clone(),
            current_agent: self.current_agent,
            current_phase: self.current_phase,
            last_updated_at: self.last_updated_at,
        }
    }
}

/// A lightweight summary of a project for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub project_id: String,
    pub current_agent: CurrentAgent,
    pub current_phase: ProjectPhase,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("Out-of-order transition: {requested} is not the current phase ({current})")]
    OutOfOrder {
        requested: ProjectPhase,
        current: ProjectPhase,
    },

    #[error("Phase {0} can only be completed by the user")]
    ConfirmationRequired(ProjectPhase),

    #[error("Phase {0} is not reviewed by the user")]
    NotAUserPhase(ProjectPhase),

    #[error("Invalid phase: {0}")]
    InvalidPhase(#[from] PhaseParseError),

    #[error("Invalid cost amount: {0}")]
    InvalidCost(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status() {
        let status = ProjectStatus::new("001");
        assert_eq!(status.current_phase.to_string(), "pm-questions-generate");
        assert_eq!(status.current_agent, CurrentAgent::Agent(AgentRole::Pm));
        assert!(status.history.is_empty());
        for agent in AgentRole::ALL {
            for phase in agent.phases() {
                assert_eq!(status.phase_status(agent, phase), PhaseStatus::NotStarted);
            }
        }
    }

    #[test]
    fn test_begin_sets_status_by_kind() {
        let mut status = ProjectStatus::new("001");
        assert!(status
            .begin_phase(AgentRole::Pm, PhaseName::QuestionsGenerate)
            .unwrap());
        assert_eq!(
            status.phase_status(AgentRole::Pm, PhaseName::QuestionsGenerate),
            PhaseStatus::AiWorking
        );
        assert_eq!(status.agents.pm.status, AgentState::InProgress);

        // Second begin is a no-op
        assert!(!status
            .begin_phase(AgentRole::Pm, PhaseName::QuestionsGenerate)
            .unwrap());
        assert_eq!(status.history.len(), 1);

        status
            .complete_phase(
                AgentRole::Pm,
                PhaseName::QuestionsGenerate,
                Confirmation::OutputDetected,
            )
            .unwrap();
        status
            .begin_phase(AgentRole::Pm, PhaseName::QuestionsAnswer)
            .unwrap();
        assert_eq!(
            status.phase_status(AgentRole::Pm, PhaseName::QuestionsAnswer),
            PhaseStatus::AwaitingUser
        );
    }

    #[test]
    fn test_complete_closes_open_history_entry() {
        let mut status = ProjectStatus::new("001");
        status
            .begin_phase(AgentRole::Pm, PhaseName::QuestionsGenerate)
            .unwrap();
        status
            .complete_phase(
                AgentRole::Pm,
                PhaseName::QuestionsGenerate,
                Confirmation::OutputDetected,
            )
            .unwrap();

        assert_eq!(status.history.len(), 2);
        assert!(status.history.iter().all(|e| e.completed_at.is_some()));
        assert_eq!(status.history[1].status, PhaseStatus::Complete);
        assert_eq!(status.current_phase.to_string(), "pm-questions-answer");
    }

    #[test]
    fn test_human_phase_needs_user_confirmation() {
        let mut status = ProjectStatus::new("001");
        status
            .complete_phase(
                AgentRole::Pm,
                PhaseName::QuestionsGenerate,
                Confirmation::OutputDetected,
            )
            .unwrap();

        let err = status
            .complete_phase(
                AgentRole::Pm,
                PhaseName::QuestionsAnswer,
                Confirmation::OutputDetected,
            )
            .unwrap_err();
        assert!(matches!(err, TransitionError::ConfirmationRequired(_)));

        assert!(status
            .complete_phase(AgentRole::Pm, PhaseName::QuestionsAnswer, Confirmation::User)
            .unwrap());
    }

    #[test]
    fn test_mark_user_reviewing() {
        let mut status = ProjectStatus::new("001");
        assert!(matches!(
            status.mark_user_reviewing(AgentRole::Pm, PhaseName::QuestionsGenerate),
            Err(TransitionError::NotAUserPhase(_))
        ));

        status
            .complete_phase(AgentRole::Pm, PhaseName::QuestionsGenerate, Confirmation::User)
            .unwrap();
        status
            .begin_phase(AgentRole::Pm, PhaseName::QuestionsAnswer)
            .unwrap();
        assert!(status
            .mark_user_reviewing(AgentRole::Pm, PhaseName::QuestionsAnswer)
            .unwrap());
        assert!(!status
            .mark_user_reviewing(AgentRole::Pm, PhaseName::QuestionsAnswer)
            .unwrap());
        assert_eq!(
            status.phase_status(AgentRole::Pm, PhaseName::QuestionsAnswer),
            PhaseStatus::UserReviewing
        );
    }

    #[test]
    fn test_record_cost() {
        let mut status = ProjectStatus::new("001");
        status.record_cost(AgentRole::Pm, 0.25).unwrap();
        status.record_cost(AgentRole::Ux, 0.5).unwrap();
        status.record_cost(AgentRole::Pm, 0.25).unwrap();

        let tracking = status.cost_tracking.as_ref().unwrap();
        assert_eq!(tracking.total_usd, 1.0);
        assert_eq!(tracking.by_agent[&AgentRole::Pm], 0.5);

        assert!(status.record_cost(AgentRole::Pm, -1.0).is_err());
        assert!(status.record_cost(AgentRole::Pm, f64::NAN).is_err());
    }

    #[test]
    fn test_json_shape() {
        let status = ProjectStatus::new("042");
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["projectId"], "042");
        assert_eq!(json["currentAgent"], "pm");
        assert_eq!(json["currentPhase"], "pm-questions-generate");
        assert_eq!(json["agents"]["ux"]["currentPhase"], "questions-generate");
        assert_eq!(
            json["agents"]["engineer"]["phases"]["spec-review"]["status"],
            "not-started"
        );
        assert!(json["history"].as_array().unwrap().is_empty());
    }
}
