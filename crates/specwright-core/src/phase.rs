use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the three specification roles.
///
/// Roles are processed in a fixed order:
/// Product Manager → Designer → Engineer → Complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Product Manager, writes the PRD
    Pm,
    /// Designer, writes the design brief
    Ux,
    /// Engineer, writes the technical spec
    Engineer,
}

impl AgentRole {
    /// All roles in processing order.
    pub const ALL: [AgentRole; 3] = [AgentRole::Pm, AgentRole::Ux, AgentRole::Engineer];

    /// Returns the role that follows this one, or None after the engineer.
    pub fn next(&self) -> Option<AgentRole> {
        match self {
            AgentRole::Pm => Some(AgentRole::Ux),
            AgentRole::Ux => Some(AgentRole::Engineer),
            AgentRole::Engineer => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Pm => "pm",
            AgentRole::Ux => "ux",
            AgentRole::Engineer => "engineer",
        }
    }

    /// Returns a human-readable name for the role.
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentRole::Pm => "Product Manager",
            AgentRole::Ux => "Designer",
            AgentRole::Engineer => "Engineer",
        }
    }

    /// Short name of the document this role produces.
    pub fn document(&self) -> &'static str {
        match self {
            AgentRole::Pm => "prd",
            AgentRole::Ux => "design-brief",
            AgentRole::Engineer => "spec",
        }
    }

    /// The role's four phases, in the only order they may run.
    pub fn phases(&self) -> [PhaseName; 4] {
        match self {
            AgentRole::Pm => [
                PhaseName::QuestionsGenerate,
                PhaseName::QuestionsAnswer,
                PhaseName::PrdGenerate,
                PhaseName::PrdReview,
            ],
            AgentRole::Ux => [
                PhaseName::QuestionsGenerate,
                PhaseName::QuestionsAnswer,
                PhaseName::DesignBriefGenerate,
                PhaseName::DesignBriefReview,
            ],
            AgentRole::Engineer => [
                PhaseName::QuestionsGenerate,
                PhaseName::QuestionsAnswer,
                PhaseName::SpecGenerate,
                PhaseName::SpecReview,
            ],
        }
    }

    /// The phase every role starts with.
    pub fn first_phase(&self) -> AgentPhase {
        AgentPhase {
            agent: *self,
            phase: self.phases()[0],
        }
    }

    /// Returns true if `phase` is part of this role's sequence.
    pub fn owns(&self, phase: PhaseName) -> bool {
        self.phases().contains(&phase)
    }

    fn index(&self) -> usize {
        match self {
            AgentRole::Pm => 0,
            AgentRole::Ux => 1,
            AgentRole::Engineer => 2,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = PhaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pm" => Ok(AgentRole::Pm),
            "ux" => Ok(AgentRole::Ux),
            "engineer" => Ok(AgentRole::Engineer),
            other => Err(PhaseParseError::UnknownAgent(other.to_string())),
        }
    }
}

/// The position of a phase inside a role's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PhaseKind {
    QuestionsGenerate,
    QuestionsAnswer,
    DocumentGenerate,
    DocumentReview,
}

impl PhaseKind {
    fn index(&self) -> usize {
        match self {
            PhaseKind::QuestionsGenerate => 0,
            PhaseKind::QuestionsAnswer => 1,
            PhaseKind::DocumentGenerate => 2,
            PhaseKind::DocumentReview => 3,
        }
    }
}

/// A symbolic phase name as it appears in the status record.
///
/// The questions phases are shared by every role; the document phases are
/// specific to the role that owns the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseName {
    QuestionsGenerate,
    QuestionsAnswer,
    PrdGenerate,
    PrdReview,
    DesignBriefGenerate,
    DesignBriefReview,
    SpecGenerate,
    SpecReview,
}

impl PhaseName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::QuestionsGenerate => "questions-generate",
            PhaseName::QuestionsAnswer => "questions-answer",
            PhaseName::PrdGenerate => "prd-generate",
            PhaseName::PrdReview => "prd-review",
            PhaseName::DesignBriefGenerate => "design-brief-generate",
            PhaseName::DesignBriefReview => "design-brief-review",
            PhaseName::SpecGenerate => "spec-generate",
            PhaseName::SpecReview => "spec-review",
        }
    }

    pub fn kind(&self) -> PhaseKind {
        match self {
            PhaseName::QuestionsGenerate => PhaseKind::QuestionsGenerate,
            PhaseName::QuestionsAnswer => PhaseKind::QuestionsAnswer,
            PhaseName::PrdGenerate | PhaseName::DesignBriefGenerate | PhaseName::SpecGenerate => {
                PhaseKind::DocumentGenerate
            }
            PhaseName::PrdReview | PhaseName::DesignBriefReview | PhaseName::SpecReview => {
                PhaseKind::DocumentReview
            }
        }
    }

    /// Phases that need a human; they never complete without explicit confirmation.
    pub fn requires_user(&self) -> bool {
        matches!(
            self.kind(),
            PhaseKind::QuestionsAnswer | PhaseKind::DocumentReview
        )
    }

    /// Phases whose completion is evidenced by the assistant writing a file.
    pub fn is_generate(&self) -> bool {
        !self.requires_user()
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseName {
    type Err = PhaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "questions-generate" => Ok(PhaseName::QuestionsGenerate),
            "questions-answer" => Ok(PhaseName::QuestionsAnswer),
            "prd-generate" => Ok(PhaseName::PrdGenerate),
            "prd-review" => Ok(PhaseName::PrdReview),
            "design-brief-generate" => Ok(PhaseName::DesignBriefGenerate),
            "design-brief-review" => Ok(PhaseName::DesignBriefReview),
            "spec-generate" => Ok(PhaseName::SpecGenerate),
            "spec-review" => Ok(PhaseName::SpecReview),
            other => Err(PhaseParseError::UnknownPhase(other.to_string())),
        }
    }
}

/// Status of a single phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseStatus {
    #[default]
    NotStarted,
    AiWorking,
    AwaitingUser,
    UserReviewing,
    Complete,
}

impl PhaseStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, PhaseStatus::Complete)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PhaseStatus::NotStarted => "Not started",
            PhaseStatus::AiWorking => "AI working",
            PhaseStatus::AwaitingUser => "Awaiting user",
            PhaseStatus::UserReviewing => "User reviewing",
            PhaseStatus::Complete => "Complete",
        }
    }
}

/// A phase bound to the role that owns it.
///
/// Can only be constructed for pairs where the role owns the phase, so an
/// illegal combination such as `pm-spec-review` never exists at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentPhase {
    agent: AgentRole,
    phase: PhaseName,
}

impl AgentPhase {
    pub fn new(agent: AgentRole, phase: PhaseName) -> Result<Self, PhaseParseError> {
        if !agent.owns(phase) {
            return Err(PhaseParseError::PhaseNotOwned { agent, phase });
        }
        Ok(Self { agent, phase })
    }

    pub fn agent(&self) -> AgentRole {
        self.agent
    }

    pub fn phase(&self) -> PhaseName {
        self.phase
    }

    fn ordinal(&self) -> usize {
        self.agent.index() * 4 + self.phase.kind().index()
    }
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.agent, self.phase)
    }
}

impl FromStr for AgentPhase {
    type Err = PhaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<ProjectPhase>()? {
            ProjectPhase::At(phase) => Ok(phase),
            ProjectPhase::Complete => Err(PhaseParseError::UnknownPhase(s.to_string())),
        }
    }
}

/// Global position of a project: a role's phase, or complete.
///
/// Serialized as `"<agent>-<phase>"` (e.g. `pm-prd-review`) or `"complete"`.
/// Ordered by the fixed processing order across all roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProjectPhase {
    At(AgentPhase),
    Complete,
}

impl ProjectPhase {
    /// The first phase of a new project.
    pub fn first() -> Self {
        ProjectPhase::At(AgentRole::Pm.first_phase())
    }

    /// Every position in order, ending with `Complete`.
    pub fn sequence() -> Vec<ProjectPhase> {
        AgentRole::ALL
            .iter()
            .flat_map(|agent| {
                agent
                    .phases()
                    .into_iter()
                    .map(move |phase| ProjectPhase::At(AgentPhase { agent: *agent, phase }))
            })
            .chain(std::iter::once(ProjectPhase::Complete))
            .collect()
    }

    pub fn agent(&self) -> Option<AgentRole> {
        match self {
            ProjectPhase::At(p) => Some(p.agent),
            ProjectPhase::Complete => None,
        }
    }

    pub fn phase(&self) -> Option<PhaseName> {
        match self {
            ProjectPhase::At(p) => Some(p.phase),
            ProjectPhase::Complete => None,
        }
    }

    fn ordinal(&self) -> usize {
        match self {
            ProjectPhase::At(p) => p.ordinal(),
            ProjectPhase::Complete => AgentRole::ALL.len() * 4,
        }
    }
}

impl From<AgentPhase> for ProjectPhase {
    fn from(phase: AgentPhase) -> Self {
        ProjectPhase::At(phase)
    }
}

impl PartialOrd for ProjectPhase {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProjectPhase {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal().cmp(&other.ordinal())
    }
}

impl fmt::Display for ProjectPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectPhase::At(p) => write!(f, "{p}"),
            ProjectPhase::Complete => f.write_str("complete"),
        }
    }
}

impl FromStr for ProjectPhase {
    type Err = PhaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "complete" {
            return Ok(ProjectPhase::Complete);
        }
        let (agent, phase) = s
            .split_once('-')
            .ok_or_else(|| PhaseParseError::UnknownPhase(s.to_string()))?;
        let agent: AgentRole = agent.parse()?;
        let phase: PhaseName = phase.parse()?;
        Ok(ProjectPhase::At(AgentPhase::new(agent, phase)?))
    }
}

impl TryFrom<String> for ProjectPhase {
    type Error = PhaseParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectPhase> for String {
    fn from(phase: ProjectPhase) -> Self {
        phase.to_string()
    }
}

/// The role currently being processed, or complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CurrentAgent {
    Agent(AgentRole),
    Complete,
}

impl fmt::Display for CurrentAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentAgent::Agent(agent) => f.write_str(agent.as_str()),
            CurrentAgent::Complete => f.write_str("complete"),
        }
    }
}

impl TryFrom<String> for CurrentAgent {
    type Error = PhaseParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "complete" {
            Ok(CurrentAgent::Complete)
        } else {
            Ok(CurrentAgent::Agent(value.parse()?))
        }
    }
}

impl From<CurrentAgent> for String {
    fn from(agent: CurrentAgent) -> Self {
        agent.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseParseError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    #[error("Phase {phase} does not belong to agent {agent}")]
    PhaseNotOwned { agent: AgentRole, phase: PhaseName },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_progression() {
        assert_eq!(AgentRole::Pm.next(), Some(AgentRole::Ux));
        assert_eq!(AgentRole::Ux.next(), Some(AgentRole::Engineer));
        assert_eq!(AgentRole::Engineer.next(), None);
    }

    #[test]
    fn test_phase_string_roundtrip() {
        for phase in ProjectPhase::sequence() {
            let parsed: ProjectPhase = phase.to_string().parse().unwrap();
            assert_eq!(parsed, phase);
        }
    }

    #[test]
    fn test_phase_not_owned() {
        let err = "pm-spec-review".parse::<ProjectPhase>().unwrap_err();
        assert_eq!(
            err,
            PhaseParseError::PhaseNotOwned {
                agent: AgentRole::Pm,
                phase: PhaseName::SpecReview
            }
        );
        assert!(AgentPhase::new(AgentRole::Ux, PhaseName::PrdGenerate).is_err());
    }

    #[test]
    fn test_sequence_is_sorted() {
        let sequence = ProjectPhase::sequence();
        assert_eq!(sequence.len(), 13);
        assert_eq!(sequence[0], ProjectPhase::first());
        assert!(sequence.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(sequence.last(), Some(&ProjectPhase::Complete));
    }

    #[test]
    fn test_human_phases() {
        assert!(PhaseName::QuestionsAnswer.requires_user());
        assert!(PhaseName::DesignBriefReview.requires_user());
        assert!(PhaseName::QuestionsGenerate.is_generate());
        assert!(PhaseName::SpecGenerate.is_generate());
    }
}
