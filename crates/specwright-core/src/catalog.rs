//! Phase catalog shared by the state machine, the validator and the
//! workflow registry.
//!
//! Every `*-generate` phase produces exactly one artifact and is driven by
//! one leaf workflow. Human phases produce nothing on disk. The artifacts a
//! phase requires are the outputs of every generate phase before it.

use crate::phase::{AgentPhase, AgentRole, PhaseKind, ProjectPhase};

/// Questions file written by a role's `questions-generate` phase.
pub fn questions_file(agent: AgentRole) -> &'static str {
    match agent {
        AgentRole::Pm => "questions/pm_questions.json",
        AgentRole::Ux => "questions/ux_questions.json",
        AgentRole::Engineer => "questions/engineer_questions.json",
    }
}

/// Document written by a role's document generate phase.
pub fn document_file(agent: AgentRole) -> &'static str {
    match agent {
        AgentRole::Pm => "documents/prd.md",
        AgentRole::Ux => "documents/design-brief.md",
        AgentRole::Engineer => "documents/spec.md",
    }
}

/// The artifact a phase produces, relative to the project directory.
pub fn produced_artifact(phase: AgentPhase) -> Option<&'static str> {
    match phase.phase().kind() {
        PhaseKind::QuestionsGenerate => Some(questions_file(phase.agent())),
        PhaseKind::DocumentGenerate => Some(document_file(phase.agent())),
        PhaseKind::QuestionsAnswer | PhaseKind::DocumentReview => None,
    }
}

/// The leaf workflow that drives a phase. Human phases have none.
pub fn workflow_for(phase: AgentPhase) -> Option<&'static str> {
    match (phase.agent(), phase.phase().kind()) {
        (AgentRole::Pm, PhaseKind::QuestionsGenerate) => Some("pm_questions"),
        (AgentRole::Pm, PhaseKind::DocumentGenerate) => Some("pm_analysis"),
        (AgentRole::Ux, PhaseKind::QuestionsGenerate) => Some("ux_questions"),
        (AgentRole::Ux, PhaseKind::DocumentGenerate) => Some("ux_analysis"),
        (AgentRole::Engineer, PhaseKind::QuestionsGenerate) => Some("engineer_questions"),
        (AgentRole::Engineer, PhaseKind::DocumentGenerate) => Some("engineer_analysis"),
        (_, PhaseKind::QuestionsAnswer | PhaseKind::DocumentReview) => None,
    }
}

/// Artifacts that must exist on disk for `phase` to be the current phase.
pub fn required_artifacts(phase: ProjectPhase) -> Vec<&'static str> {
    ProjectPhase::sequence()
        .into_iter()
        .take_while(|p| *p < phase)
        .filter_map(|p| match p {
            ProjectPhase::At(p) => produced_artifact(p),
            ProjectPhase::Complete => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::PhaseName;

    fn at(agent: AgentRole, phase: PhaseName) -> ProjectPhase {
        AgentPhase::new(agent, phase).unwrap().into()
    }

    #[test]
    fn test_first_phase_requires_nothing() {
        assert!(required_artifacts(ProjectPhase::first()).is_empty());
    }

    #[test]
    fn test_review_requires_document_and_questions() {
        let required = required_artifacts(at(AgentRole::Pm, PhaseName::PrdReview));
        assert_eq!(
            required,
            vec!["questions/pm_questions.json", "documents/prd.md"]
        );
    }

    #[test]
    fn test_later_agents_require_earlier_documents() {
        let required = required_artifacts(at(AgentRole::Ux, PhaseName::QuestionsGenerate));
        assert!(required.contains(&"documents/prd.md"));
        assert!(!required.contains(&"questions/ux_questions.json"));

        let all = required_artifacts(ProjectPhase::Complete);
        assert_eq!(all.len(), 6);
        assert!(all.contains(&"documents/spec.md"));
    }

    #[test]
    fn test_human_phases_have_no_workflow() {
        for phase in ProjectPhase::sequence() {
            if let ProjectPhase::At(p) = phase {
                assert_eq!(
                    workflow_for(p).is_some(),
                    p.phase().is_generate(),
                    "{phase}"
                );
                assert_eq!(produced_artifact(p).is_some(), p.phase().is_generate());
            }
        }
    }
}
