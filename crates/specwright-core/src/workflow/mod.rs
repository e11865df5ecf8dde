//! Workflow registry.
//!
//! A static catalog of named workflows. Leaf workflows carry everything the
//! prompt composer needs; composite workflows list leaf names in the order a
//! caller should drive them, one phase at a time.

mod prompt;

pub use prompt::{build_prompt, ComposedPrompt, OUTPUTS_PREFIX, PROJECT_DIR_TOKEN};

use serde::Serialize;
use thiserror::Error;

use crate::catalog;
use crate::phase::{AgentRole, ProjectPhase};

/// A single-phase workflow with a concrete template, context and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafWorkflow {
    pub name: &'static str,
    pub agent: AgentRole,
    /// Instructions handed to the assistant.
    pub template: &'static str,
    /// Project-relative artifacts the workflow reads.
    pub inputs: &'static [&'static str],
    /// Files the assistant is expected to write.
    pub outputs: &'static [&'static str],
    /// Files referenced in the prompt; may contain `{{PROJECT_DIR}}`.
    pub context_files: &'static [&'static str],
    #[serde(skip_serializing_if = "no_output_templates")]
    pub output_templates: &'static [OutputTemplate],
}

fn no_output_templates(templates: &&'static [OutputTemplate]) -> bool {
    templates.is_empty()
}

/// Skeleton the assistant should follow when writing an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputTemplate {
    pub output: &'static str,
    pub template: &'static str,
}

/// An ordered list of leaf workflow names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositeWorkflow {
    pub name: &'static str,
    pub phases: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Workflow {
    Leaf(LeafWorkflow),
    Composite(CompositeWorkflow),
}

impl Workflow {
    pub fn name(&self) -> &'static str {
        match self {
            Workflow::Leaf(w) => w.name,
            Workflow::Composite(w) => w.name,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafWorkflow> {
        match self {
            Workflow::Leaf(w) => Some(w),
            Workflow::Composite(_) => None,
        }
    }
}

/// Errors from workflow lookup and prompt composition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("Workflow {0} has multiple phases; cannot build a direct prompt")]
    CompositeNotDirectlyComposable(String),

    #[error("Workflow catalog is inconsistent: {0}")]
    CatalogMismatch(String),
}

/// Immutable, process-wide workflow catalog.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowRegistry {
    workflows: &'static [Workflow],
}

impl WorkflowRegistry {
    /// The built-in catalog.
    pub const fn builtin() -> Self {
        Self {
            workflows: BUILTIN_WORKFLOWS,
        }
    }

    /// Looks up a workflow by name.
    pub fn get(&self, name: &str) -> Option<&'static Workflow> {
        self.workflows.iter().find(|w| w.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.workflows.iter().map(|w| w.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Workflow> {
        self.workflows.iter()
    }

    /// Returns the leaf workflows a name stands for, in order.
    ///
    /// A leaf expands to itself.
    pub fn expand(&self, name: &str) -> Result<Vec<&'static LeafWorkflow>, WorkflowError> {
        match self.get(name) {
            None => Err(WorkflowError::UnknownWorkflow(name.to_string())),
            Some(Workflow::Leaf(leaf)) => Ok(vec![leaf]),
            Some(Workflow::Composite(composite)) => composite
                .phases
                .iter()
                .map(|phase| match self.get(phase) {
                    Some(Workflow::Leaf(leaf)) => Ok(leaf),
                    Some(Workflow::Composite(_)) => Err(WorkflowError::CatalogMismatch(format!(
                        "{} references composite {phase}",
                        composite.name
                    ))),
                    None => Err(WorkflowError::UnknownWorkflow(phase.to_string())),
                })
                .collect(),
        }
    }

    /// Checks that the registry and the phase catalog agree.
    ///
    /// Every generate phase must map to a leaf workflow of the same agent
    /// that declares the phase's artifact as an output and reads only
    /// artifacts the phase requires. Every composite must expand.
    pub fn verify_against_catalog(&self) -> Result<(), WorkflowError> {
        for phase in ProjectPhase::sequence() {
            let ProjectPhase::At(agent_phase) = phase else {
                continue;
            };
            let Some(name) = catalog::workflow_for(agent_phase) else {
                continue;
            };
            let leaf = self
                .get(name)
                .ok_or_else(|| WorkflowError::UnknownWorkflow(name.to_string()))?
                .as_leaf()
                .ok_or_else(|| {
                    WorkflowError::CatalogMismatch(format!("{phase} is driven by composite {name}"))
                })?;

            if leaf.agent != agent_phase.agent() {
                return Err(WorkflowError::CatalogMismatch(format!(
                    "{name} belongs to {} but drives {phase}",
                    leaf.agent
                )));
            }

            if let Some(artifact) = catalog::produced_artifact(agent_phase) {
                if !leaf.outputs.contains(&artifact) {
                    return Err(WorkflowError::CatalogMismatch(format!(
                        "{name} does not output {artifact}"
                    )));
                }
            }

            let required = catalog::required_artifacts(phase);
            if let Some(input) = leaf.inputs.iter().find(|i| !required.contains(*i)) {
                return Err(WorkflowError::CatalogMismatch(format!(
                    "{name} reads {input}, which {phase} does not require"
                )));
            }
        }

        for workflow in self.workflows {
            if let Workflow::Composite(composite) = workflow {
                self.expand(composite.name)?;
            }
        }

        Ok(())
    }

    /// Builds a prompt from one of this registry's leaf workflows.
    pub fn build_prompt(
        &self,
        workflow_name: &str,
        project_dir: &str,
        user_request: &str,
    ) -> Result<ComposedPrompt, WorkflowError> {
        let workflow = match self.get(workflow_name) {
            None => return Err(WorkflowError::UnknownWorkflow(workflow_name.to_string())),
            Some(Workflow::Composite(_)) => {
                return Err(WorkflowError::CompositeNotDirectlyComposable(
                    workflow_name.to_string(),
                ))
            }
            Some(Workflow::Leaf(leaf)) => leaf,
        };
        Ok(prompt::compose(workflow, project_dir, user_request))
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Looks up a workflow in the built-in catalog.
pub fn get_workflow(name: &str) -> Option<&'static Workflow> {
    WorkflowRegistry::builtin().get(name)
}

const BRIEF: &str = "{{PROJECT_DIR}}/brief.md";
const PM_QUESTIONS: &str = "{{PROJECT_DIR}}/questions/pm_questions.json";
const UX_QUESTIONS: &str = "{{PROJECT_DIR}}/questions/ux_questions.json";
const ENGINEER_QUESTIONS: &str = "{{PROJECT_DIR}}/questions/engineer_questions.json";
const PRD: &str = "{{PROJECT_DIR}}/documents/prd.md";
const DESIGN_BRIEF: &str = "{{PROJECT_DIR}}/documents/design-brief.md";
const SPEC: &str = "{{PROJECT_DIR}}/documents/spec.md";

const QUESTIONS_TEMPLATE: &str = "specwright/templates/questions.json";

const BUILTIN_WORKFLOWS: &[Workflow] = &[
    Workflow::Leaf(LeafWorkflow {
        name: "scope",
        agent: AgentRole::Pm,
        template: "specwright/templates/scope.md",
        inputs: &[],
        outputs: &["specwright/outputs/scope.md"],
        context_files: &[BRIEF],
        output_templates: &[],
    }),
    Workflow::Leaf(LeafWorkflow {
        name: "pm_questions",
        agent: AgentRole::Pm,
        template: "specwright/templates/pm-questions.md",
        inputs: &[],
        outputs: &["questions/pm_questions.json"],
        context_files: &[BRIEF],
        output_templates: &[OutputTemplate {
            output: "questions/pm_questions.json",
            template: QUESTIONS_TEMPLATE,
        }],
    }),
    Workflow::Leaf(LeafWorkflow {
        name: "pm_analysis",
        agent: AgentRole::Pm,
        template: "specwright/templates/pm-analysis.md",
        inputs: &["questions/pm_questions.json"],
        outputs: &["documents/prd.md"],
        context_files: &[BRIEF, PM_QUESTIONS],
        output_templates: &[OutputTemplate {
            output: "documents/prd.md",
            template: "specwright/templates/documents/prd.md",
        }],
    }),
    Workflow::Leaf(LeafWorkflow {
        name: "ux_questions",
        agent: AgentRole::Ux,
        template: "specwright/templates/ux-questions.md",
        inputs: &["documents/prd.md"],
        outputs: &["questions/ux_questions.json"],
        context_files: &[BRIEF, PRD],
        output_templates: &[OutputTemplate {
            output: "questions/ux_questions.json",
            template: QUESTIONS_TEMPLATE,
        }],
    }),
    Workflow::Leaf(LeafWorkflow {
        name: "ux_analysis",
        agent: AgentRole::Ux,
        template: "specwright/templates/ux-analysis.md",
        inputs: &["documents/prd.md", "questions/ux_questions.json"],
        outputs: &["documents/design-brief.md"],
        context_files: &[PRD, UX_QUESTIONS],
        output_templates: &[OutputTemplate {
            output: "documents/design-brief.md",
            template: "specwright/templates/documents/design-brief.md",
        }],
    }),
    Workflow::Leaf(LeafWorkflow {
        name: "engineer_questions",
        agent: AgentRole::Engineer,
        template: "specwright/templates/engineer-questions.md",
        inputs: &["documents/prd.md", "documents/design-brief.md"],
        outputs: &["questions/engineer_questions.json"],
        context_files: &[PRD, DESIGN_BRIEF],
        output_templates: &[OutputTemplate {
            output: "questions/engineer_questions.json",
            template: QUESTIONS_TEMPLATE,
        }],
    }),
    Workflow::Leaf(LeafWorkflow {
        name: "engineer_analysis",
        agent: AgentRole::Engineer,
        template: "specwright/templates/engineer-analysis.md",
        inputs: &[
            "documents/prd.md",
            "documents/design-brief.md",
            "questions/engineer_questions.json",
        ],
        outputs: &["documents/spec.md"],
        context_files: &[PRD, DESIGN_BRIEF, ENGINEER_QUESTIONS],
        output_templates: &[OutputTemplate {
            output: "documents/spec.md",
            template: "specwright/templates/documents/spec.md",
        }],
    }),
    Workflow::Leaf(LeafWorkflow {
        name: "breakdown",
        agent: AgentRole::Engineer,
        template: "specwright/templates/breakdown.md",
        inputs: &["documents/spec.md"],
        outputs: &["documents/tasks.md"],
        context_files: &[SPEC],
        output_templates: &[],
    }),
    Workflow::Composite(CompositeWorkflow {
        name: "spec",
        phases: &[
            "pm_questions",
            "pm_analysis",
            "ux_questions",
            "ux_analysis",
            "engineer_questions",
            "engineer_analysis",
        ],
    }),
    Workflow::Composite(CompositeWorkflow {
        name: "playbook",
        phases: &[
            "scope",
            "pm_questions",
            "pm_analysis",
            "ux_questions",
            "ux_analysis",
            "engineer_questions",
            "engineer_analysis",
            "breakdown",
        ],
    }),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_consistent() {
        WorkflowRegistry::builtin().verify_against_catalog().unwrap();
    }

    #[test]
    fn test_required_names_present() {
        for name in [
            "scope",
            "playbook",
            "spec",
            "pm_analysis",
            "ux_analysis",
            "engineer_analysis",
            "breakdown",
        ] {
            assert!(get_workflow(name).is_some(), "missing {name}");
        }
        assert!(get_workflow("nope").is_none());
    }

    #[test]
    fn test_expand_composite() {
        let registry = WorkflowRegistry::builtin();
        let leaves = registry.expand("spec").unwrap();
        let names: Vec<_> = leaves.iter().map(|l| l.name).collect();
        assert_eq!(names.first(), Some(&"pm_questions"));
        assert_eq!(names.last(), Some(&"engineer_analysis"));
        assert_eq!(names.len(), 6);

        assert_eq!(registry.expand("breakdown").unwrap()[0].name, "breakdown");
        assert!(matches!(
            registry.expand("missing"),
            Err(WorkflowError::UnknownWorkflow(_))
        ));
    }

    #[test]
    fn test_mismatched_catalog_detected() {
        static BROKEN: &[Workflow] = &[Workflow::Leaf(LeafWorkflow {
            name: "pm_questions",
            agent: AgentRole::Ux,
            template: "t.md",
            inputs: &[],
            outputs: &["questions/pm_questions.json"],
            context_files: &[],
            output_templates: &[],
        })];
        let registry = WorkflowRegistry { workflows: BROKEN };
        assert!(matches!(
            registry.verify_against_catalog(),
            Err(WorkflowError::CatalogMismatch(_))
        ));
    }
}
