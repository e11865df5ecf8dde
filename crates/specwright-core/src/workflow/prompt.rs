use std::path::Path;

use super::{LeafWorkflow, WorkflowError, WorkflowRegistry};

/// Token replaced by the project directory in context-file paths.
pub const PROJECT_DIR_TOKEN: &str = "{{PROJECT_DIR}}";

/// Outputs under this prefix are shared across projects and kept as declared.
pub const OUTPUTS_PREFIX: &str = "specwright/outputs/";

/// Literal text to hand to the assistant, plus what went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub prompt_text: String,
    /// Context files with `{{PROJECT_DIR}}` resolved.
    pub context_files: Vec<String>,
    pub workflow: &'static LeafWorkflow,
}

/// Builds a prompt from a built-in leaf workflow.
///
/// Composite workflows are rejected; expand them first and build one prompt
/// per leaf.
pub fn build_prompt(
    workflow_name: &str,
    project_dir: &str,
    user_request: &str,
) -> Result<ComposedPrompt, WorkflowError> {
    WorkflowRegistry::builtin().build_prompt(workflow_name, project_dir, user_request)
}

pub(super) fn compose(
    workflow: &'static LeafWorkflow,
    project_dir: &str,
    user_request: &str,
) -> ComposedPrompt {
    let context_files: Vec<String> = workflow
        .context_files
        .iter()
        .map(|path| path.replace(PROJECT_DIR_TOKEN, project_dir))
        .collect();

    let mut prompt_text = format!("@{}\n", workflow.template);
    for file in &context_files {
        prompt_text.push_str(&format!("@{file}\n"));
    }
    prompt_text.push_str(&format!("\nUSER REQUEST:\n{user_request}\n"));

    if !workflow.outputs.is_empty() {
        prompt_text.push_str("\nFILES TO EDIT:\n");
        for (i, output) in workflow.outputs.iter().enumerate() {
            prompt_text.push_str(&format!("{}. {}\n", i + 1, resolve_output(project_dir, output)));
        }
    }

    ComposedPrompt {
        prompt_text,
        context_files,
        workflow,
    }
}

fn resolve_output(project_dir: &str, output: &str) -> String {
    if output.starts_with(OUTPUTS_PREFIX) {
        output.to_string()
    } else {
        Path::new(project_dir).join(output).display().to_string()
    }
}
