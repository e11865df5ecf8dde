use specwright_core::workflow::{OUTPUTS_PREFIX, PROJECT_DIR_TOKEN};
use specwright_core::{build_prompt, get_workflow, Workflow, WorkflowError, WorkflowRegistry};

#[test]
fn test_catalog_names() {
    for name in [
        "scope",
        "playbook",
        "spec",
        "pm_analysis",
        "ux_analysis",
        "engineer_analysis",
        "breakdown",
    ] {
        assert!(get_workflow(name).is_some(), "{name}");
    }
    assert!(get_workflow("deploy").is_none());
}

#[test]
fn test_registry_matches_phase_catalog() {
    WorkflowRegistry::builtin().verify_against_catalog().unwrap();
}

#[test]
fn test_playbook_expands_to_leaves() {
    let registry = WorkflowRegistry::builtin();
    let names: Vec<_> = registry
        .expand("playbook")
        .unwrap()
        .iter()
        .map(|leaf| leaf.name)
        .collect();

    assert_eq!(names.first(), Some(&"scope"));
    assert_eq!(names.last(), Some(&"breakdown"));
    assert!(names.contains(&"ux_analysis"));
    assert!(matches!(get_workflow("playbook"), Some(Workflow::Composite(_))));
}

#[test]
fn test_pm_analysis_prompt() {
    let prompt = build_prompt("pm_analysis", "/proj/042", "Add OAuth login").unwrap();

    assert!(!prompt.context_files.is_empty());
    for file in &prompt.context_files {
        assert!(file.starts_with("/proj/042/"), "{file}");
        assert!(!file.contains(PROJECT_DIR_TOKEN));
    }
    assert!(prompt.prompt_text.starts_with('@'));
    assert!(prompt
        .prompt_text
        .contains("\nUSER REQUEST:\nAdd OAuth login\n"));
    assert!(prompt
        .prompt_text
        .contains("\nFILES TO EDIT:\n1. /proj/042/documents/prd.md\n"));
}

#[test]
fn test_prompt_is_deterministic() {
    let first = build_prompt("ux_analysis", "/proj/007", "Dark mode").unwrap();
    let second = build_prompt("ux_analysis", "/proj/007", "Dark mode").unwrap();
    assert_eq!(first.prompt_text, second.prompt_text);
}

#[test]
fn test_shared_outputs_not_resolved() {
    let prompt = build_prompt("scope", "/proj/_scoping", "A reading tracker").unwrap();
    let files = prompt.prompt_text.split("FILES TO EDIT:\n").nth(1).unwrap();
    assert!(files.starts_with(&format!("1. {OUTPUTS_PREFIX}")));
}

#[test]
fn test_composites_need_expansion() {
    let err = build_prompt("playbook", "/proj/042", "x").unwrap_err();
    assert!(matches!(err, WorkflowError::CompositeNotDirectlyComposable(_)));
    assert!(err.to_string().contains("cannot build a direct prompt"));
}
