//! Phase validation against on-disk evidence.
//!
//! The status record can drift from reality: a run crashed mid-write, a
//! document was edited by hand, or a file was removed. The validator checks
//! a claimed phase against the artifacts it requires and, when they are
//! missing, finds the latest phase the evidence still supports.
//!
//! Checks are existence-only. Document contents are never parsed.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog;
use crate::phase::ProjectPhase;
use crate::status::ProjectStatus;

/// Outcome of checking a claimed phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_phase: Option<ProjectPhase>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            reason: None,
            missing_files: Vec::new(),
            suggested_phase: None,
        }
    }
}

/// Checks `claimed` against the artifacts that must exist before it.
///
/// `exists` answers whether a project-relative artifact is on disk. When
/// something is missing, `suggested_phase` is the latest earlier phase whose
/// own requirements are all met.
pub fn validate_phase(claimed: ProjectPhase, exists: impl Fn(&str) -> bool) -> ValidationReport {
    let missing: Vec<String> = catalog::required_artifacts(claimed)
        .into_iter()
        .filter(|artifact| !exists(*artifact))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        return ValidationReport::valid();
    }

    let suggested = ProjectPhase::sequence()
        .into_iter()
        .filter(|phase| *phase < claimed)
        .rev()
        .find(|phase| {
            catalog::required_artifacts(*phase)
                .iter()
                .all(|artifact| exists(*artifact))
        })
        .unwrap_or_else(ProjectPhase::first);

    ValidationReport {
        is_valid: false,
        reason: Some(format!(
            "{claimed} requires {} which {} missing",
            missing.join(", "),
            if missing.len() == 1 { "is" } else { "are" }
        )),
        missing_files: missing,
        suggested_phase: Some(suggested),
    }
}

/// Validates the recorded phase and rewinds the status if evidence is missing.
///
/// Returns the report when a recovery was applied, None when the status was
/// already consistent (and left untouched).
pub fn recover(
    status: &mut ProjectStatus,
    exists: impl Fn(&str) -> bool,
) -> Option<ValidationReport> {
    let recorded = status.current_phase;
    let report = validate_phase(recorded, exists);
    let suggested = report.suggested_phase?;

    let note = format!(
        "recovered from {recorded} to {suggested}: missing {}",
        report.missing_files.join(", ")
    );
    info!(project = %status.project_id, from = %recorded, to = %suggested, "recovering phase");
    status.rewind_to(suggested, note);
    Some(report)
}
