pub mod catalog;
pub mod config;
pub mod manager;
pub mod phase;
pub mod session;
pub mod status;
pub mod storage;
pub mod validator;
pub mod workflow;

pub use config::Config;
pub use manager::{ManagerError, PhasePrompt, ProjectManager, RecoveryOutcome};
pub use phase::{AgentPhase, AgentRole, CurrentAgent, PhaseName, PhaseStatus, ProjectPhase};
pub use session::{SessionKey, SessionStore, SCOPING_PROJECT_ID};
pub use status::{Confirmation, ProjectStatus, ProjectSummary, TransitionError};
pub use storage::{FileAccess, FileStorage, Storage, StorageError};
pub use validator::ValidationReport;
pub use workflow::{build_prompt, get_workflow, ComposedPrompt, Workflow, WorkflowError, WorkflowRegistry};
