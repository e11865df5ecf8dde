//! Default values for Specwright configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Record Defaults
// ============================================================================

/// Schema version written into every status record.
pub const STATUS_VERSION: &str = "1.0";

/// Assistant that receives composed prompts.
pub const DEFAULT_ASSISTANT: &str = "claude";

/// Validate and recover projects before resuming work on them.
pub const DEFAULT_AUTO_RECOVER: bool = true;

// ============================================================================
// Storage Defaults
// ============================================================================

/// Default root directory; project paths are resolved against it.
pub const DEFAULT_ROOT_DIR: &str = ".";

/// Default projects subdirectory.
pub const DEFAULT_PROJECTS_DIR: &str = "projects";

/// Per-project directory holding machine-managed records.
pub const DEFAULT_STATE_DIR: &str = ".specwright";

/// Default status record file name.
pub const DEFAULT_STATUS_FILE: &str = "status.json";

/// Default session record file name.
pub const DEFAULT_SESSIONS_FILE: &str = "sessions.json";

// ============================================================================
// Watch Defaults
// ============================================================================

/// How often to poll for a generated output (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// How long to wait for a generated output before giving up (seconds).
pub const DEFAULT_WATCH_TIMEOUT_SECS: u64 = 600;

// ============================================================================
// Logging Defaults
// ============================================================================

/// Default log filter when neither `--verbose` nor `RUST_LOG` is given.
pub const DEFAULT_LOG_LEVEL: &str = "warn";
