//! Assistant conversation continuity.
//!
//! Each agent's phases (ask questions, then write the document) run as one
//! conversation with the external assistant. The store remembers the opaque
//! session id per agent so a later phase can resume it. Sessions live beside
//! the status record but have their own lifecycle: clearing one never
//! touches the other.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::phase::{AgentRole, PhaseParseError};
use crate::storage::{Storage, StorageError};

/// Project id reserved for the scoping conversation, which runs before any
/// project exists.
pub const SCOPING_PROJECT_ID: &str = "_scoping";

/// Key of a session within a project's record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKey {
    Pm,
    Ux,
    Engineer,
    Scoping,
}

impl SessionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::Pm => "pm",
            SessionKey::Ux => "ux",
            SessionKey::Engineer => "engineer",
            SessionKey::Scoping => "scoping",
        }
    }
}

impl From<AgentRole> for SessionKey {
    fn from(agent: AgentRole) -> Self {
        match agent {
            AgentRole::Pm => SessionKey::Pm,
            AgentRole::Ux => SessionKey::Ux,
            AgentRole::Engineer => SessionKey::Engineer,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKey {
    type Err = PhaseParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "scoping" {
            return Ok(SessionKey::Scoping);
        }
        s.parse::<AgentRole>().map(SessionKey::from)
    }
}

/// The persisted session ids of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub project_id: String,
    #[serde(default)]
    pub sessions: BTreeMap<SessionKey, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            sessions: BTreeMap::new(),
            updated_at: None,
        }
    }
}

/// Reads and writes session ids through a [`Storage`] backend.
///
/// Every call loads the record fresh; saves are last-write-wins per key.
pub struct SessionStore<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> SessionStore<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Loads a project's record, or an empty one if none was saved.
    ///
    /// A record that exists but cannot be parsed is an error.
    pub fn record(&self, project_id: &str) -> Result<SessionRecord, StorageError> {
        Ok(self
            .storage
            .load_sessions(project_id)?
            .unwrap_or_else(|| SessionRecord::new(project_id)))
    }

    pub fn get_agent_session(
        &self,
        project_id: &str,
        key: impl Into<SessionKey>,
    ) -> Result<Option<String>, StorageError> {
        let key = key.into();
        Ok(self.record(project_id)?.sessions.remove(&key))
    }

    pub fn save_agent_session(
        &self,
        project_id: &str,
        key: impl Into<SessionKey>,
        session_id: impl Into<String>,
    ) -> Result<(), StorageError> {
        let key = key.into();
        let mut record = self.record(project_id)?;
        record.sessions.insert(key, session_id.into());
        record.updated_at = Some(Utc::now());
        self.storage.save_sessions(&record)?;
        debug!(project = project_id, %key, "session saved");
        Ok(())
    }

    /// Forgets one session. Returns false if there was nothing to clear.
    pub fn clear_agent_session(
        &self,
        project_id: &str,
        key: impl Into<SessionKey>,
    ) -> Result<bool, StorageError> {
        let key = key.into();
        let mut record = self.record(project_id)?;
        if record.sessions.remove(&key).is_none() {
            return Ok(false);
        }
        record.updated_at = Some(Utc::now());
        self.storage.save_sessions(&record)?;
        debug!(project = project_id, %key, "session cleared");
        Ok(true)
    }

    pub fn clear_all_sessions(&self, project_id: &str) -> Result<(), StorageError> {
        let mut record = self.record(project_id)?;
        record.sessions.clear();
        record.updated_at = Some(Utc::now());
        self.storage.save_sessions(&record)?;
        debug!(project = project_id, "all sessions cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parsing() {
        assert_eq!("ux".parse::<SessionKey>().unwrap(), SessionKey::Ux);
        assert_eq!("scoping".parse::<SessionKey>().unwrap(), SessionKey::Scoping);
        assert!("designer".parse::<SessionKey>().is_err());
        assert_eq!(SessionKey::from(AgentRole::Engineer).to_string(), "engineer");
    }

    #[test]
    fn test_record_json_shape() {
        let mut record = SessionRecord::new("042");
        record.sessions.insert(SessionKey::Pm, "sess-1".to_string());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["projectId"], "042");
        assert_eq!(json["sessions"]["pm"], "sess-1");
        assert!(json.get("updatedAt").is_none());
    }
}
