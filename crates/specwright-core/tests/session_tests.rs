use specwright_core::config::StorageConfig;
use specwright_core::{AgentRole, FileStorage, SessionKey, SessionStore, StorageError, SCOPING_PROJECT_ID};
use tempfile::TempDir;

fn create_test_storage() -> (FileStorage, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileStorage::with_config(StorageConfig::rooted(temp_dir.path()));
    (storage, temp_dir)
}

#[test]
fn test_save_then_get() {
    let (storage, _temp) = create_test_storage();
    let sessions = SessionStore::new(&storage);

    sessions
        .save_agent_session("042", AgentRole::Pm, "sess-7f3a")
        .unwrap();

    assert_eq!(
        sessions.get_agent_session("042", AgentRole::Pm).unwrap(),
        Some("sess-7f3a".to_string())
    );
    assert_eq!(sessions.get_agent_session("042", AgentRole::Ux).unwrap(), None);
}

#[test]
fn test_sessions_persist_across_stores() {
    let (storage, temp) = create_test_storage();
    SessionStore::new(&storage)
        .save_agent_session("042", AgentRole::Engineer, "eng-1")
        .unwrap();

    let reopened = FileStorage::with_config(StorageConfig::rooted(temp.path()));
    assert_eq!(
        SessionStore::new(&reopened)
            .get_agent_session("042", AgentRole::Engineer)
            .unwrap(),
        Some("eng-1".to_string())
    );
}

#[test]
fn test_last_write_wins() {
    let (storage, _temp) = create_test_storage();
    let sessions = SessionStore::new(&storage);

    sessions.save_agent_session("042", AgentRole::Pm, "first").unwrap();
    sessions.save_agent_session("042", AgentRole::Pm, "second").unwrap();

    assert_eq!(
        sessions.get_agent_session("042", AgentRole::Pm).unwrap(),
        Some("second".to_string())
    );
}

#[test]
fn test_clear_sessions() {
    let (storage, _temp) = create_test_storage();
    let sessions = SessionStore::new(&storage);

    sessions.save_agent_session("042", AgentRole::Pm, "a").unwrap();
    sessions.save_agent_session("042", AgentRole::Ux, "b").unwrap();

    assert!(sessions.clear_agent_session("042", AgentRole::Pm).unwrap());
    assert!(!sessions.clear_agent_session("042", AgentRole::Pm).unwrap());
    assert_eq!(
        sessions.get_agent_session("042", AgentRole::Ux).unwrap(),
        Some("b".to_string())
    );

    sessions.clear_all_sessions("042").unwrap();
    assert!(sessions.record("042").unwrap().sessions.is_empty());
}

#[test]
fn test_scoping_sessions_are_separate() {
    let (storage, _temp) = create_test_storage();
    let sessions = SessionStore::new(&storage);

    sessions
        .save_agent_session(SCOPING_PROJECT_ID, SessionKey::Scoping, "scope-1")
        .unwrap();

    assert_eq!(
        sessions
            .get_agent_session(SCOPING_PROJECT_ID, SessionKey::Scoping)
            .unwrap(),
        Some("scope-1".to_string())
    );
    assert_eq!(sessions.get_agent_session("042", SessionKey::Scoping).unwrap(), None);
}

#[test]
fn test_corrupt_record_is_an_error() {
    let (storage, temp) = create_test_storage();
    let dir = temp.path().join("projects/042/.specwright");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("sessions.json"), "[1, 2").unwrap();

    let sessions = SessionStore::new(&storage);
    assert!(matches!(
        sessions.get_agent_session("042", AgentRole::Pm),
        Err(StorageError::Json { .. })
    ));
}

#[test]
fn test_ids_cannot_leave_the_projects_root() {
    let temp = TempDir::new().unwrap();
    let storage = FileStorage::with_config(StorageConfig::rooted(temp.path().join("root")));
    let sessions = SessionStore::new(&storage);

    for id in ["../../escaped", "..", "a/b", ""] {
        assert!(matches!(
            sessions.save_agent_session(id, AgentRole::Pm, "x"),
            Err(StorageError::InvalidProjectId(_))
        ));
        assert!(matches!(
            sessions.get_agent_session(id, AgentRole::Pm),
            Err(StorageError::InvalidProjectId(_))
        ));
    }
    assert!(!temp.path().join("escaped").exists());
    assert!(!temp.path().join("root").exists());
}
