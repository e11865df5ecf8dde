use specwright_core::config::{
    DEFAULT_ASSISTANT, DEFAULT_LOG_LEVEL, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PROJECTS_DIR,
};
use specwright_core::Config;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.storage.projects_dir, DEFAULT_PROJECTS_DIR);
    assert_eq!(config.project.assistant, DEFAULT_ASSISTANT);
    assert!(config.project.auto_recover);
    assert_eq!(config.watch.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    assert_eq!(config.logging.level, DEFAULT_LOG_LEVEL);
}

#[test]
fn test_config_to_toml() {
    let toml_str = Config::default_config_string();
    assert!(toml_str.contains("[storage]"));
    assert!(toml_str.contains("[project]"));
    assert!(toml_str.contains("[watch]"));
}

#[test]
fn test_config_from_toml() {
    let toml_str = r#"
[storage]
root_dir = "/srv/specs"

[project]
assistant = "codex"
auto_recover = false
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.storage.root_dir, "/srv/specs");
    assert_eq!(config.storage.projects_dir, DEFAULT_PROJECTS_DIR);
    assert_eq!(config.project.assistant, "codex");

    let settings = config.project.to_settings();
    assert!(!settings.auto_recover);
}

#[test]
fn test_from_file_rejects_invalid_values() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("specwright.toml");
    std::fs::write(&path, "[watch]\npoll_interval_ms = 0\n").unwrap();

    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_from_file_rejects_bad_toml() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("specwright.toml");
    std::fs::write(&path, "[storage\n").unwrap();

    assert!(Config::from_file(&path).is_err());
}
