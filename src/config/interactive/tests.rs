use super::load_existing_config as load_existing_config_impl;
use tempfile::TempDir;

#[test]
fn load_existing_config_defaults_when_absent() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");
    assert!(!config.ollama.host.is_empty());
    assert!(config.ollama.port > 0);
    assert!(!config.ollama.model.is_empty());
    assert_eq!(config.store.namespace, "ns1");
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn load_existing_config_reads_saved_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = super::Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..super::Config::default()
    };
    config.store.index = "lectures".to_string();
    config.save().expect("should save config");

    let loaded = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");
    assert_eq!(loaded.store.index, "lectures");
}
