//! Tests for src/config - loading, paths and garden management

use gardenctl::config::{self, Config, ENV_CONFIG_NAME, ENV_HOME};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("gardenctl-v2.yaml");
    fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// Config path tests
// ============================================================================

#[test]
#[serial]
fn test_config_path_from_env() {
    std::env::set_var(ENV_HOME, "/tmp/gctl-home");
    std::env::set_var(ENV_CONFIG_NAME, "custom");
    let path = config::config_path(None).unwrap();
    std::env::remove_var(ENV_HOME);
    std::env::remove_var(ENV_CONFIG_NAME);
    assert_eq!(path, std::path::PathBuf::from("/tmp/gctl-home/custom.yaml"));
}

#[test]
#[serial]
fn test_explicit_config_path_wins() {
    std::env::set_var(ENV_HOME, "/tmp/gctl-home");
    let path = config::config_path(Some(std::path::Path::new("/etc/gardenctl.yaml"))).unwrap();
    std::env::remove_var(ENV_HOME);
    assert_eq!(path, std::path::PathBuf::from("/etc/gardenctl.yaml"));
}

// ============================================================================
// Loading tests
// ============================================================================

#[test]
#[serial]
fn test_load_full_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
gardens:
- identity: prod
  alias: p
  kubeconfig: ~/.garden/prod.yaml
  patterns:
  - "^shoot--(?P<project>.+)--(?P<shoot>.+)$"
  accessRestrictions:
  - key: seed.gardener.cloud/eu-access
    notifyIf: true
    msg: EU access only
provider:
  openstack:
    allowedPatterns:
    - field: authURL
      uri: https://keystone.example.com:5000/v3
"#,
    );

    let config = config::load(&path).unwrap();
    assert_eq!(config.filename, path);
    assert_eq!(config.garden("p").unwrap().name, "prod");
    assert!(!config.gardens[0].kubeconfig.starts_with('~'));
    assert_eq!(config.gardens[0].access_restrictions.len(), 1);

    let patterns = config.openstack_allowed_patterns();
    assert_eq!(patterns.len(), 1);
    assert!(patterns[0].is_user_provided);
    assert!(!config.link_kubeconfig());
}

#[test]
#[serial]
fn test_load_rejects_invalid_garden_pattern() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "gardens:\n- name: prod\n  kubeconfig: /tmp/prod\n  patterns: [\"(\"]\n");
    let err = config::load(&path).unwrap_err();
    assert_eq!(err.kind(), "ConfigError");
}

#[test]
#[serial]
fn test_load_rejects_malformed_yaml() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "gardens: [");
    assert_eq!(config::load(&path).unwrap_err().kind(), "ConfigError");
}

#[test]
#[serial]
fn test_empty_file_is_empty_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");
    assert!(config::load(&path).unwrap().gardens.is_empty());
}

#[test]
#[serial]
fn test_load_or_default_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.yaml");
    let config = config::load_or_default(&path).unwrap();
    assert!(config.gardens.is_empty());
    assert_eq!(config.filename, path);
}

// ============================================================================
// Garden management tests
// ============================================================================

#[test]
#[serial]
fn test_set_garden_and_save() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("gardenctl-v2.yaml");
    let mut config = config::load_or_default(&path).unwrap();

    config
        .set_garden("dev", Some("/tmp/dev.yaml"), Some("dev-ctx"), None, Some("d"))
        .unwrap();
    config.save().unwrap();

    let loaded = config::load(&path).unwrap();
    assert_eq!(loaded.gardens.len(), 1);
    assert_eq!(loaded.gardens[0].context.as_deref(), Some("dev-ctx"));
    assert_eq!(loaded.garden("d").unwrap().kubeconfig, "/tmp/dev.yaml");
}

#[test]
fn test_set_garden_rejects_bad_names() {
    let mut config = Config::default();
    assert!(config.set_garden("-dev", None, None, None, None).is_err());
    assert!(config.set_garden("dev", None, None, None, Some("bad alias")).is_err());
    assert!(config.gardens.is_empty());
}

#[test]
fn test_delete_unknown_garden() {
    let err = Config::default().delete_garden("nope").unwrap_err();
    assert_eq!(err.kind(), "GardenNotDefined");
}

#[test]
fn test_match_pattern_returns_captures() {
    let mut config = Config::default();
    config
        .set_garden(
            "prod",
            Some("/tmp/prod"),
            None,
            Some(&["^(?P<namespace>garden-.+)/(?P<shoot>.+)$".to_string()]),
            None,
        )
        .unwrap();
    let m = config.match_pattern(None, "garden-ops/infra").unwrap();
    assert_eq!(m.garden, "prod");
    assert_eq!(m.namespace.as_deref(), Some("garden-ops"));
    assert_eq!(m.shoot.as_deref(), Some("infra"));
    assert!(m.project.is_none());
}
