//! Configuration error-message and on-disk layout tests.

use assert_fs::prelude::*;
use hubmirror_core::{
    config::{self, config_path_at},
    ConfigError, MirrorConfig,
};
use predicates::prelude::predicate;

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".hubmirror/config.yaml")
        .write_str("download_issues: [unclosed\n")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"), "must name the file: {err}");
}

#[test]
fn wrong_type_returns_parse_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".hubmirror/config.yaml")
        .write_str("max_parallel_syncs: lots\n")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn empty_file_is_treated_as_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".hubmirror/config.yaml").touch().expect("touch");
    assert_eq!(config::load_at(home.path()).unwrap(), MirrorConfig::default());
}

#[test]
fn save_creates_readable_yaml() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &MirrorConfig::default()).expect("save");

    home.child(".hubmirror/config.yaml")
        .assert(predicate::str::contains("update_existing_repos: true"));
    home.child(".hubmirror/config.yaml")
        .assert(predicate::str::contains("backend: files"));
    assert!(config_path_at(home.path()).exists());
}
