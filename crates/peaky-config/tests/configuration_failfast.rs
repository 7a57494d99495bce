use std::ffi::OsString;
use std::fs;

use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;
use peaky_config::Config;

#[test]
fn malformed_config_file_fails_to_load() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let config_path = temp_dir.path().join("peakypanes.toml");
    fs::write(&config_path, r#"daemon_socket = { path = "/tmp" "#).expect("write config");

    let args = vec![
        OsString::from("peakyd"),
        OsString::from("--config-path"),
        config_path.clone().into_os_string(),
    ];

    let error = Config::load_from_iter(args).expect_err("loading must fail");
    match error.as_ref() {
        OrthoError::File { path, .. } => assert_eq!(path, &config_path),
        OrthoError::Aggregate(aggregate) => {
            let mentions_path = aggregate.iter().any(|err| {
                matches!(err, OrthoError::File { path, .. } if path == &config_path)
            });
            assert!(mentions_path, "aggregate does not name {config_path:?}");
        }
        other => panic!("expected a file error, got {other:?}"),
    }
}

#[test]
fn unknown_log_format_is_rejected() {
    let args = vec![
        OsString::from("peakyd"),
        OsString::from("--log-format"),
        OsString::from("yaml"),
    ];
    assert!(Config::load_from_iter(args).is_err());
}
