//! Integration tests for `logtap config`, `status`, and `enable`/`disable`
//! against real TOML files.

use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use logtap_cli::commands::config::{show, validate};
use logtap_cli::commands::status::build_status_report;
use logtap_cli::commands::toggle::toggle;
use logtap_core::config::LogtapConfig;

const VALID: &str = r#"
[general]
log_level = "info"
log_format = "json"

[forwarder]
min_severity_level = "WARNING"
exclude_wildcards = ["reloading plugin *"]
syslog_enabled = true
syslog_host = "127.0.0.1"
syslog_facility = "LOG_LOCAL0"
"#;

#[tokio::test]
async fn validate_accepts_valid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logtap.toml");
    fs::write(&path, VALID).unwrap();

    let report = validate(&path, false).await;
    assert!(report.valid);
    assert!(report.errors.is_empty());
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn validate_rejects_malformed_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[general\nlog_level = \"info\"\n").unwrap();

    let report = validate(&path, false).await;
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test]
async fn validate_rejects_missing_file() {
    let dir = TempDir::new().unwrap();
    let report = validate(&dir.path().join("absent.toml"), false).await;
    assert!(!report.valid);
    assert!(report.errors[0].contains("not found"));
}

#[tokio::test]
async fn zero_buffer_capacity_is_a_warning_unless_strict() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logtap.toml");
    fs::write(&path, "[forwarder]\nbuffer_capacity = 0\n").unwrap();

    let report = validate(&path, false).await;
    assert!(report.valid);
    assert!(report.errors.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("buffer_capacity"));

    let strict = validate(&path, true).await;
    assert!(!strict.valid);
    assert!(strict.errors[0].contains("forwarder.buffer_capacity"));
}

#[tokio::test]
async fn unknown_log_level_is_reported_with_its_replacement() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logtap.toml");
    fs::write(&path, "[general]\nlog_level = \"warning\"\n").unwrap();

    let report = validate(&path, false).await;
    assert!(report.valid);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("general.log_level"));
    assert!(report.warnings[0].contains("using info"));

    let strict = validate(&path, true).await;
    assert!(!strict.valid);
    assert!(strict.errors[0].contains("general.log_level"));
}

#[tokio::test]
async fn strict_accepts_valid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logtap.toml");
    fs::write(&path, VALID).unwrap();

    let report = validate(&path, true).await;
    assert!(report.valid);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn lenient_values_are_warnings_not_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logtap.toml");
    fs::write(
        &path,
        r#"
[forwarder]
min_severity_level = "LOUD"
exclude_regex = ["(unclosed"]
file_encoding = "latin-1"
syslog_enabled = true
syslog_facility = "LOG_NOPE"
"#,
    )
    .unwrap();

    let report = validate(&path, false).await;
    assert!(report.valid);
    assert_eq!(report.warnings.len(), 4);
    for field in ["min_severity_level", "exclude_regex", "file_encoding", "syslog_facility"] {
        assert!(
            report.warnings.iter().any(|w| w.starts_with(field)),
            "missing warning for {field}: {:?}",
            report.warnings
        );
    }
}

#[tokio::test]
#[serial]
async fn show_reflects_file_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logtap.toml");
    fs::write(&path, VALID).unwrap();

    let config = LogtapConfig::load(&path).await.unwrap();
    let report = show(&config, "logtap.toml", Some("forwarder".to_owned())).unwrap();
    assert!(report.config_toml.contains("min_severity_level = \"WARNING\""));
    assert_eq!(report.config["syslog_facility"], "LOG_LOCAL0");
}

#[tokio::test]
#[serial]
async fn status_reports_sink_targets() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logtap.toml");
    fs::write(&path, VALID).unwrap();

    let config = LogtapConfig::load(&path).await.unwrap();
    let report = build_status_report(&config, "logtap.toml", false);
    assert!(report.enabled);
    assert_eq!(report.min_severity, "WARNING");
    assert_eq!(report.exclusion_rules, 1);

    let syslog = report.syslog.expect("syslog enabled");
    assert_eq!(syslog.target, "127.0.0.1:514");
    assert_eq!(syslog.facility, "LOG_LOCAL0");
}

#[tokio::test]
async fn disable_creates_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logtap.toml");

    let report = toggle(false, &path).await.unwrap();
    assert!(!report.enabled);
    assert!(path.exists());
    assert!(validate(&path, false).await.valid);
}

#[tokio::test]
#[serial]
async fn env_override_wins_over_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logtap.toml");
    fs::write(&path, VALID).unwrap();

    // SAFETY: serialised with other env-mutating tests by `#[serial]`.
    unsafe { std::env::set_var("LOGTAP_FORWARDER_MIN_SEVERITY_LEVEL", "ERROR") };
    let config = LogtapConfig::load(&path).await;
    unsafe { std::env::remove_var("LOGTAP_FORWARDER_MIN_SEVERITY_LEVEL") };

    let report = build_status_report(&config.unwrap(), "logtap.toml", false);
    assert_eq!(report.min_severity, "ERROR");
}
