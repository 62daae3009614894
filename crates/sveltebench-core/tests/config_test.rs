//! Tests for the config module.

use std::io::Write;
use sveltebench_core::config::{
    interpolate_env_vars, load_config, AppConfig, ConfigError, ConfigOverrides, OverflowPolicy,
};
use tempfile::NamedTempFile;

#[test]
fn test_env_interpolation_multiple() {
    std::env::set_var("SVB_VAR_A", "alpha");
    std::env::set_var("SVB_VAR_B", "beta");
    let result = interpolate_env_vars("a: ${SVB_VAR_A}, b: ${SVB_VAR_B}");
    assert_eq!(result, "a: alpha, b: beta");
    std::env::remove_var("SVB_VAR_A");
    std::env::remove_var("SVB_VAR_B");
}

#[test]
fn test_env_interpolation_missing_no_default() {
    std::env::remove_var("SVB_NONEXISTENT_VAR_ABC");
    let result = interpolate_env_vars("value: ${SVB_NONEXISTENT_VAR_ABC}");
    assert_eq!(result, "value: ");
}

#[test]
fn missing_file_yields_defaults() {
    let cfg = load_config("/definitely/not/here/sveltebench.yaml", ConfigOverrides::default())
        .unwrap();
    assert_eq!(cfg, AppConfig::default());
    assert_eq!(cfg.worker.command, "pnpm run-tests");
    assert_eq!(cfg.bridge.queue_capacity, 100);
    assert_eq!(cfg.bridge.overflow, OverflowPolicy::Drop);
    assert_eq!(cfg.samples, 10);
    assert!(!cfg.parallel);
    assert!(cfg.tests.is_empty());
    assert_eq!(cfg.model_cache_ttl().as_secs(), 300);
}

#[test]
fn load_config_reads_yaml_with_interpolation() {
    std::env::set_var("SVB_TEST_SAMPLES", "3");
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
worker:
  command: "node run.js"
  working_dir: "${{SVB_UNSET_DIR:-/tmp}}"
bridge:
  overflow: block
samples: ${{SVB_TEST_SAMPLES}}
tests: [counter, props]
"#
    )
    .unwrap();

    let cfg = load_config(file.path(), ConfigOverrides::default()).unwrap();
    std::env::remove_var("SVB_TEST_SAMPLES");

    assert_eq!(cfg.worker.command, "node run.js");
    assert_eq!(cfg.worker.working_dir.as_deref(), Some(std::path::Path::new("/tmp")));
    assert_eq!(cfg.bridge.overflow, OverflowPolicy::Block);
    assert_eq!(cfg.bridge.queue_capacity, 100);
    assert_eq!(cfg.samples, 3);
    assert_eq!(cfg.tests, vec!["counter", "props"]);
}

#[test]
fn overrides_take_precedence_over_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "samples: 4\nparallel: false\nworker:\n  command: \"node run.js\"").unwrap();

    let overrides = ConfigOverrides {
        samples: Some(1),
        parallel: Some(true),
        queue_capacity: Some(8),
        ..Default::default()
    };
    let cfg = load_config(file.path(), overrides).unwrap();
    assert_eq!(cfg.samples, 1);
    assert!(cfg.parallel);
    assert_eq!(cfg.bridge.queue_capacity, 8);
    // Untouched fields keep the file's value.
    assert_eq!(cfg.worker.command, "node run.js");
}

#[test]
fn load_config_rejects_invalid_values() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "bridge:\n  queue_capacity: 0").unwrap();
    let err = load_config(file.path(), ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("queue_capacity"));

    let err = load_config(
        "/definitely/not/here.yaml",
        ConfigOverrides {
            command: Some("   ".into()),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(err.to_string().contains("worker command must not be empty"));
}

#[test]
fn load_config_reports_parse_errors() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "samples: lots").unwrap();
    let err = load_config(file.path(), ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Figment(_)), "{err}");
}
