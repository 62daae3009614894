//! Environment layer of config loading. Kept in its own test binary so the
//! `SVELTEBENCH_*` variables cannot leak into other tests.

use std::io::Write;
use sveltebench_core::config::{load_config, ConfigOverrides, OverflowPolicy};
use tempfile::NamedTempFile;

#[test]
fn env_layer_sits_between_file_and_overrides() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "samples: 4\nbridge:\n  queue_capacity: 50").unwrap();

    std::env::set_var("SVELTEBENCH_SAMPLES", "6");
    std::env::set_var("SVELTEBENCH_BRIDGE__OVERFLOW", "block");
    std::env::set_var("SVELTEBENCH_WORKER__COMMAND", "node worker.js");

    let from_env = load_config(file.path(), ConfigOverrides::default());
    let overridden = load_config(
        file.path(),
        ConfigOverrides {
            samples: Some(2),
            ..Default::default()
        },
    );

    std::env::remove_var("SVELTEBENCH_SAMPLES");
    std::env::remove_var("SVELTEBENCH_BRIDGE__OVERFLOW");
    std::env::remove_var("SVELTEBENCH_WORKER__COMMAND");

    let cfg = from_env.unwrap();
    assert_eq!(cfg.samples, 6);
    assert_eq!(cfg.bridge.overflow, OverflowPolicy::Block);
    assert_eq!(cfg.bridge.queue_capacity, 50);
    assert_eq!(cfg.worker.command, "node worker.js");

    assert_eq!(overridden.unwrap().samples, 2);
}
