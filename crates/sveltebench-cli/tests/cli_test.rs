use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const SECRET: &str = "sk-test-do-not-print";

fn project() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("package.json"), "{}").unwrap();
    dir
}

fn write_worker(dir: &Path, body: &str) {
    fs::write(dir.join("worker.sh"), body).unwrap();
}

fn sveltebench(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sveltebench"));
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("SVELTEBENCH_SAMPLES")
        .env("OPENAI_API_KEY", SECRET);
    cmd
}

#[test]
fn show_config_prints_merged_yaml() {
    let dir = project();
    fs::write(dir.path().join("sveltebench.yaml"), "samples: 3\n").unwrap();

    sveltebench(dir.path())
        .arg("show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("samples: 3"))
        .stdout(predicate::str::contains("command: pnpm run-tests"))
        .stdout(predicate::str::contains("queue_capacity: 100"));
}

#[test]
fn tests_lists_discovered_directories() {
    let dir = project();
    for name in ["props", "counter"] {
        fs::create_dir_all(dir.path().join("src/tests").join(name)).unwrap();
    }

    sveltebench(dir.path())
        .arg("tests")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tests (2):"))
        .stdout(predicate::str::contains("counter"))
        .stdout(predicate::str::contains("props"));
}

#[test]
fn tests_falls_back_to_builtin_list() {
    let dir = project();
    sveltebench(dir.path())
        .arg("tests")
        .assert()
        .success()
        .stdout(predicate::str::contains("built-in list"))
        .stdout(predicate::str::contains("hello-world"));
}

#[test]
fn run_reports_a_successful_worker() {
    let dir = project();
    write_worker(
        dir.path(),
        r#"
echo "> run-tests"
echo '{"type":"test_start","test":"counter"}'
echo '{"type":"sample_progress","test":"counter","sample":0,"total":2}'
echo '{"type":"sample_progress","test":"counter","sample":1,"total":2}'
echo '{"type":"test_complete","test":"counter","total":2,"passed":true,"passAtOne":0.8}'
echo '{"type":"complete","resultsSaved":"benchmarks/out.json"}'
"#,
    );

    sveltebench(dir.path())
        .args(["run", "--provider", "openai", "--model", "gpt-4o"])
        .args(["--samples", "2", "--tests", "counter", "--command", "sh worker.sh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("COMPLETED"))
        .stdout(predicate::str::contains("counter"))
        .stdout(predicate::str::contains("80.0%"))
        .stdout(predicate::str::contains("benchmarks/out.json"))
        .stdout(predicate::str::contains(SECRET).not())
        .stderr(predicate::str::contains(SECRET).not());
}

#[test]
fn run_passes_settings_to_the_worker() {
    let dir = project();
    write_worker(
        dir.path(),
        r#"
printf '%s %s %s %s' "$DEBUG_PROVIDER" "$DEBUG_MODEL" "$DEBUG_SAMPLES" "$PARALLEL_EXECUTION" > env.txt
echo '{"type":"complete"}'
"#,
    );

    sveltebench(dir.path())
        .args(["run", "-p", "OpenAI", "-m", "gpt-4o-mini", "--samples", "4", "--parallel"])
        .args(["--tests", "counter", "--command", "sh worker.sh"])
        .assert()
        .success();

    let env = fs::read_to_string(dir.path().join("env.txt")).unwrap();
    assert_eq!(env, "openai gpt-4o-mini 4 true");
}

#[test]
fn run_fails_with_worker_stderr() {
    let dir = project();
    write_worker(dir.path(), "echo 'rate limit exceeded' >&2\nexit 1\n");

    sveltebench(dir.path())
        .args(["run", "--provider", "openai", "--model", "gpt-4o"])
        .args(["--tests", "counter", "--command", "sh worker.sh"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("FAILED"))
        .stdout(predicate::str::contains("rate limit exceeded"))
        .stderr(predicate::str::contains("run failed").not());
}

#[test]
fn run_requires_the_provider_key() {
    let dir = project();
    sveltebench(dir.path())
        .env_remove("OPENAI_API_KEY")
        .args(["run", "--provider", "openai", "--model", "gpt-4o"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no API key set for OPENAI_API_KEY"));
}

#[test]
fn run_rejects_unknown_provider() {
    let dir = project();
    sveltebench(dir.path())
        .args(["run", "--provider", "nope", "--model", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown provider: nope"));
}

#[test]
fn providers_never_prints_key_values() {
    let dir = project();
    sveltebench(dir.path())
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("OPENAI_API_KEY"))
        .stdout(predicate::str::contains(SECRET).not());
}
