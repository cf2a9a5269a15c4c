use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use serde_json::Value;
use uuid::Uuid;

fn unique_workspace(prefix: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&path).expect("workspace should be creatable");
    path
}

struct Workspace {
    root: PathBuf,
    db: PathBuf,
    config: PathBuf,
    share: PathBuf,
}

impl Workspace {
    fn new(prefix: &str) -> Self {
        let root = unique_workspace(prefix);
        let share = root.join("share");
        std::fs::create_dir_all(&share).expect("share dir should be creatable");
        let config = root.join("config.toml");
        std::fs::write(&config, "[connectivity]\nprobe_interval_secs = 0\n")
            .expect("config should be writable");
        Self {
            db: root.join(".actgen/local.sqlite"),
            root,
            config,
            share,
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_actgen"));
        command
            .env_remove("ACTGEN_DB_PATH")
            .env_remove("ACTGEN_CONFIG")
            .env_remove("ACTGEN_REMOTE_HOST")
            .env_remove("ACTGEN_REMOTE_DATABASE")
            .env("NO_COLOR", "1")
            .arg("--db")
            .arg(&self.db)
            .arg("--config")
            .arg(&self.config)
            .arg("--remote-host")
            .arg(&self.share)
            .arg("--remote-database")
            .arg("activities")
            .args(args);
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .output()
            .expect("actgen command should run")
    }

    fn run_with_stdin(&self, args: &[&str], stdin: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("actgen command should spawn");
        child
            .stdin
            .take()
            .expect("stdin should be piped")
            .write_all(stdin.as_bytes())
            .expect("stdin should be writable");
        child.wait_with_output().expect("actgen command should finish")
    }

    fn remote_path(&self) -> PathBuf {
        self.share.join("activities.sqlite")
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "expected success but failed.\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn assert_failure(output: &Output) {
    assert!(
        !output.status.success(),
        "expected failure but command succeeded.\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("command should emit json")
}

fn priority_of(listed: &Value, name: &str) -> Option<f64> {
    listed.as_array()?.iter().find_map(|activity| {
        (activity.get("name")?.as_str()? == name)
            .then(|| activity.get("priority")?.as_f64())
            .flatten()
    })
}

#[test]
fn offline_changes_sync_once_remote_exists() {
    let ws = Workspace::new("actgen-cli-offline");

    assert_success(&ws.run(&["add", "walk"]));
    assert_success(&ws.run(&["add", "read", "2.5"]));
    assert_success(&ws.run(&["adjust", "walk", "0.2"]));
    assert_success(&ws.run(&["rm", "read"]));

    let status = ws.run(&["status", "--json"]);
    assert_success(&status);
    let status = json(&status);
    assert_eq!(status.get("online").and_then(Value::as_bool), Some(false));
    assert_eq!(
        status.get("pending_operations").and_then(Value::as_u64),
        Some(4)
    );

    let queue = ws.run(&["queue", "--json"]);
    assert_success(&queue);
    assert_eq!(json(&queue).as_array().map_or(0, Vec::len), 4);

    let offline_sync = ws.run(&["sync"]);
    assert_failure(&offline_sync);
    assert!(String::from_utf8_lossy(&offline_sync.stderr).contains("unreachable"));

    assert_success(&ws.run(&["init-remote"]));
    assert!(ws.remote_path().exists());

    let sync = ws.run(&["sync", "--json"]);
    assert_success(&sync);
    let report = json(&sync);
    assert_eq!(report.get("success").and_then(Value::as_u64), Some(4));
    assert_eq!(report.get("failed").and_then(Value::as_u64), Some(0));
    assert_eq!(report.get("pulled").and_then(Value::as_bool), Some(true));

    let listed = ws.run(&["ls", "--json"]);
    assert_success(&listed);
    let listed = json(&listed);
    assert_eq!(listed.as_array().map_or(0, Vec::len), 1);
    assert_eq!(priority_of(&listed, "walk"), Some(1.2));

    let status = json(&ws.run(&["status", "--json"]));
    assert_eq!(status.get("online").and_then(Value::as_bool), Some(true));
    assert_eq!(
        status.get("pending_operations").and_then(Value::as_u64),
        Some(0)
    );
}

#[test]
fn command_failures_exit_non_zero() {
    let ws = Workspace::new("actgen-cli-failures");

    assert_success(&ws.run(&["add", "walk", "1.0"]));
    let duplicate = ws.run(&["add", "walk"]);
    assert_failure(&duplicate);
    assert!(String::from_utf8_lossy(&duplicate.stderr).contains("already exists"));

    let missing = ws.run(&["show", "nope"]);
    assert_failure(&missing);
    assert!(String::from_utf8_lossy(&missing.stderr).contains("not found"));

    assert_failure(&ws.run(&["adjust", "nope", "0.1"]));
    assert_failure(&ws.run(&["rm", "nope"]));
    assert_failure(&ws.run(&["add", "tiny", "0.05"]));
    assert_failure(&ws.run(&["completions", "nonsense"]));

    let shown = ws.run(&["show", "walk", "--json"]);
    assert_success(&shown);
    assert_eq!(
        json(&shown).get("priority").and_then(Value::as_f64),
        Some(1.0)
    );
}

#[test]
fn interactive_suggest_adjusts_priorities() {
    let ws = Workspace::new("actgen-cli-suggest");
    assert_success(&ws.run(&["init-remote"]));
    assert_success(&ws.run(&["add", "walk", "1.0"]));

    let output = ws.run_with_stdin(&["suggest"], "+\n+\nq\n");
    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Selected activity: walk"));
    assert!(stdout.contains("Priority adjusted to 1.2"));

    let listed = json(&ws.run(&["ls", "--json"]));
    assert_eq!(priority_of(&listed, "walk"), Some(1.2));
    let queue = json(&ws.run(&["queue", "--json"]));
    assert_eq!(
        queue.as_array().map_or(0, Vec::len),
        0,
        "online changes are not queued"
    );

    let once = ws.run(&["suggest", "--json"]);
    assert_success(&once);
    let suggestion = json(&once);
    assert_eq!(
        suggestion.get("activity").and_then(Value::as_str),
        Some("walk")
    );
    assert!(suggestion.get("min_roll").and_then(Value::as_f64).is_some());
}

#[test]
fn suggest_fails_without_activities() {
    let ws = Workspace::new("actgen-cli-empty");
    let output = ws.run_with_stdin(&["suggest"], "");
    assert_failure(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("no activities"));
}

#[test]
fn completions_print_script() {
    let ws = Workspace::new("actgen-cli-completions");
    let output = ws.run(&["completions", "bash"]);
    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("actgen"));
    assert!(!ws.db.exists(), "completions do not open the store");
}
