//! Integration tests for `logtrig trigger` and `logtrig source` commands.
//!
//! Runs the compiled binary against recipes, source definitions and samples
//! written to a temp directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const RECIPE: &str = r#"
id: login-burst
title: Failed logins without recovery
class: MULTI
steps:
  - name: failed
    trigger:
      - "\\S+ \\S+ login failed user=<<user>>"
    next: recovery
  - name: recovery
    type: delay
    trigger:
      - "\\S+ \\S+ login ok user=@<<user>>@"
    duration: "30 seconds"
    next: "@notify"
"#;

const SOURCE: &str = r#"
id: auth
directory: /var/log/auth
prefix: "auth-"
suffix: ".log"
timestamp:
  format: "yyyy-MM-dd HH:mm:ss"
multiline: { start_pattern: "\\d{4}-.*" }
grouping: { count: 2, must_match: ".*ERROR.*" }
"#;

const SAMPLE: &str = "\
2024-03-09 10:00:00 login failed user=alice
2024-03-09 10:00:02 login failed user=bob
2024-03-09 10:00:05 login ok user=alice
2024-03-09 10:01:30 heartbeat
";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("should create temp dir");
        Self { dir }
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("should write fixture");
        path
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("logtrig.toml")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_logtrig"))
            .env_remove("RUST_LOG")
            .arg("-c")
            .arg(self.config_path())
            .args(args)
            .args(["--output", "json"])
            .output()
            .expect("should run logtrig")
    }
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout should be JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn trigger_test_uses_source_timestamp_format() {
    let fx = Fixture::new();
    let recipe = fx.write("login.yml", RECIPE);
    let source = fx.write("auth.yml", SOURCE);
    let sample = fx.write("sample.log", SAMPLE);

    let output = fx.run(&[
        "trigger",
        "test",
        arg(&recipe),
        arg(&sample),
        "--source",
        arg(&source),
    ]);

    assert!(output.status.success(), "{output:?}");
    let report = json(&output);
    assert_eq!(report["report"]["timestamp_format"], "yyyy-MM-dd HH:mm:ss");
    assert_eq!(report["report"]["lines_timestamped"], 4);
    assert_eq!(report["report"]["triggered"], true);

    let instances = report["report"]["instances"].as_array().expect("instances");
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0]["captured_key"], "alice");
    assert_eq!(instances[0]["status"], "cancelled");
    assert_eq!(instances[1]["captured_key"], "bob");
    assert_eq!(instances[1]["status"], "fired");
}

#[test]
fn trigger_test_missing_recipe_is_definition_error() {
    let fx = Fixture::new();
    let sample = fx.write("sample.log", SAMPLE);
    let missing = fx.dir.path().join("missing.yml");

    let output = fx.run(&["trigger", "test", arg(&missing), arg(&sample)]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("definition error"), "{stderr}");
}

#[test]
fn trigger_validate_reports_invalid_files() {
    let fx = Fixture::new();
    let recipes = fx.dir.path().join("recipes");
    fs::create_dir(&recipes).expect("should create recipe dir");
    fs::write(recipes.join("a_login.yml"), RECIPE).expect("write");
    fs::write(recipes.join("b_empty.yml"), "id: empty\nsteps: []").expect("write");

    let output = fx.run(&["trigger", "validate", arg(&recipes)]);

    assert_eq!(output.status.code(), Some(1));
    let report = json(&output);
    assert_eq!(report["valid"], 1);
    assert_eq!(report["invalid"], 1);
    assert_eq!(report["recipes"][0]["id"], "login-burst");
    assert_eq!(report["recipes"][0]["class"], "multi");
}

#[test]
fn source_path_traces_checks() {
    let fx = Fixture::new();
    let source = fx.write("auth.yml", SOURCE);

    let output = fx.run(&[
        "source",
        "path",
        arg(&source),
        "/var/log/auth/auth-1.txt",
        "--today",
        "2024-03-09",
    ]);

    assert!(output.status.success(), "{output:?}");
    let report = json(&output);
    assert_eq!(report["source"], "auth");
    assert_eq!(report["matched"], false);
    let steps = report["steps"].as_array().expect("steps");
    let last = steps.last().expect("at least one check");
    assert_eq!(last["kind"], "suffix");
    assert_eq!(last["passed"], false);
}

#[test]
fn source_watermark_honours_since() {
    let fx = Fixture::new();
    let source = fx.write("auth.yml", SOURCE);
    let sample = fx.write("sample.log", SAMPLE);

    let output = fx.run(&[
        "source",
        "watermark",
        arg(&source),
        arg(&sample),
        "--since",
        "2024-03-09 10:00:03",
    ]);

    assert!(output.status.success(), "{output:?}");
    let report = json(&output);
    assert_eq!(report["skipped"], 2);
    assert_eq!(report["passed"], 2);
    assert_eq!(report["watermark"], "2024-03-09T10:01:30");
}

#[test]
fn source_multiline_and_group() {
    let fx = Fixture::new();
    let source = fx.write("auth.yml", SOURCE);
    let sample = fx.write(
        "trace.log",
        "2024-03-09 10:00:00 ERROR boom\n  at frame 1\n  at frame 2\n2024-03-09 10:00:01 ok\n",
    );

    let output = fx.run(&["source", "multiline", arg(&source), arg(&sample)]);
    assert!(output.status.success(), "{output:?}");
    let report = json(&output);
    let blocks = report["blocks"].as_array().expect("blocks");
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0]["start_line"], 1);
    assert_eq!(blocks[0]["end_line"], 3);

    let output = fx.run(&["source", "group", arg(&source), arg(&sample)]);
    assert!(output.status.success(), "{output:?}");
    let report = json(&output);
    assert_eq!(report["incomplete_group"], true);
    assert_eq!(report["bypassed"].as_array().map(Vec::len), Some(3));
}

#[test]
fn source_extract_without_section_fails() {
    let fx = Fixture::new();
    let source = fx.write("auth.yml", SOURCE);
    let sample = fx.write("sample.log", SAMPLE);

    let output = fx.run(&[
        "source",
        "extract",
        arg(&source),
        "/var/log/auth/auth-1.log",
        arg(&sample),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("has no extract section"), "{stderr}");
}
