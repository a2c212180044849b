//! CLI tests for the conductor binary.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn conductor() -> Command {
    let mut cmd = cargo_bin_cmd!("conductor");
    cmd.env_remove("CONDUCTOR_TASK_QUOTA")
        .env_remove("CONDUCTOR_TASK_TIMEOUT_SECS")
        .env_remove("CONDUCTOR_UNMATCHED")
        .env_remove("CONDUCTOR_LOG")
        .env_remove("RUST_LOG");
    cmd
}

const CATALOG: &str = r#"{
  "tasks": [
    { "id": "ANL-1", "title": "Codebase Structure Mapping", "labels": ["Agent-Analysis"], "estimate_hours": 8 },
    { "id": "QA-1", "title": "Test Coverage Analysis", "labels": ["Agent-QA"], "estimate_hours": 8 },
    { "id": "SEC-1", "title": "Penetration Test", "labels": ["security"], "estimate_hours": 24 }
  ]
}"#;

fn write_catalog(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("catalog.json");
    fs::write(&path, CATALOG).unwrap();
    path
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        conductor()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("plan"));
    }

    #[test]
    fn test_version() {
        conductor().arg("--version").assert().success();
    }

    #[test]
    fn test_workers_lists_specialists() {
        conductor()
            .arg("workers")
            .assert()
            .success()
            .stdout(predicate::str::contains("devops"))
            .stdout(predicate::str::contains("Agent-QA"))
            .stdout(predicate::str::contains("Agent-Documentation"));
    }
}

mod plan {
    use super::*;

    #[test]
    fn test_default_plan() {
        conductor()
            .arg("plan")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initial Analysis"))
            .stdout(predicate::str::contains("Validation & Documentation"))
            .stdout(predicate::str::contains("Total estimate"));
    }

    #[test]
    fn test_plan_from_yaml_workflow() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flow.yaml");
        fs::write(
            &path,
            "phases:\n  - name: Audit\n    workers: [qa]\n  - name: Ship\n    workers: [devops]\n    depends_on: [Audit]\n    eta: 2 days\n",
        )
        .unwrap();

        conductor()
            .args(["plan", "--workflow"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("1. Audit"))
            .stdout(predicate::str::contains("2. Ship"))
            .stdout(predicate::str::contains("2d"));
    }

    #[test]
    fn test_plan_rejects_cycle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flow.toml");
        fs::write(
            &path,
            r#"
[[phases]]
name = "A"
workers = ["qa"]
depends_on = ["B"]

[[phases]]
name = "B"
workers = ["qa"]
depends_on = ["A"]
"#,
        )
        .unwrap();

        conductor()
            .args(["plan", "--workflow"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cycle detected"));
    }

    #[test]
    fn test_plan_rejects_unknown_worker() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flow.json");
        fs::write(&path, r#"{"phases": [{"name": "A", "workers": ["frontend"]}]}"#).unwrap();

        conductor()
            .args(["plan", "--workflow"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown worker 'frontend'"));
    }
}

mod validate {
    use super::*;

    #[test]
    fn test_validate_reports_unassigned_tasks() {
        let dir = TempDir::new().unwrap();
        let catalog = write_catalog(dir.path());

        conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["validate", "--catalog"])
            .arg(&catalog)
            .assert()
            .success()
            .stdout(predicate::str::contains("Workflow OK: 4 phases"))
            .stdout(predicate::str::contains("Catalog OK: 3 tasks"))
            .stdout(predicate::str::contains("SEC-1"));
    }

    #[test]
    fn test_validate_rejects_duplicate_task_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"[{"id": "T1", "title": "a"}, {"id": "T1", "title": "b"}]"#,
        )
        .unwrap();

        conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["validate", "--catalog"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Duplicate task id: T1"));
    }
}

mod run {
    use super::*;

    #[test]
    fn test_run_prints_text_report() {
        let dir = TempDir::new().unwrap();
        let catalog = write_catalog(dir.path());

        conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "--ui", "minimal", "--catalog"])
            .arg(&catalog)
            .assert()
            .success()
            .stdout(predicate::str::contains("Success rate: 100.0%"))
            .stdout(predicate::str::contains("SEC-1"));
    }

    #[test]
    fn test_run_json_report() {
        let dir = TempDir::new().unwrap();
        let catalog = write_catalog(dir.path());

        let output = conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "--ui", "minimal", "--output", "json", "--catalog"])
            .arg(&catalog)
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        let start = stdout.find('{').unwrap();
        let report: serde_json::Value = serde_json::from_str(&stdout[start..]).unwrap();
        assert_eq!(report["total_tasks_completed"], 2);
        assert_eq!(report["unassigned"][0], "SEC-1");
        assert_eq!(report["success_rate"], 100.0);
    }

    #[test]
    fn test_run_json_ui_streams_events() {
        let dir = TempDir::new().unwrap();
        let catalog = write_catalog(dir.path());

        conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "--ui", "json", "--catalog"])
            .arg(&catalog)
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""type":"run_started""#))
            .stdout(predicate::str::contains(r#""type":"task_finished""#))
            .stdout(predicate::str::contains(r#""type":"run_completed""#));
    }

    #[test]
    fn test_run_writes_sink_file() {
        let dir = TempDir::new().unwrap();
        let catalog = write_catalog(dir.path());
        let sink = dir.path().join("results").join("sink.jsonl");

        conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "--ui", "minimal", "--catalog"])
            .arg(&catalog)
            .arg("--sink-file")
            .arg(&sink)
            .assert()
            .success();

        let content = fs::read_to_string(&sink).unwrap();
        assert!(content.lines().any(|l| l.contains(r#""entry":"task""#)));
        assert!(content.lines().any(|l| l.contains(r#""entry":"discovery""#)));
    }

    #[test]
    fn test_run_rejects_zero_quota() {
        let dir = TempDir::new().unwrap();
        let catalog = write_catalog(dir.path());

        conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "--quota", "0", "--catalog"])
            .arg(&catalog)
            .assert()
            .failure()
            .stderr(predicate::str::contains("task_quota"));
    }

    #[test]
    fn test_run_rejects_bad_env_quota() {
        let dir = TempDir::new().unwrap();
        let catalog = write_catalog(dir.path());

        conductor()
            .env("CONDUCTOR_TASK_QUOTA", "lots")
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "--catalog"])
            .arg(&catalog)
            .assert()
            .failure()
            .stderr(predicate::str::contains("CONDUCTOR_TASK_QUOTA"));
    }

    #[test]
    fn test_run_missing_catalog_fails() {
        let dir = TempDir::new().unwrap();

        conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "--catalog"])
            .arg(dir.path().join("missing.json"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read task catalog"));
    }
}

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();

        conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("task_quota = 3"))
            .stdout(predicate::str::contains("unmatched = \"warn\""));
    }

    #[test]
    fn test_config_init_then_validate() {
        let dir = TempDir::new().unwrap();

        conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "init"])
            .assert()
            .success();
        assert!(dir.path().join("conductor.toml").exists());

        conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "init"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));

        conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
    }

    #[test]
    fn test_config_validate_rejects_zero_override() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("conductor.toml"),
            "[phases.overrides.\"cleanup*\"]\ntask_quota = 0\n",
        )
        .unwrap();

        conductor()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["config", "validate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("task_quota"));
    }

    #[test]
    fn test_config_flag_must_exist() {
        let dir = TempDir::new().unwrap();
        let catalog = write_catalog(dir.path());

        conductor()
            .arg("--config")
            .arg(dir.path().join("nope.toml"))
            .args(["run", "--catalog"])
            .arg(&catalog)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Config file not found"));
    }
}
