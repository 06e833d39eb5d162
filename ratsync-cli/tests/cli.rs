use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

/// `ratsync` run from `dir` against `dir/repo`, colors off.
fn ratsync(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ratsync"));
    cmd.current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .args(["--repo", "repo"]);
    cmd
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

/// Sandbox with an empty repo and two template versions.
fn sandbox() -> TempDir {
    let tmp = TempDir::new().expect("tmp");
    fs::create_dir_all(tmp.path().join("repo")).expect("repo");
    write(tmp.path(), "tpl/v1/config.yaml", "service: acme\nversion: 1\n");
    write(tmp.path(), "tpl/v1/README.md", "# acme\n\nintro\n");
    write(tmp.path(), "tpl/v2/config.yaml", "service: acme\nversion: 2\n");
    write(tmp.path(), "tpl/v2/README.md", "# acme\n\nintro\n\nusage\n");
    tmp
}

fn adopt(dir: &Path) {
    ratsync(dir)
        .args([
            "adopt",
            "--template",
            "rat:./tpl/v1@v1",
            "--managed",
            "config.yaml",
            "--managed",
            "README.md:merge",
        ])
        .assert()
        .success()
        .stdout(contains("Adopted rat@v1"));
}

#[test]
fn adopt_writes_lock_record_once() {
    let tmp = sandbox();
    adopt(tmp.path());

    let lock = fs::read_to_string(tmp.path().join("repo/.ratsync.lock")).expect("lock");
    assert!(lock.contains("./tpl/v1"));
    assert!(lock.contains("README.md"));

    ratsync(tmp.path())
        .args(["adopt", "--template", "rat:./tpl/v1@v1"])
        .assert()
        .failure()
        .stderr(contains("already"));
}

#[test]
fn adopt_dry_run_writes_nothing() {
    let tmp = sandbox();
    ratsync(tmp.path())
        .args(["adopt", "--template", "rat:./tpl/v1@v1", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run]"));
    assert!(!tmp.path().join("repo/.ratsync.lock").exists());
}

#[test]
fn adopt_rejects_bad_render_rule() {
    let tmp = sandbox();
    ratsync(tmp.path())
        .args(["adopt", "--template", "rat:./tpl/v1@v1", "--render", "(unclosed=>x"])
        .assert()
        .failure();
    assert!(!tmp.path().join("repo/.ratsync.lock").exists());
}

#[test]
fn plan_without_adoption_points_at_adopt() {
    let tmp = sandbox();
    ratsync(tmp.path())
        .args(["plan", "--to", "rat:./tpl/v1@v1"])
        .assert()
        .failure()
        .stderr(contains("ratsync adopt"));
}

#[test]
fn plan_lists_creates() {
    let tmp = sandbox();
    adopt(tmp.path());
    ratsync(tmp.path())
        .args(["plan", "--to", "rat:./tpl/v1@v1"])
        .assert()
        .success()
        .stdout(contains("CREATE").and(contains("config.yaml")));
}

#[test]
fn plan_json_is_machine_readable() {
    let tmp = sandbox();
    adopt(tmp.path());
    let output = ratsync(tmp.path())
        .args(["plan", "--to", "rat:./tpl/v1@v1", "--json"])
        .output()
        .expect("run plan");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["summary"]["changes"], 2);
    let items = json["items"].as_array().expect("items");
    assert!(items
        .iter()
        .all(|item| item["action"] == "create"));
}

#[test]
fn apply_dry_run_leaves_repo_untouched() {
    let tmp = sandbox();
    adopt(tmp.path());
    ratsync(tmp.path())
        .args(["apply", "--to", "rat:./tpl/v1@v1", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run]").and(contains("config.yaml")));
    assert!(!tmp.path().join("repo/config.yaml").exists());
}

#[test]
fn apply_then_upgrade() {
    let tmp = sandbox();
    adopt(tmp.path());
    ratsync(tmp.path())
        .args(["apply", "--to", "rat:./tpl/v1@v1"])
        .assert()
        .success()
        .stdout(contains("2 files changed"));

    // Local note in the merge-managed README survives the upgrade.
    write(tmp.path(), "repo/README.md", "# acme (fork)\n\nintro\n");
    ratsync(tmp.path())
        .args(["apply", "--to", "rat:./tpl/v2@v2"])
        .assert()
        .success()
        .stdout(contains("rat@v2"));

    let repo = tmp.path().join("repo");
    assert_eq!(
        fs::read_to_string(repo.join("config.yaml")).expect("config"),
        "service: acme\nversion: 2\n"
    );
    assert_eq!(
        fs::read_to_string(repo.join("README.md")).expect("readme"),
        "# acme (fork)\n\nintro\n\nusage\n"
    );
    let lock = fs::read_to_string(repo.join(".ratsync.lock")).expect("lock");
    assert!(lock.contains("applied_ref: v2"));
}

#[test]
fn diff_shows_added_lines() {
    let tmp = sandbox();
    adopt(tmp.path());
    ratsync(tmp.path())
        .args(["apply", "--to", "rat:./tpl/v1@v1"])
        .assert()
        .success();

    let assert = ratsync(tmp.path())
        .args(["diff", "--to", "rat:./tpl/v2@v2"])
        .assert()
        .success()
        .stdout(contains("b/config.yaml"));
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    assert!(stdout.lines().any(|l| l == "+version: 2"));
    assert!(stdout.lines().any(|l| l == "-version: 1"));
}

#[test]
fn diff_reports_nothing_when_current() {
    let tmp = sandbox();
    adopt(tmp.path());
    ratsync(tmp.path())
        .args(["apply", "--to", "rat:./tpl/v1@v1"])
        .assert()
        .success();
    ratsync(tmp.path())
        .args(["diff", "--to", "rat:./tpl/v1@v1"])
        .assert()
        .success()
        .stdout(contains("No differences"));
}

#[test]
fn drift_json_reports_local_edit() {
    let tmp = sandbox();
    adopt(tmp.path());
    ratsync(tmp.path())
        .args(["apply", "--to", "rat:./tpl/v1@v1"])
        .assert()
        .success();
    write(tmp.path(), "repo/README.md", "# acme\n\nintro, edited\n");

    let output = ratsync(tmp.path())
        .args(["drift", "--json"])
        .output()
        .expect("run drift");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["baseline_version"], "v1");
    assert_eq!(json["local_only"], serde_json::json!(["README.md"]));
    assert_eq!(json["conflicts"], serde_json::json!([]));
}

#[test]
fn remote_template_cannot_be_resolved() {
    let tmp = sandbox();
    adopt(tmp.path());
    ratsync(tmp.path())
        .args(["plan", "--to", "rat:gh:acme/service-template@v2"])
        .assert()
        .failure()
        .stderr(contains("cannot resolve"));
}
