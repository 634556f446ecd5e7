use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn doclinks_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_doclinks"));
    cmd.env_remove("VALIDATE_IGNORE_PATTERNS");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn validate_json(root: &Path) -> (Output, serde_json::Value) {
    let output = doclinks_cmd()
        .arg("validate")
        .arg(root)
        .args(["--format", "json"])
        .output()
        .unwrap();
    let json = serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!("stdout is not JSON ({e}): {}", String::from_utf8_lossy(&output.stdout))
    });
    (output, json)
}

#[test]
fn missing_sibling_is_reported_broken() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "principles/01-names/README.md", "# Names\n\nSee the [checklist](./checklist.md).\n");

    let (output, json) = validate_json(dir.path());
    assert_eq!(output.status.code(), Some(1));
    let broken = json["brokenLinks"].as_array().unwrap();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0]["source"], "principles/01-names/README.md");
    assert_eq!(broken[0]["attemptedTarget"], "principles/01-names/checklist.md");
    assert_eq!(broken[0]["rawText"], "./checklist.md");
}

#[test]
fn wrapped_link_to_missing_file_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "principles/01-names/README.md",
        "# Names\n\nApply the principle from the\n[naming\nchecklist](./checklist.md) carefully.\n",
    );

    let (output, json) = validate_json(dir.path());
    assert_eq!(output.status.code(), Some(1));
    let broken = json["brokenLinks"].as_array().unwrap();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0]["line"], 4);
    assert_eq!(broken[0]["attemptedTarget"], "principles/01-names/checklist.md");
}

#[test]
fn mutual_links_pass() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.md", "[b](b.md)\n");
    write(dir.path(), "b.md", "[a](a.md)\n");

    let (output, json) = validate_json(dir.path());
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(json["brokenLinks"], serde_json::json!([]));
    assert_eq!(json["orphanedDocuments"], serde_json::json!([]));
}

#[test]
fn unlinked_document_is_orphaned_but_entry_is_not() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "README.md", "# Root\n");
    write(dir.path(), "orphan.md", "# Nobody links here\n");

    let (output, json) = validate_json(dir.path());
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(json["orphanedDocuments"], serde_json::json!(["orphan.md"]));
}

#[test]
fn principle_without_readme_is_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "principles/05-objects/checklist.md", "# Objects checklist\n");

    let (output, json) = validate_json(dir.path());
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        json["incompletePrinciples"],
        serde_json::json!([{ "ordinal": 5, "slug": "objects", "missing": ["README.md"] }])
    );
}

#[test]
fn missing_root_is_an_invocation_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = doclinks_cmd().arg("validate").arg(dir.path().join("nope")).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Root Not Found"));
}

#[test]
fn malformed_config_is_an_invocation_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "README.md", "# Root\n");
    write(dir.path(), ".doclinks.toml", "ignore = [\n");

    let output = doclinks_cmd().arg("validate").arg(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn zero_concurrency_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = doclinks_cmd()
        .arg("validate")
        .arg(dir.path())
        .args(["--concurrency", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn repeated_runs_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "README.md", "[a](docs/a.md) [gone](gone.md)\n");
    write(dir.path(), "docs/a.md", "[up](../README.md) [also gone](../missing/b.md)\n");
    write(dir.path(), "docs/lonely.md", "# Lonely\n");

    let first = validate_json(dir.path()).0;
    let second = validate_json(dir.path()).0;
    assert_eq!(first.stdout, second.stdout);

    let text_first = doclinks_cmd().arg("validate").arg(dir.path()).output().unwrap();
    let text_second = doclinks_cmd().arg("validate").arg(dir.path()).output().unwrap();
    assert_eq!(text_first.stdout, text_second.stdout);
    assert_eq!(text_first.status.code(), Some(1));
}

#[test]
fn ignore_patterns_from_the_environment_are_honored() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "README.md", "# Root\n");
    write(dir.path(), "drafts/wip.md", "[todo](nowhere.md)\n");

    let (output, _) = validate_json(dir.path());
    assert_eq!(output.status.code(), Some(1));

    let output = doclinks_cmd()
        .env("VALIDATE_IGNORE_PATTERNS", "drafts/**, scratch/**")
        .arg("validate")
        .arg(dir.path())
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["summary"]["documents"], 1);
}

#[test]
fn ignore_flag_prunes_directories() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "README.md", "# Root\n");
    write(dir.path(), "node_modules/pkg/README.md", "[x](missing.md)\n");

    let output = doclinks_cmd()
        .arg("validate")
        .arg(dir.path())
        .args(["--ignore", "node_modules"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn checked_in_curriculum_is_clean() {
    let (output, json) = validate_json(&fixture("curriculum"));
    assert_eq!(
        output.status.code(),
        Some(0),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(json["brokenLinks"], serde_json::json!([]));
    assert_eq!(json["orphanedDocuments"], serde_json::json!([]));
    assert_eq!(json["incompletePrinciples"], serde_json::json!([]));
    assert_eq!(json["summary"]["principles"], 2);
}

#[test]
fn catalog_lists_principles_in_order() {
    let output = doclinks_cmd()
        .arg("catalog")
        .arg(fixture("curriculum"))
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let principles = json["principles"].as_array().unwrap();
    assert_eq!(principles.len(), 2);
    assert_eq!(principles[0]["slug"], "names");
    assert_eq!(principles[0]["title"], "Meaningful Names");
    assert_eq!(principles[0]["examples"].as_array().unwrap().len(), 2);
    assert_eq!(
        principles[0]["exercises"],
        serde_json::json!(["exercises/principle-practice/01-names/README.md"])
    );
    assert_eq!(principles[1]["slug"], "functions");
    assert_eq!(principles[1]["exercises"], serde_json::json!([]));
}
