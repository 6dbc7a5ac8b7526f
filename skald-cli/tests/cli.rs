use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;

fn skald() -> Command {
    Command::cargo_bin("skald").unwrap()
}

fn write_tree(dir: &std::path::Path) -> std::path::PathBuf {
    let tree = json!({
        "name": "repo",
        "type": "DIRECTORY",
        "path": "/tmp/repo",
        "summaries": [],
        "final_summary": {
            "name": "repo",
            "summary": "A tiny calculator project.",
            "code": "",
            "kind": "DIRECTORY"
        },
        "children": [{
            "name": "main.py",
            "type": "PYTHON_FILE",
            "path": "/tmp/repo/main.py",
            "summaries": [{
                "name": "add",
                "summary": "Adds two numbers.",
                "code": "def add(a, b):\n    return a + b",
                "kind": "FUNCTION"
            }],
            "final_summary": {
                "name": "main.py",
                "summary": "Arithmetic helpers.",
                "code": "def add(a, b):\n    return a + b\n",
                "kind": "PYTHON_FILE"
            },
            "children": []
        }]
    });
    let path = dir.join("summary_tree.json");
    std::fs::write(&path, serde_json::to_string_pretty(&tree).unwrap()).unwrap();
    path
}

#[test]
fn help_lists_subcommands() {
    skald()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("summarize"))
        .stdout(predicate::str::contains("flatten"))
        .stdout(predicate::str::contains("show"));
}

#[test]
fn show_prints_outline() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    skald()
        .arg("show")
        .arg(&tree)
        .arg("--functions")
        .assert()
        .success()
        .stdout(predicate::str::contains("repo [DIRECTORY] A tiny calculator project."))
        .stdout(predicate::str::contains("  main.py [PYTHON_FILE] Arithmetic helpers."))
        .stdout(predicate::str::contains("fn add: Adds two numbers."));
}

#[test]
fn flatten_writes_documents_in_preorder() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    let out = dir.path().join("docs.json");
    skald()
        .arg("flatten")
        .arg(&tree)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let docs: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    let types: Vec<&str> = docs
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["metadata"]["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, ["DIRECTORY", "PYTHON_FILE", "FUNCTION"]);
    assert_eq!(docs[2]["metadata"]["path"], "/tmp/repo/main.py");
    assert_eq!(
        docs[2]["page_content"],
        "Adds two numbers.\n\ndef add(a, b):\n    return a + b"
    );
}

#[test]
fn flatten_vector_batch_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    skald()
        .args(["flatten", "--vector-batch"])
        .arg(&tree)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ids\""))
        .stdout(predicate::str::contains("\"metadatas\""));
}

#[test]
fn missing_path_exits_with_not_found_code() {
    skald()
        .args(["summarize", "/definitely/not/a/real/path"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Cannot resolve path"));
}

#[test]
fn unreadable_tree_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("tree.json");
    std::fs::write(&bogus, "not json").unwrap();
    skald()
        .arg("show")
        .arg(&bogus)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot read tree"));
}
