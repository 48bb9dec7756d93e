//! CLI integration tests driving the compiled binary.

use std::fs;

use assert_cmd::Command;

fn write_fixture(dir: &std::path::Path) -> std::path::PathBuf {
    fs::write(
        dir.join("Cargo.toml"),
        "[package]\nname = \"cli-fixture\"\nversion = \"0.1.0\"\n",
    )
    .unwrap();
    let path = dir.join("exports.rs");
    fs::write(
        &path,
        "/// py:export\npub fn Add(a: i64, b: i64) -> i64 { a + b }\n",
    )
    .unwrap();
    path
}

#[test]
fn test_codegen_writes_three_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = write_fixture(dir.path());
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();

    Command::cargo_bin("pybridge")
        .unwrap()
        .args([
            "codegen",
            "--pymodule",
            "sample",
            "--output-dir",
            out.to_str().unwrap(),
            fixture.to_str().unwrap(),
        ])
        .assert()
        .success();

    assert!(out.join("pyexports.c").is_file());
    assert!(out.join("pyexports.h").is_file());
    assert!(out.join("pyexports.rs").is_file());

    let c = fs::read_to_string(out.join("pyexports.c")).unwrap();
    assert!(c.contains("PyInit_sample"));
}

#[test]
fn test_codegen_fails_without_exports() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.rs");
    fs::write(&path, "pub fn unmarked() {}\n").unwrap();

    Command::cargo_bin("pybridge")
        .unwrap()
        .args(["codegen", path.to_str().unwrap()])
        .current_dir(dir.path())
        .assert()
        .failure();
}

#[test]
fn test_codegen_reports_unsupported_types() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.rs");
    fs::write(
        &path,
        "/// py:export\npub fn bad(cb: fn(i32) -> i32) {}\n",
    )
    .unwrap();

    let assert = Command::cargo_bin("pybridge")
        .unwrap()
        .args(["codegen", path.to_str().unwrap()])
        .current_dir(dir.path())
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("bad"), "{stderr}");
}
