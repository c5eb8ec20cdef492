use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_completion_generates_bash_script() {
    Command::cargo_bin("blotter")
        .unwrap()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("blotter"));
}

#[test]
fn test_completion_rejects_unknown_shell() {
    Command::cargo_bin("blotter")
        .unwrap()
        .args(["completion", "tcsh"])
        .assert()
        .failure();
}
