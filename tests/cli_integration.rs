use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::prelude::*;

fn cmdkit() -> Command {
    let mut cmd = Command::cargo_bin("cmdkit").unwrap();
    cmd.env_remove("CMDKIT_LOG");
    cmd
}

#[test]
fn test_no_arguments_show_help() {
    cmdkit()
        .assert()
        .success()
        .stdout(predicate::str::contains("(preview)"))
        .stdout(predicate::str::contains("cmdkit: package browser"))
        .stdout(predicate::str::contains("Main commands"))
        .stdout(predicate::str::contains("Support commands"))
        .stdout(predicate::str::contains("Search packages"));
}

#[test]
fn test_version_flag() {
    cmdkit()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stdout(predicate::str::contains("Main commands").not());
}

#[test]
fn test_query_lists_matches() {
    cmdkit()
        .args(["query", "serde"])
        .assert()
        .success()
        .stdout(predicate::str::contains("encoding/serde  1.0.228"))
        .stdout(predicate::str::contains("encoding/serde_json  1.0.145"))
        .stdout(predicate::str::contains("cli/clap").not());
}

#[test]
fn test_query_info_and_limit() {
    cmdkit()
        .args(["query", "*", "--limit", "2", "--info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("async/futures"))
        .stdout(predicate::str::contains("zero-cost asynchronous programming"))
        .stdout(predicate::str::contains("cli/clap").not());
}

#[test]
fn test_query_without_matches() {
    cmdkit()
        .args(["query", "zzz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("zero results"));
}

#[test]
fn test_query_max_fails() {
    cmdkit()
        .args(["query", "*", "--max", "3"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("expected at most 3 matches, found 8"))
        .stderr(predicate::str::contains("Closing with exit code 1"));
}

#[test]
fn test_query_requires_pattern() {
    cmdkit()
        .arg("query")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("pass at least one query pattern"));
}

#[test]
fn test_query_install_action() {
    cmdkit()
        .args(["query", "clap", "-a", "install"])
        .assert()
        .success()
        .stdout(predicate::str::contains("running: install"))
        .stdout(predicate::str::contains("vendor/cli-clap-4.5.53"))
        .stdout(predicate::str::contains("install success!"));
}

#[test]
fn test_query_unknown_action() {
    cmdkit()
        .args(["query", "clap", "--action", "publish"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unknown action: publish"))
        .stdout(predicate::str::contains("running:").not());
}

#[test]
fn test_settings_shows_defaults() {
    cmdkit()
        .args(["settings", "--config", "no-such-cmdkit.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"argv_padding\": 2"))
        .stdout(predicate::str::contains("--config: no-such-cmdkit.json"));
}

#[test]
fn test_unknown_command_falls_back_to_help() {
    cmdkit()
        .arg("frobnicate")
        .assert()
        .success()
        .stdout(predicate::str::contains("command not found: frobnicate"))
        .stdout(predicate::str::contains("Help commands"));
}

#[test]
fn test_unknown_option_fails() {
    cmdkit()
        .args(["query", "serde", "--bogus"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--bogus"));
}
