use assert_cmd::Command;
use predicates::prelude::*;

fn watch_attach() -> Command {
    Command::cargo_bin("watch-attach").expect("binary should be built")
}

#[test]
fn test_match_prints_root() {
    watch_attach()
        .args(["match", r#"dotnet exec "/repo/bin/app.dll""#, "--root", "/repo"])
        .assert()
        .success()
        .stdout("/repo\n");
}

#[test]
fn test_match_picks_the_containing_root() {
    watch_attach()
        .args([
            "match",
            "/work/other/bin/Debug/Other",
            "--root",
            "/work/api",
            "--root",
            "/work/other",
        ])
        .assert()
        .success()
        .stdout("/work/other\n");
}

#[test]
fn test_match_outside_roots_fails() {
    watch_attach()
        .args(["match", r#"dotnet exec "/elsewhere/app.dll""#, "--root", "/repo"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No workspace root contains"));
}

#[test]
fn test_match_rejects_build_tools() {
    watch_attach()
        .args([
            "match",
            r#"dotnet exec "/repo/sdk/MSBuild.dll" /repo/Api/Api.csproj"#,
            "--root",
            "/repo",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_match_requires_a_root() {
    watch_attach()
        .args(["match", "/repo/app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--root"));
}

#[test]
fn test_help_lists_subcommands() {
    watch_attach()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("ps"))
        .stdout(predicate::str::contains("match"));
}
