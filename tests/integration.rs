use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn seed_only_profile_runs_clean_to_completion() {
    Command::cargo_bin("vsch")
        .unwrap()
        .arg(fixture("seed_only.profile"))
        .assert()
        .success()
        .stdout(predicate::str::contains("###-simulation start-###"))
        .stdout(predicate::str::contains("###-simulation end-###"));
}

#[test]
fn single_child_profile_traces_a_fork_with_the_required_banner() {
    Command::cargo_bin("vsch")
        .unwrap()
        .arg(fixture("single_child.profile"))
        .assert()
        .success()
        .stdout(predicate::str::contains("has been created"));
}

#[test]
fn killtime_profile_eventually_traces_the_task_going_down() {
    Command::cargo_bin("vsch")
        .unwrap()
        .arg(fixture("killtime.profile"))
        .assert()
        .success()
        .stdout(predicate::str::contains("is going down"));
}

#[test]
fn nested_spawn_profile_forks_both_generations_and_names_the_grandchild_with_its_parent() {
    let output = Command::cargo_bin("vsch")
        .unwrap()
        .arg(fixture("nested_spawn.profile"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let created: Vec<&str> = stdout.lines().filter(|l| l.contains("has been created")).collect();
    assert_eq!(created.len(), 2);

    let parent_line = created
        .iter()
        .find(|l| l.contains("(parent:"))
        .expect("parent was created");
    let child_line = created
        .iter()
        .find(|l| l.contains("(child:"))
        .expect("child was created");

    // The direct child of init carries no parent prefix...
    assert!(!parent_line.contains("init:("));
    // ...but the grandchild's display name contains its parent's.
    let parent_name_start = parent_line.find("(parent:").unwrap();
    let parent_name_end = parent_line[parent_name_start..].find(')').unwrap() + parent_name_start + 1;
    let parent_display = &parent_line[parent_name_start..parent_name_end];
    assert!(
        child_line.contains(parent_display),
        "child's display name `{child_line}` should contain parent's `{parent_display}`"
    );
}

#[test]
fn missing_profile_exits_with_code_one() {
    Command::cargo_bin("vsch")
        .unwrap()
        .arg(fixture("does_not_exist.profile"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("profile not found"));
}

#[test]
fn unknown_keyword_is_rejected_with_exit_code_one() {
    Command::cargo_bin("vsch")
        .unwrap()
        .arg(fixture("unknown_keyword.profile"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("malformed profile"));
}

#[test]
fn quiet_flag_does_not_suppress_the_simulation_trace() {
    Command::cargo_bin("vsch")
        .unwrap()
        .args(["--quiet", &fixture("single_child.profile")])
        .assert()
        .success()
        .stdout(predicate::str::contains("###-simulation start-###"))
        .stdout(predicate::str::contains("has been created"));
}

#[test]
fn verbose_and_quiet_are_mutually_exclusive() {
    Command::cargo_bin("vsch")
        .unwrap()
        .args(["--verbose", "--quiet", &fixture("seed_only.profile")])
        .assert()
        .failure();
}

#[test]
fn interactive_profile_traces_sleep_and_wake() {
    Command::cargo_bin("vsch")
        .unwrap()
        .arg(fixture("single_child.profile"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Going to Sleep"))
        .stdout(predicate::str::contains("Waking Up from Sleep"));
}
