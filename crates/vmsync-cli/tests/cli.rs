use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn vmsync() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vmsync"));
    cmd.env_remove("VMSYNC_INVENTORY");
    cmd
}

#[test]
fn help_lists_commands() {
    vmsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("--inventory"));
}

#[test]
fn sync_requires_host() {
    vmsync()
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--host"));
}

#[test]
fn sync_without_inventory_fails() {
    vmsync()
        .args(["sync", "--host", "h1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no inventory given"));
}

#[test]
fn unknown_host_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"hosts":[{{"id":"h1","address":"127.0.0.1"}}],"vms":[]}}"#
    )
    .unwrap();

    vmsync()
        .args(["scan", "--host", "h9", "--inventory"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("host 'h9' is not in the inventory"));
}

#[test]
fn scan_with_nothing_unknown_skips_the_host() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"hosts":[{{"id":"h1","address":"127.0.0.1"}}],
            "vms":[{{"id":"vm-1","state":"Running","host_id":"h1"}}]}}"#
    )
    .unwrap();

    vmsync()
        .args(["--json", "scan", "--host", "h1", "--inventory"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("nothing to verify"));
}

#[test]
fn invalid_inventory_is_reported() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"hosts":[],"vms":[{{"id":"vm-1","state":"Running","host_id":"ghost"}}]}}"#
    )
    .unwrap();

    vmsync()
        .args(["sync", "--host", "h1", "--inventory"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown host"));
}
