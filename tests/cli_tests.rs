//! Binary smoke tests. Anything beyond argument handling needs the real
//! handset, so only the argv surface is covered here.

use assert_cmd::Command;

#[test]
fn help_mentions_the_device_flag() {
    let mut cmd = Command::cargo_bin("mousefon").unwrap();
    let assert = cmd.arg("--help").assert().success();
    let output = assert.get_output();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--device"));
    assert!(stdout.contains("--on-key"));
}

#[test]
fn version_flag_works() {
    let mut cmd = Command::cargo_bin("mousefon").unwrap();
    cmd.arg("--version").assert().success();
}

#[test]
fn missing_device_is_a_clean_failure() {
    let mut cmd = Command::cargo_bin("mousefon").unwrap();
    cmd.args(["--device", "/nonexistent/hiddev0"])
        .assert()
        .failure()
        .code(1);
}
