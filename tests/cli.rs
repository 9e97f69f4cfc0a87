mod common;

use common::rescuebot_bin;

#[test]
fn version_flag_prints_version() {
    let output = rescuebot_bin().arg("--version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    assert!(stdout.starts_with("rescuebot"));
}

#[test]
fn help_flag_prints_usage() {
    let output = rescuebot_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage: rescuebot"));
}

#[test]
fn missing_config_is_fatal() {
    let output = rescuebot_bin()
        .args(["--config", "/nonexistent/rescuebot-config.toml"])
        .env_remove("RESCUEBOT_API_KEY")
        .output()
        .unwrap();
    assert!(!output.status.success());
}
