//! Integration tests for the drbdcon CLI
//!
//! These run the binary against temporary configuration directories and
//! cover every command that works without reaching a remote host.

#![allow(clippy::uninlined_format_args)]

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// Helper to run the CLI with given arguments
fn run_cli(args: &[&str], config_dir: Option<&Path>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_drbdcon"));
    cmd.env_remove("DRBDCON_CONFIG_DIR");
    if let Some(dir) = config_dir {
        cmd.env("DRBDCON_CONFIG_DIR", dir);
    }
    cmd.args(args).output().expect("Failed to execute CLI")
}

/// Helper to run the CLI with `input` on stdin
fn run_cli_with_stdin(args: &[&str], input: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_drbdcon"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes())
        .expect("Failed to write stdin");
    child.wait_with_output().expect("Failed to wait for CLI")
}

fn stdout_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Creates a config dir holding `content` as drbdcon.toml
fn config_dir_with(content: &str) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("drbdcon.toml"), content).expect("Failed to write config");
    dir
}

const CONFIG: &str = r#"
[ssh]
sudo = true

[[hosts]]
name = "node-a"
address = "10.0.0.1"
user = "admin"
distribution = "debian"
version = "12"

[[hosts]]
name = "node-b"
address = "10.0.0.2"
user = "root"

[commands.drbd-up]
default = "drbdadm up @RES@"
"debian:12" = "drbdadm up --debian @RES@"
"#;

// ============================================================================
// Help and completions
// ============================================================================

#[test]
fn test_help_command() {
    let output = run_cli(&["--help"], None);
    assert!(output.status.success(), "Help command should succeed");

    let stdout = stdout_str(&output);
    assert!(stdout.contains("drbdcon"), "Help should mention program name");
    for command in ["hosts", "resolve", "exec", "inspect", "parse", "init"] {
        assert!(stdout.contains(command), "Help should mention {command}");
    }
}

#[test]
fn test_completions_bash() {
    let output = run_cli(&["completions", "bash"], None);
    assert!(output.status.success());
    assert!(stdout_str(&output).contains("drbdcon"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_init_writes_config_once() {
    let dir = TempDir::new().unwrap();

    let output = run_cli(&["init"], Some(dir.path()));
    assert!(output.status.success(), "stderr: {}", stderr_str(&output));
    let written = std::fs::read_to_string(dir.path().join("drbdcon.toml")).unwrap();
    assert!(written.contains("[executor]"));

    let output = run_cli(&["init"], Some(dir.path()));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_str(&output).contains("already exists"));

    let output = run_cli(&["init", "--force"], Some(dir.path()));
    assert!(output.status.success());
}

#[test]
fn test_hosts_lists_configured_hosts() {
    let dir = config_dir_with(CONFIG);
    let output = run_cli(&["hosts"], Some(dir.path()));
    assert!(output.status.success(), "stderr: {}", stderr_str(&output));

    let stdout = stdout_str(&output);
    assert!(stdout.contains("node-a"));
    assert!(stdout.contains("10.0.0.2:22"));
    assert!(stdout.contains("debian:12"));
}

#[test]
fn test_hosts_json() {
    let dir = config_dir_with(CONFIG);
    let output = run_cli(&["hosts", "--format", "json"], Some(dir.path()));
    assert!(output.status.success());

    let hosts: serde_json::Value = serde_json::from_str(&stdout_str(&output)).unwrap();
    assert_eq!(hosts.as_array().map(Vec::len), Some(2));
    assert_eq!(hosts[0]["name"], "node-a");
}

#[test]
fn test_invalid_config_is_general_error() {
    let dir = config_dir_with("[[hosts]]\nname = \"\"\n");
    let output = run_cli(&["hosts"], Some(dir.path()));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_str(&output).contains("Configuration error"));
}

#[test]
fn test_config_flag_overrides_env() {
    let dir = config_dir_with(CONFIG);
    let empty = TempDir::new().unwrap();
    let path = dir.path().to_str().unwrap();
    let output = run_cli(&["--config", path, "hosts"], Some(empty.path()));
    assert!(output.status.success());
    assert!(stdout_str(&output).contains("node-b"));
}

// ============================================================================
// Resolve
// ============================================================================

#[test]
fn test_resolve_builtin_inspection() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["resolve", "HostInfo"], Some(dir.path()));
    assert!(output.status.success(), "stderr: {}", stderr_str(&output));
    assert!(stdout_str(&output).contains("uname -r"));
}

#[test]
fn test_resolve_falls_back_through_distribution_scopes() {
    let dir = config_dir_with(CONFIG);

    let output = run_cli(
        &["resolve", "drbd-up", "-d", "debian:12:x86_64", "-s", "RES=r0"],
        Some(dir.path()),
    );
    assert!(output.status.success(), "stderr: {}", stderr_str(&output));
    assert_eq!(stdout_str(&output).trim(), "drbdadm up --debian r0");

    let output = run_cli(
        &["resolve", "drbd-up", "-d", "rocky:9", "-s", "RES=r0"],
        Some(dir.path()),
    );
    assert_eq!(stdout_str(&output).trim(), "drbdadm up r0");
}

#[test]
fn test_resolve_for_host_applies_sudo() {
    let dir = config_dir_with(CONFIG);

    let output = run_cli(
        &["resolve", "drbd-up", "--host", "node-a", "-s", "RES=r1"],
        Some(dir.path()),
    );
    assert!(output.status.success(), "stderr: {}", stderr_str(&output));
    assert_eq!(
        stdout_str(&output).trim(),
        "sudo -n sh -c 'drbdadm up --debian r1'"
    );

    let output = run_cli(
        &["resolve", "drbd-up", "--host", "node-b", "-s", "RES=r1"],
        Some(dir.path()),
    );
    assert_eq!(stdout_str(&output).trim(), "drbdadm up r1");
}

#[test]
fn test_resolve_missing_substitution() {
    let dir = config_dir_with(CONFIG);
    let output = run_cli(&["resolve", "drbd-up"], Some(dir.path()));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_str(&output).contains("RES"));
}

#[test]
fn test_resolve_unknown_command() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["resolve", "no-such-command"], Some(dir.path()));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_str(&output).contains("no-such-command"));
}

#[test]
fn test_commands_lists_table_names() {
    let dir = config_dir_with(CONFIG);
    let output = run_cli(&["commands"], Some(dir.path()));
    assert!(output.status.success());
    let stdout = stdout_str(&output);
    assert!(stdout.lines().any(|l| l == "drbd-up"));
    assert!(stdout.lines().any(|l| l == "HostInfo"));
}

// ============================================================================
// Exec and inspect without reaching a host
// ============================================================================

#[test]
fn test_exec_unknown_host() {
    let dir = config_dir_with(CONFIG);
    let output = run_cli(&["exec", "drbd-up", "node-z"], Some(dir.path()));
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_str(&output).contains("node-z"));
}

#[test]
fn test_inspect_without_hosts() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&["inspect"], Some(dir.path()));
    assert!(output.status.success());
    assert!(stdout_str(&output).contains("No hosts configured"));
}

// ============================================================================
// Parse
// ============================================================================

#[test]
fn test_parse_domain_xml_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("domains.xml");
    std::fs::write(
        &file,
        r#"<vms><vm state="running"><domain type="kvm"><name>web</name>
<devices><graphics type="vnc" port="5901"/></devices></domain></vm></vms>"#,
    )
    .unwrap();

    let output = run_cli(
        &["parse", "domain-xml", file.to_str().unwrap(), "--format", "json"],
        None,
    );
    assert!(output.status.success(), "stderr: {}", stderr_str(&output));
    let parsed: serde_json::Value = serde_json::from_str(&stdout_str(&output)).unwrap();
    assert_eq!(parsed["records"][0]["kind"], "vm_domain");
    assert_eq!(parsed["records"][0]["name"], "web");
    assert_eq!(parsed["diagnostics"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_parse_truncated_xml_reports_diagnostic() {
    let output = run_cli_with_stdin(&["parse", "drbd-config-xml"], "<config><resource name=\"r0\">");
    assert!(output.status.success());
    assert!(stdout_str(&output).contains("0 record(s), 1 diagnostic(s)"));
}

#[test]
fn test_parse_vnc_status_from_stdin() {
    let output = run_cli_with_stdin(
        &["parse", "vnc-status", "-"],
        "domain: web\ndisplay: :4\n\ndomain: db\ndisplay: bogus\n",
    );
    assert!(output.status.success(), "stderr: {}", stderr_str(&output));
    let stdout = stdout_str(&output);
    assert!(stdout.contains("vnc_endpoint"));
    assert!(stdout.contains("2 record(s)"));
}

#[test]
fn test_parse_unknown_kind() {
    let output = run_cli(&["parse", "yaml", "-"], None);
    assert!(!output.status.success());
}
