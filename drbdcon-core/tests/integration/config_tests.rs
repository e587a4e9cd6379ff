//! Configuration files feeding a console

use std::sync::Arc;

use drbdcon_core::command::CommandTable;
use drbdcon_core::config::{ConfigManager, HostConfig};
use drbdcon_core::remote::{Reply, ScriptedTransport};
use drbdcon_core::{Console, ConsoleConfig, LookupScope};
use tempfile::TempDir;

#[test]
fn save_then_load_round_trips_without_passwords() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_config_dir(dir.path().join("nested"));

    let mut config = ConsoleConfig::default();
    config.executor.max_parallel = 3;
    config.ssh.sudo = true;
    let mut host = HostConfig::new("alpha");
    host.address = Some("10.0.0.1".to_string());
    host.password = Some(secrecy::SecretString::from("hunter2"));
    config.hosts.push(host);
    manager.save(&config).unwrap();

    let written = std::fs::read_to_string(manager.config_path()).unwrap();
    assert!(!written.contains("hunter2"));

    let loaded = manager.load().unwrap();
    assert_eq!(loaded.executor.max_parallel, 3);
    assert!(loaded.ssh.sudo);
    assert_eq!(loaded.hosts.len(), 1);
    assert!(loaded.hosts[0].password.is_none());
}

#[test]
fn commands_file_overrides_config_entries() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_config_dir(dir.path().to_path_buf());
    std::fs::write(
        manager.config_path(),
        "[commands.status]\ndefault = \"from-config\"\ndebian = \"debian-config\"\n",
    )
    .unwrap();
    std::fs::write(
        manager.commands_path(),
        "[commands.status]\ndefault = \"from-file\"\n",
    )
    .unwrap();

    let config = manager.load().unwrap();
    let table = manager.command_table(&config).unwrap();
    assert_eq!(table.lookup("status", &LookupScope::Generic), Some("from-file"));
    assert_eq!(
        table.lookup("status", &LookupScope::Family("debian".into())),
        Some("debian-config")
    );
}

#[tokio::test]
async fn console_from_loaded_config() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_config_dir(dir.path().to_path_buf());
    std::fs::write(
        manager.config_path(),
        r#"
[ssh]
sudo = true

[[hosts]]
name = "alpha"
user = "admin"

[commands.uptime]
default = "uptime"
"#,
    )
    .unwrap();

    let config = manager.load().unwrap();
    let table = manager.command_table(&config).unwrap();
    let transport = ScriptedTransport::new().fallback(Reply::stdout("up 3 days"));
    let console = Console::new(config, Arc::new(table), Arc::new(transport.clone())).unwrap();

    let hosts = console.select_hosts(&[]).unwrap();
    let results = console.run("uptime", &[], &hosts).join().await;
    assert_eq!(results[0].stdout, "up 3 days");
    assert_eq!(transport.commands_for("alpha"), vec!["sudo -n sh -c 'uptime'"]);
}
