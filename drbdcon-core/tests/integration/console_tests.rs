//! Console refresh pipeline over the scripted transport

use std::sync::Arc;

use drbdcon_core::config::HostConfig;
use drbdcon_core::parser::VncPort;
use drbdcon_core::remote::{Reply, ScriptedTransport};
use drbdcon_core::{
    Console, ConsoleConfig, Inspection, LookupScope, Outcome, RecordKind, StaticCommandTable,
};

const DRBD_XML: &str = r#"<config file="/etc/drbd.conf">
  <resource name="r0">
    <host name="alpha">
      <volume vnr="0">
        <device minor="0">/dev/drbd0</device>
        <disk>/dev/vg0/r0</disk>
        <meta-disk>internal</meta-disk>
      </volume>
      <address family="ipv4" port="7788">10.0.0.1</address>
    </host>
    <host name="beta">
      <volume vnr="0">
        <device minor="0">/dev/drbd0</device>
        <disk>/dev/sdb1</disk>
        <meta-disk>internal</meta-disk>
      </volume>
      <address family="ipv4" port="7788">10.0.0.2</address>
    </host>
  </resource>
</config>"#;

fn domains_xml(names: &[&str]) -> String {
    let mut xml = String::from("<vms>");
    for (i, name) in names.iter().enumerate() {
        xml.push_str(&format!(
            r#"<vm state="running" autostart="yes"><domain type="kvm" id="{i}"><name>{name}</name>
<memory unit="MiB">512</memory><vcpu>1</vcpu>
<devices><graphics type="vnc" port="-1" autoport="yes"/></devices></domain></vm>"#
        ));
    }
    xml.push_str("</vms>");
    xml
}

fn console(transport: &ScriptedTransport) -> Console {
    let mut config = ConsoleConfig::default();
    config.hosts = vec![HostConfig::new("alpha"), HostConfig::new("beta")];
    let mut table = StaticCommandTable::with_defaults();
    table.insert("Reload", LookupScope::Generic, "generic-reload @RES@");
    table.insert(
        "Reload",
        LookupScope::Family("rocky".into()),
        "rocky-reload @RES@ on @HOST@",
    );
    Console::new(config, Arc::new(table), Arc::new(transport.clone())).unwrap()
}

#[tokio::test]
async fn host_facts_switch_command_variants() {
    let transport = ScriptedTransport::new()
        .fallback(Reply::stdout(""))
        .on(
            "alpha",
            "kernel-version",
            Reply::stdout("hostname: alpha\ndistribution: rocky\ndistribution-version: 9\n"),
        )
        .on(
            "beta",
            "kernel-version",
            Reply::stdout("hostname: beta\ndistribution: debian\n"),
        );
    let console = console(&transport);
    let hosts = console.select_hosts(&[]).unwrap();

    let subs = vec![("RES".to_string(), "r0".to_string())];
    console.run("Reload", &subs, &hosts).join().await;
    assert_eq!(transport.commands_for("alpha").last().unwrap(), "generic-reload r0");

    let report = console.refresh(Inspection::HostInfo, &hosts).await;
    assert!(report.summary().all_succeeded());

    console.run("Reload", &subs, &hosts).join().await;
    assert_eq!(
        transport.commands_for("alpha").last().unwrap(),
        "rocky-reload r0 on alpha"
    );
    assert_eq!(transport.commands_for("beta").last().unwrap(), "generic-reload r0");
}

#[tokio::test]
async fn drbd_config_supports_peer_lookup() {
    let transport = ScriptedTransport::new()
        .on_command("dump-xml", Reply::stdout(DRBD_XML))
        .on_command("kernel-version", Reply::stdout("hostname: alpha.lab.example\n"));
    let console = console(&transport);
    let alpha = console.select_hosts(&["alpha".to_string()]).unwrap();
    let all = console.select_hosts(&[]).unwrap();

    console.refresh(Inspection::HostInfo, &alpha).await;
    let report = console.refresh(Inspection::DrbdConfig, &all).await;
    assert_eq!(report.hosts.len(), 2);
    assert!(report.hosts.iter().all(|h| h.merged && h.records == 2));

    let snapshot = console.snapshot();
    assert_eq!(snapshot.drbd_resource_hosts("r0"), vec!["alpha", "beta"]);
    let peers = snapshot.drbd_peer_block_device("r0", "alpha");
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].node, "beta");
    assert_eq!(peers[0].host.as_deref(), Some("beta"));
    assert_eq!(peers[0].disk.as_deref(), Some("/dev/sdb1"));
}

#[tokio::test]
async fn refresh_replaces_previous_records() {
    let transport = ScriptedTransport::new().on_command("virsh", Reply::stdout(domains_xml(&["a"])));
    let console = console(&transport);
    let alpha = console.select_hosts(&["alpha".to_string()]).unwrap();

    console.refresh(Inspection::VmDomains, &alpha).await;
    assert_eq!(console.snapshot().hosts_defining_domain("a"), vec!["alpha"]);

    transport.push(None, Some("virsh"), Reply::stdout(domains_xml(&["b"])));
    console.refresh(Inspection::VmDomains, &alpha).await;
    let snapshot = console.snapshot();
    assert!(snapshot.hosts_defining_domain("a").is_empty());
    assert_eq!(snapshot.hosts_defining_domain("b"), vec!["alpha"]);

    transport.push(None, Some("virsh"), Reply::stdout("<vms></vms>"));
    let report = console.refresh(Inspection::VmDomains, &alpha).await;
    assert!(report.hosts[0].merged);
    assert!(console.snapshot().vm_domains("alpha").is_empty());
}

#[tokio::test]
async fn live_vnc_display_overrides_definition() {
    let transport = ScriptedTransport::new()
        .on_command("dumpxml", Reply::stdout(domains_xml(&["web", "db"])))
        .on_command(
            "vncdisplay",
            Reply::stdout("domain: web\ndisplay: :4\n\ndomain: db\ndisplay: bogus\n"),
        );
    let console = console(&transport);
    let alpha = console.select_hosts(&["alpha".to_string()]).unwrap();

    console.refresh(Inspection::VmDomains, &alpha).await;
    assert_eq!(console.snapshot().vnc_port("alpha", "web"), VncPort::Unknown);

    let report = console.refresh(Inspection::VncDisplays, &alpha).await;
    assert_eq!(report.hosts[0].records, 2);
    let snapshot = console.snapshot();
    assert_eq!(snapshot.vnc_port("alpha", "web"), VncPort::Known(5904));
    assert_eq!(snapshot.vnc_port("alpha", "db"), VncPort::Unknown);
    assert_eq!(snapshot.records("alpha", RecordKind::VmDomain).count(), 2);
}

#[tokio::test]
async fn failed_host_leaves_model_untouched() {
    let transport = ScriptedTransport::new().on("alpha", "lsblk", Reply::stdout(
        "device: /dev/sda\nsize: 1000\ntype: disk\n\ndevice: /dev/sda1\nsize: 500\ntype: part\n",
    ));
    let console = console(&transport);
    let all = console.select_hosts(&[]).unwrap();

    let report = console.refresh(Inspection::BlockDevices, &all).await;
    let beta = report.hosts.iter().find(|h| h.host == "beta").unwrap();
    assert_eq!(beta.result.outcome, Outcome::Failure);
    assert!(!beta.merged);

    let snapshot = console.snapshot();
    assert_eq!(snapshot.records("alpha", RecordKind::BlockDevice).count(), 2);
    assert!(snapshot.host("beta").is_none());
    assert_eq!(report.generation, snapshot.generation());
}
