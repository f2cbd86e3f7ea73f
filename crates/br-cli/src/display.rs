//! Rendering of show, showstp and showmacs.

use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;

use br_core::{Bridge, BridgeChannel, BridgeInfo, FdbEntry, OutputFormat, PortInfo, Registry};

use crate::command::{Failure, Session};

#[derive(Debug, Serialize)]
struct BridgeSummary<'a> {
    name: &'a str,
    bridge_id: String,
    stp_enabled: bool,
    interfaces: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct StpReport<'a> {
    bridge: &'a str,
    #[serde(flatten)]
    info: BridgeInfo,
    ports: Vec<PortReport<'a>>,
}

#[derive(Debug, Serialize)]
struct PortReport<'a> {
    name: &'a str,
    port_no: u16,
    #[serde(flatten)]
    info: PortInfo,
}

/// Timer in `seconds.centiseconds`, seconds right-aligned to four columns.
fn timer(d: Duration) -> String {
    format!("{:4}.{:02}", d.as_secs(), d.subsec_millis() / 10)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Write `value` in a structured format; text output is rendered by the callers.
fn emit<W: Write, T: Serialize>(out: &mut W, format: OutputFormat, value: &T) -> io::Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut *out, value)?;
        writeln!(out)
    } else {
        serde_yaml::to_writer(&mut *out, value).map_err(io::Error::other)
    }
}

pub fn show<C, W, E>(session: &mut Session<'_, C, W, E>) -> Result<(), Failure>
where
    C: BridgeChannel,
    W: Write,
    E: Write,
{
    let registry = session.registry;
    if session.format == OutputFormat::Text {
        writeln!(session.out, "bridge name\tbridge id\t\tSTP enabled\tinterfaces")?;
    }

    let mut summaries = Vec::new();
    for bridge in registry.bridges() {
        let info = match registry.bridge_info(bridge) {
            Ok(info) => info,
            Err(e) => {
                let errno = e.errno().map(|e| e.to_string()).unwrap_or_else(|| e.to_string());
                writeln!(session.err, "{}: can't get info {errno}", bridge.name())?;
                continue;
            }
        };
        let summary = BridgeSummary {
            name: bridge.name(),
            bridge_id: info.bridge_id.to_string(),
            stp_enabled: info.stp_enabled,
            interfaces: bridge.ports().iter().map(|p| p.name()).collect(),
        };
        if session.format == OutputFormat::Text {
            write_summary(&mut session.out, &summary)?;
        } else {
            summaries.push(summary);
        }
    }

    if session.format != OutputFormat::Text {
        emit(&mut session.out, session.format, &summaries)?;
    }
    Ok(())
}

fn write_summary<W: Write>(out: &mut W, summary: &BridgeSummary<'_>) -> io::Result<()> {
    write!(
        out,
        "{}\t\t{}\t{}\t\t",
        summary.name,
        summary.bridge_id,
        yes_no(summary.stp_enabled)
    )?;
    let mut interfaces = summary.interfaces.iter();
    match interfaces.next() {
        Some(first) => writeln!(out, "{first}")?,
        None => writeln!(out)?,
    }
    for name in interfaces {
        writeln!(out, "\t\t\t\t\t\t\t{name}")?;
    }
    Ok(())
}

pub fn showstp<C, W, E>(session: &mut Session<'_, C, W, E>, bridge: &Bridge) -> Result<(), Failure>
where
    C: BridgeChannel,
    W: Write,
    E: Write,
{
    let registry = session.registry;
    let info = registry.bridge_info(bridge)?;
    let ports = port_reports(registry, bridge, &mut session.err)?;

    if session.format != OutputFormat::Text {
        let report = StpReport {
            bridge: bridge.name(),
            info,
            ports,
        };
        emit(&mut session.out, session.format, &report)?;
        return Ok(());
    }

    write_bridge_block(&mut session.out, bridge, &info)?;
    for port in &ports {
        write_port_block(&mut session.out, port)?;
    }
    Ok(())
}

/// Port snapshots in slot order; a port whose info can't be read is reported and skipped.
fn port_reports<'b, C: BridgeChannel, E: Write>(
    registry: &Registry<C>,
    bridge: &'b Bridge,
    err: &mut E,
) -> io::Result<Vec<PortReport<'b>>> {
    let mut reports = Vec::new();
    for port in bridge.ports() {
        match registry.port_info(port) {
            Ok(info) => reports.push(PortReport {
                name: port.name(),
                port_no: port.slot(),
                info,
            }),
            Err(e) => {
                let errno = e.errno().map(|e| e.to_string()).unwrap_or_else(|| e.to_string());
                writeln!(
                    err,
                    "{}: can't get port {} info {errno}",
                    bridge.name(),
                    port.slot()
                )?;
            }
        }
    }
    Ok(reports)
}

fn write_bridge_block<W: Write>(out: &mut W, bridge: &Bridge, info: &BridgeInfo) -> io::Result<()> {
    writeln!(out, "{}", bridge.name())?;
    writeln!(out, " bridge id\t\t{}", info.bridge_id)?;
    writeln!(out, " designated root\t{}", info.designated_root)?;
    writeln!(
        out,
        " root port\t\t{:4}\t\t\tpath cost\t\t{:4}",
        info.root_port, info.root_path_cost
    )?;
    writeln!(
        out,
        " max age\t\t{}\t\t\tbridge max age\t\t{}",
        timer(info.max_age),
        timer(info.bridge_max_age)
    )?;
    writeln!(
        out,
        " hello time\t\t{}\t\t\tbridge hello time\t{}",
        timer(info.hello_time),
        timer(info.bridge_hello_time)
    )?;
    writeln!(
        out,
        " forward delay\t\t{}\t\t\tbridge forward delay\t{}",
        timer(info.forward_delay),
        timer(info.bridge_forward_delay)
    )?;
    writeln!(
        out,
        " ageing time\t\t{}\t\t\tgc interval\t\t{}",
        timer(info.ageing_time),
        timer(info.gc_interval)
    )?;
    writeln!(
        out,
        " hello timer\t\t{}\t\t\ttcn timer\t\t{}",
        timer(info.hello_timer),
        timer(info.tcn_timer)
    )?;
    writeln!(
        out,
        " topology change timer\t{}\t\t\tgc timer\t\t{}",
        timer(info.topology_change_timer),
        timer(info.gc_timer)
    )?;

    write!(out, " flags\t\t\t")?;
    if info.topology_change {
        write!(out, "TOPOLOGY_CHANGE ")?;
    }
    if info.topology_change_detected {
        write!(out, "TOPOLOGY_CHANGE_DETECTED ")?;
    }
    writeln!(out)?;
    writeln!(out)?;
    writeln!(out)
}

fn write_port_block<W: Write>(out: &mut W, port: &PortReport<'_>) -> io::Result<()> {
    let info = &port.info;
    writeln!(out, "{} ({})", port.name, port.port_no)?;
    writeln!(
        out,
        " port id\t\t{:04x}\t\t\tstate\t\t\t{}",
        info.port_id, info.state
    )?;
    writeln!(
        out,
        " designated root\t{}\tpath cost\t\t{:4}",
        info.designated_root, info.path_cost
    )?;
    writeln!(
        out,
        " designated bridge\t{}\tmessage age timer\t{}",
        info.designated_bridge,
        timer(info.message_age_timer)
    )?;
    writeln!(
        out,
        " designated port\t{:04x}\t\t\tforward delay timer\t{}",
        info.designated_port,
        timer(info.forward_delay_timer)
    )?;
    writeln!(
        out,
        " designated cost\t{:4}\t\t\thold timer\t\t{}",
        info.designated_cost,
        timer(info.hold_timer)
    )?;

    write!(out, " flags\t\t\t")?;
    if info.config_pending {
        write!(out, "CONFIG_PENDING ")?;
    }
    if info.top_change_ack {
        write!(out, "TOPOLOGY_CHANGE_ACK ")?;
    }
    writeln!(out)?;
    writeln!(out)
}

pub fn showmacs<C, W, E>(session: &mut Session<'_, C, W, E>, bridge: &Bridge) -> Result<(), Failure>
where
    C: BridgeChannel,
    W: Write,
    E: Write,
{
    let registry = session.registry;

    if session.format != OutputFormat::Text {
        let mut entries: Vec<FdbEntry> = Vec::new();
        for page in registry.fdb_pages(bridge) {
            entries.extend(page?);
        }
        emit(&mut session.out, session.format, &entries)?;
        return Ok(());
    }

    writeln!(session.out, "port no\tmac addr\t\tis local?\tageing timer")?;
    for page in registry.fdb_pages(bridge) {
        for entry in page? {
            writeln!(
                session.out,
                "{:3}\t{}\t{}\t\t{}",
                entry.port_no,
                entry.mac_addr,
                yes_no(entry.is_local),
                timer(entry.ageing_timer)
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use br_core::{Errno, MockKernel, Op, Settings};

    fn session<'a>(
        registry: &'a Registry<MockKernel>,
        format: OutputFormat,
    ) -> Session<'a, MockKernel, Vec<u8>, Vec<u8>> {
        Session {
            registry,
            out: Vec::new(),
            err: Vec::new(),
            format,
        }
    }

    fn registry() -> Registry<MockKernel> {
        let kernel = MockKernel::new();
        kernel.add_link("eth0");
        kernel.add_link("eth1");
        kernel.create_bridge("br0", &["eth0", "eth1"]);
        kernel.create_bridge("br1", &[]);
        kernel.add_fdb("br0", [0x02, 0, 0, 0, 0, 0x09], 2, false, 150);
        kernel.add_fdb("br0", [0x00, 0x11, 0x22, 0x33, 0x44, 0x55], 1, true, 0);
        Registry::initialize(kernel, Settings::default()).unwrap()
    }

    #[test]
    fn timer_format() {
        assert_eq!(timer(Duration::from_secs(20)), "  20.00");
        assert_eq!(timer(Duration::from_millis(1500)), "   1.50");
        assert_eq!(timer(Duration::from_secs(12345)), "12345.00");
    }

    #[test]
    fn show_lists_extra_ports_on_continuation_lines() {
        let registry = registry();
        let br0_id = registry
            .bridge_info(registry.find_bridge("br0").unwrap())
            .unwrap()
            .bridge_id;
        let br1_id = registry
            .bridge_info(registry.find_bridge("br1").unwrap())
            .unwrap()
            .bridge_id;

        let mut s = session(&registry, OutputFormat::Text);
        show(&mut s).unwrap();
        let out = String::from_utf8(s.out).unwrap();

        let mut expected = vec![
            "bridge name\tbridge id\t\tSTP enabled\tinterfaces".to_string(),
            format!("br0\t\t{br0_id}\tno\t\teth0"),
            "\t\t\t\t\t\t\teth1".to_string(),
            format!("br1\t\t{br1_id}\tno\t\t"),
        ];
        expected.push(String::new());
        assert_eq!(out, expected.join("\n"));
    }

    #[test]
    fn show_skips_bridge_whose_info_fails() {
        let registry = registry();
        registry.channel().fail_next(Op::BridgeInfo, Errno::ENODEV);
        let mut s = session(&registry, OutputFormat::Text);
        show(&mut s).unwrap();
        let out = String::from_utf8(s.out).unwrap();
        let err = String::from_utf8(s.err).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(err.starts_with("br0: can't get info "));
    }

    #[test]
    fn show_json_is_machine_readable() {
        let registry = registry();
        let mut s = session(&registry, OutputFormat::Json);
        show(&mut s).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&s.out).unwrap();
        assert_eq!(value[0]["name"], "br0");
        assert_eq!(value[0]["interfaces"][1], "eth1");
        assert_eq!(value[1]["interfaces"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn showmacs_sorts_and_formats_entries() {
        let registry = registry();
        let br0 = registry.find_bridge("br0").unwrap();
        let mut s = session(&registry, OutputFormat::Text);
        showmacs(&mut s, br0).unwrap();
        let out = String::from_utf8(s.out).unwrap();
        assert_eq!(
            out,
            "port no\tmac addr\t\tis local?\tageing timer\n\
             \x20 1\t00:11:22:33:44:55\tyes\t\t   0.00\n\
             \x20 2\t02:00:00:00:00:09\tno\t\t   1.50\n"
        );
    }

    #[test]
    fn showmacs_yaml_reports_seconds() {
        let registry = registry();
        let br0 = registry.find_bridge("br0").unwrap();
        let mut s = session(&registry, OutputFormat::Yaml);
        showmacs(&mut s, br0).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_slice(&s.out).unwrap();
        assert_eq!(value[0]["mac_addr"].as_str(), Some("00:11:22:33:44:55"));
        assert_eq!(value[1]["ageing_timer"].as_f64(), Some(1.5));
    }

    #[test]
    fn showmacs_read_failure_propagates() {
        let registry = registry();
        let br0 = registry.find_bridge("br0").unwrap();
        registry.channel().fail_next(Op::ReadFdb, Errno::EPERM);
        let mut s = session(&registry, OutputFormat::Text);
        let err = showmacs(&mut s, br0).unwrap_err();
        assert!(matches!(err, Failure::Bridge(e) if e.errno() == Some(Errno::EPERM)));
    }

    #[test]
    fn showstp_prints_bridge_then_ports() {
        let registry = registry();
        let br0 = registry.find_bridge("br0").unwrap();
        let mut s = session(&registry, OutputFormat::Text);
        showstp(&mut s, br0).unwrap();
        let out = String::from_utf8(s.out).unwrap();

        assert!(out.starts_with("br0\n bridge id\t\t"));
        assert!(out.contains(" max age\t\t  20.00\t\t\tbridge max age\t\t  20.00\n"));
        assert!(out.contains(" ageing time\t\t 300.00\t\t\tgc interval\t\t   4.00\n"));
        let eth0 = out.find("eth0 (1)\n").unwrap();
        let eth1 = out.find("eth1 (2)\n").unwrap();
        assert!(eth0 < eth1);
        assert!(out.contains("state\t\t\tdisabled\n"));
    }

    #[test]
    fn showstp_json_nests_ports() {
        let registry = registry();
        let br0 = registry.find_bridge("br0").unwrap();
        let mut s = session(&registry, OutputFormat::Json);
        showstp(&mut s, br0).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&s.out).unwrap();
        assert_eq!(value["bridge"], "br0");
        assert_eq!(value["bridge_max_age"].as_f64(), Some(20.0));
        assert_eq!(value["ports"][0]["name"], "eth0");
        assert_eq!(value["ports"][1]["port_no"], 2);
        assert_eq!(value["ports"][0]["state"], "disabled");
    }
}
