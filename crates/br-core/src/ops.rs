//! Control operations: each issues exactly one configuration request.
//!
//! Operator input is validated before the request goes out; malformed values
//! and unknown names never reach the kernel. Nothing here retries.

use std::time::Duration;
use tracing::{debug, info};

use crate::channel::{BridgeChannel, Setting};
use crate::error::{BridgeError, Op, Result};
use crate::registry::{Bridge, Port, Registry};

/// Parse an integer the way C's `%i` does: sign, `0x` hex, leading-`0` octal.
pub fn parse_int(what: &'static str, value: &str) -> Result<i64> {
    let invalid = || BridgeError::InvalidInteger {
        what,
        value: value.to_string(),
    };

    let trimmed = value.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (radix, digits) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    let magnitude = i64::from_str_radix(digits, radix).map_err(|_| invalid())?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Parse an integer and check it fits `min..=max`.
pub fn parse_bounded(what: &'static str, value: &str, min: i64, max: i64) -> Result<i64> {
    let parsed = parse_int(what, value)?;
    if parsed < min || parsed > max {
        return Err(BridgeError::OutOfRange {
            what,
            value: parsed,
            min,
            max,
        });
    }
    Ok(parsed)
}

/// Accepted spellings for turning STP on or off.
pub fn parse_stp_flag(value: &str) -> Result<bool> {
    match value {
        "on" | "yes" | "1" => Ok(true),
        "off" | "no" | "0" => Ok(false),
        other => Err(BridgeError::InvalidStpFlag(other.to_string())),
    }
}

impl<C: BridgeChannel> Registry<C> {
    pub fn add_bridge(&self, name: &str) -> Result<()> {
        debug!(bridge = name, "adding bridge");
        self.channel()
            .add_bridge(name)
            .map_err(|errno| BridgeError::kernel(Op::AddBridge, errno))?;
        info!(bridge = name, "bridge created");
        Ok(())
    }

    pub fn del_bridge(&self, name: &str) -> Result<()> {
        debug!(bridge = name, "deleting bridge");
        self.channel()
            .del_bridge(name)
            .map_err(|errno| BridgeError::kernel(Op::DelBridge, errno))?;
        info!(bridge = name, "bridge deleted");
        Ok(())
    }

    /// Enslave the named interface to `bridge`.
    pub fn add_interface(&self, bridge: &Bridge, ifname: &str) -> Result<()> {
        let bridge = self.check_current(bridge)?;
        let ifindex = self.interface_index(ifname)?;
        debug!(bridge = bridge.name(), interface = ifname, ifindex, "adding interface");
        self.channel()
            .add_interface(bridge.name(), ifindex)
            .map_err(|errno| BridgeError::kernel(Op::AddInterface, errno))?;
        info!(bridge = bridge.name(), interface = ifname, "interface added");
        Ok(())
    }

    pub fn del_interface(&self, bridge: &Bridge, ifname: &str) -> Result<()> {
        let bridge = self.check_current(bridge)?;
        let ifindex = self.interface_index(ifname)?;
        debug!(bridge = bridge.name(), interface = ifname, ifindex, "removing interface");
        self.channel()
            .del_interface(bridge.name(), ifindex)
            .map_err(|errno| BridgeError::kernel(Op::DelInterface, errno))?;
        info!(bridge = bridge.name(), interface = ifname, "interface removed");
        Ok(())
    }

    pub fn set_ageing_time(&self, bridge: &Bridge, time: Duration) -> Result<()> {
        let ticks = self.tick_rate().to_ticks(time);
        self.apply(bridge, Setting::AgeingTime(ticks))
    }

    pub fn set_forward_delay(&self, bridge: &Bridge, time: Duration) -> Result<()> {
        let ticks = self.tick_rate().to_ticks(time);
        self.apply(bridge, Setting::ForwardDelay(ticks))
    }

    pub fn set_hello_time(&self, bridge: &Bridge, time: Duration) -> Result<()> {
        let ticks = self.tick_rate().to_ticks(time);
        self.apply(bridge, Setting::HelloTime(ticks))
    }

    pub fn set_max_age(&self, bridge: &Bridge, time: Duration) -> Result<()> {
        let ticks = self.tick_rate().to_ticks(time);
        self.apply(bridge, Setting::MaxAge(ticks))
    }

    pub fn set_gc_interval(&self, bridge: &Bridge, time: Duration) -> Result<()> {
        let ticks = self.tick_rate().to_ticks(time);
        self.apply(bridge, Setting::GcInterval(ticks))
    }

    pub fn set_stp(&self, bridge: &Bridge, enabled: bool) -> Result<()> {
        self.apply(bridge, Setting::StpState(enabled))
    }

    pub fn set_bridge_priority(&self, bridge: &Bridge, priority: u16) -> Result<()> {
        self.apply(bridge, Setting::BridgePriority(priority))
    }

    pub fn set_port_priority(&self, port: &Port, priority: u32) -> Result<()> {
        let bridge = self.port_parent(port)?;
        self.apply(
            bridge,
            Setting::PortPriority {
                slot: port.slot(),
                priority,
            },
        )
    }

    pub fn set_path_cost(&self, port: &Port, cost: u32) -> Result<()> {
        let bridge = self.port_parent(port)?;
        self.apply(
            bridge,
            Setting::PathCost {
                slot: port.slot(),
                cost,
            },
        )
    }

    fn apply(&self, bridge: &Bridge, setting: Setting) -> Result<()> {
        let bridge = self.check_current(bridge)?;
        debug!(bridge = bridge.name(), ?setting, "applying setting");
        self.channel()
            .apply(bridge.name(), setting)
            .map_err(|errno| BridgeError::kernel(setting.op(), errno))?;
        info!(bridge = bridge.name(), op = %setting.op(), "setting applied");
        Ok(())
    }

    fn port_parent(&self, port: &Port) -> Result<&Bridge> {
        self.parent(port)
            .ok_or_else(|| BridgeError::NoSuchPort {
                bridge: format!("#{}", port.bridge().ifindex()),
                port: port.name().to_string(),
            })
    }

    fn interface_index(&self, ifname: &str) -> Result<u32> {
        self.channel()
            .name_to_index(ifname)
            .map_err(|errno| BridgeError::kernel(Op::ResolveLink, errno))?
            .ok_or_else(|| BridgeError::NoSuchInterface(ifname.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::Errno;
    use crate::mock::MockKernel;

    fn registry() -> Registry<MockKernel> {
        let kernel = MockKernel::new();
        kernel.add_link("eth0");
        kernel.add_link("eth1");
        Registry::initialize(kernel, Settings::default()).unwrap()
    }

    #[test]
    fn parse_int_follows_c_conventions() {
        assert_eq!(parse_int("priority", "100").unwrap(), 100);
        assert_eq!(parse_int("priority", "0x10").unwrap(), 16);
        assert_eq!(parse_int("priority", "0X1f").unwrap(), 31);
        assert_eq!(parse_int("priority", "010").unwrap(), 8);
        assert_eq!(parse_int("priority", "0").unwrap(), 0);
        assert_eq!(parse_int("priority", "-5").unwrap(), -5);
        assert_eq!(parse_int("priority", " +7 ").unwrap(), 7);

        assert!(parse_int("priority", "").is_err());
        assert!(parse_int("priority", "0x").is_err());
        assert!(parse_int("priority", "08").is_err());
        assert!(parse_int("priority", "12abc").is_err());
        assert!(parse_int("priority", "--1").is_err());
    }

    #[test]
    fn parse_bounded_reports_range() {
        assert_eq!(parse_bounded("priority", "65535", 0, 65535).unwrap(), 65535);
        match parse_bounded("priority", "70000", 0, 65535) {
            Err(BridgeError::OutOfRange { value, max, .. }) => {
                assert_eq!(value, 70000);
                assert_eq!(max, 65535);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn stp_flag_spellings() {
        for on in ["on", "yes", "1"] {
            assert!(parse_stp_flag(on).unwrap());
        }
        for off in ["off", "no", "0"] {
            assert!(!parse_stp_flag(off).unwrap());
        }
        assert!(matches!(
            parse_stp_flag("ON"),
            Err(BridgeError::InvalidStpFlag(_))
        ));
    }

    #[test]
    fn bridge_lifecycle_scenario() {
        let mut registry = registry();

        registry.add_bridge("br0").unwrap();
        registry.refresh().unwrap();
        assert!(registry.find_bridge("br0").unwrap().ports().is_empty());

        let br0 = registry.find_bridge("br0").unwrap().clone();
        registry.add_interface(&br0, "eth0").unwrap();
        registry.refresh().unwrap();
        let br0 = registry.find_bridge("br0").unwrap().clone();
        assert!(br0.find_port("eth0").is_some());

        let err = registry.add_interface(&br0, "eth0").unwrap_err();
        assert_eq!(err.errno(), Some(Errno::EBUSY));
        registry.refresh().unwrap();
        assert_eq!(registry.find_bridge("br0").unwrap().ports().len(), 1);

        registry.channel().set_up("br0", true);
        let err = registry.del_bridge("br0").unwrap_err();
        assert_eq!(err.errno(), Some(Errno::EBUSY));
        registry.refresh().unwrap();
        assert!(registry.find_bridge("br0").is_some());

        registry.channel().set_up("br0", false);
        registry.del_bridge("br0").unwrap();
        registry.refresh().unwrap();
        assert!(registry.find_bridge("br0").is_none());
    }

    #[test]
    fn kernel_errors_carry_operation() {
        let mut registry = registry();
        registry.add_bridge("br0").unwrap();
        match registry.add_bridge("br0") {
            Err(BridgeError::Kernel { op, errno }) => {
                assert_eq!(op, Op::AddBridge);
                assert_eq!(errno, Errno::EEXIST);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(registry.del_bridge("nope").unwrap_err().errno(), Some(Errno::ENXIO));

        registry.add_bridge("br1").unwrap();
        registry.refresh().unwrap();
        let br0 = registry.find_bridge("br0").unwrap().clone();
        assert_eq!(
            registry.add_interface(&br0, "br1").unwrap_err().errno(),
            Some(Errno::ELOOP)
        );
        assert_eq!(
            registry.del_interface(&br0, "eth1").unwrap_err().errno(),
            Some(Errno::EINVAL)
        );
    }

    #[test]
    fn unknown_interface_never_reaches_kernel() {
        let mut registry = registry();
        registry.add_bridge("br0").unwrap();
        registry.refresh().unwrap();
        let br0 = registry.find_bridge("br0").unwrap().clone();

        let calls = registry.channel().mutating_calls();
        let err = registry.add_interface(&br0, "nope0").unwrap_err();
        assert!(matches!(err, BridgeError::NoSuchInterface(ref n) if n == "nope0"));
        assert!(err.is_local());
        assert_eq!(registry.channel().mutating_calls(), calls);
    }

    #[test]
    fn timers_are_sent_as_ticks() {
        let mut registry = registry();
        registry.add_bridge("br0").unwrap();
        registry.refresh().unwrap();
        let br0 = registry.find_bridge("br0").unwrap().clone();

        registry.set_forward_delay(&br0, Duration::from_millis(2500)).unwrap();
        registry.set_hello_time(&br0, Duration::from_secs(1)).unwrap();
        registry.set_max_age(&br0, Duration::from_secs(12)).unwrap();
        registry.set_ageing_time(&br0, Duration::from_secs(60)).unwrap();
        registry.set_gc_interval(&br0, Duration::from_secs(8)).unwrap();

        let raw = registry.channel().bridge_info("br0").unwrap();
        assert_eq!(raw.bridge_forward_delay, 250);
        assert_eq!(raw.bridge_hello_time, 100);
        assert_eq!(raw.bridge_max_age, 1200);
        assert_eq!(raw.ageing_time, 6000);
        assert_eq!(raw.gc_interval, 800);
    }

    #[test]
    fn stp_and_priorities_are_applied() {
        let mut registry = registry();
        registry.add_bridge("br0").unwrap();
        registry.refresh().unwrap();
        let br0 = registry.find_bridge("br0").unwrap().clone();
        registry.add_interface(&br0, "eth0").unwrap();
        registry.refresh().unwrap();
        let br0 = registry.find_bridge("br0").unwrap().clone();
        let eth0 = br0.find_port("eth0").unwrap();

        registry.set_stp(&br0, true).unwrap();
        registry.set_bridge_priority(&br0, 0x1000).unwrap();
        registry.set_path_cost(eth0, 42).unwrap();
        registry.set_port_priority(eth0, 3).unwrap();

        let raw = registry.channel().bridge_info("br0").unwrap();
        assert_eq!(raw.stp_enabled, 1);
        assert_eq!(&raw.bridge_id[..2], &[0x10, 0x00]);

        let port = registry.channel().port_info("br0", eth0.slot()).unwrap();
        assert_eq!(port.path_cost, 42);
        assert_eq!(port.port_id >> 10, 3);

        let err = registry.set_port_priority(eth0, 64).unwrap_err();
        assert_eq!(err.errno(), Some(Errno::ERANGE));
    }

    #[test]
    fn stale_port_is_rejected_locally() {
        let mut registry = registry();
        registry.add_bridge("br0").unwrap();
        registry.refresh().unwrap();
        let br0 = registry.find_bridge("br0").unwrap().clone();
        registry.add_interface(&br0, "eth0").unwrap();
        registry.refresh().unwrap();
        let stale = registry.find_bridge("br0").unwrap().ports()[0].clone();

        registry.refresh().unwrap();
        let err = registry.set_path_cost(&stale, 10).unwrap_err();
        assert!(matches!(err, BridgeError::NoSuchPort { .. }));
    }

    #[test]
    fn stale_bridge_is_rejected_locally() {
        let mut registry = registry();
        registry.add_bridge("br0").unwrap();
        registry.refresh().unwrap();
        let stale = registry.find_bridge("br0").unwrap().clone();

        // same name, new device: the old handle must not reach it
        registry.del_bridge("br0").unwrap();
        registry.add_bridge("br0").unwrap();
        registry.refresh().unwrap();
        assert!(registry.resolve(stale.key()).is_none());

        let calls = registry.channel().mutating_calls();
        for err in [
            registry.set_stp(&stale, true).unwrap_err(),
            registry.set_forward_delay(&stale, Duration::from_secs(4)).unwrap_err(),
            registry.set_bridge_priority(&stale, 1).unwrap_err(),
            registry.add_interface(&stale, "eth0").unwrap_err(),
            registry.del_interface(&stale, "eth0").unwrap_err(),
            registry.bridge_info(&stale).unwrap_err(),
            registry.read_fdb(&stale, 0, 16).unwrap_err(),
        ] {
            assert!(matches!(err, BridgeError::NoSuchBridge(ref n) if n == "br0"));
        }
        assert_eq!(registry.channel().mutating_calls(), calls);
        assert_eq!(registry.channel().bridge_info("br0").unwrap().stp_enabled, 0);
    }
}
