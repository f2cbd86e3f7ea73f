use tracing::debug;

use crate::channel::{BridgeChannel, RawBridgeInfo, RawPortInfo};
use crate::error::{BridgeError, Op, Result};
use crate::registry::{Bridge, Port, Registry};
use crate::time::TickRate;
use crate::types::{BridgeId, BridgeInfo, PortInfo, StpState};

impl BridgeInfo {
    pub fn from_raw(raw: &RawBridgeInfo, ticks: TickRate) -> Self {
        Self {
            designated_root: BridgeId::from_bytes(raw.designated_root),
            bridge_id: BridgeId::from_bytes(raw.bridge_id),
            root_port: u16::from(raw.root_port),
            root_path_cost: raw.root_path_cost,
            stp_enabled: raw.stp_enabled != 0,
            topology_change: raw.topology_change != 0,
            topology_change_detected: raw.topology_change_detected != 0,
            max_age: ticks.to_duration(raw.max_age),
            hello_time: ticks.to_duration(raw.hello_time),
            forward_delay: ticks.to_duration(raw.forward_delay),
            bridge_max_age: ticks.to_duration(raw.bridge_max_age),
            bridge_hello_time: ticks.to_duration(raw.bridge_hello_time),
            bridge_forward_delay: ticks.to_duration(raw.bridge_forward_delay),
            ageing_time: ticks.to_duration(raw.ageing_time),
            gc_interval: ticks.to_duration(raw.gc_interval),
            hello_timer: ticks.to_duration(raw.hello_timer_value),
            tcn_timer: ticks.to_duration(raw.tcn_timer_value),
            topology_change_timer: ticks.to_duration(raw.topology_change_timer_value),
            gc_timer: ticks.to_duration(raw.gc_timer_value),
        }
    }
}

impl PortInfo {
    pub fn from_raw(raw: &RawPortInfo, ticks: TickRate) -> Self {
        Self {
            designated_root: BridgeId::from_bytes(raw.designated_root),
            designated_bridge: BridgeId::from_bytes(raw.designated_bridge),
            port_id: raw.port_id,
            designated_port: raw.designated_port,
            path_cost: raw.path_cost,
            designated_cost: raw.designated_cost,
            state: StpState::from(raw.state),
            top_change_ack: raw.top_change_ack != 0,
            config_pending: raw.config_pending != 0,
            message_age_timer: ticks.to_duration(raw.message_age_timer_value),
            forward_delay_timer: ticks.to_duration(raw.forward_delay_timer_value),
            hold_timer: ticks.to_duration(raw.hold_timer_value),
        }
    }
}

impl<C: BridgeChannel> Registry<C> {
    /// Fetch a live STP snapshot of `bridge`. Never cached.
    pub fn bridge_info(&self, bridge: &Bridge) -> Result<BridgeInfo> {
        let bridge = self.check_current(bridge)?;
        debug!(bridge = bridge.name(), "reading bridge info");
        let raw = self
            .channel()
            .bridge_info(bridge.name())
            .map_err(|errno| BridgeError::kernel(Op::BridgeInfo, errno))?;
        Ok(BridgeInfo::from_raw(&raw, self.tick_rate()))
    }

    /// Fetch a live STP snapshot of `port`.
    pub fn port_info(&self, port: &Port) -> Result<PortInfo> {
        let bridge = self.parent(port).ok_or_else(|| BridgeError::NoSuchPort {
            bridge: format!("#{}", port.bridge().ifindex()),
            port: port.name().to_string(),
        })?;
        debug!(bridge = bridge.name(), port = port.name(), slot = port.slot(), "reading port info");
        let raw = self
            .channel()
            .port_info(bridge.name(), port.slot())
            .map_err(|errno| BridgeError::kernel(Op::PortInfo, errno))?;
        Ok(PortInfo::from_raw(&raw, self.tick_rate()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::Errno;
    use crate::mock::MockKernel;
    use std::time::Duration;

    #[test]
    fn bridge_info_converts_ticks() {
        let kernel = MockKernel::new();
        kernel.create_bridge("br0", &[]);
        let registry = Registry::initialize(kernel, Settings::default()).unwrap();
        let br0 = registry.find_bridge("br0").unwrap();

        let info = registry.bridge_info(br0).unwrap();
        assert_eq!(info.bridge_max_age, Duration::from_secs(20));
        assert_eq!(info.bridge_hello_time, Duration::from_secs(2));
        assert_eq!(info.bridge_forward_delay, Duration::from_secs(15));
        assert_eq!(info.ageing_time, Duration::from_secs(300));
        assert_eq!(info.bridge_id.priority, 0x8000);
        assert!(!info.stp_enabled);
    }

    #[test]
    fn port_info_reports_state() {
        let kernel = MockKernel::new();
        kernel.add_link("eth0");
        kernel.create_bridge("br0", &["eth0"]);
        let registry = Registry::initialize(kernel, Settings::default()).unwrap();
        let br0 = registry.find_bridge("br0").unwrap();
        let eth0 = br0.find_port("eth0").unwrap();

        let info = registry.port_info(eth0).unwrap();
        assert_eq!(info.port_id & 0x3ff, eth0.slot());
        assert_eq!(info.state, StpState::Disabled);
        assert_eq!(info.path_cost, 100);
    }

    #[test]
    fn vanished_bridge_is_reported() {
        let kernel = MockKernel::new();
        kernel.create_bridge("br0", &[]);
        let registry = Registry::initialize(kernel, Settings::default()).unwrap();
        let br0 = registry.find_bridge("br0").unwrap();

        registry.channel().remove_link("br0");
        let err = registry.bridge_info(br0).unwrap_err();
        assert_eq!(err.errno(), Some(Errno::ENODEV));
    }

    #[test]
    fn from_raw_maps_flags() {
        let raw = RawBridgeInfo {
            topology_change: 1,
            topology_change_detected: 1,
            stp_enabled: 1,
            root_port: 3,
            hello_timer_value: 150,
            ..Default::default()
        };
        let info = BridgeInfo::from_raw(&raw, TickRate::default());
        assert!(info.topology_change && info.topology_change_detected && info.stp_enabled);
        assert_eq!(info.root_port, 3);
        assert_eq!(info.hello_timer, Duration::from_millis(1500));
    }
}
