use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use crate::time::serialize_secs;

/// 48-bit Ethernet hardware address. Orders byte-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// STP bridge identifier: 16-bit priority followed by the bridge address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BridgeId {
    pub priority: u16,
    pub addr: MacAddr,
}

impl BridgeId {
    /// Decode the kernel's 8-byte wire layout (priority big-endian, then address).
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        let mut addr = [0u8; 6];
        addr.copy_from_slice(&bytes[2..]);
        Self {
            priority: u16::from_be_bytes([bytes[0], bytes[1]]),
            addr: MacAddr(addr),
        }
    }
}

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.addr.0;
        write!(
            f,
            "{:04x}.{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.priority, a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

impl Serialize for BridgeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Spanning-tree state of a port as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StpState {
    Disabled,
    Listening,
    Learning,
    Forwarding,
    Blocking,
    /// Value outside the kernel's documented range.
    Invalid(u8),
}

impl StpState {
    pub fn name(self) -> &'static str {
        match self {
            StpState::Disabled => "disabled",
            StpState::Listening => "listening",
            StpState::Learning => "learning",
            StpState::Forwarding => "forwarding",
            StpState::Blocking => "blocking",
            StpState::Invalid(_) => "<INVALID STATE>",
        }
    }
}

impl From<u8> for StpState {
    fn from(raw: u8) -> Self {
        match raw {
            0 => StpState::Disabled,
            1 => StpState::Listening,
            2 => StpState::Learning,
            3 => StpState::Forwarding,
            4 => StpState::Blocking,
            other => StpState::Invalid(other),
        }
    }
}

impl fmt::Display for StpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for StpState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Bridge-level STP snapshot, timers already in host units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeInfo {
    pub designated_root: BridgeId,
    pub bridge_id: BridgeId,
    pub root_port: u16,
    pub root_path_cost: u32,
    pub stp_enabled: bool,
    pub topology_change: bool,
    pub topology_change_detected: bool,
    #[serde(serialize_with = "serialize_secs")]
    pub max_age: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub hello_time: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub forward_delay: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub bridge_max_age: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub bridge_hello_time: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub bridge_forward_delay: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub ageing_time: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub gc_interval: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub hello_timer: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub tcn_timer: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub topology_change_timer: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub gc_timer: Duration,
}

/// Per-port STP snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortInfo {
    pub designated_root: BridgeId,
    pub designated_bridge: BridgeId,
    pub port_id: u16,
    pub designated_port: u16,
    pub path_cost: u32,
    pub designated_cost: u32,
    pub state: StpState,
    pub top_change_ack: bool,
    pub config_pending: bool,
    #[serde(serialize_with = "serialize_secs")]
    pub message_age_timer: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub forward_delay_timer: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub hold_timer: Duration,
}

/// One forwarding-database entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FdbEntry {
    pub mac_addr: MacAddr,
    pub port_no: u16,
    pub is_local: bool,
    #[serde(serialize_with = "serialize_secs")]
    pub ageing_timer: Duration,
}
