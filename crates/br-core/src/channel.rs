//! Kernel-facing request/response channel.
//!
//! A [`BridgeChannel`] speaks the kernel's bridge control protocol. Records
//! crossing it are still in kernel encoding (ticks, raw id bytes); the
//! registry converts them.

use crate::error::{Errno, Op};

/// Control protocol version this build was written against.
pub const BRCTL_VERSION: u32 = 1;

/// Bridge info block as the kernel hands it out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawBridgeInfo {
    pub designated_root: [u8; 8],
    pub bridge_id: [u8; 8],
    pub root_path_cost: u32,
    pub max_age: u32,
    pub hello_time: u32,
    pub forward_delay: u32,
    pub bridge_max_age: u32,
    pub bridge_hello_time: u32,
    pub bridge_forward_delay: u32,
    pub topology_change: u8,
    pub topology_change_detected: u8,
    pub root_port: u8,
    pub stp_enabled: u8,
    pub ageing_time: u32,
    pub gc_interval: u32,
    pub hello_timer_value: u32,
    pub tcn_timer_value: u32,
    pub topology_change_timer_value: u32,
    pub gc_timer_value: u32,
}

/// Port info block as the kernel hands it out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawPortInfo {
    pub designated_root: [u8; 8],
    pub designated_bridge: [u8; 8],
    pub port_id: u16,
    pub designated_port: u16,
    pub path_cost: u32,
    pub designated_cost: u32,
    pub state: u8,
    pub top_change_ack: u8,
    pub config_pending: u8,
    pub message_age_timer_value: u32,
    pub forward_delay_timer_value: u32,
    pub hold_timer_value: u32,
}

/// Forwarding-database record as the kernel hands it out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawFdbEntry {
    pub mac_addr: [u8; 6],
    pub port_no: u8,
    pub is_local: u8,
    pub ageing_timer_value: u32,
    pub port_hi: u8,
}

impl RawFdbEntry {
    pub fn port(&self) -> u16 {
        (u16::from(self.port_hi) << 8) | u16::from(self.port_no)
    }
}

/// A single bridge or port setting, timers in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    AgeingTime(u32),
    ForwardDelay(u32),
    HelloTime(u32),
    MaxAge(u32),
    GcInterval(u32),
    StpState(bool),
    BridgePriority(u16),
    PortPriority { slot: u16, priority: u32 },
    PathCost { slot: u16, cost: u32 },
}

impl Setting {
    pub fn op(&self) -> Op {
        match self {
            Setting::AgeingTime(_) => Op::SetAgeingTime,
            Setting::ForwardDelay(_) => Op::SetForwardDelay,
            Setting::HelloTime(_) => Op::SetHelloTime,
            Setting::MaxAge(_) => Op::SetMaxAge,
            Setting::GcInterval(_) => Op::SetGcInterval,
            Setting::StpState(_) => Op::SetStpState,
            Setting::BridgePriority(_) => Op::SetBridgePriority,
            Setting::PortPriority { .. } => Op::SetPortPriority,
            Setting::PathCost { .. } => Op::SetPathCost,
        }
    }
}

/// Result of a single kernel request.
pub type KernelResult<T> = std::result::Result<T, Errno>;

/// Request/response channel to the kernel bridging subsystem.
///
/// Each method issues exactly one kernel request and blocks until it
/// completes. Bridges are addressed by device name, ports by slot number.
pub trait BridgeChannel {
    fn version(&self) -> KernelResult<u32>;

    /// Interface indices of all bridges, at most `max`.
    fn bridge_indices(&self, max: usize) -> KernelResult<Vec<u32>>;

    /// Port interface indices indexed by slot, `max` slots, zero for empty.
    fn port_slots(&self, bridge: &str, max: usize) -> KernelResult<Vec<u32>>;

    fn bridge_info(&self, bridge: &str) -> KernelResult<RawBridgeInfo>;

    fn port_info(&self, bridge: &str, slot: u16) -> KernelResult<RawPortInfo>;

    /// Up to `capacity` FDB records starting after `offset`; empty when done.
    fn fdb_page(&self, bridge: &str, offset: usize, capacity: usize) -> KernelResult<Vec<RawFdbEntry>>;

    fn add_bridge(&self, name: &str) -> KernelResult<()>;

    fn del_bridge(&self, name: &str) -> KernelResult<()>;

    fn add_interface(&self, bridge: &str, ifindex: u32) -> KernelResult<()>;

    fn del_interface(&self, bridge: &str, ifindex: u32) -> KernelResult<()>;

    fn apply(&self, bridge: &str, setting: Setting) -> KernelResult<()>;

    /// Current name of an interface, `None` if the index is gone.
    fn index_to_name(&self, ifindex: u32) -> KernelResult<Option<String>>;

    /// Index of a named interface, `None` if no such interface exists.
    fn name_to_index(&self, name: &str) -> KernelResult<Option<u32>>;
}
