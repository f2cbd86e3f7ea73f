//! Kernel ABI for the legacy bridge ioctl interface.
//!
//! Layouts mirror `<linux/if_bridge.h>`; the 64-bit fields are kept as byte
//! arrays since the kernel copies bridge ids in wire order.

use br_core::{RawBridgeInfo, RawFdbEntry, RawPortInfo};
use libc::{c_char, c_ulong, c_void};

pub const SIOCGIFBR: c_ulong = 0x8940;
pub const SIOCSIFBR: c_ulong = 0x8941;
pub const SIOCDEVPRIVATE: c_ulong = 0x89F0;

pub const IFNAMSIZ: usize = 16;

pub const BRCTL_GET_VERSION: c_ulong = 0;
pub const BRCTL_GET_BRIDGES: c_ulong = 1;
pub const BRCTL_ADD_BRIDGE: c_ulong = 2;
pub const BRCTL_DEL_BRIDGE: c_ulong = 3;
pub const BRCTL_ADD_IF: c_ulong = 4;
pub const BRCTL_DEL_IF: c_ulong = 5;
pub const BRCTL_GET_BRIDGE_INFO: c_ulong = 6;
pub const BRCTL_GET_PORT_LIST: c_ulong = 7;
pub const BRCTL_SET_BRIDGE_FORWARD_DELAY: c_ulong = 8;
pub const BRCTL_SET_BRIDGE_HELLO_TIME: c_ulong = 9;
pub const BRCTL_SET_BRIDGE_MAX_AGE: c_ulong = 10;
pub const BRCTL_SET_AGEING_TIME: c_ulong = 11;
pub const BRCTL_SET_GC_INTERVAL: c_ulong = 12;
pub const BRCTL_GET_PORT_INFO: c_ulong = 13;
pub const BRCTL_SET_BRIDGE_STP_STATE: c_ulong = 14;
pub const BRCTL_SET_BRIDGE_PRIORITY: c_ulong = 15;
pub const BRCTL_SET_PORT_PRIORITY: c_ulong = 16;
pub const BRCTL_SET_PATH_COST: c_ulong = 17;
pub const BRCTL_GET_FDB_ENTRIES: c_ulong = 18;

/// `struct __bridge_info`
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelBridgeInfo {
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

/// `struct __port_info`
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelPortInfo {
    pub designated_root: [u8; 8],
    pub designated_bridge: [u8; 8],
    pub port_id: u16,
    pub designated_port: u16,
    pub path_cost: u32,
    pub designated_cost: u32,
    pub state: u8,
    pub top_change_ack: u8,
    pub config_pending: u8,
    pub unused0: u8,
    pub message_age_timer_value: u32,
    pub forward_delay_timer_value: u32,
    pub hold_timer_value: u32,
}

/// `struct __fdb_entry`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelFdbEntry {
    pub mac_addr: [u8; 6],
    pub port_no: u8,
    pub is_local: u8,
    pub ageing_timer_value: u32,
    pub port_hi: u8,
    pub pad0: u8,
    pub unused: u16,
}

/// The part of `struct ifreq` the private device ioctl reads: name and data pointer.
#[repr(C)]
pub struct IfReq {
    pub name: [c_char; IFNAMSIZ],
    pub data: *mut c_void,
    _pad: [u8; 16],
}

impl IfReq {
    pub fn new(name: [c_char; IFNAMSIZ], data: *mut c_void) -> Self {
        Self { name, data, _pad: [0; 16] }
    }
}

impl From<KernelBridgeInfo> for RawBridgeInfo {
    fn from(k: KernelBridgeInfo) -> Self {
        Self {
            designated_root: k.designated_root,
            bridge_id: k.bridge_id,
            root_path_cost: k.root_path_cost,
            max_age: k.max_age,
            hello_time: k.hello_time,
            forward_delay: k.forward_delay,
            bridge_max_age: k.bridge_max_age,
            bridge_hello_time: k.bridge_hello_time,
            bridge_forward_delay: k.bridge_forward_delay,
            topology_change: k.topology_change,
            topology_change_detected: k.topology_change_detected,
            root_port: k.root_port,
            stp_enabled: k.stp_enabled,
            ageing_time: k.ageing_time,
            gc_interval: k.gc_interval,
            hello_timer_value: k.hello_timer_value,
            tcn_timer_value: k.tcn_timer_value,
            topology_change_timer_value: k.topology_change_timer_value,
            gc_timer_value: k.gc_timer_value,
        }
    }
}

impl From<KernelPortInfo> for RawPortInfo {
    fn from(k: KernelPortInfo) -> Self {
        Self {
            designated_root: k.designated_root,
            designated_bridge: k.designated_bridge,
            port_id: k.port_id,
            designated_port: k.designated_port,
            path_cost: k.path_cost,
            designated_cost: k.designated_cost,
            state: k.state,
            top_change_ack: k.top_change_ack,
            config_pending: k.config_pending,
            message_age_timer_value: k.message_age_timer_value,
            forward_delay_timer_value: k.forward_delay_timer_value,
            hold_timer_value: k.hold_timer_value,
        }
    }
}

impl From<KernelFdbEntry> for RawFdbEntry {
    fn from(k: KernelFdbEntry) -> Self {
        Self {
            mac_addr: k.mac_addr,
            port_no: k.port_no,
            is_local: k.is_local,
            ageing_timer_value: k.ageing_timer_value,
            port_hi: k.port_hi,
        }
    }
}
