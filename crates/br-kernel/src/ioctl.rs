//! [`BridgeChannel`] over the legacy bridge ioctls.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use libc::{c_char, c_int, c_ulong, c_void};
use tracing::{debug, trace};

use br_core::{
    BridgeChannel, BridgeError, Errno, KernelResult, RawBridgeInfo, RawFdbEntry, RawPortInfo,
    Setting,
};

use crate::abi::*;
use crate::link::LinkResolver;

/// Control socket plus a netlink resolver for interface names.
pub struct IoctlChannel {
    fd: OwnedFd,
    links: LinkResolver,
}

impl IoctlChannel {
    pub fn open() -> br_core::Result<Self> {
        let raw = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
        if raw < 0 {
            return Err(BridgeError::Channel(io::Error::last_os_error()));
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        let links = LinkResolver::new().map_err(|e| BridgeError::Channel(io::Error::other(e)))?;
        debug!(fd = fd.as_raw_fd(), "opened bridge control socket");
        Ok(Self { fd, links })
    }

    /// Global bridge ioctl; returns the kernel's non-negative result.
    fn bridge_ioctl(&self, request: c_ulong, mut args: [c_ulong; 3]) -> KernelResult<c_int> {
        trace!(request, cmd = args[0], "bridge ioctl");
        let ret = unsafe { libc::ioctl(self.fd.as_raw_fd(), request as _, args.as_mut_ptr()) };
        if ret < 0 { Err(Errno::last()) } else { Ok(ret) }
    }

    /// Per-device private ioctl addressed by bridge name.
    fn device_ioctl(&self, bridge: &str, mut args: [c_ulong; 4]) -> KernelResult<c_int> {
        let mut req = IfReq::new(ifname(bridge)?, args.as_mut_ptr().cast::<c_void>());
        trace!(bridge, cmd = args[0], "device ioctl");
        let ret = unsafe { libc::ioctl(self.fd.as_raw_fd(), SIOCDEVPRIVATE as _, &mut req) };
        if ret < 0 { Err(Errno::last()) } else { Ok(ret) }
    }

    fn named_bridge_ioctl(&self, request: c_ulong, cmd: c_ulong, name: &str) -> KernelResult<()> {
        let mut buf = ifname(name)?;
        self.bridge_ioctl(request, [cmd, buf.as_mut_ptr() as c_ulong, 0])?;
        Ok(())
    }
}

/// Copy a device name into a NUL-terminated fixed buffer.
fn ifname(name: &str) -> KernelResult<[c_char; IFNAMSIZ]> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() >= IFNAMSIZ || bytes.contains(&0) {
        return Err(Errno::EINVAL);
    }
    let mut buf = [0 as c_char; IFNAMSIZ];
    for (dst, src) in buf.iter_mut().zip(bytes) {
        *dst = *src as c_char;
    }
    Ok(buf)
}

impl BridgeChannel for IoctlChannel {
    fn version(&self) -> KernelResult<u32> {
        let version = self.bridge_ioctl(SIOCGIFBR, [BRCTL_GET_VERSION, 0, 0])?;
        Ok(version as u32)
    }

    fn bridge_indices(&self, max: usize) -> KernelResult<Vec<u32>> {
        let mut indices: Vec<c_int> = vec![0; max];
        let count = self.bridge_ioctl(
            SIOCGIFBR,
            [BRCTL_GET_BRIDGES, indices.as_mut_ptr() as c_ulong, max as c_ulong],
        )?;
        indices.truncate((count as usize).min(max));
        Ok(indices.into_iter().map(|i| i as u32).collect())
    }

    fn port_slots(&self, bridge: &str, max: usize) -> KernelResult<Vec<u32>> {
        let mut slots: Vec<c_int> = vec![0; max];
        self.device_ioctl(
            bridge,
            [BRCTL_GET_PORT_LIST, slots.as_mut_ptr() as c_ulong, max as c_ulong, 0],
        )?;
        Ok(slots.into_iter().map(|i| i as u32).collect())
    }

    fn bridge_info(&self, bridge: &str) -> KernelResult<RawBridgeInfo> {
        let mut info = KernelBridgeInfo::default();
        self.device_ioctl(
            bridge,
            [BRCTL_GET_BRIDGE_INFO, &mut info as *mut KernelBridgeInfo as c_ulong, 0, 0],
        )?;
        Ok(info.into())
    }

    fn port_info(&self, bridge: &str, slot: u16) -> KernelResult<RawPortInfo> {
        let mut info = KernelPortInfo::default();
        self.device_ioctl(
            bridge,
            [
                BRCTL_GET_PORT_INFO,
                &mut info as *mut KernelPortInfo as c_ulong,
                c_ulong::from(slot),
                0,
            ],
        )?;
        Ok(info.into())
    }

    fn fdb_page(&self, bridge: &str, offset: usize, capacity: usize) -> KernelResult<Vec<RawFdbEntry>> {
        let mut entries = vec![KernelFdbEntry::default(); capacity];
        let count = self.device_ioctl(
            bridge,
            [
                BRCTL_GET_FDB_ENTRIES,
                entries.as_mut_ptr() as c_ulong,
                capacity as c_ulong,
                offset as c_ulong,
            ],
        )?;
        entries.truncate((count as usize).min(capacity));
        Ok(entries.into_iter().map(RawFdbEntry::from).collect())
    }

    fn add_bridge(&self, name: &str) -> KernelResult<()> {
        self.named_bridge_ioctl(SIOCSIFBR, BRCTL_ADD_BRIDGE, name)
    }

    fn del_bridge(&self, name: &str) -> KernelResult<()> {
        self.named_bridge_ioctl(SIOCSIFBR, BRCTL_DEL_BRIDGE, name)
    }

    fn add_interface(&self, bridge: &str, ifindex: u32) -> KernelResult<()> {
        self.device_ioctl(bridge, [BRCTL_ADD_IF, c_ulong::from(ifindex), 0, 0])?;
        Ok(())
    }

    fn del_interface(&self, bridge: &str, ifindex: u32) -> KernelResult<()> {
        self.device_ioctl(bridge, [BRCTL_DEL_IF, c_ulong::from(ifindex), 0, 0])?;
        Ok(())
    }

    fn apply(&self, bridge: &str, setting: Setting) -> KernelResult<()> {
        let args = match setting {
            Setting::AgeingTime(t) => [BRCTL_SET_AGEING_TIME, c_ulong::from(t), 0, 0],
            Setting::ForwardDelay(t) => [BRCTL_SET_BRIDGE_FORWARD_DELAY, c_ulong::from(t), 0, 0],
            Setting::HelloTime(t) => [BRCTL_SET_BRIDGE_HELLO_TIME, c_ulong::from(t), 0, 0],
            Setting::MaxAge(t) => [BRCTL_SET_BRIDGE_MAX_AGE, c_ulong::from(t), 0, 0],
            Setting::GcInterval(t) => [BRCTL_SET_GC_INTERVAL, c_ulong::from(t), 0, 0],
            Setting::StpState(on) => [BRCTL_SET_BRIDGE_STP_STATE, c_ulong::from(on), 0, 0],
            Setting::BridgePriority(p) => [BRCTL_SET_BRIDGE_PRIORITY, c_ulong::from(p), 0, 0],
            Setting::PortPriority { slot, priority } => [
                BRCTL_SET_PORT_PRIORITY,
                c_ulong::from(slot),
                c_ulong::from(priority),
                0,
            ],
            Setting::PathCost { slot, cost } => {
                [BRCTL_SET_PATH_COST, c_ulong::from(slot), c_ulong::from(cost), 0]
            }
        };
        debug!(bridge, ?setting, "applying bridge setting");
        self.device_ioctl(bridge, args)?;
        Ok(())
    }

    fn index_to_name(&self, ifindex: u32) -> KernelResult<Option<String>> {
        self.links.name_of(ifindex).map_err(|e| e.errno())
    }

    fn name_to_index(&self, name: &str) -> KernelResult<Option<u32>> {
        self.links.index_of(name).map_err(|e| e.errno())
    }
}
