//! In-memory bridge channel for tests and development without a kernel.
//!
//! Mirrors the kernel's error behaviour for the control requests: duplicate
//! names, busy bridges, loops, non-members. Faults can be injected per
//! request type with [`MockKernel::fail_next`].

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::channel::{BRCTL_VERSION, BridgeChannel, KernelResult, RawBridgeInfo, RawFdbEntry, RawPortInfo, Setting};
use crate::error::{Errno, Op};

const MAX_PORT_PRIORITY: u32 = 63;
const PORT_BITS: u32 = 10;
const DEFAULT_PATH_COST: u32 = 100;

#[derive(Debug, Clone)]
struct Link {
    name: String,
    up: bool,
    master: Option<u32>,
    bridge: Option<BridgeState>,
}

#[derive(Debug, Clone, Default)]
struct BridgeState {
    info: RawBridgeInfo,
    ports: BTreeMap<u16, RawPortInfo>,
    slots: BTreeMap<u16, u32>,
    fdb: Vec<RawFdbEntry>,
}

#[derive(Debug, Default)]
struct MockState {
    links: BTreeMap<u32, Link>,
    next_index: u32,
    faults: Vec<(Op, Errno)>,
}

impl MockState {
    fn index_of(&self, name: &str) -> Option<u32> {
        self.links
            .iter()
            .find(|(_, link)| link.name == name)
            .map(|(&index, _)| index)
    }

    fn bridge(&self, name: &str) -> KernelResult<&BridgeState> {
        self.index_of(name)
            .and_then(|index| self.links[&index].bridge.as_ref())
            .ok_or(Errno::ENODEV)
    }

    fn bridge_mut(&mut self, name: &str) -> KernelResult<&mut BridgeState> {
        let index = self.index_of(name).ok_or(Errno::ENODEV)?;
        self.links
            .get_mut(&index)
            .and_then(|link| link.bridge.as_mut())
            .ok_or(Errno::ENODEV)
    }

    fn new_link(&mut self, name: &str, bridge: Option<BridgeState>) -> u32 {
        self.next_index += 1;
        let index = self.next_index;
        self.links.insert(
            index,
            Link {
                name: name.to_string(),
                up: false,
                master: None,
                bridge,
            },
        );
        index
    }
}

/// Kernel stand-in holding interfaces, bridges and their FDBs.
#[derive(Debug)]
pub struct MockKernel {
    version: u32,
    state: RefCell<MockState>,
    mutating_calls: Cell<usize>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self::with_version(BRCTL_VERSION)
    }

    pub fn with_version(version: u32) -> Self {
        Self {
            version,
            state: RefCell::new(MockState::default()),
            mutating_calls: Cell::new(0),
        }
    }

    /// Create a plain network interface and return its index.
    pub fn add_link(&self, name: &str) -> u32 {
        self.state.borrow_mut().new_link(name, None)
    }

    /// Create a bridge with the given existing interfaces attached, in slot order.
    pub fn create_bridge(&self, name: &str, ports: &[&str]) -> u32 {
        let index = {
            let mut state = self.state.borrow_mut();
            let bridge = Self::fresh_bridge(state.next_index + 1);
            state.new_link(name, Some(bridge))
        };
        for port in ports {
            let ifindex = self.state.borrow().index_of(port);
            if let Some(ifindex) = ifindex {
                let _ = self.attach(name, ifindex);
            }
        }
        index
    }

    pub fn remove_link(&self, name: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(index) = state.index_of(name) {
            state.links.remove(&index);
            for link in state.links.values_mut() {
                if let Some(bridge) = link.bridge.as_mut() {
                    bridge.slots.retain(|_, port| *port != index);
                }
            }
        }
    }

    pub fn set_up(&self, name: &str, up: bool) {
        let mut state = self.state.borrow_mut();
        if let Some(index) = state.index_of(name) {
            if let Some(link) = state.links.get_mut(&index) {
                link.up = up;
            }
        }
    }

    pub fn add_fdb(&self, bridge: &str, mac: [u8; 6], port: u16, is_local: bool, ageing_ticks: u32) {
        let mut state = self.state.borrow_mut();
        if let Ok(bridge) = state.bridge_mut(bridge) {
            bridge.fdb.push(RawFdbEntry {
                mac_addr: mac,
                port_no: (port & 0xff) as u8,
                port_hi: (port >> 8) as u8,
                is_local: u8::from(is_local),
                ageing_timer_value: ageing_ticks,
            });
        }
    }

    /// Make the next request of kind `op` fail with `errno`.
    pub fn fail_next(&self, op: Op, errno: Errno) {
        self.state.borrow_mut().faults.push((op, errno));
    }

    /// Count of requests that would change kernel state.
    pub fn mutating_calls(&self) -> usize {
        self.mutating_calls.get()
    }

    fn check(&self, op: Op) -> KernelResult<()> {
        let mut state = self.state.borrow_mut();
        if let Some(pos) = state.faults.iter().position(|(o, _)| *o == op) {
            let (_, errno) = state.faults.remove(pos);
            return Err(errno);
        }
        Ok(())
    }

    fn mutate(&self, op: Op) -> KernelResult<()> {
        self.mutating_calls.set(self.mutating_calls.get() + 1);
        self.check(op)
    }

    fn fresh_bridge(seed: u32) -> BridgeState {
        let mut id = [0u8; 8];
        id[0] = 0x80;
        id[2] = 0x02;
        id[4..].copy_from_slice(&seed.to_be_bytes());
        BridgeState {
            info: RawBridgeInfo {
                designated_root: id,
                bridge_id: id,
                max_age: 2000,
                hello_time: 200,
                forward_delay: 1500,
                bridge_max_age: 2000,
                bridge_hello_time: 200,
                bridge_forward_delay: 1500,
                ageing_time: 30000,
                gc_interval: 400,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn attach(&self, bridge: &str, ifindex: u32) -> KernelResult<()> {
        let mut state = self.state.borrow_mut();
        let bridge_index = state.index_of(bridge).ok_or(Errno::ENODEV)?;
        let link = state.links.get(&ifindex).ok_or(Errno::ENODEV)?;
        if link.bridge.is_some() {
            return Err(Errno::ELOOP);
        }
        if link.master.is_some() {
            return Err(Errno::EBUSY);
        }

        let bridge_state = state.bridge_mut(bridge)?;
        let slot = (1..=u16::MAX)
            .find(|s| !bridge_state.slots.contains_key(s))
            .ok_or(Errno::ERANGE)?;
        let designated_root = bridge_state.info.bridge_id;
        bridge_state.slots.insert(slot, ifindex);
        bridge_state.ports.insert(
            slot,
            RawPortInfo {
                designated_root,
                designated_bridge: designated_root,
                port_id: (0x20 << PORT_BITS) as u16 | slot,
                designated_port: (0x20 << PORT_BITS) as u16 | slot,
                path_cost: DEFAULT_PATH_COST,
                ..Default::default()
            },
        );
        if let Some(link) = state.links.get_mut(&ifindex) {
            link.master = Some(bridge_index);
        }
        Ok(())
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeChannel for MockKernel {
    fn version(&self) -> KernelResult<u32> {
        self.check(Op::GetVersion)?;
        Ok(self.version)
    }

    fn bridge_indices(&self, max: usize) -> KernelResult<Vec<u32>> {
        self.check(Op::ListBridges)?;
        let state = self.state.borrow();
        Ok(state
            .links
            .iter()
            .filter(|(_, link)| link.bridge.is_some())
            .map(|(&index, _)| index)
            .take(max)
            .collect())
    }

    fn port_slots(&self, bridge: &str, max: usize) -> KernelResult<Vec<u32>> {
        self.check(Op::ListPorts)?;
        let state = self.state.borrow();
        let bridge = state.bridge(bridge)?;
        let mut slots = vec![0u32; max];
        for (&slot, &ifindex) in &bridge.slots {
            if let Some(entry) = slots.get_mut(usize::from(slot)) {
                *entry = ifindex;
            }
        }
        Ok(slots)
    }

    fn bridge_info(&self, bridge: &str) -> KernelResult<RawBridgeInfo> {
        self.check(Op::BridgeInfo)?;
        Ok(self.state.borrow().bridge(bridge)?.info)
    }

    fn port_info(&self, bridge: &str, slot: u16) -> KernelResult<RawPortInfo> {
        self.check(Op::PortInfo)?;
        let state = self.state.borrow();
        state.bridge(bridge)?.ports.get(&slot).copied().ok_or(Errno::EINVAL)
    }

    fn fdb_page(&self, bridge: &str, offset: usize, capacity: usize) -> KernelResult<Vec<RawFdbEntry>> {
        self.check(Op::ReadFdb)?;
        let state = self.state.borrow();
        let fdb = &state.bridge(bridge)?.fdb;
        Ok(fdb.iter().skip(offset).take(capacity).copied().collect())
    }

    fn add_bridge(&self, name: &str) -> KernelResult<()> {
        self.mutate(Op::AddBridge)?;
        let mut state = self.state.borrow_mut();
        if state.index_of(name).is_some() {
            return Err(Errno::EEXIST);
        }
        let bridge = Self::fresh_bridge(state.next_index + 1);
        state.new_link(name, Some(bridge));
        Ok(())
    }

    fn del_bridge(&self, name: &str) -> KernelResult<()> {
        self.mutate(Op::DelBridge)?;
        let mut state = self.state.borrow_mut();
        let index = state.index_of(name).ok_or(Errno::ENXIO)?;
        let link = &state.links[&index];
        if link.bridge.is_none() {
            return Err(Errno::EPERM);
        }
        if link.up {
            return Err(Errno::EBUSY);
        }
        state.links.remove(&index);
        for link in state.links.values_mut() {
            if link.master == Some(index) {
                link.master = None;
            }
        }
        Ok(())
    }

    fn add_interface(&self, bridge: &str, ifindex: u32) -> KernelResult<()> {
        self.mutate(Op::AddInterface)?;
        self.attach(bridge, ifindex)
    }

    fn del_interface(&self, bridge: &str, ifindex: u32) -> KernelResult<()> {
        self.mutate(Op::DelInterface)?;
        let mut state = self.state.borrow_mut();
        let bridge_index = state.index_of(bridge).ok_or(Errno::ENODEV)?;
        match state.links.get(&ifindex) {
            Some(link) if link.master == Some(bridge_index) => {}
            Some(_) => return Err(Errno::EINVAL),
            None => return Err(Errno::ENODEV),
        }
        let bridge_state = state.bridge_mut(bridge)?;
        let slot = bridge_state
            .slots
            .iter()
            .find(|(_, port)| **port == ifindex)
            .map(|(&slot, _)| slot);
        if let Some(slot) = slot {
            bridge_state.slots.remove(&slot);
            bridge_state.ports.remove(&slot);
        }
        if let Some(link) = state.links.get_mut(&ifindex) {
            link.master = None;
        }
        Ok(())
    }

    fn apply(&self, bridge: &str, setting: Setting) -> KernelResult<()> {
        self.mutate(setting.op())?;
        let mut state = self.state.borrow_mut();
        let bridge = state.bridge_mut(bridge)?;
        let info = &mut bridge.info;
        match setting {
            Setting::AgeingTime(t) => info.ageing_time = t,
            Setting::ForwardDelay(t) => info.bridge_forward_delay = t,
            Setting::HelloTime(t) => info.bridge_hello_time = t,
            Setting::MaxAge(t) => info.bridge_max_age = t,
            Setting::GcInterval(t) => info.gc_interval = t,
            Setting::StpState(on) => info.stp_enabled = u8::from(on),
            Setting::BridgePriority(prio) => info.bridge_id[..2].copy_from_slice(&prio.to_be_bytes()),
            Setting::PortPriority { slot, priority } => {
                if priority > MAX_PORT_PRIORITY {
                    return Err(Errno::ERANGE);
                }
                let port = bridge.ports.get_mut(&slot).ok_or(Errno::EINVAL)?;
                port.port_id = ((priority << PORT_BITS) as u16) | slot;
            }
            Setting::PathCost { slot, cost } => {
                let port = bridge.ports.get_mut(&slot).ok_or(Errno::EINVAL)?;
                port.path_cost = cost;
            }
        }
        Ok(())
    }

    fn index_to_name(&self, ifindex: u32) -> KernelResult<Option<String>> {
        self.check(Op::ResolveLink)?;
        Ok(self.state.borrow().links.get(&ifindex).map(|l| l.name.clone()))
    }

    fn name_to_index(&self, name: &str) -> KernelResult<Option<u32>> {
        self.check(Op::ResolveLink)?;
        Ok(self.state.borrow().index_of(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_assigns_lowest_free_slot() {
        let kernel = MockKernel::new();
        let eth0 = kernel.add_link("eth0");
        let eth1 = kernel.add_link("eth1");
        kernel.create_bridge("br0", &["eth0", "eth1"]);

        kernel.del_interface("br0", eth0).unwrap();
        let eth2 = kernel.add_link("eth2");
        kernel.add_interface("br0", eth2).unwrap();

        let slots = kernel.port_slots("br0", 4).unwrap();
        assert_eq!(slots, vec![0, eth2, eth1, 0]);
    }

    #[test]
    fn injected_fault_fires_once() {
        let kernel = MockKernel::new();
        kernel.fail_next(Op::ListBridges, Errno::EPERM);
        assert_eq!(kernel.bridge_indices(8), Err(Errno::EPERM));
        assert_eq!(kernel.bridge_indices(8), Ok(vec![]));
    }

    #[test]
    fn deleting_bridge_releases_ports() {
        let kernel = MockKernel::new();
        let eth0 = kernel.add_link("eth0");
        kernel.create_bridge("br0", &["eth0"]);
        kernel.del_bridge("br0").unwrap();
        kernel.create_bridge("br1", &[]);
        kernel.add_interface("br1", eth0).unwrap();
    }
}
