//! In-memory snapshot of the kernel's bridges and their ports.
//!
//! The snapshot is rebuilt wholesale: [`Registry::refresh`] discards every
//! [`Bridge`] and [`Port`] before enumerating again, and bumps a generation
//! counter so [`BridgeKey`]s taken from an older snapshot no longer resolve.

use std::io;
use tracing::{debug, info};

use crate::channel::{BRCTL_VERSION, BridgeChannel, KernelResult};
use crate::config::Settings;
use crate::error::{BridgeError, Errno, Op, Result};
use crate::time::TickRate;

/// Non-owning reference from a port to its parent bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeKey {
    ifindex: u32,
    generation: u64,
}

impl BridgeKey {
    pub fn ifindex(&self) -> u32 {
        self.ifindex
    }
}

/// Interface enslaved to a bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    ifindex: u32,
    slot: u16,
    name: String,
    bridge: BridgeKey,
}

impl Port {
    pub fn ifindex(&self) -> u32 {
        self.ifindex
    }

    /// STP port number the kernel assigned to this port.
    pub fn slot(&self) -> u16 {
        self.slot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bridge(&self) -> BridgeKey {
        self.bridge
    }
}

/// Bridge device and the ports it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bridge {
    key: BridgeKey,
    name: String,
    ports: Vec<Port>,
}

impl Bridge {
    pub fn ifindex(&self) -> u32 {
        self.key.ifindex
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> BridgeKey {
        self.key
    }

    /// Ports in slot order.
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port_by_slot(&self, slot: u16) -> Option<&Port> {
        self.ports.iter().find(|p| p.slot == slot)
    }

    pub fn find_port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }
}

/// Owner of the control channel and the current bridge snapshot.
pub struct Registry<C: BridgeChannel> {
    channel: C,
    settings: Settings,
    ticks: TickRate,
    generation: u64,
    bridges: Vec<Bridge>,
}

impl<C: BridgeChannel> Registry<C> {
    /// Check the kernel's protocol version and build the first snapshot.
    ///
    /// A version mismatch (or an unanswerable version query) is fatal.
    pub fn initialize(channel: C, settings: Settings) -> Result<Self> {
        settings.validate()?;
        let ticks = settings.tick_rate()?;

        let found = channel
            .version()
            .map_err(|errno| BridgeError::Channel(io::Error::from_raw_os_error(errno.code())))?;
        if found != BRCTL_VERSION {
            return Err(BridgeError::VersionMismatch {
                expected: BRCTL_VERSION,
                found,
            });
        }

        let mut registry = Self {
            channel,
            settings,
            ticks,
            generation: 0,
            bridges: Vec::new(),
        };
        registry.bridges = registry.build()?;
        info!(bridges = registry.bridges.len(), "bridge registry initialized");
        Ok(registry)
    }

    /// Drop the whole snapshot and enumerate again.
    pub fn refresh(&mut self) -> Result<()> {
        self.bridges.clear();
        self.generation += 1;
        self.bridges = self.build()?;
        debug!(
            generation = self.generation,
            bridges = self.bridges.len(),
            "bridge registry refreshed"
        );
        Ok(())
    }

    /// Tear down the snapshot, handing the channel back.
    pub fn shutdown(self) -> C {
        debug!(generation = self.generation, "bridge registry shut down");
        self.channel
    }

    pub fn bridges(&self) -> &[Bridge] {
        &self.bridges
    }

    pub fn find_bridge(&self, name: &str) -> Option<&Bridge> {
        self.bridges.iter().find(|b| b.name == name)
    }

    pub fn find_port<'a>(&self, bridge: &'a Bridge, name: &str) -> Option<&'a Port> {
        bridge.find_port(name)
    }

    /// Resolve a key against the current snapshot; stale keys yield `None`.
    pub fn resolve(&self, key: BridgeKey) -> Option<&Bridge> {
        if key.generation != self.generation {
            return None;
        }
        self.bridges.iter().find(|b| b.key == key)
    }

    pub fn parent(&self, port: &Port) -> Option<&Bridge> {
        self.resolve(port.bridge)
    }

    /// Reject a bridge handle taken from an earlier snapshot.
    pub fn check_current(&self, bridge: &Bridge) -> Result<&Bridge> {
        self.resolve(bridge.key)
            .ok_or_else(|| BridgeError::NoSuchBridge(bridge.name.clone()))
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tick_rate(&self) -> TickRate {
        self.ticks
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn build(&self) -> Result<Vec<Bridge>> {
        let indices = self
            .channel
            .bridge_indices(self.settings.max_bridges)
            .map_err(|errno| BridgeError::kernel(Op::ListBridges, errno))?;

        let mut bridges = Vec::with_capacity(indices.len());
        for ifindex in indices {
            match self.build_bridge(ifindex) {
                Ok(bridge) => bridges.push(bridge),
                // the bridge can vanish between enumeration and detail fetch
                Err(errno) => debug!(ifindex, %errno, "skipping bridge"),
            }
        }
        Ok(bridges)
    }

    fn build_bridge(&self, ifindex: u32) -> KernelResult<Bridge> {
        let name = self
            .channel
            .index_to_name(ifindex)?
            .ok_or(Errno::ENODEV)?;
        self.channel.bridge_info(&name)?;

        let key = BridgeKey {
            ifindex,
            generation: self.generation,
        };
        let slots = self.channel.port_slots(&name, self.settings.max_ports)?;

        let mut ports = Vec::new();
        for (slot, &port_index) in slots.iter().enumerate() {
            if port_index == 0 {
                continue;
            }
            let slot = u16::try_from(slot).map_err(|_| Errno::ERANGE)?;
            self.channel.port_info(&name, slot)?;
            let port_name = self
                .channel
                .index_to_name(port_index)?
                .ok_or(Errno::ENODEV)?;
            ports.push(Port {
                ifindex: port_index,
                slot,
                name: port_name,
                bridge: key,
            });
        }

        debug!(bridge = %name, ifindex, ports = ports.len(), "read bridge");
        Ok(Bridge { key, name, ports })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockKernel;
    use std::collections::BTreeSet;

    fn snapshot<C: BridgeChannel>(registry: &Registry<C>) -> BTreeSet<(String, Vec<(u16, String)>)> {
        registry
            .bridges()
            .iter()
            .map(|b| {
                let ports = b
                    .ports()
                    .iter()
                    .map(|p| (p.slot(), p.name().to_string()))
                    .collect();
                (b.name().to_string(), ports)
            })
            .collect()
    }

    fn two_bridges() -> MockKernel {
        let kernel = MockKernel::new();
        kernel.add_link("eth0");
        kernel.add_link("eth1");
        kernel.add_link("eth2");
        kernel.create_bridge("br0", &["eth0", "eth1"]);
        kernel.create_bridge("br1", &["eth2"]);
        kernel
    }

    #[test]
    fn initialize_builds_bridges_and_ports() {
        let registry = Registry::initialize(two_bridges(), Settings::default()).unwrap();
        assert_eq!(registry.bridges().len(), 2);

        let br0 = registry.find_bridge("br0").unwrap();
        let names: Vec<_> = br0.ports().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["eth0", "eth1"]);
        assert_eq!(br0.ports()[0].slot(), 1);
        assert_eq!(br0.ports()[1].slot(), 2);

        let eth2 = registry.find_port(registry.find_bridge("br1").unwrap(), "eth2").unwrap();
        assert_eq!(registry.parent(eth2).unwrap().name(), "br1");
    }

    #[test]
    fn version_mismatch_is_fatal() {
        let kernel = MockKernel::with_version(BRCTL_VERSION + 1);
        let err = Registry::initialize(kernel, Settings::default()).err().unwrap();
        assert!(err.is_fatal());
        assert!(matches!(err, BridgeError::VersionMismatch { found: 2, .. }));
    }

    #[test]
    fn version_query_failure_is_fatal() {
        let kernel = MockKernel::new();
        kernel.fail_next(Op::GetVersion, Errno::EPERM);
        let err = Registry::initialize(kernel, Settings::default()).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn enumeration_failure_aborts() {
        let kernel = two_bridges();
        kernel.fail_next(Op::ListBridges, Errno::EPERM);
        let err = Registry::initialize(kernel, Settings::default()).err().unwrap();
        assert_eq!(err.errno(), Some(Errno::EPERM));
        assert!(!err.is_fatal());
    }

    #[test]
    fn vanished_bridge_is_skipped() {
        let kernel = two_bridges();
        kernel.fail_next(Op::BridgeInfo, Errno::ENODEV);
        let registry = Registry::initialize(kernel, Settings::default()).unwrap();
        assert_eq!(registry.bridges().len(), 1);
    }

    #[test]
    fn port_info_failure_skips_only_that_bridge() {
        let kernel = two_bridges();
        kernel.fail_next(Op::PortInfo, Errno::ENODEV);
        let registry = Registry::initialize(kernel, Settings::default()).unwrap();
        assert_eq!(registry.bridges().len(), 1);
        assert!(registry.find_bridge("br0").is_none());
        assert!(registry.find_bridge("br1").is_some());
    }

    #[test]
    fn enumeration_respects_bridge_limit() {
        let settings = Settings {
            max_bridges: 1,
            ..Settings::default()
        };
        let registry = Registry::initialize(two_bridges(), settings).unwrap();
        assert_eq!(registry.bridges().len(), 1);
    }

    #[test]
    fn repeated_enumeration_is_stable() {
        let first = Registry::initialize(two_bridges(), Settings::default()).unwrap();
        let second = Registry::initialize(first.shutdown(), Settings::default()).unwrap();
        let again = Registry::initialize(two_bridges(), Settings::default()).unwrap();
        assert_eq!(snapshot(&second), snapshot(&again));
    }

    #[test]
    fn refresh_is_idempotent_without_changes() {
        let mut registry = Registry::initialize(two_bridges(), Settings::default()).unwrap();
        let before = snapshot(&registry);
        registry.refresh().unwrap();
        assert_eq!(snapshot(&registry), before);
        assert_eq!(registry.generation(), 1);
    }

    #[test]
    fn refresh_invalidates_old_keys() {
        let mut registry = Registry::initialize(two_bridges(), Settings::default()).unwrap();
        let old_key = registry.find_bridge("br0").unwrap().key();
        assert!(registry.resolve(old_key).is_some());

        registry.refresh().unwrap();
        assert!(registry.resolve(old_key).is_none());

        let new_key = registry.find_bridge("br0").unwrap().key();
        assert_ne!(old_key, new_key);
        assert_eq!(registry.resolve(new_key).unwrap().name(), "br0");
    }

    #[test]
    fn refresh_picks_up_kernel_changes() {
        let mut registry = Registry::initialize(two_bridges(), Settings::default()).unwrap();
        registry.channel().add_link("eth3");
        registry.channel().create_bridge("br2", &["eth3"]);

        assert!(registry.find_bridge("br2").is_none());
        registry.refresh().unwrap();
        assert_eq!(registry.find_bridge("br2").unwrap().ports()[0].name(), "eth3");
    }

    #[test]
    fn failed_refresh_leaves_empty_snapshot() {
        let mut registry = Registry::initialize(two_bridges(), Settings::default()).unwrap();
        registry.channel().fail_next(Op::ListBridges, Errno::EPERM);
        assert!(registry.refresh().is_err());
        assert!(registry.bridges().is_empty());
    }

    #[test]
    fn check_current_rejects_old_snapshot() {
        let mut registry = Registry::initialize(two_bridges(), Settings::default()).unwrap();
        let old = registry.find_bridge("br0").unwrap().clone();
        assert_eq!(registry.check_current(&old).unwrap().name(), "br0");

        registry.refresh().unwrap();
        let err = registry.check_current(&old).unwrap_err();
        assert!(matches!(err, BridgeError::NoSuchBridge(ref n) if n == "br0"));
        assert!(err.is_local());
    }

    #[test]
    fn lookups_miss_without_error() {
        let registry = Registry::initialize(two_bridges(), Settings::default()).unwrap();
        assert!(registry.find_bridge("br9").is_none());
        let br0 = registry.find_bridge("br0").unwrap();
        assert!(registry.find_port(br0, "eth2").is_none());
        assert!(br0.port_by_slot(7).is_none());
    }
}
