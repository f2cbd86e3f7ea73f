//! Paginated forwarding-database reads.
//!
//! The caller drives pagination: start at offset zero, advance by the number
//! of entries each page returned, and stop on an empty page or an error.
//! Entries are sorted by hardware address within a page only.

use tracing::debug;

use crate::channel::BridgeChannel;
use crate::error::{BridgeError, Op, Result};
use crate::registry::{Bridge, Registry};
use crate::types::{FdbEntry, MacAddr};

impl<C: BridgeChannel> Registry<C> {
    /// Read up to `capacity` entries after the first `offset`. Empty when exhausted.
    pub fn read_fdb(&self, bridge: &Bridge, offset: usize, capacity: usize) -> Result<Vec<FdbEntry>> {
        let bridge = self.check_current(bridge)?;
        let ticks = self.tick_rate();
        let raw = self
            .channel()
            .fdb_page(bridge.name(), offset, capacity)
            .map_err(|errno| BridgeError::kernel(Op::ReadFdb, errno))?;
        debug!(bridge = bridge.name(), offset, count = raw.len(), "read fdb page");

        Ok(raw
            .iter()
            .take(capacity)
            .map(|r| FdbEntry {
                mac_addr: MacAddr(r.mac_addr),
                port_no: r.port(),
                is_local: r.is_local != 0,
                ageing_timer: ticks.to_duration(r.ageing_timer_value),
            })
            .collect())
    }

    /// Iterate the whole table page by page using the configured page size.
    pub fn fdb_pages<'a>(&'a self, bridge: &'a Bridge) -> FdbPages<'a, C> {
        FdbPages::new(self, bridge, self.settings().fdb_page_size)
    }
}

/// Iterator over sorted FDB pages; yields an error at most once, then stops.
pub struct FdbPages<'a, C: BridgeChannel> {
    registry: &'a Registry<C>,
    bridge: &'a Bridge,
    capacity: usize,
    offset: usize,
    done: bool,
}

impl<'a, C: BridgeChannel> FdbPages<'a, C> {
    pub fn new(registry: &'a Registry<C>, bridge: &'a Bridge, capacity: usize) -> Self {
        Self {
            registry,
            bridge,
            capacity: capacity.max(1),
            offset: 0,
            done: false,
        }
    }

    /// Entries consumed so far.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<C: BridgeChannel> Iterator for FdbPages<'_, C> {
    type Item = Result<Vec<FdbEntry>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.registry.read_fdb(self.bridge, self.offset, self.capacity) {
            Ok(page) if page.is_empty() => {
                self.done = true;
                None
            }
            Ok(mut page) => {
                self.offset += page.len();
                page.sort_by(|a, b| a.mac_addr.cmp(&b.mac_addr));
                Some(Ok(page))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::Errno;
    use crate::mock::MockKernel;
    use std::collections::BTreeSet;

    fn mac(i: u32) -> [u8; 6] {
        // scramble so the kernel order is not already sorted
        let x = i.wrapping_mul(2_654_435_761);
        [0x02, (x >> 24) as u8, (x >> 16) as u8, (x >> 8) as u8, x as u8, i as u8]
    }

    fn bridge_with_fdb(entries: u32, page: usize) -> Registry<MockKernel> {
        let kernel = MockKernel::new();
        kernel.add_link("eth0");
        kernel.create_bridge("br0", &["eth0"]);
        for i in 0..entries {
            kernel.add_fdb("br0", mac(i), 1, i % 7 == 0, i * 10);
        }
        let settings = Settings {
            fdb_page_size: page,
            ..Settings::default()
        };
        Registry::initialize(kernel, settings).unwrap()
    }

    #[test]
    fn pagination_covers_table_exactly_once() {
        for (entries, page) in [(0, 4), (1, 4), (4, 4), (5, 4), (37, 8), (100, 1024)] {
            let registry = bridge_with_fdb(entries, page);
            let br0 = registry.find_bridge("br0").unwrap();

            let mut seen = Vec::new();
            let mut pages = 0;
            for result in registry.fdb_pages(br0) {
                let page_entries = result.unwrap();
                assert!(page_entries.len() <= page);
                seen.extend(page_entries.into_iter().map(|e| e.mac_addr));
                pages += 1;
            }

            assert_eq!(seen.len(), entries as usize);
            let unique: BTreeSet<_> = seen.iter().collect();
            assert_eq!(unique.len(), seen.len());
            let expected: BTreeSet<_> = (0..entries).map(|i| MacAddr(mac(i))).collect();
            assert_eq!(unique.into_iter().copied().collect::<BTreeSet<_>>(), expected);
            assert_eq!(pages, (entries as usize).div_ceil(page));
        }
    }

    #[test]
    fn each_page_is_sorted() {
        let registry = bridge_with_fdb(50, 16);
        let br0 = registry.find_bridge("br0").unwrap();
        for page in registry.fdb_pages(br0) {
            let page = page.unwrap();
            assert!(page.windows(2).all(|w| w[0].mac_addr <= w[1].mac_addr));
        }
    }

    #[test]
    fn error_stops_iteration() {
        let registry = bridge_with_fdb(10, 4);
        let br0 = registry.find_bridge("br0").unwrap();
        let mut pages = registry.fdb_pages(br0);

        assert!(pages.next().unwrap().is_ok());
        registry.channel().fail_next(Op::ReadFdb, Errno::ENODEV);
        let err = pages.next().unwrap().unwrap_err();
        assert_eq!(err.errno(), Some(Errno::ENODEV));
        assert!(pages.next().is_none());
        assert_eq!(pages.offset(), 4);
    }

    #[test]
    fn read_fdb_converts_entries() {
        let registry = bridge_with_fdb(1, 4);
        let br0 = registry.find_bridge("br0").unwrap();
        let page = registry.read_fdb(br0, 0, 4).unwrap();
        assert_eq!(page.len(), 1);
        assert!(page[0].is_local);
        assert_eq!(page[0].port_no, 1);
        assert!(registry.read_fdb(br0, 1, 4).unwrap().is_empty());
    }
}
