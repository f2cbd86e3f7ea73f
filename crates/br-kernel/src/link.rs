// Interface name/index lookups over rtnetlink
use futures::stream::TryStreamExt;
use netlink_packet_route::link::{LinkAttribute, LinkMessage};
use rtnetlink::{Handle, new_connection};
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use br_core::Errno;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("netlink: {0}")]
    Netlink(#[from] rtnetlink::Error),

    #[error("netlink socket: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Errno equivalent; a missing link is `ENODEV`.
    pub fn errno(&self) -> Errno {
        match self {
            LinkError::Netlink(rtnetlink::Error::NetlinkError(msg)) => msg
                .code
                .map(|code| Errno(code.get().abs()))
                .unwrap_or(Errno(libc::EIO)),
            LinkError::Netlink(_) => Errno(libc::EIO),
            LinkError::Io(e) => Errno(e.raw_os_error().unwrap_or(libc::EIO)),
        }
    }

    fn is_missing(&self) -> bool {
        self.errno() == Errno::ENODEV
    }
}

/// Blocking link lookups. Owns a single-threaded runtime that drives the
/// netlink connection only while a lookup is in flight.
pub struct LinkResolver {
    runtime: Runtime,
    handle: Handle,
}

impl LinkResolver {
    pub fn new() -> Result<Self, LinkError> {
        let runtime = Builder::new_current_thread().enable_io().build()?;
        let (connection, handle, _) = {
            let _guard = runtime.enter();
            new_connection()?
        };
        runtime.spawn(connection);
        Ok(Self { runtime, handle })
    }

    pub fn index_of(&self, name: &str) -> Result<Option<u32>, LinkError> {
        match self.runtime.block_on(self.link_by_name(name)) {
            Ok(link) => Ok(link.map(|l| l.header.index)),
            Err(e) if e.is_missing() => Ok(None),
            Err(e) => {
                debug!(name, error = %e, "link lookup by name failed");
                Err(e)
            }
        }
    }

    pub fn name_of(&self, index: u32) -> Result<Option<String>, LinkError> {
        match self.runtime.block_on(self.link_by_index(index)) {
            Ok(link) => Ok(link.and_then(|l| link_name(&l))),
            Err(e) if e.is_missing() => Ok(None),
            Err(e) => {
                debug!(index, error = %e, "link lookup by index failed");
                Err(e)
            }
        }
    }

    async fn link_by_name(&self, name: &str) -> Result<Option<LinkMessage>, LinkError> {
        let mut links = self.handle.link().get().match_name(name.to_string()).execute();
        Ok(links.try_next().await?)
    }

    async fn link_by_index(&self, index: u32) -> Result<Option<LinkMessage>, LinkError> {
        let mut links = self.handle.link().get().match_index(index).execute();
        Ok(links.try_next().await?)
    }
}

fn link_name(link: &LinkMessage) -> Option<String> {
    link.attributes.iter().find_map(|attr| {
        if let LinkAttribute::IfName(n) = attr {
            Some(n.clone())
        } else {
            None
        }
    })
}
