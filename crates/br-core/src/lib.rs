//! Bridge/port registry and control library.
//!
//! The kernel does the bridging and runs spanning tree; this crate keeps a
//! snapshot of what bridges and ports exist, translates the kernel's tick and
//! id encodings, and issues one control request per operation.

pub mod channel;
pub mod config;
pub mod error;
pub mod fdb;
pub mod info;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ops;
pub mod registry;
pub mod time;
pub mod types;

pub use channel::{BRCTL_VERSION, BridgeChannel, KernelResult, RawBridgeInfo, RawFdbEntry, RawPortInfo, Setting};
pub use config::{DEFAULT_CONFIG_PATH, OutputFormat, Settings};
pub use error::{BridgeError, Errno, Op, Result};
pub use fdb::FdbPages;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockKernel;
pub use ops::{parse_bounded, parse_int, parse_stp_flag};
pub use registry::{Bridge, BridgeKey, Port, Registry};
pub use time::{TickRate, USER_HZ, parse_seconds};
pub use types::{BridgeId, BridgeInfo, FdbEntry, MacAddr, PortInfo, StpState};
