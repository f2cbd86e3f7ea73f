//! Linux kernel backend for bridge control.

pub mod abi;
pub mod ioctl;
pub mod link;

pub use ioctl::IoctlChannel;
pub use link::{LinkError, LinkResolver};
