//! Error types for bridge control operations.
//!
//! Errors fall into three classes: local validation failures that never reach
//! the kernel, kernel-reported failures carrying the raw errno, and fatal
//! initialization failures after which no registry exists.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result alias used across the bridge library.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Raw error code reported by the kernel for a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    pub const EEXIST: Errno = Errno(libc::EEXIST);
    pub const ENXIO: Errno = Errno(libc::ENXIO);
    pub const ENODEV: Errno = Errno(libc::ENODEV);
    pub const EBUSY: Errno = Errno(libc::EBUSY);
    pub const ELOOP: Errno = Errno(libc::ELOOP);
    pub const EINVAL: Errno = Errno(libc::EINVAL);
    pub const ERANGE: Errno = Errno(libc::ERANGE);
    pub const EPERM: Errno = Errno(libc::EPERM);
    pub const EOPNOTSUPP: Errno = Errno(libc::EOPNOTSUPP);

    /// Take the calling thread's last OS error.
    pub fn last() -> Self {
        Errno(io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO))
    }

    pub fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = io::Error::from_raw_os_error(self.0).to_string();
        // io::Error appends " (os error N)"; keep the strerror text and the bare code
        let text = text.split(" (os error").next().unwrap_or(&text);
        write!(f, "{text} ({})", self.0)
    }
}

/// Control request that a kernel failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    GetVersion,
    ListBridges,
    ListPorts,
    BridgeInfo,
    PortInfo,
    ReadFdb,
    AddBridge,
    DelBridge,
    AddInterface,
    DelInterface,
    SetAgeingTime,
    SetForwardDelay,
    SetHelloTime,
    SetMaxAge,
    SetGcInterval,
    SetStpState,
    SetBridgePriority,
    SetPortPriority,
    SetPathCost,
    ResolveLink,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::GetVersion => "get version",
            Op::ListBridges => "get bridge indices",
            Op::ListPorts => "get port list",
            Op::BridgeInfo => "get bridge info",
            Op::PortInfo => "get port info",
            Op::ReadFdb => "read forward table",
            Op::AddBridge => "add bridge",
            Op::DelBridge => "delete bridge",
            Op::AddInterface => "add interface",
            Op::DelInterface => "delete interface",
            Op::SetAgeingTime => "set ageing time",
            Op::SetForwardDelay => "set forward delay",
            Op::SetHelloTime => "set hello timer",
            Op::SetMaxAge => "set max age",
            Op::SetGcInterval => "set gc interval",
            Op::SetStpState => "set stp status",
            Op::SetBridgePriority => "set bridge priority",
            Op::SetPortPriority => "set port priority",
            Op::SetPathCost => "set path cost",
            Op::ResolveLink => "resolve interface",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while building the registry or issuing requests.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Operator supplied a duration that is not a finite, non-negative number.
    #[error("bad {what} value '{value}'")]
    InvalidDuration { what: &'static str, value: String },

    /// Operator supplied something that does not parse as an integer.
    #[error("bad {what} value '{value}'")]
    InvalidInteger { what: &'static str, value: String },

    /// Parsed integer does not fit the field it is meant for.
    #[error("{what} {value} is out of range ({min}..={max})")]
    OutOfRange {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// STP toggle token was not one of the accepted spellings.
    #[error("expect on/off for argument, got '{0}'")]
    InvalidStpFlag(String),

    #[error("bridge {0} doesn't exist")]
    NoSuchBridge(String),

    #[error("can't find port {port} in bridge {bridge}")]
    NoSuchPort { bridge: String, port: String },

    #[error("interface {0} does not exist")]
    NoSuchInterface(String),

    /// The kernel rejected a control request.
    #[error("{op} failed: {errno}")]
    Kernel { op: Op, errno: Errno },

    /// The control channel could not be opened.
    #[error("can't setup bridge control: {0}")]
    Channel(io::Error),

    /// Kernel speaks a different control protocol than this build.
    #[error("bridge utilities not compatible with kernel version (kernel {found}, expected {expected})")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("invalid configuration for {field}: {message}")]
    Config { field: &'static str, message: String },
}

impl BridgeError {
    pub fn kernel(op: Op, errno: Errno) -> Self {
        BridgeError::Kernel { op, errno }
    }

    /// Errors after which the process must not continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Channel(_) | BridgeError::VersionMismatch { .. }
        )
    }

    /// Kernel errno, when the failure came from the kernel.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            BridgeError::Kernel { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// True for failures detected before any kernel request was made.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidDuration { .. }
                | BridgeError::InvalidInteger { .. }
                | BridgeError::OutOfRange { .. }
                | BridgeError::InvalidStpFlag(_)
                | BridgeError::NoSuchBridge(_)
                | BridgeError::NoSuchPort { .. }
                | BridgeError::NoSuchInterface(_)
        )
    }
}
