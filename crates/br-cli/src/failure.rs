//! Operator-facing wording for failed commands.

use br_core::{BridgeError, Errno, Op};

use crate::command::{Command, Invocation};

/// Message printed on the error stream when `invocation` fails with `err`.
pub fn message(invocation: &Invocation, err: &BridgeError) -> String {
    let args = invocation.args();
    let arg = |i: usize| args.get(i).map(String::as_str).unwrap_or("");

    match (invocation.command(), err) {
        (_, BridgeError::NoSuchBridge(name)) => format!("bridge {name} doesn't exist!"),
        (_, BridgeError::NoSuchInterface(name)) => format!("interface {name} does not exist!"),
        (Command::AddBridge, BridgeError::Kernel { errno, .. }) => match *errno {
            Errno::EEXIST => format!(
                "device {} already exists; can't create bridge with the same name",
                arg(0)
            ),
            errno => format!("add bridge failed: {errno}"),
        },
        (Command::DelBridge, BridgeError::Kernel { errno, .. }) => match *errno {
            Errno::ENXIO => format!("bridge {} doesn't exist; can't delete it", arg(0)),
            Errno::EBUSY => format!("bridge {} is still up; can't delete it", arg(0)),
            errno => format!("can't delete bridge {}: {errno}", arg(0)),
        },
        (Command::AddInterface, BridgeError::Kernel { errno, .. }) => match *errno {
            Errno::EBUSY => format!(
                "device {} is already a member of a bridge; can't enslave it to bridge {}.",
                arg(1),
                arg(0)
            ),
            Errno::ELOOP => format!(
                "device {} is a bridge device itself; can't enslave a bridge device to a bridge device.",
                arg(1)
            ),
            errno => format!("can't add {} to bridge {}: {errno}", arg(1), arg(0)),
        },
        (Command::DelInterface, BridgeError::Kernel { errno, .. }) => match *errno {
            Errno::EINVAL => format!("device {} is not a slave of {}", arg(1), arg(0)),
            errno => format!("can't delete {} from {}: {errno}", arg(1), arg(0)),
        },
        (Command::ShowStp, BridgeError::Kernel { op: Op::BridgeInfo, errno }) => {
            format!("{}: can't get info {errno}", arg(0))
        }
        (Command::ShowMacs, BridgeError::Kernel { op: Op::ReadFdb, .. }) => {
            "read of forward table failed".to_string()
        }
        (_, other) => other.to_string(),
    }
}
