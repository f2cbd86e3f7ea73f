//! Command table and dispatch.

use std::io::{self, Write};
use thiserror::Error;
use tracing::debug;

use br_core::{
    Bridge, BridgeChannel, BridgeError, OutputFormat, Port, Registry, parse_bounded,
    parse_seconds, parse_stp_flag,
};

use crate::display;
use crate::failure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    AddBridge,
    DelBridge,
    AddInterface,
    DelInterface,
    SetAgeing,
    SetBridgePriority,
    SetForwardDelay,
    SetGcInterval,
    SetHello,
    SetMaxAge,
    SetPathCost,
    SetPortPriority,
    Show,
    ShowMacs,
    ShowStp,
    Stp,
}

impl Command {
    pub const ALL: [Command; 16] = [
        Command::AddBridge,
        Command::DelBridge,
        Command::AddInterface,
        Command::DelInterface,
        Command::SetAgeing,
        Command::SetBridgePriority,
        Command::SetForwardDelay,
        Command::SetGcInterval,
        Command::SetHello,
        Command::SetMaxAge,
        Command::SetPathCost,
        Command::SetPortPriority,
        Command::Show,
        Command::ShowMacs,
        Command::ShowStp,
        Command::Stp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::AddBridge => "addbr",
            Command::DelBridge => "delbr",
            Command::AddInterface => "addif",
            Command::DelInterface => "delif",
            Command::SetAgeing => "setageing",
            Command::SetBridgePriority => "setbridgeprio",
            Command::SetForwardDelay => "setfd",
            Command::SetGcInterval => "setgcint",
            Command::SetHello => "sethello",
            Command::SetMaxAge => "setmaxage",
            Command::SetPathCost => "setpathcost",
            Command::SetPortPriority => "setportprio",
            Command::Show => "show",
            Command::ShowMacs => "showmacs",
            Command::ShowStp => "showstp",
            Command::Stp => "stp",
        }
    }

    /// Whether the first argument names an existing bridge.
    pub fn needs_bridge(self) -> bool {
        !matches!(self, Command::AddBridge | Command::DelBridge | Command::Show)
    }

    /// Arguments required after the bridge name, if any.
    pub fn min_args(self) -> usize {
        match self {
            Command::Show | Command::ShowMacs | Command::ShowStp => 0,
            Command::SetPathCost | Command::SetPortPriority => 2,
            _ => 1,
        }
    }

    pub fn usage(self) -> &'static str {
        match self {
            Command::AddBridge | Command::DelBridge => "<bridge>",
            Command::AddInterface | Command::DelInterface => "<bridge> <device>",
            Command::SetAgeing
            | Command::SetForwardDelay
            | Command::SetGcInterval
            | Command::SetHello
            | Command::SetMaxAge => "<bridge> <time>",
            Command::SetBridgePriority => "<bridge> <prio>",
            Command::SetPathCost => "<bridge> <port> <cost>",
            Command::SetPortPriority => "<bridge> <port> <prio>",
            Command::Show => "",
            Command::ShowMacs | Command::ShowStp => "<bridge>",
            Command::Stp => "<bridge> {on|off}",
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            Command::AddBridge => "add bridge",
            Command::DelBridge => "delete bridge",
            Command::AddInterface => "add interface to bridge",
            Command::DelInterface => "delete interface from bridge",
            Command::SetAgeing => "set ageing time",
            Command::SetBridgePriority => "set bridge priority",
            Command::SetForwardDelay => "set bridge forward delay",
            Command::SetGcInterval => "set garbage collection interval",
            Command::SetHello => "set hello time",
            Command::SetMaxAge => "set max message age",
            Command::SetPathCost => "set path cost",
            Command::SetPortPriority => "set port priority",
            Command::Show => "show a list of bridges",
            Command::ShowMacs => "show a list of mac addrs",
            Command::ShowStp => "show bridge stp info",
            Command::Stp => "turn stp on/off",
        }
    }

    pub fn lookup(name: &str) -> Option<Command> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Look up `name` and check arity. Touches nothing outside the process.
    pub fn prepare(name: &str, args: &[String]) -> Result<Invocation, DispatchError> {
        let command =
            Self::lookup(name).ok_or_else(|| DispatchError::UnknownCommand(name.to_string()))?;
        let required = usize::from(command.needs_bridge()) + command.min_args();
        if args.len() < required {
            return Err(DispatchError::Usage {
                command,
                required,
                given: args.len(),
            });
        }
        Ok(Invocation {
            command,
            args: args.to_vec(),
        })
    }
}

/// Write the command list the way `brctl` with no arguments does.
pub fn write_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "commands:")?;
    for command in Command::ALL {
        writeln!(
            out,
            "\t{:<16}{:<24}{}",
            command.name(),
            command.usage(),
            command.summary()
        )?;
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("never heard of command [{0}]")]
    UnknownCommand(String),

    #[error("incorrect number of arguments for command {} (need {required}, got {given})", .command.name())]
    Usage {
        command: Command,
        required: usize,
        given: usize,
    },
}

/// Failure while running a command: either the operation or writing its output.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Output(#[from] io::Error),
}

/// Everything a command needs while it runs.
pub struct Session<'a, C: BridgeChannel, W: Write, E: Write> {
    pub registry: &'a Registry<C>,
    pub out: W,
    pub err: E,
    pub format: OutputFormat,
}

/// A validated command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    command: Command,
    args: Vec<String>,
}

impl Invocation {
    pub fn command(&self) -> Command {
        self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run the command. Operation failures are reported on the error stream
    /// and are not an error here; only a broken output stream is.
    pub fn run<C, W, E>(&self, session: &mut Session<'_, C, W, E>) -> io::Result<()>
    where
        C: BridgeChannel,
        W: Write,
        E: Write,
    {
        debug!(command = self.command.name(), args = ?self.args, "running command");
        match self.execute(session) {
            Ok(()) => Ok(()),
            Err(Failure::Bridge(e)) => {
                debug!(command = self.command.name(), error = %e, "command failed");
                writeln!(session.err, "{}", failure::message(self, &e))
            }
            Err(Failure::Output(e)) => Err(e),
        }
    }

    fn execute<C, W, E>(&self, session: &mut Session<'_, C, W, E>) -> Result<(), Failure>
    where
        C: BridgeChannel,
        W: Write,
        E: Write,
    {
        let registry = session.registry;
        let args = &self.args;

        match self.command {
            Command::AddBridge => registry.add_bridge(&args[0])?,
            Command::DelBridge => registry.del_bridge(&args[0])?,
            Command::Show => display::show(session)?,
            Command::AddInterface => registry.add_interface(self.bridge(registry)?, &args[1])?,
            Command::DelInterface => registry.del_interface(self.bridge(registry)?, &args[1])?,
            Command::SetAgeing => {
                let bridge = self.bridge(registry)?;
                registry.set_ageing_time(bridge, parse_seconds("ageing time", &args[1])?)?
            }
            Command::SetForwardDelay => {
                let bridge = self.bridge(registry)?;
                registry.set_forward_delay(bridge, parse_seconds("forward delay", &args[1])?)?
            }
            Command::SetGcInterval => {
                let bridge = self.bridge(registry)?;
                registry.set_gc_interval(bridge, parse_seconds("gc interval", &args[1])?)?
            }
            Command::SetHello => {
                let bridge = self.bridge(registry)?;
                registry.set_hello_time(bridge, parse_seconds("hello timer", &args[1])?)?
            }
            Command::SetMaxAge => {
                let bridge = self.bridge(registry)?;
                registry.set_max_age(bridge, parse_seconds("max age", &args[1])?)?
            }
            Command::SetBridgePriority => {
                let bridge = self.bridge(registry)?;
                let priority = parse_bounded("bridge priority", &args[1], 0, i64::from(u16::MAX))?;
                registry.set_bridge_priority(bridge, priority as u16)?
            }
            Command::SetPathCost => {
                let bridge = self.bridge(registry)?;
                let cost = parse_bounded("path cost", &args[2], 0, i64::from(u32::MAX))?;
                registry.set_path_cost(self.port(bridge)?, cost as u32)?
            }
            Command::SetPortPriority => {
                let bridge = self.bridge(registry)?;
                let priority = parse_bounded("port priority", &args[2], 0, i64::from(u32::MAX))?;
                registry.set_port_priority(self.port(bridge)?, priority as u32)?
            }
            Command::Stp => {
                let bridge = self.bridge(registry)?;
                registry.set_stp(bridge, parse_stp_flag(&args[1])?)?
            }
            Command::ShowMacs => {
                let bridge = self.bridge(registry)?;
                display::showmacs(session, bridge)?
            }
            Command::ShowStp => {
                let bridge = self.bridge(registry)?;
                display::showstp(session, bridge)?
            }
        }
        Ok(())
    }

    fn bridge<'r, C: BridgeChannel>(&self, registry: &'r Registry<C>) -> Result<&'r Bridge, BridgeError> {
        let name = &self.args[0];
        registry
            .find_bridge(name)
            .ok_or_else(|| BridgeError::NoSuchBridge(name.clone()))
    }

    fn port<'b>(&self, bridge: &'b Bridge) -> Result<&'b Port, BridgeError> {
        let name = &self.args[1];
        bridge.find_port(name).ok_or_else(|| BridgeError::NoSuchPort {
            bridge: bridge.name().to_string(),
            port: name.clone(),
        })
    }
}
