use clap::{ArgAction, Parser, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use br_core::{BridgeChannel, DEFAULT_CONFIG_PATH, OutputFormat, Registry, Settings};
use br_kernel::IoctlChannel;

mod command;
mod display;
mod failure;

use command::{Command, Invocation, Session, write_help};

#[derive(Parser)]
#[command(name = "brctl")]
#[command(version, about = "Ethernet bridge administration", long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Settings file [default: /etc/brctl/brctl.yaml if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format for the show commands
    #[arg(short, long, value_enum)]
    output: Option<Format>,

    /// Command to run; omit to list commands
    command: Option<String>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Yaml,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
            Format::Yaml => OutputFormat::Yaml,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    if let Some(path) = path {
        return Settings::from_file(path);
    }
    let default = Path::new(DEFAULT_CONFIG_PATH);
    if default.exists() {
        Settings::from_file(default)
    } else {
        Ok(Settings::default())
    }
}

/// How the process ends once the command line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    /// A recognised command ran, whether or not its operation failed.
    Ran,
    /// No command, an unknown one, or too few arguments.
    Usage,
}

impl Status {
    fn code(self) -> u8 {
        match self {
            Status::Ran => 0,
            Status::Usage => 1,
        }
    }
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        ExitCode::from(status.code())
    }
}

/// Resolve the command line to an invocation without touching the kernel.
/// On a usage problem the command list has been written and `None` returned.
fn dispatch(cli: &Cli, out: &mut impl Write, err: &mut impl Write) -> io::Result<Option<Invocation>> {
    let Some(name) = cli.command.as_deref() else {
        write_help(out)?;
        return Ok(None);
    };

    match Command::prepare(name, &cli.args) {
        Ok(invocation) => Ok(Some(invocation)),
        Err(e) => {
            writeln!(err, "{e}")?;
            write_help(out)?;
            Ok(None)
        }
    }
}

fn execute<C, W, E>(invocation: &Invocation, session: &mut Session<'_, C, W, E>) -> io::Result<Status>
where
    C: BridgeChannel,
    W: Write,
    E: Write,
{
    invocation.run(session)?;
    session.out.flush()?;
    Ok(Status::Ran)
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let invocation = dispatch(&cli, &mut io::stdout().lock(), &mut io::stderr().lock())?;
    let Some(invocation) = invocation else {
        return Ok(Status::Usage.into());
    };

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(format) = cli.output {
        settings.output = format.into();
    }
    let format = settings.output;

    let channel = IoctlChannel::open()?;
    let registry = Registry::initialize(channel, settings)?;
    debug!(bridges = registry.bridges().len(), "registry ready");

    let mut session = Session {
        registry: &registry,
        out: io::stdout().lock(),
        err: io::stderr().lock(),
        format,
    };
    let status = execute(&invocation, &mut session)?;
    drop(session);

    registry.shutdown();
    Ok(status.into())
}
