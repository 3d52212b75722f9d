//! Minimal host utility driving a PL regulator from the command line.
//!
//! Usage: `cli [-p] [-d <device>] [-b <baud>] [-m <model>] <command>`
//!
//! Exit codes: 0 success, 1 usage error, 2 local failure, 3 command
//! failure, 4 communication failure.

use std::env;
use std::process::ExitCode;
use std::time::Duration;

use inquire::Select;
use serialport::SerialPort;
use strum::IntoEnumIterator;
use tracing_subscriber::EnvFilter;

use plasmatronics_pl::channel::{DEFAULT_IO_WAIT, Deadline, TimeoutAction};
use plasmatronics_pl::command::{Command, OutputMode, RunOptions};
use plasmatronics_pl::error::Status;
use plasmatronics_pl::regulator::PlRegulator;
use plasmatronics_pl::scaling::PlModel;

const DEFAULT_BAUD: u32 = 9600;
// The regulator answers slowly; the channel retries around this.
const SERIAL_TIMEOUT_MS: u64 = 300;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            std::io::ErrorKind::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

fn usage() {
    eprintln!("cli [-p] [-d <device>] [-b <baud>] [-m <model>] <command>");
    eprintln!("  -p           plain (just values) output");
    eprintln!("  -d <device>  serial port device file (default: interactive selection)");
    eprintln!("  -b <baud>    baud rate (default: {DEFAULT_BAUD})");
    eprintln!("  -m <model>   regulator model: pl20, pl40 or pl60 (default: pl20)");
    eprintln!();
    eprintln!("  help         display this help");
    eprintln!("  version      display version of this program");
    for command in Command::iter() {
        eprintln!("  {:<12} {}", command.name(), command.description());
    }
}

struct Args {
    plain: bool,
    device: Option<String>,
    baud: u32,
    model: PlModel,
    command: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        plain: false,
        device: None,
        baud: DEFAULT_BAUD,
        model: PlModel::Pl20,
        command: None,
    };

    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-p" => args.plain = true,
            "-d" => {
                args.device = Some(iter.next().ok_or("missing parameter for -d argument")?);
            }
            "-b" => {
                let baud = iter.next().ok_or("missing parameter for -b argument")?;
                args.baud = baud
                    .parse()
                    .map_err(|_| format!("invalid parameter '{baud}' for -b argument"))?;
            }
            "-m" => {
                let model = iter.next().ok_or("missing parameter for -m argument")?;
                args.model = match model.as_str() {
                    "pl20" => PlModel::Pl20,
                    "pl40" => PlModel::Pl40,
                    "pl60" => PlModel::Pl60,
                    _ => return Err(format!("invalid parameter '{model}' for -m argument")),
                };
            }
            name if args.command.is_none() => args.command = Some(name.to_string()),
            name => return Err(format!("unexpected command '{name}'")),
        }
    }

    Ok(args)
}

/// Open the port, waiting a bounded time for exclusive access. The PLI is
/// often shared with a logger, so a busy port is normal for a moment; a port
/// that never frees up leaves nothing for us to do.
fn open_port(device: &str, baud: u32) -> PortWrapper {
    let deadline = Deadline::start(DEFAULT_IO_WAIT, TimeoutAction::Terminate);
    loop {
        match serialport::new(device, baud)
            .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
            .flow_control(serialport::FlowControl::Hardware)
            .open()
        {
            Ok(port) => return PortWrapper(port),
            Err(err) => {
                eprintln!("waiting for serial port device file '{device}': {err}");
                // Terminates the process once the wait has gone on too long.
                let _ = deadline.check();
                std::thread::sleep(Duration::from_millis(250));
            }
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}.");
            eprintln!();
            usage();
            return ExitCode::from(1);
        }
    };

    let Some(name) = args.command else {
        eprintln!("missing command argument.");
        eprintln!();
        usage();
        return ExitCode::from(1);
    };

    match name.as_str() {
        "help" => {
            usage();
            return ExitCode::SUCCESS;
        }
        "version" => {
            let prefix = if args.plain { "" } else { "Version: " };
            println!("{prefix}{}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    let Some(command) = Command::from_name(&name) else {
        eprintln!("unsupported command '{name}'.");
        eprintln!();
        usage();
        return ExitCode::from(1);
    };

    let device = args.device.unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("failed to enumerate serial ports");
        if ports.is_empty() {
            eprintln!("no serial ports found.");
            std::process::exit(2);
        }
        let names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();
        Select::new("Select a serial port:", names)
            .prompt()
            .expect("failed to select port")
    });

    let port = open_port(&device, args.baud);
    let mut regulator = PlRegulator::new(port, args.model);

    let options = RunOptions {
        mode: if args.plain {
            OutputMode::Plain
        } else {
            OutputMode::Verbose
        },
        ..RunOptions::default()
    };

    match command.run(&mut regulator, &options) {
        Status::Success => ExitCode::SUCCESS,
        Status::Local => ExitCode::from(2),
        Status::Command => ExitCode::from(3),
        Status::Communication => ExitCode::from(4),
    }
}
