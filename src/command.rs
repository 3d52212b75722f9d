//! The closed set of operations a host can run against the regulator.
//!
//! Each command is a short sequential script over the
//! [`PlRegulator`](crate::regulator::PlRegulator) driver: it prints its
//! result to stdout, sends any diagnostic to stderr and classifies the
//! outcome as a [`Status`] for the caller to turn into an exit code.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use tracing::debug;

use crate::error::{Error, Result, Status};
use crate::registers::CONFIGURATION_SIZE;
use crate::regulator::PlRegulator;

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Labelled, human-readable lines.
    #[default]
    Verbose,
    /// Values only, for scripts.
    Plain,
}

/// Settings threaded through one command invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: OutputMode,
    /// Where `save` and `restore` keep the configuration block.
    pub config_path: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            mode: OutputMode::Verbose,
            config_path: PathBuf::from("solar.conf"),
        }
    }
}

/// Every operation the utility can run: one name, one description, one
/// handler per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Command {
    Test,
    PlVersion,
    GetDay,
    GetTime,
    SetDayTime,
    BatCapacity,
    BatVoltage,
    SolVoltage,
    Charge,
    Load,
    State,
    Save,
    Restore,
    PowerCycle,
}

impl Command {
    /// Command-line name.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Test => "test",
            Command::PlVersion => "plversion",
            Command::GetDay => "getday",
            Command::GetTime => "gettime",
            Command::SetDayTime => "setdaytime",
            Command::BatCapacity => "batcapacity",
            Command::BatVoltage => "batvoltage",
            Command::SolVoltage => "solvoltage",
            Command::Charge => "charge",
            Command::Load => "load",
            Command::State => "state",
            Command::Save => "save",
            Command::Restore => "restore",
            Command::PowerCycle => "powercycle",
        }
    }

    /// One-line description for help listings.
    pub fn description(&self) -> &'static str {
        match self {
            Command::Test => "loopback test connection to PLI",
            Command::PlVersion => "get PL software version",
            Command::GetDay => "get current day in a month",
            Command::GetTime => "get current time",
            Command::SetDayTime => "set current day and time from local time on this system",
            Command::BatCapacity => "get battery capacity configuration",
            Command::BatVoltage => "get current battery voltage",
            Command::SolVoltage => "get current solar voltage",
            Command::Charge => "get current charging current",
            Command::Load => "get current load current",
            Command::State => "get current regulator state",
            Command::Save => "save current configuration to a file",
            Command::Restore => "restore configuration from a file",
            Command::PowerCycle => "switch power off to be (possibly) turned automatically back on",
        }
    }

    /// Look a command up by its command-line name.
    pub fn from_name(name: &str) -> Option<Command> {
        Command::iter().find(|command| command.name() == name)
    }

    /// Run the command against the regulator and classify the outcome.
    pub fn run<S>(&self, regulator: &mut PlRegulator<S>, options: &RunOptions) -> Status
    where
        S: embedded_io::Read + embedded_io::Write,
    {
        debug!("running command '{}'", self.name());
        match self.execute(regulator, options) {
            Ok(status) => status,
            Err(err) => {
                // Plain output keeps quiet about device-reported failures;
                // everything else is always diagnosed, exactly once.
                if !(options.mode == OutputMode::Plain && err.is_protocol()) {
                    eprintln!("{err}.");
                }
                err.status()
            }
        }
    }

    fn execute<S>(
        &self,
        regulator: &mut PlRegulator<S>,
        options: &RunOptions,
    ) -> Result<Status, S::Error>
    where
        S: embedded_io::Read + embedded_io::Write,
    {
        let mode = options.mode;
        match self {
            Command::Test => {
                if regulator.test()? {
                    if mode == OutputMode::Verbose {
                        println!("Test successful.");
                    }
                    Ok(Status::Success)
                } else {
                    if mode == OutputMode::Verbose {
                        println!("Test failed.");
                    }
                    Ok(Status::Command)
                }
            }
            Command::PlVersion => {
                report(mode, "Version: ", regulator.version()?);
                Ok(Status::Success)
            }
            Command::GetDay => {
                report(mode, "Day: ", regulator.day()?);
                Ok(Status::Success)
            }
            Command::GetTime => {
                report(mode, "Time: ", regulator.time()?);
                Ok(Status::Success)
            }
            Command::SetDayTime => {
                regulator.set_day_time(&chrono::Local::now())?;
                Ok(Status::Success)
            }
            Command::BatCapacity => {
                report(mode, "Battery capacity (Ah): ", regulator.battery_capacity_ah()?);
                Ok(Status::Success)
            }
            Command::BatVoltage => {
                let volts = regulator.battery_voltage()?;
                report(mode, "Battery voltage (V): ", format!("{volts:.1}"));
                Ok(Status::Success)
            }
            Command::SolVoltage => {
                let volts = regulator.solar_voltage()?;
                report(mode, "Solar voltage (V): ", format!("{volts:.1}"));
                Ok(Status::Success)
            }
            Command::Charge => {
                let amps = regulator.charge_current()?;
                report(mode, "Charging current (A): ", format!("{amps:.1}"));
                Ok(Status::Success)
            }
            Command::Load => {
                let amps = regulator.load_current()?;
                report(mode, "Load current (A): ", format!("{amps:.1}"));
                Ok(Status::Success)
            }
            Command::State => {
                report(mode, "Regulator state: ", regulator.state()?);
                Ok(Status::Success)
            }
            Command::Save => {
                // The whole block is read off the device before the file is
                // touched; a failed cell read leaves the old file intact.
                let block = regulator.read_configuration()?;
                fs::write(&options.config_path, block).map_err(|source| Error::ConfigFile {
                    path: options.config_path.display().to_string(),
                    source,
                })?;
                Ok(Status::Success)
            }
            Command::Restore => {
                // The file is read and validated before any device I/O.
                let data = fs::read(&options.config_path).map_err(|source| Error::ConfigFile {
                    path: options.config_path.display().to_string(),
                    source,
                })?;
                let block: [u8; CONFIGURATION_SIZE] =
                    data.as_slice()
                        .try_into()
                        .map_err(|_| Error::ConfigFileSize {
                            path: options.config_path.display().to_string(),
                            expected: CONFIGURATION_SIZE,
                            actual: data.len(),
                        })?;
                regulator.write_configuration(&block)?;
                Ok(Status::Success)
            }
            Command::PowerCycle => {
                regulator.power_cycle()?;
                Ok(Status::Success)
            }
        }
    }
}

fn report(mode: OutputMode, label: &str, value: impl fmt::Display) {
    match mode {
        OutputMode::Verbose => println!("{label}{value}"),
        OutputMode::Plain => println!("{value}"),
    }
}
