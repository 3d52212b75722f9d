use std::thread;
use std::time::Duration;

use chrono::{Datelike, Timelike};
use tracing::warn;

use crate::channel::{self, DEFAULT_IO_WAIT};
use crate::error::Result;
use crate::frame;
use crate::registers::{CONFIGURATION_END, CONFIGURATION_SIZE, CONFIGURATION_START, PlRegister};
use crate::scaling::{CurrentScaling, PlModel};
use crate::types::{ExternalSense, RegulatorState, TimeOfDay};

/// Display power values for [`PlRegister::DisplayPower`].
const DISPLAY_WAKE: u8 = 0x00;
const DISPLAY_SLEEP: u8 = 0x10;
/// Channel selectors for [`PlRegister::DisplaySelect`].
const DISPLAY_DEFAULT: u8 = 0x00;
const DISPLAY_SOLAR_VOLTAGE: u8 = 0x27;
const DISPLAY_LOAD_TIMER: u8 = 0x17;
/// Button push selectors, carried in the frame's location byte.
const SHORT_PUSH: u8 = 0x01;
const LONG_PUSH: u8 = 0x02;

/// Fixed pauses built into the protocol sequences.
#[derive(Debug, Clone, Copy)]
pub struct Delays {
    /// Pause after every completed write; the PLI may otherwise answer the
    /// next request with a stale value.
    pub settle: Duration,
    /// Wait after switching the display to an analog channel before the
    /// reading is trusted.
    pub stabilize: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Delays {
            settle: Duration::from_millis(200),
            stabilize: Duration::from_secs(3),
        }
    }
}

impl Delays {
    /// No pauses at all. Useful against simulated ports.
    pub const fn none() -> Self {
        Delays {
            settle: Duration::ZERO,
            stabilize: Duration::ZERO,
        }
    }
}

/// You can create a PlRegulator over any interface which implements
/// [`embedded_io::Read`] & [`embedded_io::Write`].
///
/// One method call is one strictly sequential request/response exchange;
/// nothing is pipelined or batched.
pub struct PlRegulator<S: embedded_io::Read + embedded_io::Write> {
    port: S,
    scaling: CurrentScaling,
    io_wait: Duration,
    delays: Delays,
}

impl<S: embedded_io::Read + embedded_io::Write> PlRegulator<S> {
    /// Create a new PlRegulator instance for the given model.
    pub fn new(port: S, model: PlModel) -> Self {
        Self::with_scaling(port, model.scaling())
    }

    /// Create a PlRegulator with explicit current-sense divisors, for
    /// hardware variants not covered by [`PlModel`].
    pub fn with_scaling(port: S, scaling: CurrentScaling) -> Self {
        PlRegulator {
            port,
            scaling,
            io_wait: DEFAULT_IO_WAIT,
            delays: Delays::default(),
        }
    }

    /// Replace the wall-clock budget for a single read or write.
    pub fn with_io_wait(mut self, wait: Duration) -> Self {
        self.io_wait = wait;
        self
    }

    /// Replace the fixed protocol pauses.
    pub fn with_delays(mut self, delays: Delays) -> Self {
        self.delays = delays;
        self
    }

    /// Release the underlying port.
    pub fn into_port(self) -> S {
        self.port
    }

    /// Read one volatile processor register.
    pub fn read_register(&mut self, location: impl Into<u8>) -> Result<u8, S::Error> {
        self.transact(frame::encode(frame::CMD_READ_REGISTER, location.into(), 0x00))
    }

    /// Read one persistent EEPROM cell.
    pub fn read_eeprom(&mut self, location: impl Into<u8>) -> Result<u8, S::Error> {
        self.transact(frame::encode(frame::CMD_READ_EEPROM, location.into(), 0x00))
    }

    /// Write one volatile processor register. The PLI sends no reply.
    pub fn write_register(&mut self, location: impl Into<u8>, data: u8) -> Result<(), S::Error> {
        self.send(frame::encode(frame::CMD_WRITE_REGISTER, location.into(), data))
    }

    /// Write one persistent EEPROM cell. The PLI sends no reply.
    pub fn write_eeprom(&mut self, location: impl Into<u8>, data: u8) -> Result<(), S::Error> {
        self.send(frame::encode(frame::CMD_WRITE_EEPROM, location.into(), data))
    }

    /// Simulate a short front-panel button press.
    pub fn short_push(&mut self) -> Result<(), S::Error> {
        self.send(frame::encode(frame::CMD_PUSH, SHORT_PUSH, 0x00))
    }

    /// Simulate a long front-panel button press.
    pub fn long_push(&mut self) -> Result<(), S::Error> {
        self.send(frame::encode(frame::CMD_PUSH, LONG_PUSH, 0x00))
    }

    fn send(&mut self, frame: [u8; frame::FRAME_LEN]) -> Result<(), S::Error> {
        channel::write_all(&mut self.port, &frame, self.io_wait, self.delays.settle)
    }

    fn transact(&mut self, frame: [u8; frame::FRAME_LEN]) -> Result<u8, S::Error> {
        self.send(frame)?;
        let mut response = [0u8; frame::READ_RESPONSE_LEN];
        channel::read_exact(&mut self.port, &mut response, self.io_wait)?;
        Ok(frame::decode_response(response)?)
    }

    /// Loopback test of the link to the PLI.
    ///
    /// `Ok(false)` means the adapter answered, but with something other than
    /// the probe acknowledgement.
    pub fn test(&mut self) -> Result<bool, S::Error> {
        self.send(frame::encode(frame::CMD_LOOPBACK, 0x00, 0x00))?;
        let mut reply = [0u8; 1];
        channel::read_exact(&mut self.port, &mut reply, self.io_wait)?;
        Ok(reply[0] == frame::LOOPBACK_ACK)
    }

    /// PL software version.
    pub fn version(&mut self) -> Result<u8, S::Error> {
        self.read_register(PlRegister::Version)
    }

    /// Day of month as the regulator counts it (from zero).
    pub fn day(&mut self) -> Result<u8, S::Error> {
        self.read_register(PlRegister::Day)
    }

    /// Current regulator time of day.
    pub fn time(&mut self) -> Result<TimeOfDay, S::Error> {
        let hour_code = self.read_register(PlRegister::HourCode)?;
        let minute_remainder = self.read_register(PlRegister::MinuteRemainder)?;
        let second = self.read_register(PlRegister::Second)?;
        Ok(TimeOfDay::from_raw(hour_code, minute_remainder, second))
    }

    /// Set the regulator day and time, usually from `chrono::Local::now()`.
    pub fn set_day_time<T: Datelike + Timelike>(&mut self, now: &T) -> Result<(), S::Error> {
        self.write_register(PlRegister::Day, (now.day() - 1) as u8)?;
        self.write_register(
            PlRegister::HourCode,
            (now.hour() * 10 + now.minute() / 6) as u8,
        )?;
        self.write_register(PlRegister::MinuteRemainder, (now.minute() % 6) as u8)?;
        self.write_register(PlRegister::Second, now.second() as u8)
    }

    /// Configured battery capacity in amp-hours.
    ///
    /// The register packs two hardware ranges: raw values up to 50 count in
    /// 20 Ah steps, values above count in 100 Ah steps from zero again.
    pub fn battery_capacity_ah(&mut self) -> Result<u32, S::Error> {
        let raw = self.read_register(PlRegister::BatteryCapacity)? as u32;
        Ok(if raw <= 50 { raw * 20 } else { (raw - 50) * 100 })
    }

    /// Measured battery voltage in volts.
    pub fn battery_voltage(&mut self) -> Result<f64, S::Error> {
        let multiplier = self.read_register(PlRegister::VoltageScale)? as u32;
        let raw = self.read_register(PlRegister::BatteryVoltage)? as u32;
        Ok((raw * (multiplier + 1)) as f64 / 10.0)
    }

    /// Measured solar panel voltage in volts.
    ///
    /// The solar reading is only produced while the display shows it, so the
    /// display is woken, switched over and given time to stabilize before
    /// the register is read; afterwards the display is restored and put back
    /// to sleep.
    pub fn solar_voltage(&mut self) -> Result<f64, S::Error> {
        self.wake_display()?;
        self.write_register(PlRegister::DisplaySelect, DISPLAY_SOLAR_VOLTAGE)?;
        thread::sleep(self.delays.stabilize);
        let raw = self.read_register(PlRegister::SolarVoltage)?;
        self.write_register(PlRegister::DisplaySelect, DISPLAY_DEFAULT)?;
        self.sleep_display()?;
        Ok(raw as f64 / 2.0)
    }

    /// Charging current in amps, internal sense plus external shunt.
    pub fn charge_current(&mut self) -> Result<f64, S::Error> {
        let internal = self.read_register(PlRegister::ChargeInternal)? as f64;
        let external = self.read_register(PlRegister::ChargeExternal)? as f64;
        let sense = self.external_sense()?;
        let scale = if sense.charge_full_scale() { 1.0 } else { 10.0 };
        Ok(internal / self.scaling.charge_divisor + external / scale)
    }

    /// Load current in amps, internal sense plus external shunt.
    pub fn load_current(&mut self) -> Result<f64, S::Error> {
        let internal = self.read_register(PlRegister::LoadInternal)? as f64;
        let external = self.read_register(PlRegister::LoadExternal)? as f64;
        let sense = self.external_sense()?;
        let scale = if sense.load_full_scale() { 1.0 } else { 10.0 };
        Ok(internal / self.scaling.load_divisor + external / scale)
    }

    fn external_sense(&mut self) -> Result<ExternalSense, S::Error> {
        let raw = self.read_register(PlRegister::ExternalSense)?;
        Ok(ExternalSense::from_bytes([raw]))
    }

    /// Current charging-algorithm phase.
    pub fn state(&mut self) -> Result<RegulatorState, S::Error> {
        let raw = self.read_register(PlRegister::State)?;
        Ok(RegulatorState::from_raw(raw))
    }

    /// Read the whole EEPROM configuration block.
    ///
    /// Any single failed cell read aborts the transfer; nothing partial is
    /// returned.
    pub fn read_configuration(&mut self) -> Result<[u8; CONFIGURATION_SIZE], S::Error> {
        let mut block = [0u8; CONFIGURATION_SIZE];
        for (offset, cell) in (CONFIGURATION_START..=CONFIGURATION_END).enumerate() {
            block[offset] = self.read_eeprom(cell)?;
        }
        Ok(block)
    }

    /// Write a configuration block back, cell by cell in address order.
    ///
    /// A mid-sequence failure leaves the regulator with mixed old and new
    /// configuration; the transfer is not atomic.
    pub fn write_configuration(&mut self, block: &[u8; CONFIGURATION_SIZE]) -> Result<(), S::Error> {
        for (offset, cell) in (CONFIGURATION_START..=CONFIGURATION_END).enumerate() {
            self.write_eeprom(cell, block[offset])?;
        }
        Ok(())
    }

    /// Switch load power off, to be (possibly) switched automatically back
    /// on after the regulator's off delay.
    ///
    /// When the host itself hangs off the regulator's load terminals, the
    /// final display-sleep writes usually never complete because the host
    /// loses power first. That outcome is expected and is not reported as a
    /// failure.
    pub fn power_cycle(&mut self) -> Result<(), S::Error> {
        self.wake_display()?;
        self.write_register(PlRegister::DisplaySelect, DISPLAY_LOAD_TIMER)?;
        self.long_push()?;
        if let Err(err) = self.sleep_display() {
            warn!("display sleep after power cycle not acknowledged: {}", err);
        }
        Ok(())
    }

    // Display writes are repeated three times as a hedge against a single
    // lost, unacknowledged write.
    fn wake_display(&mut self) -> Result<(), S::Error> {
        for _ in 0..3 {
            self.write_register(PlRegister::DisplayPower, DISPLAY_WAKE)?;
        }
        Ok(())
    }

    fn sleep_display(&mut self) -> Result<(), S::Error> {
        for _ in 0..3 {
            self.write_register(PlRegister::DisplayPower, DISPLAY_SLEEP)?;
        }
        Ok(())
    }
}
