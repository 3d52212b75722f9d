//! This crate provides an interface for commanding Plasmatronics PL series solar charge
//! regulators through the PLI serial interface adapter.
//!
//! Supported regulator models (they differ in internal current-sense divisors, see
//! [`scaling`]):
//! * PL20
//! * PL40
//! * PL60
//!
//! The PLI speaks a fixed 4-byte binary protocol: every request carries a command byte, a
//! register location, a data byte and a checksum derived from the command byte alone.
//! Replies are at most two bytes. Registers live in two address spaces, the volatile
//! processor registers and the persistent EEPROM configuration cells.
//!
//! The serial port used for PLI comms should be configured like so:
//! * Default baud rate: 9600
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//! * Flow control: RTS/CTS
//!
//! Any transport implementing [`embedded_io::Read`] and [`embedded_io::Write`] can carry
//! the protocol; `demos/cli.rs` shows an adapter for a `serialport` port.

pub mod channel;
pub mod command;
pub mod error;
pub mod frame;
pub mod registers;
pub mod regulator;
pub mod scaling;
pub mod types;

#[cfg(test)]
mod mock_serial;
