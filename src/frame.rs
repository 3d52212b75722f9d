//! Encoding and decoding of PLI frames.
//!
//! Every request is one fixed 4-byte frame of `command`, `location`, `data`
//! and a checksum. The PLI derives the checksum from the command byte alone
//! and never checks it against the location or data bytes; that quirk is part
//! of the protocol and is kept as-is here.

use crate::error::ProtocolError;

/// Length of every command frame sent to the PLI.
pub const FRAME_LEN: usize = 4;
/// Length of the reply to a register or EEPROM read.
pub const READ_RESPONSE_LEN: usize = 2;

/// First reply byte signalling a successful operation.
pub const ACK: u8 = 0xC8;
/// Sole reply byte to the loopback probe when the PLI is reachable.
pub const LOOPBACK_ACK: u8 = 0x80;

/// Read one processor register.
pub const CMD_READ_REGISTER: u8 = 0x14;
/// Read one EEPROM cell.
pub const CMD_READ_EEPROM: u8 = 0x48;
/// Write one processor register.
pub const CMD_WRITE_REGISTER: u8 = 0x98;
/// Write one EEPROM cell.
pub const CMD_WRITE_EEPROM: u8 = 0xCA;
/// Simulate a front-panel button push.
pub const CMD_PUSH: u8 = 0x57;
/// Loopback probe, answered by [`LOOPBACK_ACK`] alone.
pub const CMD_LOOPBACK: u8 = 0xBB;

/// Build a command frame.
pub fn encode(command: u8, location: u8, data: u8) -> [u8; FRAME_LEN] {
    [command, location, data, command ^ 0xFF]
}

/// Decode a two-byte read reply into its data byte.
pub fn decode_response(response: [u8; READ_RESPONSE_LEN]) -> Result<u8, ProtocolError> {
    if response[0] == ACK {
        Ok(response[1])
    } else {
        Err(ProtocolError::from_code(response[0]))
    }
}
