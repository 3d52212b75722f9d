//! Reliable transfer of whole buffers over the serial link.
//!
//! The PLI neither frames nor acknowledges raw bytes, so every transfer here
//! moves an exact number of bytes or fails: partial reads and writes are
//! retried with a running offset until the buffer is complete, a fixed retry
//! budget is exhausted, or the deadline for the whole call passes.

use std::process;
use std::thread;
use std::time::{Duration, Instant};

use embedded_io::{Error as _, ErrorKind};
use tracing::{debug, error};

use crate::error::{Error, Result};

/// How many incomplete loop iterations one transfer may consume.
const RETRY_BUDGET: u32 = 10;
/// Default wall-clock budget for one read or write.
pub const DEFAULT_IO_WAIT: Duration = Duration::from_secs(10);

/// What an expired [`Deadline`] does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutAction {
    /// Report the expiry to the caller so the operation fails cleanly.
    Recover,
    /// End the process. Only for startup conditions no caller can recover
    /// from, such as waiting for exclusive access to the port.
    Terminate,
}

/// Scoped timeout guard for one blocking operation.
///
/// A `Deadline` lives exactly as long as the call it guards and holds no
/// state outside itself, so an expiry cannot leak into a later, unrelated
/// operation.
#[derive(Debug)]
pub struct Deadline {
    expires: Instant,
    action: TimeoutAction,
}

/// Marker returned by [`Deadline::check`] when a `Recover` deadline expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExpired;

impl Deadline {
    /// Arm a deadline `wait` from now.
    pub fn start(wait: Duration, action: TimeoutAction) -> Self {
        Deadline {
            expires: Instant::now() + wait,
            action,
        }
    }

    /// Check the deadline and apply its action if it has passed.
    pub fn check(&self) -> std::result::Result<(), DeadlineExpired> {
        if Instant::now() < self.expires {
            return Ok(());
        }
        match self.action {
            TimeoutAction::Recover => Err(DeadlineExpired),
            TimeoutAction::Terminate => {
                error!("deadline expired, terminating");
                process::exit(2);
            }
        }
    }
}

/// Write all of `buf`, retrying partial transfers.
///
/// After the final byte goes out the call pauses for `settle`; the PLI may
/// otherwise answer the next request with a stale value instead of a freshly
/// computed one.
pub(crate) fn write_all<S: embedded_io::Write>(
    port: &mut S,
    buf: &[u8],
    wait: Duration,
    settle: Duration,
) -> Result<(), S::Error> {
    let deadline = Deadline::start(wait, TimeoutAction::Recover);
    let mut written = 0;
    let mut attempts = 0;

    while written < buf.len() {
        deadline.check().map_err(|_| Error::Timeout)?;

        let count = match port.write(&buf[written..]) {
            Ok(count) => count,
            // The port pacing us is not a transfer failure; the deadline
            // bounds how long we keep asking.
            Err(err) if err.kind() == ErrorKind::TimedOut => continue,
            Err(err) => return Err(Error::Serial(err)),
        };
        written += count;

        if written < buf.len() {
            if attempts >= RETRY_BUDGET {
                return Err(Error::IncompleteWrite);
            }
            attempts += 1;
            debug!(written, total = buf.len(), attempts, "partial write");
        }
    }

    thread::sleep(settle);

    Ok(())
}

/// Fill all of `buf` from the port, retrying partial transfers.
pub(crate) fn read_exact<S: embedded_io::Read>(
    port: &mut S,
    buf: &mut [u8],
    wait: Duration,
) -> Result<(), S::Error> {
    let deadline = Deadline::start(wait, TimeoutAction::Recover);
    let mut filled = 0;
    let mut attempts = 0;

    while filled < buf.len() {
        deadline.check().map_err(|_| Error::Timeout)?;

        let count = match port.read(&mut buf[filled..]) {
            Ok(count) => count,
            Err(err) if err.kind() == ErrorKind::TimedOut => continue,
            Err(err) => return Err(Error::Serial(err)),
        };
        filled += count;

        if filled < buf.len() {
            if attempts >= RETRY_BUDGET {
                return Err(Error::IncompleteRead);
            }
            attempts += 1;
            debug!(filled, total = buf.len(), attempts, "partial read");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_serial::MockSerial;

    const NO_SETTLE: Duration = Duration::ZERO;

    #[test]
    fn write_completes_across_partial_accepts() {
        let mut port = MockSerial::new();
        // Three bytes per call: a 4-byte frame needs one retry.
        port.set_write_chunk(Some(3));

        write_all(&mut port, &[0x14, 0x35, 0x00, 0xEB], DEFAULT_IO_WAIT, NO_SETTLE).unwrap();
        assert_eq!(port.written_data(), &[0x14, 0x35, 0x00, 0xEB]);
    }

    #[test]
    fn write_single_byte_accepts_complete_within_budget() {
        let mut port = MockSerial::new();
        port.set_write_chunk(Some(1));

        write_all(&mut port, &[0xBB, 0x00, 0x00, 0x44], DEFAULT_IO_WAIT, NO_SETTLE).unwrap();
        assert_eq!(port.written_data(), &[0xBB, 0x00, 0x00, 0x44]);
    }

    #[test]
    fn write_without_progress_fails_incomplete() {
        let mut port = MockSerial::new();
        port.set_stall_writes(true);

        let result = write_all(&mut port, &[0x14, 0x35, 0x00, 0xEB], DEFAULT_IO_WAIT, NO_SETTLE);
        assert!(matches!(result, Err(Error::IncompleteWrite)));
        assert!(port.written_data().is_empty());
    }

    #[test]
    fn write_system_error_is_immediately_fatal() {
        let mut port = MockSerial::new();
        port.set_write_error(true);

        let result = write_all(&mut port, &[0x14, 0x35, 0x00, 0xEB], DEFAULT_IO_WAIT, NO_SETTLE);
        assert!(matches!(result, Err(Error::Serial(_))));
    }

    #[test]
    fn read_gathers_partial_chunks() {
        let mut port = MockSerial::new();
        port.set_read_data(&[0xC8, 0x2A]);
        port.set_read_chunk(Some(1));

        let mut response = [0u8; 2];
        read_exact(&mut port, &mut response, DEFAULT_IO_WAIT).unwrap();
        assert_eq!(response, [0xC8, 0x2A]);
    }

    #[test]
    fn read_without_progress_fails_incomplete() {
        // An exhausted port keeps reporting zero bytes; the budget must end
        // the loop rather than spin forever.
        let mut port = MockSerial::new();

        let mut response = [0u8; 2];
        let result = read_exact(&mut port, &mut response, DEFAULT_IO_WAIT);
        assert!(matches!(result, Err(Error::IncompleteRead)));
    }

    #[test]
    fn read_deadline_expiry_is_a_timeout() {
        let mut port = MockSerial::new();
        port.set_read_timeout(true);

        let mut response = [0u8; 2];
        let result = read_exact(&mut port, &mut response, Duration::from_millis(20));
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[test]
    fn expired_deadline_does_not_outlive_its_call() {
        let deadline = Deadline::start(Duration::ZERO, TimeoutAction::Recover);
        assert_eq!(deadline.check(), Err(DeadlineExpired));
        drop(deadline);

        // A fresh call gets a fresh budget.
        let mut port = MockSerial::new();
        port.set_read_data(&[0xC8, 0x01]);
        let mut response = [0u8; 2];
        read_exact(&mut port, &mut response, DEFAULT_IO_WAIT).unwrap();
        assert_eq!(response, [0xC8, 0x01]);
    }

    #[test]
    fn recover_deadline_reports_expiry() {
        let deadline = Deadline::start(Duration::ZERO, TimeoutAction::Recover);
        assert!(deadline.check().is_err());

        let deadline = Deadline::start(DEFAULT_IO_WAIT, TimeoutAction::Recover);
        assert!(deadline.check().is_ok());
    }
}
