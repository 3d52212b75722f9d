//! We use this mocking module in unit tests to emulate the PLI end of the
//! serial link.

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Bytes written to the mock serial port.
    write_buffer: Vec<u8>,
    /// Pre-configured reply bytes handed out by read().
    read_buffer: Vec<u8>,
    /// Current position in the read buffer.
    read_position: usize,
    /// Largest number of bytes a single write call accepts.
    write_chunk: Option<usize>,
    /// Largest number of bytes a single read call returns.
    read_chunk: Option<usize>,
    /// Total bytes accepted before writes start failing, to emulate a link
    /// that dies mid-sequence.
    write_limit: Option<usize>,
    /// When set, write calls accept nothing and report zero progress.
    stall_writes: bool,
    /// Flag to simulate write errors.
    should_error_on_write: bool,
    /// Flag to simulate read errors.
    should_error_on_read: bool,
    /// When set, read calls report a timed-out port instead of data.
    should_timeout_on_read: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum MockSerialError {
    /// Simulated port-level timeout.
    #[error("simulated port timeout")]
    Timeout,
    /// Generic simulated error for testing.
    #[error("simulated error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        if self.stall_writes {
            return Ok(0);
        }

        let mut accepted = buf.len();
        if let Some(limit) = self.write_limit {
            if self.write_buffer.len() >= limit {
                return Err(MockSerialError::SimulatedError);
            }
            accepted = accepted.min(limit - self.write_buffer.len());
        }
        if let Some(chunk) = self.write_chunk {
            accepted = accepted.min(chunk);
        }

        self.write_buffer.extend_from_slice(&buf[..accepted]);
        Ok(accepted)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }
        if self.should_timeout_on_read {
            return Err(MockSerialError::Timeout);
        }

        let available = self.read_buffer.len() - self.read_position;
        let mut count = buf.len().min(available);
        if let Some(chunk) = self.read_chunk {
            count = count.min(chunk);
        }

        buf[..count].copy_from_slice(&self.read_buffer[self.read_position..][..count]);
        self.read_position += count;
        Ok(count)
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers.
    pub fn new() -> Self {
        Self {
            write_buffer: Vec::new(),
            read_buffer: Vec::new(),
            read_position: 0,
            write_chunk: None,
            read_chunk: None,
            write_limit: None,
            stall_writes: false,
            should_error_on_write: false,
            should_error_on_read: false,
            should_timeout_on_read: false,
        }
    }

    /// Set the data that will be returned when read() is called.
    pub fn set_read_data(&mut self, data: &[u8]) {
        self.read_buffer.clear();
        self.read_position = 0;
        self.read_buffer.extend_from_slice(data);
    }

    /// Get the data that was written to this mock serial port.
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Cap how many bytes a single write call accepts.
    pub fn set_write_chunk(&mut self, chunk: Option<usize>) {
        self.write_chunk = chunk;
    }

    /// Cap how many bytes a single read call returns.
    pub fn set_read_chunk(&mut self, chunk: Option<usize>) {
        self.read_chunk = chunk;
    }

    /// Fail writes once the port has accepted this many bytes in total.
    pub fn set_write_limit(&mut self, limit: Option<usize>) {
        self.write_limit = limit;
    }

    /// Configure whether write calls accept nothing at all.
    pub fn set_stall_writes(&mut self, stall: bool) {
        self.stall_writes = stall;
    }

    /// Configure whether write operations should fail with an error.
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error.
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }

    /// Configure whether read operations report a port-level timeout.
    pub fn set_read_timeout(&mut self, should_timeout: bool) {
        self.should_timeout_on_read = should_timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Read, Write};

    #[test]
    fn writes_accumulate() {
        let mut mock = MockSerial::new();
        mock.write(&[0x14, 0x35]).unwrap();
        mock.write(&[0x00, 0xEB]).unwrap();
        assert_eq!(mock.written_data(), &[0x14, 0x35, 0x00, 0xEB]);
    }

    #[test]
    fn write_chunk_caps_each_call() {
        let mut mock = MockSerial::new();
        mock.set_write_chunk(Some(3));

        let accepted = mock.write(&[1, 2, 3, 4]).unwrap();
        assert_eq!(accepted, 3);
        assert_eq!(mock.written_data(), &[1, 2, 3]);
    }

    #[test]
    fn write_limit_fails_once_reached() {
        let mut mock = MockSerial::new();
        mock.set_write_limit(Some(2));

        assert_eq!(mock.write(&[1, 2, 3]).unwrap(), 2);
        assert!(mock.write(&[4]).is_err());
        assert_eq!(mock.written_data(), &[1, 2]);
    }

    #[test]
    fn stalled_writes_report_zero_progress() {
        let mut mock = MockSerial::new();
        mock.set_stall_writes(true);

        assert_eq!(mock.write(&[1, 2, 3]).unwrap(), 0);
        assert!(mock.written_data().is_empty());
    }

    #[test]
    fn reads_hand_out_scripted_data_in_order() {
        let mut mock = MockSerial::new();
        mock.set_read_data(&[0xC8, 0x2A, 0xC8, 0x01]);

        let mut first = [0u8; 2];
        let mut second = [0u8; 2];
        assert_eq!(mock.read(&mut first).unwrap(), 2);
        assert_eq!(mock.read(&mut second).unwrap(), 2);
        assert_eq!(first, [0xC8, 0x2A]);
        assert_eq!(second, [0xC8, 0x01]);
    }

    #[test]
    fn read_chunk_caps_each_call() {
        let mut mock = MockSerial::new();
        mock.set_read_data(&[0xC8, 0x2A]);
        mock.set_read_chunk(Some(1));

        let mut buf = [0u8; 2];
        assert_eq!(mock.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 0xC8);
    }

    #[test]
    fn exhausted_reads_report_zero_progress() {
        let mut mock = MockSerial::new();
        let mut buf = [0u8; 2];
        assert_eq!(mock.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn error_flags_surface_as_errors() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(mock.write(&[1]).is_err());
        assert!(mock.flush().is_err());

        let mut mock = MockSerial::new();
        mock.set_read_error(true);
        let mut buf = [0u8; 1];
        assert!(mock.read(&mut buf).is_err());

        let mut mock = MockSerial::new();
        mock.set_read_timeout(true);
        let mut buf = [0u8; 1];
        assert!(matches!(
            mock.read(&mut buf),
            Err(MockSerialError::Timeout)
        ));
    }
}
