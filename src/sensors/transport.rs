//! Byte transports a session can own: a real serial port, or an in-memory mock for tests and
//! offline replay of recorded streams.

use serialport::{ClearBuffer, SerialPort};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A bidirectional byte link to a sensor.
pub trait Transport: Read + Write + Send {
    /// Discards any bytes received but not yet read.
    fn clear_input(&mut self) -> io::Result<()>;

    /// Sets the data-terminal-ready line. Links without one ignore this.
    fn set_dtr(&mut self, _level: bool) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> io::Result<()> {
        Ok(self.clear(ClearBuffer::Input)?)
    }

    fn set_dtr(&mut self, level: bool) -> io::Result<()> {
        Ok(self.write_data_terminal_ready(level)?)
    }
}

/// An in-memory transport. Clones share the same buffers, so a test can keep one handle to inject
/// bytes and inspect writes while a session owns another.
///
/// Reading from an empty buffer behaves like a serial port whose read timed out. After
/// `disconnect` every operation fails with `BrokenPipe`, like an unplugged device.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Default)]
struct MockInner {
    read_buffer: VecDeque<u8>,
    written: Vec<u8>,
    dtr: Option<bool>,
    disconnected: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        // A poisoned lock only means a test thread panicked mid-write; the data is still usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn inject_read(&self, data: &[u8]) {
        self.lock().read_buffer.extend(data);
    }

    pub fn unread(&self) -> usize {
        self.lock().read_buffer.len()
    }

    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    pub fn dtr(&self) -> Option<bool> {
        self.lock().dtr
    }

    pub fn disconnect(&self) {
        self.lock().disconnected = true;
    }

    fn check(inner: &MockInner) -> io::Result<()> {
        if inner.disconnected {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"))
        } else {
            Ok(())
        }
    }
}

impl Read for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let n = {
            let mut inner = self.lock();
            Self::check(&inner)?;
            let n = inner.read_buffer.len().min(buffer.len());
            for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..n)) {
                *slot = byte;
            }
            n
        };

        if n == 0 && !buffer.is_empty() {
            std::thread::sleep(Duration::from_millis(1));
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        Ok(n)
    }
}

impl Write for MockTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        inner.written.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Self::check(&self.lock())
    }
}

impl Transport for MockTransport {
    fn clear_input(&mut self) -> io::Result<()> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        inner.read_buffer.clear();
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> io::Result<()> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        inner.dtr = Some(level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mock_times_out() {
        let mut mock = MockTransport::new();
        let mut buffer = [0u8; 4];
        let err = mock.read(&mut buffer).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn clones_share_buffers() {
        let probe = MockTransport::new();
        let mut owned = probe.clone();
        probe.inject_read(&[1, 2, 3]);
        owned.write_all(&[9, 8]).unwrap();

        let mut buffer = [0u8; 2];
        owned.read_exact(&mut buffer).unwrap();
        assert_eq!(buffer, [1, 2]);
        assert_eq!(probe.unread(), 1);
        assert_eq!(probe.written(), vec![9, 8]);
    }

    #[test]
    fn disconnected_mock_fails() {
        let mut mock = MockTransport::new();
        mock.disconnect();
        assert_eq!(
            mock.write(&[1]).unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }
}
