use crate::config::SensorProfile;
use crate::sensors::driver::Driver;
use crate::sensors::{SensorError, SensorResult, Transport, open_port};
use crate::{Scan, io};
use crossbeam_channel::{SendTimeoutError, Sender};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

/// How long a publish waits on a full channel before checking the run flag again
const PUBLISH_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionStatus {
    Disconnected = 0,
    Connected = 1,
    Scanning = 2,
}

impl SessionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionStatus::Connected,
            2 => SessionStatus::Scanning,
            _ => SessionStatus::Disconnected,
        }
    }
}

/// Status readable from other threads while the session itself is busy in its scan loop.
#[derive(Debug, Clone)]
pub(crate) struct SharedStatus(Arc<AtomicU8>);

impl SharedStatus {
    fn new(status: SessionStatus) -> Self {
        Self(Arc::new(AtomicU8::new(status as u8)))
    }

    pub(crate) fn get(&self) -> SessionStatus {
        SessionStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, status: SessionStatus) {
        self.0.store(status as u8, Ordering::Release);
    }
}

/// One physical sensor and the serial link it is reached through.
///
/// The session is the only owner of its transport. It moves through
/// `Disconnected → Connected → Scanning → Disconnected`; once disconnected, whether by
/// `deactivate` or by a fatal I/O fault, a new session has to be created to scan again.
pub struct SensorSession {
    profile: SensorProfile,
    port_name: Option<String>,
    transport: Option<Box<dyn Transport>>,
    driver: Driver,
    status: SharedStatus,
    last_scan: Option<Scan>,
}

impl SensorSession {
    fn build(
        profile: SensorProfile,
        port_name: Option<String>,
        transport: Option<Box<dyn Transport>>,
    ) -> Self {
        let status = match transport {
            Some(_) => SessionStatus::Connected,
            None => SessionStatus::Disconnected,
        };
        Self {
            driver: Driver::for_profile(&profile),
            profile,
            port_name,
            transport,
            status: SharedStatus::new(status),
            last_scan: None,
        }
    }

    /// Looks for the device described by `profile` and opens it. A missing device is not an
    /// error here: the session is returned `Disconnected` and the caller checks `status`.
    pub fn connect(profile: SensorProfile) -> Self {
        match open_port(&profile) {
            Ok((name, port)) => {
                log::info!("{} connected on {}", profile.name(), name);
                Self::build(profile, Some(name), Some(Box::new(port)))
            }
            Err(e) => {
                log::warn!("{} unavailable: {}", profile.name(), e);
                Self::build(profile, None, None)
            }
        }
    }

    /// Creates a connected session over an already open transport.
    pub fn with_transport<T: Transport + 'static>(profile: SensorProfile, transport: T) -> Self {
        Self::build(profile, None, Some(Box::new(transport)))
    }

    pub fn profile(&self) -> &SensorProfile {
        &self.profile
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.get()
    }

    pub(crate) fn status_handle(&self) -> SharedStatus {
        self.status.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// The most recent non-empty scan this session produced.
    pub fn last_scan(&self) -> Option<&Scan> {
        self.last_scan.as_ref()
    }

    /// Runs the sensor's start-up handshake and enters `Scanning`. Does nothing if already
    /// scanning.
    pub fn begin(&mut self) -> SensorResult<()> {
        if self.status() == SessionStatus::Scanning {
            return Ok(());
        }
        let transport = self.transport.as_mut().ok_or(SensorError::NotConnected)?;
        let result = self.driver.start(transport.as_mut());
        self.check(result)?;

        log::info!("{} scanning", self.profile.name());
        self.status.set(SessionStatus::Scanning);
        Ok(())
    }

    /// Blocks until the next scan is assembled, starting the sensor first if needed. If `running`
    /// is cleared first, the result is the partial revolution where the sensor keeps one, or
    /// `None`.
    pub fn next_scan(&mut self, running: &AtomicBool) -> SensorResult<Option<Scan>> {
        self.begin()?;
        let transport = self.transport.as_mut().ok_or(SensorError::NotConnected)?;
        let result = self.driver.next_scan(transport.as_mut(), running);
        let scan = self.check(result)?;

        if let Some(s) = &scan {
            if !s.is_empty() {
                self.last_scan = Some(s.clone());
            }
        }
        Ok(scan)
    }

    /// Publishes scans on `sender` until `running` is cleared, the receiving side goes away, or
    /// the link fails. The session is left `Connected` on a clean exit; call `deactivate` to
    /// stop the device and release the port.
    pub fn scan_loop(&mut self, running: &AtomicBool, sender: &Sender<Scan>) -> SensorResult<()> {
        while running.load(Ordering::Relaxed) {
            let Some(scan) = self.next_scan(running)? else {
                break;
            };
            if !publish(scan, running, sender) {
                break;
            }
        }

        if self.is_connected() {
            self.status.set(SessionStatus::Connected);
        }
        Ok(())
    }

    /// Sends the sensor's shutdown commands, closes the port and discards buffered data.
    pub fn deactivate(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = self.driver.shutdown(transport.as_mut()) {
                log::warn!("{} shutdown command failed: {}", self.profile.name(), e);
            }
            log::info!("{} disconnected", self.profile.name());
        }
        self.driver.reset();
        self.status.set(SessionStatus::Disconnected);
    }

    /// Writes the last completed scan to a timestamped file in `dir`.
    pub fn save_last_scan(&self, dir: &Path) -> crate::Result<PathBuf> {
        let scan = self
            .last_scan
            .as_ref()
            .ok_or("no completed scan to save")?;
        io::save_scan(dir, scan)
    }

    /// Closes the session if `result` carries a link failure. Anything else passes through.
    fn check<T>(&mut self, result: SensorResult<T>) -> SensorResult<T> {
        if let Err(e @ (SensorError::Io(_) | SensorError::Serial(_))) = &result {
            log::error!("{} link failed: {}", self.profile.name(), e);
            self.transport = None;
            self.port_name = None;
            self.driver.reset();
            self.status.set(SessionStatus::Disconnected);
        }
        result
    }
}

/// Blocks until the scan is handed off. Returns false if the run flag was cleared or the
/// receiver is gone, in which case the scan is dropped.
fn publish(scan: Scan, running: &AtomicBool, sender: &Sender<Scan>) -> bool {
    let mut pending = scan;
    loop {
        match sender.send_timeout(pending, PUBLISH_POLL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(s)) => {
                if !running.load(Ordering::Relaxed) {
                    return false;
                }
                pending = s;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

impl Drop for SensorSession {
    fn drop(&mut self) {
        if self.transport.is_some() {
            self.deactivate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SensorKind;
    use crate::protocol::a2m8::Command;
    use crate::sensors::MockTransport;

    #[test]
    fn missing_transport_is_not_connected() {
        let mut session = SensorSession::build(SensorProfile::stl27l(), None, None);
        assert_eq!(session.status(), SessionStatus::Disconnected);
        let running = AtomicBool::new(true);
        assert!(matches!(
            session.next_scan(&running),
            Err(SensorError::NotConnected)
        ));
    }

    #[test]
    fn deactivate_stops_a2m8_motor() {
        let profile = SensorProfile {
            reset_delay_ms: 0,
            ..SensorProfile::a2m8()
        };
        let mock = MockTransport::new();
        let mut session = SensorSession::with_transport(profile, mock.clone());
        assert_eq!(session.status(), SessionStatus::Connected);

        session.begin().unwrap();
        assert_eq!(session.status(), SessionStatus::Scanning);

        session.deactivate();
        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert!(!session.is_connected());

        let written = mock.written();
        let tail = [Command::Stop.encode(), Command::SetMotorPwm(0).encode()].concat();
        assert!(written.ends_with(&tail));
    }

    #[test]
    fn link_failure_disconnects() {
        let mock = MockTransport::new();
        let mut session = SensorSession::with_transport(SensorProfile::stl27l(), mock.clone());
        mock.disconnect();

        let running = AtomicBool::new(true);
        let result = session.next_scan(&running);
        assert!(matches!(result, Err(SensorError::Io(_))));
        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert!(!session.is_connected());
    }

    #[test]
    fn save_without_scan_fails() {
        let session = SensorSession::with_transport(SensorProfile::stl27l(), MockTransport::new());
        assert!(session.save_last_scan(&std::env::temp_dir()).is_err());
        assert_eq!(session.profile().kind, SensorKind::Stl27l);
    }
}
