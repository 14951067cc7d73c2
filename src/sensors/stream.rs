use crate::Scan;
use crate::sensors::session::SharedStatus;
use crate::sensors::{SensorError, SensorResult, SensorSession, SessionStatus};
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type LoopHandle = JoinHandle<(SensorSession, SensorResult<()>)>;

/// Scans flowing out of a session running on a background thread.
///
/// The channel holds at most one scan. When the consumer falls behind, the scan loop blocks
/// rather than dropping or queueing scans.
pub struct ScanStream {
    receiver: Receiver<Scan>,
    running: Arc<AtomicBool>,
    status: SharedStatus,
    handle: Option<LoopHandle>,
}

/// Moves `session` onto its own thread and starts scanning.
pub fn start(mut session: SensorSession) -> SensorResult<ScanStream> {
    if !session.is_connected() {
        return Err(SensorError::NotConnected);
    }

    let (sender, receiver) = bounded(1);
    let running = Arc::new(AtomicBool::new(true));
    let status = session.status_handle();
    let flag = running.clone();
    let name = format!("scan-{}", session.profile().kind.name().to_lowercase());

    let handle = thread::Builder::new().name(name).spawn(move || {
        let result = session.scan_loop(&flag, &sender);
        if let Err(e) = &result {
            log::error!("scan loop ended: {}", e);
        }
        (session, result)
    })?;

    Ok(ScanStream {
        receiver,
        running,
        status,
        handle: Some(handle),
    })
}

impl ScanStream {
    pub fn status(&self) -> SessionStatus {
        self.status.get()
    }

    /// True once the scan loop has exited on its own, e.g. after a link failure.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Waits for the next scan. Returns `None` once the scan loop has ended and the channel is
    /// drained.
    pub fn recv(&self) -> Option<Scan> {
        self.receiver.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Scan> {
        match self.receiver.recv_timeout(timeout) {
            Ok(scan) => Some(scan),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` in total for a scan holding points, skipping the empty scans a
    /// thin read window produces. Returns `None` when the time runs out or the loop has ended.
    pub fn recv_populated(&self, timeout: Duration) -> Option<Scan> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match self.recv_timeout(remaining) {
                Some(scan) if !scan.is_empty() => return Some(scan),
                Some(_) => continue,
                None => return None,
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Scan> + '_ {
        self.receiver.iter()
    }

    /// Signals the scan loop to stop, waits for it, then deactivates the session and hands it
    /// back. The returned session is `Disconnected` and keeps its last scan for saving.
    pub fn stop(mut self) -> SensorResult<SensorSession> {
        let mut session = self.join()?;
        session.deactivate();
        Ok(session)
    }

    fn join(&mut self) -> SensorResult<SensorSession> {
        self.running.store(false, Ordering::Relaxed);
        let handle = self.handle.take().ok_or(SensorError::NotConnected)?;
        let (session, result) = handle.join().map_err(|_| SensorError::ThreadPanic)?;
        if let Err(e) = result {
            log::warn!("{} stopped after error: {}", session.profile().name(), e);
        }
        Ok(session)
    }
}

impl Drop for ScanStream {
    fn drop(&mut self) {
        if self.handle.is_some() {
            // The session deactivates itself when dropped
            if let Err(e) = self.join() {
                log::error!("scan thread did not shut down cleanly: {}", e);
            }
        }
    }
}
