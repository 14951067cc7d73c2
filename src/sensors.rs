//! Serial sensor sessions and the stream which carries their scans to consumers.
//!
//! A `SensorSession` exclusively owns one serial connection. Its scan loop pulls bytes through the
//! protocol decoder matching the sensor and publishes each finished `Scan` on a `ScanStream`, a
//! bounded hand-off channel with capacity one. The loop runs on its own thread and is stopped
//! cooperatively through a shared flag checked between reads.

mod discovery;
mod driver;
mod session;
mod stream;
mod transport;

pub use discovery::{PortInfo, find_port, list_ports, open_port};
pub use session::{SensorSession, SessionStatus};
pub use stream::{ScanStream, start};
pub use transport::{MockTransport, Transport};

use crate::protocol::DecodeError;

pub type SensorResult<T> = std::result::Result<T, SensorError>;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{name} not found (no serial device matching hwid {hwid})")]
    DeviceNotFound { name: String, hwid: String },

    #[error("session is not connected")]
    NotConnected,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("scan thread panicked")]
    ThreadPanic,
}

impl From<DecodeError> for SensorError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Io(io) => SensorError::Io(io),
            other => SensorError::InvalidResponse(other.to_string()),
        }
    }
}
