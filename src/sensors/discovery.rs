//! Enumeration of serial devices and matching them against sensor profiles by hardware id.

use crate::config::SensorProfile;
use crate::sensors::{SensorError, SensorResult};
use serialport::{DataBits, Parity, SerialPort, SerialPortType, StopBits};

/// A serial device as seen by the operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,

    /// Hardware id in the form `USB VID:PID=xxxx:xxxx SER=<serial>`. Ports which are not USB
    /// devices get a short description of their type instead.
    pub hwid: String,
}

impl PortInfo {
    pub fn matches(&self, pattern: &str) -> bool {
        !pattern.is_empty() && self.hwid.contains(pattern)
    }
}

fn hwid_string(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let mut text = format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid);
            if let Some(serial) = &usb.serial_number {
                text.push_str(&format!(" SER={}", serial));
            }
            text
        }
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "BLUETOOTH".to_string(),
        SerialPortType::Unknown => "n/a".to_string(),
    }
}

pub fn list_ports() -> SensorResult<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| PortInfo {
            hwid: hwid_string(&p.port_type),
            name: p.port_name,
        })
        .collect())
}

/// Returns the first port in `ports` whose hardware id contains the profile's pattern.
pub fn find_port<'a>(ports: &'a [PortInfo], profile: &SensorProfile) -> Option<&'a PortInfo> {
    ports.iter().find(|p| p.matches(&profile.hwid))
}

/// Locates the device described by `profile` and opens it with the sensor's serial settings
/// (8 data bits, no parity, one stop bit).
pub fn open_port(profile: &SensorProfile) -> SensorResult<(String, Box<dyn SerialPort>)> {
    let ports = list_ports()?;
    let info = find_port(&ports, profile).ok_or_else(|| SensorError::DeviceNotFound {
        name: profile.name().to_string(),
        hwid: profile.hwid.clone(),
    })?;

    let port = serialport::new(&info.name, profile.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(profile.timeout())
        .open()?;

    Ok((info.name.clone(), port))
}
