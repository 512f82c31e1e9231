use crate::{ByteLink, LinkError, ReconnectPolicy};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

/// How to find and open the arm controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Device paths probed in order, e.g. `/dev/ttyUSB0`.
    pub ports: Vec<String>,
    pub baud_rate: u32,
    /// Per-operation I/O timeout of the opened port.
    pub timeout_ms: u64,
    pub reconnect: ReconnectPolicy,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            ports: vec!["/dev/ttyUSB0".into(), "/dev/ttyACM0".into()],
            baud_rate: 2_400,
            timeout_ms: 1_000,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Serial link owning the controller's port.
///
/// The link starts disconnected. [`SerialLink::connect`] acquires a device;
/// any write failure afterwards drops it again, and the owner decides when to
/// reconnect.
pub struct SerialLink {
    settings: LinkSettings,
    port: Option<Box<dyn SerialPort>>,
    port_name: Option<String>,
}

impl SerialLink {
    pub fn new(settings: LinkSettings) -> Self {
        Self {
            settings,
            port: None,
            port_name: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// Path of the currently open device, if any.
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Open the first candidate that accepts, retrying per the policy.
    ///
    /// Returns the path that was opened. Any previously open device is
    /// dropped first.
    pub fn connect(&mut self) -> Result<&str, LinkError> {
        self.disconnect();
        let policy = self.settings.reconnect;
        let candidates = self.settings.ports.len();
        if candidates == 0 {
            return Err(LinkError::Exhausted {
                attempts: 0,
                candidates,
            });
        }

        for attempt in 0..policy.max_attempts {
            if let Some((name, port)) = self.open_any() {
                info!("Opened serial port {name} at {} baud", self.settings.baud_rate);
                self.port = Some(port);
                return Ok(self.port_name.insert(name).as_str());
            }
            warn!(
                "Couldn't open a serial port (attempt {}/{})",
                attempt + 1,
                policy.max_attempts
            );
            if attempt + 1 < policy.max_attempts {
                std::thread::sleep(policy.backoff(attempt));
            }
        }

        Err(LinkError::Exhausted {
            attempts: policy.max_attempts,
            candidates,
        })
    }

    /// Close the device, if one is open.
    pub fn disconnect(&mut self) {
        if let Some(name) = self.port_name.take() {
            debug!("Closing serial port {name}");
        }
        self.port = None;
    }

    /// A read-only handle on the open device for the background drain path.
    pub fn reader(&self) -> Result<SerialReader, LinkError> {
        let port = self.port.as_ref().ok_or(LinkError::Disconnected)?;
        Ok(SerialReader {
            port: port.try_clone()?,
        })
    }

    fn open_any(&self) -> Option<(String, Box<dyn SerialPort>)> {
        let timeout = Duration::from_millis(self.settings.timeout_ms);
        self.settings.ports.iter().find_map(|path| {
            match serialport::new(path.as_str(), self.settings.baud_rate)
                .timeout(timeout)
                .open()
            {
                Ok(port) => Some((path.clone(), port)),
                Err(e) => {
                    debug!("Cannot open {path}: {e}");
                    None
                }
            }
        })
    }
}

impl ByteLink for SerialLink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::Disconnected)?;
        let written = port.write_all(bytes).and_then(|()| port.flush());
        if let Err(e) = written {
            warn!("Serial write failed, dropping the port: {e}");
            self.disconnect();
            return Err(e.into());
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, LinkError> {
        let port = self.port.as_ref().ok_or(LinkError::Disconnected)?;
        Ok(port.bytes_to_read()? as usize)
    }

    fn read_available(&mut self) -> Result<Vec<u8>, LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::Disconnected)?;
        drain(port.as_mut())
    }
}

/// Read side of a [`SerialLink`], cloned from its device.
///
/// Meant to be moved to a background thread. It only reads, so it never
/// delays the frames written by the motion pipeline. Writing through it is
/// refused.
pub struct SerialReader {
    port: Box<dyn SerialPort>,
}

impl ByteLink for SerialReader {
    fn write(&mut self, _bytes: &[u8]) -> Result<(), LinkError> {
        Err(LinkError::Io(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "the drain handle is read-only",
        )))
    }

    fn bytes_available(&mut self) -> Result<usize, LinkError> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read_available(&mut self) -> Result<Vec<u8>, LinkError> {
        drain(self.port.as_mut())
    }
}

fn drain(port: &mut dyn SerialPort) -> Result<Vec<u8>, LinkError> {
    let pending = port.bytes_to_read()? as usize;
    if pending == 0 {
        return Ok(Vec::new());
    }
    let mut buf = vec![0u8; pending];
    let n = port.read(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}
