//! Device table: enumeration, naming and channel lifecycle
//!
//! The table is an explicit context object owned by the caller; there is no
//! process-wide state. Indices handed out by [`ComPorts::enumerate`] identify
//! records until the next enumeration rebuilds the table. Each record walks
//! `Enumerated -> Opened -> Closed`, with `Error` as the terminal state after
//! a hard transfer failure; the open channel handle lives inside the `Opened`
//! state, so a handle on a record in any other state cannot be represented.

use std::fmt;
use std::fmt::Write as _;
use std::io;

use serde::{Deserialize, Serialize};

use crate::error::{ComError, Result};
use crate::platform::{InsufficientBuffer, Platform};

/// Maximum number of device records the table holds; matches beyond this are
/// silently dropped during enumeration.
pub const MAX_PORTS: usize = 32;

/// Initial size of the device listing buffer.
pub const MIN_LISTING_BYTES: usize = 16 * 1024;

/// Ceiling for the listing buffer; enumeration degrades to zero devices
/// rather than growing past this.
pub const MAX_LISTING_BYTES: usize = 16 * 1024 * 1024;

/// Externally visible status of a device record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortStatus {
    /// No record behind this index (never enumerated, or out of range).
    Unknown,
    /// Discovered by enumeration and ready to open.
    Enumerated,
    /// Channel open; read/write/close are valid.
    Opened,
    /// Closed by the caller; re-enumerate to use the port again.
    Closed,
    /// A platform call failed hard; the handle has been released.
    Error,
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Enumerated => write!(f, "enumerated"),
            Self::Opened => write!(f, "opened"),
            Self::Closed => write!(f, "closed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Owned snapshot of one record, for listing and serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// Table index the snapshot was taken from.
    pub index: usize,
    /// Numeric port identifier captured during enumeration.
    pub port: u32,
    /// Short user-facing name, e.g. "COM4".
    pub name: String,
    /// Platform-addressable path, e.g. `\\.\COM4`.
    pub device_path: String,
    /// Record status at snapshot time.
    pub status: PortStatus,
}

enum State<H> {
    Enumerated,
    Opened(H),
    Closed,
    Error,
}

impl<H> State<H> {
    fn status(&self) -> PortStatus {
        match self {
            Self::Enumerated => PortStatus::Enumerated,
            Self::Opened(_) => PortStatus::Opened,
            Self::Closed => PortStatus::Closed,
            Self::Error => PortStatus::Error,
        }
    }
}

struct Device<H> {
    port: u32,
    state: State<H>,
}

/// The numbered serial device table.
///
/// Owns the platform backend, the device records, and the scratch buffer the
/// naming calls format into. All operations take `&mut self`, so a context is
/// single-threaded by construction; use one per thread or add locking above.
pub struct ComPorts<P: Platform> {
    platform: P,
    devices: Vec<Device<P::Handle>>,
    scratch: String,
}

#[cfg(any(unix, windows))]
impl ComPorts<crate::platform::HostPlatform> {
    /// Table over the running operating system's serial devices.
    pub fn host() -> Self {
        Self::new(crate::platform::HostPlatform::default())
    }
}

impl<P: Platform> ComPorts<P> {
    /// Empty table over the given platform backend. Call
    /// [`enumerate`](Self::enumerate) to populate it.
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            devices: Vec::with_capacity(MAX_PORTS),
            scratch: String::new(),
        }
    }

    /// Get a reference to the underlying platform backend
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Get a mutable reference to the underlying platform backend
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Discover the serial devices currently visible to the platform and
    /// rebuild the table from them. Returns the number of records.
    ///
    /// Every index from a previous enumeration becomes invalid; records still
    /// open are closed first, so no handle outlives its record. On a listing
    /// failure the table is left empty and 0 is returned.
    pub fn enumerate(&mut self) -> usize {
        self.close_all();
        self.devices.clear();

        let blob = match self.fetch_listing() {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!("device enumeration failed: {}", e);
                return 0;
            }
        };

        let pattern = self.platform.pattern();
        for port in pattern.matches(&blob) {
            if self.devices.len() == MAX_PORTS {
                tracing::debug!("device table full, dropping remaining matches");
                break;
            }
            self.devices.push(Device {
                port,
                state: State::Enumerated,
            });
        }
        tracing::debug!("enumerated {} serial devices", self.devices.len());
        self.devices.len()
    }

    /// Number of records discovered by the last enumeration.
    pub fn port_count(&self) -> usize {
        self.devices.len()
    }

    /// Status of the record at `index`; `Unknown` when no record backs it.
    pub fn status_at(&self, index: usize) -> PortStatus {
        self.devices
            .get(index)
            .map_or(PortStatus::Unknown, |dev| dev.state.status())
    }

    /// Short user-facing name of the record at `index`, e.g. "COM4".
    ///
    /// The string lives in a scratch buffer reused by every naming call; the
    /// borrow ends at the next `&mut self` operation, so callers copy it out
    /// if they need it longer.
    pub fn name_at(&mut self, index: usize) -> Option<&str> {
        let dev = self.devices.get(index)?;
        self.scratch.clear();
        let _ = write!(self.scratch, "{}{}", self.platform.display_prefix(), dev.port);
        Some(self.scratch.as_str())
    }

    /// Platform-addressable path of the record at `index`, e.g. `\\.\COM4`.
    /// Shares the scratch buffer with [`name_at`](Self::name_at).
    pub fn device_path_at(&mut self, index: usize) -> Option<&str> {
        let dev = self.devices.get(index)?;
        self.scratch.clear();
        let _ = write!(self.scratch, "{}{}", self.platform.path_prefix(), dev.port);
        Some(self.scratch.as_str())
    }

    /// Index of the record whose display name equals `name`.
    pub fn find_port(&mut self, name: &str) -> Option<usize> {
        for index in 0..self.devices.len() {
            if self.name_at(index) == Some(name) {
                return Some(index);
            }
        }
        None
    }

    /// Owned snapshot of the record at `index`.
    pub fn info_at(&self, index: usize) -> Option<PortInfo> {
        let dev = self.devices.get(index)?;
        Some(PortInfo {
            index,
            port: dev.port,
            name: format!("{}{}", self.platform.display_prefix(), dev.port),
            device_path: format!("{}{}", self.platform.path_prefix(), dev.port),
            status: dev.state.status(),
        })
    }

    /// Snapshots of every record in table order.
    pub fn ports(&self) -> Vec<PortInfo> {
        (0..self.devices.len())
            .filter_map(|index| self.info_at(index))
            .collect()
    }

    /// Open the channel of the record at `index` at the given baud rate.
    ///
    /// Only valid from `Enumerated`. A denied handle leaves the record
    /// untouched; a denied configuration releases the handle and also leaves
    /// the record `Enumerated`, so either failure permits a retry.
    pub fn open(&mut self, index: usize, baud: u32) -> Result<()> {
        let status = self.status_at(index);
        if status != PortStatus::Enumerated {
            return Err(ComError::InvalidState {
                index,
                status,
                required: PortStatus::Enumerated,
            });
        }

        let port = self.devices[index].port;
        let path = format!("{}{}", self.platform.path_prefix(), port);
        let mut handle = match self.platform.open(&path) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("failed to open {}: {}", path, e);
                return Err(ComError::OpenFailed {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        if let Err(e) = self.platform.configure(&mut handle, baud) {
            tracing::warn!("failed to configure {}: {}", path, e);
            self.platform.close(handle);
            return Err(ComError::ConfigureFailed {
                path,
                reason: e.to_string(),
            });
        }

        self.devices[index].state = State::Opened(handle);
        tracing::debug!("opened {} at {} baud", path, baud);
        Ok(())
    }

    /// Release the channel of the record at `index`.
    ///
    /// A no-op from any state but `Opened`, so repeated closes are harmless.
    /// A closed record is not reusable; re-enumerate to reach the port again.
    pub fn close(&mut self, index: usize) {
        let Some(dev) = self.devices.get_mut(index) else {
            return;
        };
        match std::mem::replace(&mut dev.state, State::Closed) {
            State::Opened(handle) => {
                self.platform.close(handle);
                tracing::debug!("closed port {}", dev.port);
            }
            other => dev.state = other,
        }
    }

    /// Close every record currently open.
    pub fn close_all(&mut self) {
        for index in 0..self.devices.len() {
            self.close(index);
        }
    }

    /// One transmit attempt through the open channel at `index`.
    ///
    /// Returns the number of bytes accepted, which may be less than
    /// `bytes.len()`; a short write is normal. Only valid from `Opened`.
    pub fn write(&mut self, index: usize, bytes: &[u8]) -> Result<usize> {
        self.transfer(index, "write", |platform, handle| {
            platform.write(handle, bytes)
        })
    }

    /// One receive attempt through the open channel at `index`.
    ///
    /// Returns the number of bytes placed in `buf`, possibly zero when
    /// nothing is queued; reads never block. Only valid from `Opened`.
    pub fn read(&mut self, index: usize, buf: &mut [u8]) -> Result<usize> {
        self.transfer(index, "read", |platform, handle| platform.read(handle, buf))
    }

    fn transfer(
        &mut self,
        index: usize,
        op: &'static str,
        call: impl FnOnce(&mut P, &mut P::Handle) -> io::Result<usize>,
    ) -> Result<usize> {
        let Some(dev) = self.devices.get_mut(index) else {
            return Err(ComError::InvalidState {
                index,
                status: PortStatus::Unknown,
                required: PortStatus::Opened,
            });
        };
        match std::mem::replace(&mut dev.state, State::Error) {
            State::Opened(mut handle) => match call(&mut self.platform, &mut handle) {
                Ok(count) => {
                    dev.state = State::Opened(handle);
                    Ok(count)
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    dev.state = State::Opened(handle);
                    Ok(0)
                }
                Err(e) => {
                    // Hard failure: the handle is no longer trustworthy.
                    // Release it and park the record in its terminal state.
                    tracing::error!("{} failed on port {}: {}", op, dev.port, e);
                    self.platform.close(handle);
                    Ok(0)
                }
            },
            other => {
                let status = other.status();
                dev.state = other;
                Err(ComError::InvalidState {
                    index,
                    status,
                    required: PortStatus::Opened,
                })
            }
        }
    }

    fn fetch_listing(&mut self) -> Result<Vec<u8>> {
        let mut buf: Vec<u8> = Vec::new();
        let mut size = MIN_LISTING_BYTES;
        loop {
            if size > MAX_LISTING_BYTES || buf.try_reserve_exact(size - buf.len()).is_err() {
                return Err(ComError::AllocationFailed { limit: size });
            }
            buf.resize(size, 0);
            match self.platform.device_listing(&mut buf) {
                Ok(len) => {
                    buf.truncate(len);
                    return Ok(buf);
                }
                Err(InsufficientBuffer) => size *= 2,
            }
        }
    }
}

impl<P: Platform> Drop for ComPorts<P> {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(PortStatus::Enumerated.to_string(), "enumerated");
        assert_eq!(PortStatus::Opened.to_string(), "opened");
        assert_eq!(PortStatus::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_state_to_status() {
        assert_eq!(State::<u32>::Enumerated.status(), PortStatus::Enumerated);
        assert_eq!(State::Opened(7u32).status(), PortStatus::Opened);
        assert_eq!(State::<u32>::Closed.status(), PortStatus::Closed);
        assert_eq!(State::<u32>::Error.status(), PortStatus::Error);
    }
}
