//! Platform collaborator seam
//!
//! Everything the device table needs from the operating system sits behind
//! [`Platform`]: the raw device-name listing, the naming conventions, and the
//! handle open/configure/close/transfer primitives. The table itself never
//! talks to the OS, which keeps the whole lifecycle drivable from tests with
//! a scripted implementation.

use std::fmt;
use std::io;

use crate::pattern::Pattern;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::UnixPlatform;
#[cfg(unix)]
/// The platform backend compiled in for the running operating system.
pub type HostPlatform = unix::UnixPlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WindowsPlatform;
#[cfg(windows)]
/// The platform backend compiled in for the running operating system.
pub type HostPlatform = windows::WindowsPlatform;

/// Distinguished error from [`Platform::device_listing`]: the caller's buffer
/// cannot hold the complete listing and must grow before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientBuffer;

impl fmt::Display for InsufficientBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device listing buffer too small")
    }
}

impl std::error::Error for InsufficientBuffer {}

/// Operating-system services consumed by the device table.
///
/// One handle is exclusively owned by one device record from the moment
/// `open` succeeds until `close` runs; implementations never share or cache
/// handles themselves.
pub trait Platform {
    /// Opaque channel handle owned by an opened device record.
    type Handle;

    /// Fill `buf` with the raw device-name listing: NUL-terminated entries,
    /// closed by an empty entry. Returns the number of bytes written, or
    /// [`InsufficientBuffer`] when the caller must grow `buf` and retry.
    fn device_listing(&mut self, buf: &mut [u8]) -> Result<usize, InsufficientBuffer>;

    /// The device-name pattern recognized in the listing, e.g. `"COM???"`.
    fn pattern(&self) -> &Pattern;

    /// Prefix of the short user-facing name ("COM" gives "COM4").
    fn display_prefix(&self) -> &str;

    /// Prefix of the platform-addressable path (`\\.\COM` gives `\\.\COM4`).
    fn path_prefix(&self) -> &str;

    /// Acquire a read/write handle on an existing device. Never creates one.
    fn open(&mut self, path: &str) -> io::Result<Self::Handle>;

    /// Configure line format and the non-blocking read policy: the given baud
    /// rate, 8-bit binary frames, no parity, one stop bit, and read timeouts
    /// neutralized so reads return immediately with whatever is available.
    fn configure(&mut self, handle: &mut Self::Handle, baud: u32) -> io::Result<()>;

    /// Release a handle.
    fn close(&mut self, handle: Self::Handle);

    /// One receive attempt; a short or empty read is a normal result.
    fn read(&mut self, handle: &mut Self::Handle, buf: &mut [u8]) -> io::Result<usize>;

    /// One transmit attempt; a short write is a normal result.
    fn write(&mut self, handle: &mut Self::Handle, bytes: &[u8]) -> io::Result<usize>;
}
