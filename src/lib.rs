//! # comport
//!
//! Cross-platform serial (RS232) access presented as a small numbered device
//! table: enumerate the host's serial devices, open one by table index at a
//! chosen baud rate, move raw bytes through it, and close it. Port discovery
//! scans the platform's raw device-name listing with a literal-plus-digits
//! pattern; everything OS-specific sits behind the [`Platform`] trait.
//!
//! Reads are configured non-blocking at open time: a read returns immediately
//! with whatever bytes are available, possibly none. Partial transfers are
//! ordinary results. The crate performs no framing, buffering, or retries.
//!
//! ```no_run
//! use comport::ComPorts;
//!
//! let mut ports = ComPorts::host();
//! let count = ports.enumerate();
//! for index in 0..count {
//!     println!("{}: {}", index, ports.name_at(index).unwrap_or("?"));
//! }
//! if count > 0 && ports.open(0, 115_200).is_ok() {
//!     let _ = ports.write(0, b"hello");
//!     ports.close(0);
//! }
//! ```

pub mod error;
pub mod pattern;
pub mod platform;
pub mod table;

pub use error::{ComError, Result};
pub use pattern::{Found, Pattern};
pub use platform::{InsufficientBuffer, Platform};
#[cfg(any(unix, windows))]
pub use platform::HostPlatform;
#[cfg(unix)]
pub use platform::UnixPlatform;
#[cfg(windows)]
pub use platform::WindowsPlatform;
pub use table::{ComPorts, PortInfo, PortStatus, MAX_LISTING_BYTES, MAX_PORTS, MIN_LISTING_BYTES};
