//! Unix serial backend
//!
//! Device discovery reads the device directory and rebuilds the same
//! double-terminated listing blob the table expects on every platform. Line
//! configuration goes through termios: raw 8N1 frames, no flow control, and
//! `VMIN = 0` / `VTIME = 1` so reads poll instead of blocking.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use nix::libc;
use nix::sys::termios::{
    self, BaudRate, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg,
    SpecialCharacterIndices,
};

use crate::pattern::Pattern;
use crate::platform::{InsufficientBuffer, Platform};

/// Device family enumerated by default: USB serial adapters.
const DEFAULT_FAMILY: &str = "ttyUSB";

/// Serial access through the Unix device directory and termios.
pub struct UnixPlatform {
    dev_dir: PathBuf,
    family: String,
    path_prefix: String,
    pattern: Pattern,
}

impl UnixPlatform {
    /// Backend over `dev_dir` enumerating one device family, e.g.
    /// `UnixPlatform::new("/dev", "ttyACM")`. Port numbers are the decimal
    /// suffix of the device name.
    pub fn new(dev_dir: impl Into<PathBuf>, family: &str) -> Self {
        let dev_dir = dev_dir.into();
        let path_prefix = format!("{}/{}", dev_dir.display(), family);
        let pattern = Pattern::new(&format!("{family}???"));
        Self {
            dev_dir,
            family: family.to_string(),
            path_prefix,
            pattern,
        }
    }
}

impl Default for UnixPlatform {
    fn default() -> Self {
        Self::new("/dev", DEFAULT_FAMILY)
    }
}

impl Platform for UnixPlatform {
    type Handle = File;

    fn device_listing(&mut self, buf: &mut [u8]) -> Result<usize, InsufficientBuffer> {
        let mut names = Vec::new();
        match std::fs::read_dir(&self.dev_dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if let Some(name) = entry.file_name().to_str() {
                        names.push(name.to_string());
                    }
                }
            }
            Err(e) => {
                tracing::warn!("cannot read {}: {}", self.dev_dir.display(), e);
            }
        }
        // Directory order is arbitrary; sort so enumeration hands out
        // stable indices.
        names.sort();

        let mut written = 0;
        for name in &names {
            if written + name.len() + 2 > buf.len() {
                return Err(InsufficientBuffer);
            }
            buf[written..written + name.len()].copy_from_slice(name.as_bytes());
            written += name.len();
            buf[written] = 0;
            written += 1;
        }
        if written >= buf.len() {
            return Err(InsufficientBuffer);
        }
        buf[written] = 0;
        Ok(written + 1)
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn display_prefix(&self) -> &str {
        &self.family
    }

    fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    fn open(&mut self, path: &str) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NDELAY)
            .open(path)
    }

    fn configure(&mut self, handle: &mut File, baud: u32) -> io::Result<()> {
        let rate = baud_flag(baud).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported baud rate {baud}"),
            )
        })?;

        let mut tio = termios::tcgetattr(&*handle).map_err(io::Error::from)?;
        tio.input_flags &= !(InputFlags::INLCR | InputFlags::ICRNL);
        tio.input_flags |= InputFlags::IGNPAR | InputFlags::IGNBRK;
        tio.output_flags &= !(OutputFlags::OPOST | OutputFlags::ONLCR | OutputFlags::OCRNL);
        tio.control_flags &= !(ControlFlags::PARENB
            | ControlFlags::PARODD
            | ControlFlags::CSTOPB
            | ControlFlags::CSIZE
            | ControlFlags::CRTSCTS);
        tio.control_flags |= ControlFlags::CLOCAL | ControlFlags::CREAD | ControlFlags::CS8;
        tio.local_flags &= !(LocalFlags::ICANON | LocalFlags::ISIG | LocalFlags::ECHO);
        termios::cfsetospeed(&mut tio, rate).map_err(io::Error::from)?;
        termios::cfsetispeed(&mut tio, rate).map_err(io::Error::from)?;
        // Polling reads: return immediately with whatever arrived.
        tio.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        tio.control_chars[SpecialCharacterIndices::VTIME as usize] = 1;
        termios::tcsetattr(&*handle, SetArg::TCSANOW, &tio).map_err(io::Error::from)?;
        Ok(())
    }

    fn close(&mut self, handle: File) {
        // Let pending output reach the line before the descriptor goes away.
        let _ = termios::tcdrain(&handle);
        drop(handle);
    }

    fn read(&mut self, handle: &mut File, buf: &mut [u8]) -> io::Result<usize> {
        handle.read(buf)
    }

    fn write(&mut self, handle: &mut File, bytes: &[u8]) -> io::Result<usize> {
        handle.write(bytes)
    }
}

fn baud_flag(baud: u32) -> Option<BaudRate> {
    match baud {
        50 => Some(BaudRate::B50),
        110 => Some(BaudRate::B110),
        134 => Some(BaudRate::B134),
        150 => Some(BaudRate::B150),
        200 => Some(BaudRate::B200),
        300 => Some(BaudRate::B300),
        600 => Some(BaudRate::B600),
        1200 => Some(BaudRate::B1200),
        1800 => Some(BaudRate::B1800),
        2400 => Some(BaudRate::B2400),
        4800 => Some(BaudRate::B4800),
        9600 => Some(BaudRate::B9600),
        19200 => Some(BaudRate::B19200),
        38400 => Some(BaudRate::B38400),
        57600 => Some(BaudRate::B57600),
        115200 => Some(BaudRate::B115200),
        230400 => Some(BaudRate::B230400),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_flag_known_rates() {
        assert_eq!(baud_flag(9600), Some(BaudRate::B9600));
        assert_eq!(baud_flag(115200), Some(BaudRate::B115200));
        assert_eq!(baud_flag(12345), None);
        assert_eq!(baud_flag(0), None);
    }

    #[test]
    fn test_naming_prefixes() {
        let platform = UnixPlatform::new("/dev", "ttyACM");
        assert_eq!(platform.display_prefix(), "ttyACM");
        assert_eq!(platform.path_prefix(), "/dev/ttyACM");
        assert_eq!(platform.pattern().as_str(), "ttyACM???");
    }
}
