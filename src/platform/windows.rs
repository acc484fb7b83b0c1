//! Windows serial backend
//!
//! Device discovery queries the DOS device namespace, which already returns
//! the double-terminated listing blob the table scans. Handles come from
//! `CreateFileA` on the `\\.\COMn` path form; configuration rewrites the DCB
//! for 8N1 binary frames and neutralizes the COMM timeouts so reads return
//! immediately with whatever is queued.

use std::ffi::CString;
use std::io;
use std::ptr;

use windows_sys::Win32::Devices::Communication::{
    GetCommState, SetCommState, SetCommTimeouts, SetupComm, COMMTIMEOUTS, DCB,
};
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, SetLastError, ERROR_INSUFFICIENT_BUFFER, GENERIC_READ,
    GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileA, QueryDosDeviceA, ReadFile, WriteFile, OPEN_EXISTING,
};

use crate::pattern::Pattern;
use crate::platform::{InsufficientBuffer, Platform};

// DCB bitfield flags rewritten during configuration.
const DCB_BINARY: u32 = 1 << 0;
const DCB_PARITY: u32 = 1 << 1;
const DCB_ERRORCHAR: u32 = 1 << 10;
const DCB_NULL: u32 = 1 << 11;
const DCB_ABORTONERROR: u32 = 1 << 14;

/// Transmit and receive queue depth requested at open time.
const QUEUE_DEPTH: u32 = 64;

/// Serial access through the Win32 COMM API.
pub struct WindowsPlatform {
    pattern: Pattern,
}

impl Default for WindowsPlatform {
    fn default() -> Self {
        Self {
            pattern: Pattern::new("COM???"),
        }
    }
}

impl Platform for WindowsPlatform {
    type Handle = HANDLE;

    fn device_listing(&mut self, buf: &mut [u8]) -> Result<usize, InsufficientBuffer> {
        unsafe { SetLastError(0) };
        let len = unsafe { QueryDosDeviceA(ptr::null(), buf.as_mut_ptr(), buf.len() as u32) };
        if len == 0 && unsafe { GetLastError() } == ERROR_INSUFFICIENT_BUFFER {
            return Err(InsufficientBuffer);
        }
        Ok(len as usize)
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn display_prefix(&self) -> &str {
        "COM"
    }

    fn path_prefix(&self) -> &str {
        r"\\.\COM"
    }

    fn open(&mut self, path: &str) -> io::Result<HANDLE> {
        let cpath = CString::new(path)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
        let handle = unsafe {
            CreateFileA(
                cpath.as_ptr().cast(),
                GENERIC_READ | GENERIC_WRITE,
                0,
                ptr::null(),
                OPEN_EXISTING,
                0,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        Ok(handle)
    }

    fn configure(&mut self, handle: &mut HANDLE, baud: u32) -> io::Result<()> {
        let h = *handle;
        unsafe {
            SetupComm(h, QUEUE_DEPTH, QUEUE_DEPTH);

            // All timeout constants neutralized: reads return immediately
            // with whatever the driver has queued.
            let timeouts = COMMTIMEOUTS {
                ReadIntervalTimeout: u32::MAX,
                ReadTotalTimeoutMultiplier: 0,
                ReadTotalTimeoutConstant: 0,
                WriteTotalTimeoutMultiplier: 0,
                WriteTotalTimeoutConstant: 0,
            };
            SetCommTimeouts(h, &timeouts);

            let mut dcb: DCB = std::mem::zeroed();
            dcb.DCBlength = std::mem::size_of::<DCB>() as u32;
            GetCommState(h, &mut dcb);
            dcb.BaudRate = baud;
            dcb._bitfield = (dcb._bitfield | DCB_BINARY)
                & !(DCB_PARITY | DCB_ERRORCHAR | DCB_NULL | DCB_ABORTONERROR);
            dcb.ByteSize = 8;
            dcb.Parity = 0;
            dcb.StopBits = 0;
            dcb.EvtChar = b'\n' as _;
            if SetCommState(h, &dcb) == 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    fn close(&mut self, handle: HANDLE) {
        unsafe {
            CloseHandle(handle);
        }
    }

    fn read(&mut self, handle: &mut HANDLE, buf: &mut [u8]) -> io::Result<usize> {
        let mut count: u32 = 0;
        let ok = unsafe {
            ReadFile(
                *handle,
                buf.as_mut_ptr().cast(),
                buf.len() as u32,
                &mut count,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(count as usize)
    }

    fn write(&mut self, handle: &mut HANDLE, bytes: &[u8]) -> io::Result<usize> {
        let mut count: u32 = 0;
        let ok = unsafe {
            WriteFile(
                *handle,
                bytes.as_ptr().cast(),
                bytes.len() as u32,
                &mut count,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(count as usize)
    }
}
