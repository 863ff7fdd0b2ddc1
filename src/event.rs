//! Fixed-size `input_event` transport shared by the driver and its consumer.
//!
//! Decoded events cross the session pipe as raw `input_event` records, the
//! same layout evdev consumers already understand.

use input_linux_sys::{input_event, timeval, EV_KEY, EV_PWR, EV_REL, EV_SW, EV_SYN, SYN_REPORT};
use std::io::{self, Read, Write};
use std::mem::size_of;
use std::os::unix::io::RawFd;

/// Byte-level `Read`/`Write` view of a raw descriptor.
///
/// Non-owning on purpose: the lifecycle manager closes descriptors
/// explicitly, and closing a descriptor under a blocked read is the
/// driver's only cancellation primitive. hiddev does not support
/// readiness polling, so blocking reads are the only viable strategy.
pub(crate) struct Fd(RawFd);

impl Fd {
    pub(crate) fn new(fd: RawFd) -> Self {
        Fd(fd)
    }
}

impl Read for Fd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: buf is a valid writable buffer of buf.len() bytes.
        let n = unsafe { libc::read(self.0, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}

impl Write for Fd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: buf is a valid readable buffer of buf.len() bytes.
        let n = unsafe { libc::write(self.0, buf.as_ptr().cast(), buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // Pipes reject fsync with EINVAL; flushing is best effort here.
        // SAFETY: fsync on an arbitrary descriptor is always safe to call.
        unsafe {
            libc::fsync(self.0);
        }
        Ok(())
    }
}

/// Reads a single `input_event` from the reader. Returns `Ok(None)` on EOF.
pub fn read_event(reader: &mut impl Read) -> io::Result<Option<input_event>> {
    let mut buf = [0u8; size_of::<input_event>()];
    match reader.read_exact(&mut buf) {
        Ok(()) => {
            // SAFETY: input_event is plain-old-data and buf is fully initialized.
            let event: input_event = unsafe { std::ptr::read(buf.as_ptr() as *const _) };
            Ok(Some(event))
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

/// Writes a single `input_event` to the writer and flushes it.
///
/// Partial progress never leaks out: either the whole record is written or
/// an error is returned, with a closed peer surfacing as `WriteZero`.
pub fn write_event(writer: &mut impl Write, event: &input_event) -> io::Result<()> {
    // SAFETY: input_event is plain-old-data; the slice covers exactly one record.
    let buf: &[u8] = unsafe {
        std::slice::from_raw_parts(event as *const _ as *const u8, size_of::<input_event>())
    };
    writer.write_all(buf)?;
    writer.flush()
}

/// Current wallclock time as a `timeval`.
pub fn now() -> timeval {
    let mut tv = timeval {
        tv_sec: 0,
        tv_usec: 0,
    };
    // SAFETY: tv is a valid timeval and a null timezone is allowed.
    unsafe {
        libc::gettimeofday(&mut tv as *mut timeval as *mut _, std::ptr::null_mut());
    }
    tv
}

/// The zero timestamp used for the two synthetic status events sent at
/// startup, so they sort strictly before any device-driven event.
pub fn time_zero() -> timeval {
    timeval {
        tv_sec: 0,
        tv_usec: 0,
    }
}

/// Builds an `EV_SW` switch event (lid, headphone jack).
pub fn switch_event(time: timeval, code: u16, value: i32) -> input_event {
    input_event {
        time,
        type_: EV_SW as u16,
        code,
        value,
    }
}

/// Builds an `EV_KEY` event (`value` 1 = press, 0 = release).
pub fn key_event(time: timeval, code: u16, value: i32) -> input_event {
    input_event {
        time,
        type_: EV_KEY as u16,
        code,
        value,
    }
}

/// Builds an `EV_REL` relative-motion event (scroll wheel).
pub fn rel_event(time: timeval, code: u16, value: i32) -> input_event {
    input_event {
        time,
        type_: EV_REL as u16,
        code,
        value,
    }
}

/// Terminal event injected into the pipe when the handset disappears
/// mid-session. There is no finer-grained EV_PWR code to use.
pub fn power_event(time: timeval) -> input_event {
    input_event {
        time,
        type_: EV_PWR as u16,
        code: 0,
        value: 0,
    }
}

/// Synthetic event returned to the consumer when reading the pipe fails,
/// carrying the OS error code (0 on plain EOF) instead of raising.
pub fn error_event(errno: i32) -> input_event {
    input_event {
        time: time_zero(),
        type_: EV_SYN as u16,
        code: SYN_REPORT as u16,
        value: errno,
    }
}
