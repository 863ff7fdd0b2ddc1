//! Linux hiddev ioctl surface and the handset device handle.
//!
//! The handset is a hiddev device, not hidraw: input arrives as a stream of
//! `hiddev_usage_ref` records (one per usage) once `HIDDEV_FLAG_UREF` is
//! set, and output reports are transmitted with the `HIDIOCSUSAGES` /
//! `HIDIOCSREPORT` ioctl pair.

use crate::error::InitError;
use crate::event::Fd;
use crate::lcd;
use crate::output::{OutputReport, DRAW_CHUNK, OUTPUT_USAGES};
use crate::report::Controls;
use std::ffi::CString;
use std::io::{self, Read};
use std::mem::size_of;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// hiddev protocol version this driver was written against.
pub const HID_VERSION: i32 = 0x0001_0004;

/// USB identity of the handset. Anything else is rejected at open time.
pub const VENDOR_ID: u16 = 0x04b4;
pub const PRODUCT_ID: u16 = 0x0407;
pub const DEVICE_VERSION: u16 = 0x0143;
pub const NUM_APPLICATIONS: u32 = 2;

/// Device node used when the caller does not name one.
pub const DEFAULT_DEVICE: &str = "/dev/usb/hiddev0";

const HIDDEV_FLAG_UREF: libc::c_int = 0x1;
const HIDDEV_FLAG_REPORT: libc::c_int = 0x2;

const HID_REPORT_TYPE_OUTPUT: u32 = 2;
const HID_MAX_MULTI_USAGES: usize = 1024;

/// One usage value as delivered by a hiddev read in UREF mode.
/// Mirrors `struct hiddev_usage_ref` from `<linux/hiddev.h>`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct UsageRef {
    pub report_type: u32,
    pub report_id: u32,
    pub field_index: u32,
    pub usage_index: u32,
    pub usage_code: u32,
    pub value: i32,
}

pub const USAGE_REF_SIZE: usize = size_of::<UsageRef>();

/// Mirrors `struct hiddev_usage_ref_multi`.
#[repr(C)]
struct UsageRefMulti {
    uref: UsageRef,
    num_values: u32,
    values: [i32; HID_MAX_MULTI_USAGES],
}

/// Mirrors `struct hiddev_report_info`.
#[repr(C)]
struct ReportInfo {
    report_type: u32,
    report_id: u32,
    num_fields: u32,
}

/// Mirrors `struct hiddev_devinfo`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct DevInfo {
    bustype: u32,
    busnum: u32,
    devnum: u32,
    ifnum: u32,
    vendor: i16,
    product: i16,
    version: i16,
    num_applications: u32,
}

// ioctl request numbers from <linux/hiddev.h>, _IOC('H', ...) encoded by hand.
const IOC_WRITE: libc::c_ulong = 1;
const IOC_READ: libc::c_ulong = 2;

const fn hid_ioc(dir: libc::c_ulong, nr: libc::c_ulong, size: usize) -> libc::c_ulong {
    (dir << 30) | ((size as libc::c_ulong) << 16) | ((b'H' as libc::c_ulong) << 8) | nr
}

const HIDIOCGVERSION: libc::c_ulong = hid_ioc(IOC_READ, 0x01, size_of::<libc::c_int>());
const HIDIOCGDEVINFO: libc::c_ulong = hid_ioc(IOC_READ, 0x03, size_of::<DevInfo>());
const HIDIOCSREPORT: libc::c_ulong = hid_ioc(IOC_WRITE, 0x08, size_of::<ReportInfo>());
const HIDIOCSFLAG: libc::c_ulong = hid_ioc(IOC_WRITE, 0x0f, size_of::<libc::c_int>());
const HIDIOCSUSAGES: libc::c_ulong = hid_ioc(IOC_WRITE, 0x14, size_of::<UsageRefMulti>());

/// Reads one raw usage reference from the device stream.
pub fn read_usage_ref(reader: &mut impl Read) -> io::Result<UsageRef> {
    let mut buf = [0u8; USAGE_REF_SIZE];
    reader.read_exact(&mut buf)?;
    // SAFETY: UsageRef is plain-old-data and buf is fully initialized.
    Ok(unsafe { std::ptr::read(buf.as_ptr() as *const UsageRef) })
}

/// An opened, identity-checked handset.
///
/// The descriptor is read only by the pipeline thread; command writes may
/// come from both the decoder's side effects and external callers, so they
/// are serialized by `write_lock`. The handle carries no `Drop`: closing is
/// an explicit lifecycle step because it doubles as the cancellation signal
/// for a concurrently blocked read.
pub struct Device {
    fd: RawFd,
    write_lock: Mutex<()>,
}

impl Device {
    /// Opens the device node and validates protocol version, identity and
    /// driver flags. On any failure the descriptor is closed again before
    /// the error is returned.
    pub fn open(path: &Path) -> Result<Device, InitError> {
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| InitError::Open {
            path: path.to_path_buf(),
            source: io::Error::from(io::ErrorKind::InvalidInput),
        })?;

        // SAFETY: c_path is a valid NUL-terminated string.
        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY) };
        if fd < 0 {
            return Err(InitError::Open {
                path: path.to_path_buf(),
                source: io::Error::last_os_error(),
            });
        }

        let mut version: libc::c_int = 0;
        // SAFETY: HIDIOCGVERSION writes one c_int.
        let rc = unsafe { libc::ioctl(fd, HIDIOCGVERSION, &mut version) };
        if rc < 0 || version != HID_VERSION {
            // SAFETY: fd was opened above and is not shared yet.
            unsafe { libc::close(fd) };
            return Err(InitError::ProtocolVersion { found: version });
        }

        let mut info = DevInfo::default();
        // SAFETY: HIDIOCGDEVINFO writes one DevInfo.
        let rc = unsafe { libc::ioctl(fd, HIDIOCGDEVINFO, &mut info) };
        if rc < 0
            || info.vendor as u16 != VENDOR_ID
            || info.product as u16 != PRODUCT_ID
            || info.version as u16 != DEVICE_VERSION
            || info.num_applications != NUM_APPLICATIONS
        {
            // SAFETY: fd was opened above and is not shared yet.
            unsafe { libc::close(fd) };
            return Err(InitError::Identity {
                vendor: info.vendor as u16,
                product: info.product as u16,
                version: info.version as u16,
                applications: info.num_applications,
            });
        }

        // UREF gives us one hiddev_usage_ref per usage; REPORT makes the
        // device deliver whole reports rather than only changed usages.
        let flags: libc::c_int = HIDDEV_FLAG_UREF | HIDDEV_FLAG_REPORT;
        // SAFETY: HIDIOCSFLAG reads one c_int.
        let rc = unsafe { libc::ioctl(fd, HIDIOCSFLAG, &flags) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            // SAFETY: fd was opened above and is not shared yet.
            unsafe { libc::close(fd) };
            return Err(InitError::Flags(err));
        }

        debug!(path = %path.display(), fd, "opened handset");
        Ok(Device {
            fd,
            write_lock: Mutex::new(()),
        })
    }

    /// Blocking byte reader over the device descriptor.
    pub(crate) fn reader(&self) -> Fd {
        Fd::new(self.fd)
    }

    /// Closes the descriptor. A pipeline thread blocked in `read` fails with
    /// `EBADF` as a result; that is the designed shutdown path.
    pub(crate) fn close(&self) {
        // SAFETY: fd came from open; double closes are prevented by the
        // lifecycle manager calling this exactly once.
        unsafe {
            libc::close(self.fd);
        }
    }

    /// Transmits one command report: set the output usage values, then
    /// commit the report. Best effort; failures are logged and swallowed
    /// because only the read path is authoritative for device liveness.
    pub fn send_report(&self, report: &OutputReport) {
        // SAFETY: UsageRefMulti is plain-old-data; every field written below.
        let mut urefm: UsageRefMulti = unsafe { std::mem::zeroed() };
        urefm.uref.report_type = HID_REPORT_TYPE_OUTPUT;
        urefm.uref.report_id = 1;
        urefm.uref.field_index = 0;
        urefm.uref.usage_index = 0;
        urefm.uref.usage_code = 1;
        urefm.num_values = OUTPUT_USAGES as u32;
        for (slot, byte) in urefm.values.iter_mut().zip(report.as_bytes()) {
            *slot = i32::from(*byte);
        }

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // SAFETY: HIDIOCSUSAGES reads one UsageRefMulti.
        let rc = unsafe { libc::ioctl(self.fd, HIDIOCSUSAGES, &urefm) };
        if rc < 0 {
            debug!(
                command = report.command(),
                error = %io::Error::last_os_error(),
                "HIDIOCSUSAGES failed, dropping report"
            );
            return;
        }

        let rinfo = ReportInfo {
            report_type: HID_REPORT_TYPE_OUTPUT,
            report_id: 1,
            num_fields: 1,
        };
        // SAFETY: HIDIOCSREPORT reads one ReportInfo.
        let rc = unsafe { libc::ioctl(self.fd, HIDIOCSREPORT, &rinfo) };
        if rc < 0 {
            debug!(
                command = report.command(),
                error = %io::Error::last_os_error(),
                "HIDIOCSREPORT failed, dropping report"
            );
        }
    }

    /// Asks the device to replay its current lid/headphone state.
    pub fn request_status(&self) {
        self.send_report(&OutputReport::status_request());
    }

    /// Draws a full display image, already in device page format, as a
    /// sequence of 16-byte chunks.
    pub fn draw_bitmap(&self, bitmap: &[u8; lcd::BITMAP_SIZE]) {
        let mut chunk = [0u8; DRAW_CHUNK];
        for offset in (0..lcd::BITMAP_SIZE).step_by(DRAW_CHUNK) {
            chunk.copy_from_slice(&bitmap[offset..offset + DRAW_CHUNK]);
            self.send_report(&OutputReport::draw(&chunk));
        }
    }

    /// Blanks the display.
    pub fn clear_display(&self) {
        self.draw_bitmap(&[0u8; lcd::BITMAP_SIZE]);
    }

    /// Draws the fixed tux splash image.
    pub fn show_tux(&self) {
        self.draw_bitmap(&lcd::bitmap_to_device(&lcd::TUX));
    }
}

impl Controls for Device {
    fn set_sound(&self, speaker: bool, headphone: bool) {
        self.send_report(&OutputReport::sound(speaker, headphone));
    }

    fn set_backlight(&self, on: bool) {
        self.send_report(&OutputReport::backlight(on));
    }
}
