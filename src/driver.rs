//! Session lifecycle: startup, the background decode thread, the consumer
//! event source and the device-directed controls.
//!
//! Exactly two threads of control exist per session: the consumer blocking
//! on [`EventSource::read_event`] and the pipeline thread blocking on the
//! device read. Closing the descriptors from [`Driver::stop`] is what
//! unblocks both sides; there are no timeouts.

use crate::error::InitError;
use crate::event::{self, Fd};
use crate::hiddev::{Device, DEFAULT_DEVICE};
use crate::lcd;
use crate::report::{self, Controls, DeviceStatus};
use input_linux_sys::{input_event, SW_HEADPHONE_INSERT, SW_LID};
use std::io;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Consumer-facing end of the session pipe.
///
/// Deliberately a thin, non-owning handle over the pipe descriptor: the
/// lifecycle manager owns and closes the descriptor, and reads issued
/// after [`Driver::stop`] simply yield the synthetic error event.
#[derive(Debug)]
pub struct EventSource {
    fd: RawFd,
}

impl EventSource {
    pub fn from_raw_fd(fd: RawFd) -> Self {
        EventSource { fd }
    }

    /// The underlying descriptor, usable with `select`/`poll` alongside
    /// other sources.
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    /// Reads one event, blocking until the pipeline produces it. On EOF or
    /// any read failure a synthetic `EV_SYN` event is returned with the OS
    /// error code as its value; the session is over at that point.
    pub fn read_event(&mut self) -> input_event {
        let mut fd = Fd::new(self.fd);
        match event::read_event(&mut fd) {
            Ok(Some(ev)) => ev,
            Ok(None) => event::error_event(0),
            Err(e) => event::error_event(e.raw_os_error().unwrap_or(0)),
        }
    }
}

struct Session {
    device: Arc<Device>,
    pipe_read: RawFd,
    pipe_write: RawFd,
    thread: thread::JoinHandle<()>,
}

/// Lifecycle manager for one handset.
///
/// At most one session is live at a time; `start` on a running driver is
/// idempotent and returns another handle to the existing session.
#[derive(Default)]
pub struct Driver {
    session: Option<Session>,
}

impl Driver {
    pub fn new() -> Self {
        Driver { session: None }
    }

    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// Opens and validates the device, primes the status flags with a real
    /// status round trip, emits the two initial switch events, starts the
    /// pipeline thread and draws the splash screen.
    ///
    /// Returns the consumer-facing event source. On failure everything
    /// opened so far is closed again; no `stop` call is needed.
    pub fn start(&mut self, path: Option<&Path>) -> Result<EventSource, InitError> {
        if let Some(session) = &self.session {
            return Ok(EventSource::from_raw_fd(session.pipe_read));
        }

        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEVICE));
        let device = Arc::new(Device::open(&path)?);

        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: fds is a valid two-element array.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            let err = io::Error::last_os_error();
            device.close();
            return Err(InitError::Pipe(err));
        }
        let (pipe_read, pipe_write) = (fds[0], fds[1]);

        // Prime the status flags: ask the device to replay its state, then
        // run one decode cycle with the events discarded.
        let mut status = DeviceStatus::default();
        device.request_status();
        let mut reader = device.reader();
        if let Err(e) =
            report::read_report_cycle(&mut reader, &mut status, &*device, &mut io::sink())
        {
            close_fds(pipe_read, pipe_write);
            device.close();
            return Err(InitError::Prime(e));
        }

        // Snapshot the primed status for the consumer. Written before the
        // pipeline thread exists, so they reach the pipe strictly before
        // any device-driven event.
        let [lid, headphone] = status_snapshot_events(status);
        let mut out = Fd::new(pipe_write);
        if let Err(e) = event::write_event(&mut out, &lid)
            .and_then(|()| event::write_event(&mut out, &headphone))
        {
            close_fds(pipe_read, pipe_write);
            device.close();
            return Err(InitError::Prime(e));
        }

        let thread_device = Arc::clone(&device);
        let thread = match thread::Builder::new()
            .name("mousefon-reader".into())
            .spawn(move || pipeline(thread_device, status, pipe_write))
        {
            Ok(handle) => handle,
            Err(e) => {
                close_fds(pipe_read, pipe_write);
                device.close();
                return Err(InitError::Spawn(e));
            }
        };

        info!(
            path = %path.display(),
            lid_open = status.lid_open(),
            headphone = status.headphone_present(),
            "handset session started"
        );
        self.session = Some(Session {
            device: Arc::clone(&device),
            pipe_read,
            pipe_write,
            thread,
        });

        // Splash screen, best effort like all control writes.
        device.show_tux();

        Ok(EventSource::from_raw_fd(pipe_read))
    }

    /// Tears the session down. Idempotent.
    ///
    /// Closing the device descriptor and both pipe ends is the designed
    /// cancellation signal: the pipeline's blocked device read fails with
    /// `EBADF` and the consumer's pipe read sees EOF. The pipeline thread
    /// is joined before returning.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.device.close();
        close_fds(session.pipe_read, session.pipe_write);
        if session.thread.join().is_err() {
            warn!("reader thread panicked during shutdown");
        }
        info!("handset session stopped");
    }

    /// Routes audio to the speaker and/or the external headphone.
    pub fn set_sound(&self, speaker: bool, headphone: bool) {
        if let Some(session) = &self.session {
            session.device.set_sound(speaker, headphone);
        }
    }

    /// Switches the LCD backlight.
    pub fn set_backlight(&self, on: bool) {
        if let Some(session) = &self.session {
            session.device.set_backlight(on);
        }
    }

    /// Asks the device to replay its current lid/headphone state through
    /// the event stream.
    pub fn request_status(&self) {
        if let Some(session) = &self.session {
            session.device.request_status();
        }
    }

    /// Draws a full display image, already in device page format.
    pub fn draw_bitmap(&self, bitmap: &[u8; lcd::BITMAP_SIZE]) {
        if let Some(session) = &self.session {
            session.device.draw_bitmap(bitmap);
        }
    }

    /// Blanks the display.
    pub fn clear_display(&self) {
        if let Some(session) = &self.session {
            session.device.clear_display();
        }
    }

    /// Draws the fixed tux splash image.
    pub fn show_tux(&self) {
        if let Some(session) = &self.session {
            session.device.show_tux();
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The two switch events describing a status snapshot: lid first, then
/// headphone, both timestamped zero. `SW_LID` carries 1 for a closed lid
/// and `SW_HEADPHONE_INSERT` 1 for a plugged jack, the evdev conventions.
pub fn status_snapshot_events(status: DeviceStatus) -> [input_event; 2] {
    let zero = event::time_zero();
    [
        event::switch_event(zero, SW_LID as u16, i32::from(!status.lid_open())),
        event::switch_event(
            zero,
            SW_HEADPHONE_INSERT as u16,
            i32::from(status.headphone_present()),
        ),
    ]
}

fn close_fds(a: RawFd, b: RawFd) {
    // SAFETY: both descriptors came from pipe(2) and are closed exactly once.
    unsafe {
        libc::close(a);
        libc::close(b);
    }
}

/// The background pipeline: decode cycles until the device becomes
/// unusable, then classify the failure and exit.
fn pipeline(device: Arc<Device>, mut status: DeviceStatus, out_fd: RawFd) {
    let mut reader = device.reader();
    let mut out = Fd::new(out_fd);

    let err = loop {
        match report::read_report_cycle(&mut reader, &mut status, &*device, &mut out) {
            Ok(_) => continue,
            Err(e) => break e,
        }
    };

    match err.raw_os_error() {
        Some(code) if code == libc::EIO => {
            // Unplugged mid-session: one terminal event, then exit. The
            // write is best effort; the consumer may already be gone.
            let _ = event::write_event(&mut out, &event::power_event(event::now()));
            info!("handset unplugged, reader exiting");
        }
        Some(code) if code == libc::EBADF => {
            // stop() closed the descriptor under us; expected shutdown.
            debug!("device descriptor closed, reader exiting");
        }
        _ => {
            warn!(error = %err, "reader exiting on unexpected error");
        }
    }
}
