//! Input-report decoding: the handset state machine.
//!
//! One physical change produces one complete, self-describing report, so
//! decoding is combinational per report. The only persistent state is the
//! pair of status booleans used to detect lid and headphone edges.

pub mod keymap;

use crate::event::{self, write_event};
use crate::hiddev::{read_usage_ref, UsageRef};
use input_linux_sys::{REL_DIAL, SW_HEADPHONE_INSERT, SW_LID};
use std::io::{self, Read, Write};
use tracing::warn;

/// Report id carrying the seven handset-specific usage fields.
pub const REPORT_ID_DEVICE: u32 = 1;
/// Report id of the generic pointer report the handset also emits; drained
/// and discarded.
pub const REPORT_ID_POINTER: u32 = 2;

/// Payload usages following the leading usage for each report id.
pub const DEVICE_USAGES: usize = 7;
pub const POINTER_USAGES: usize = 6;

// Field sentinels. Any other value is diagnosed and ignored.
pub const LID_CLOSED: i32 = 0x1f;
pub const LID_OPEN: i32 = 0xff;
pub const HEADPHONE_ABSENT: i32 = 0xff;
pub const HEADPHONE_PRESENT: i32 = 0x1f;
const WHEEL_UP: i32 = 0x01;
const WHEEL_REST: i32 = 0x00;
const WHEEL_DOWN: i32 = 0xff;
const RESERVED_EXPECTED: [i32; 3] = [0xff, 0xff, 0x00];

const STATUS_LID_OPEN: u8 = 0x01;
const STATUS_HEADPHONE: u8 = 0x02;

/// Authoritative device status, mutated only by the decoder on confirmed
/// transitions. Owned by the pipeline thread for the whole session; the
/// upper bits are reserved for future flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    bits: u8,
}

impl DeviceStatus {
    pub fn lid_open(self) -> bool {
        self.bits & STATUS_LID_OPEN != 0
    }

    pub fn headphone_present(self) -> bool {
        self.bits & STATUS_HEADPHONE != 0
    }

    pub fn set_lid_open(&mut self, open: bool) {
        if open {
            self.bits |= STATUS_LID_OPEN;
        } else {
            self.bits &= !STATUS_LID_OPEN;
        }
    }

    pub fn set_headphone_present(&mut self, present: bool) {
        if present {
            self.bits |= STATUS_HEADPHONE;
        } else {
            self.bits &= !STATUS_HEADPHONE;
        }
    }
}

/// Device-directed side effects the decoder triggers on confirmed
/// transitions. Implemented by [`crate::hiddev::Device`]; tests substitute
/// a recording stub.
pub trait Controls {
    fn set_sound(&self, speaker: bool, headphone: bool);
    fn set_backlight(&self, on: bool);
}

/// One id-1 report with fields named instead of positional, produced by a
/// single parsing step at the report boundary.
#[derive(Clone, Copy, Debug)]
pub struct ReportFields {
    pub key: i32,
    pub lid: i32,
    pub wheel: i32,
    pub headphone: i32,
    pub reserved: [i32; 3],
}

impl ReportFields {
    fn from_usages(usages: &[UsageRef; DEVICE_USAGES]) -> Self {
        ReportFields {
            key: usages[0].value,
            lid: usages[1].value,
            wheel: usages[2].value,
            headphone: usages[3].value,
            reserved: [usages[4].value, usages[5].value, usages[6].value],
        }
    }
}

/// Outcome of one successful decode cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cycle {
    /// A handset report was decoded; zero or more events were emitted.
    Decoded,
    /// A generic pointer report was drained and discarded.
    Ignored,
}

/// Performs one logical read cycle: read the leading usage to learn the
/// report id, then drain or decode the rest. Any read failure is fatal and
/// discards the partially-read report.
pub fn read_report_cycle(
    dev: &mut impl Read,
    status: &mut DeviceStatus,
    controls: &impl Controls,
    out: &mut impl Write,
) -> io::Result<Cycle> {
    let head = read_usage_ref(dev)?;
    match head.report_id {
        REPORT_ID_DEVICE => {
            let mut usages = [UsageRef::default(); DEVICE_USAGES];
            for slot in &mut usages {
                *slot = read_usage_ref(dev)?;
            }
            process_fields(&ReportFields::from_usages(&usages), status, controls, out)?;
            Ok(Cycle::Decoded)
        }
        REPORT_ID_POINTER => {
            for _ in 0..POINTER_USAGES {
                read_usage_ref(dev)?;
            }
            Ok(Cycle::Ignored)
        }
        other => {
            warn!(report_id = other, "unexpected report id");
            Err(io::Error::from_raw_os_error(libc::EINVAL))
        }
    }
}

/// Decodes one named report into events and side effects.
///
/// Lid and headphone are edge-triggered: status changes, the matching side
/// effect fires and one switch event is emitted only when a valid sentinel
/// disagrees with the current status. Unknown sentinel values are logged
/// and never corrupt the status or abort the remaining fields.
pub fn process_fields(
    fields: &ReportFields,
    status: &mut DeviceStatus,
    controls: &impl Controls,
    out: &mut impl Write,
) -> io::Result<()> {
    let time = event::now();

    if status.lid_open() && fields.lid == LID_CLOSED {
        status.set_lid_open(false);
        controls.set_backlight(false);
        write_event(out, &event::switch_event(time, SW_LID as u16, 1))?;
    } else if !status.lid_open() && fields.lid == LID_OPEN {
        status.set_lid_open(true);
        controls.set_backlight(true);
        write_event(out, &event::switch_event(time, SW_LID as u16, 0))?;
    }
    if fields.lid != LID_CLOSED && fields.lid != LID_OPEN {
        warn!(value = fields.lid, "ignoring unknown lid value");
    }

    if status.headphone_present() && fields.headphone == HEADPHONE_ABSENT {
        status.set_headphone_present(false);
        controls.set_sound(true, false);
        write_event(
            out,
            &event::switch_event(time, SW_HEADPHONE_INSERT as u16, 0),
        )?;
    } else if !status.headphone_present() && fields.headphone == HEADPHONE_PRESENT {
        status.set_headphone_present(true);
        controls.set_sound(false, true);
        write_event(
            out,
            &event::switch_event(time, SW_HEADPHONE_INSERT as u16, 1),
        )?;
    }
    if fields.headphone != HEADPHONE_ABSENT && fields.headphone != HEADPHONE_PRESENT {
        warn!(value = fields.headphone, "ignoring unknown headphone value");
    }

    if fields.key != 0 {
        match keymap::lookup(fields.key) {
            Some(code) => {
                write_event(out, &event::key_event(time, code, 1))?;
                // The handset never reports key-up, so the release is
                // synthesized immediately; simultaneous key holds are not
                // tracked.
                write_event(out, &event::key_event(time, code, 0))?;
            }
            None => warn!(value = fields.key, "ignoring unknown key value"),
        }
    }

    let delta = match fields.wheel {
        WHEEL_UP => -1, // up becomes down when the lid is open
        WHEEL_REST => 0,
        WHEEL_DOWN => 1,
        other => {
            warn!(value = other, "ignoring unknown wheel value");
            0
        }
    };
    if delta != 0 {
        write_event(out, &event::rel_event(time, REL_DIAL as u16, delta))?;
    }

    if fields.reserved != RESERVED_EXPECTED {
        warn!(
            values = ?fields.reserved,
            "ignoring unexpected reserved field values"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_flags_are_independent() {
        let mut status = DeviceStatus::default();
        assert!(!status.lid_open());
        assert!(!status.headphone_present());

        status.set_lid_open(true);
        assert!(status.lid_open());
        assert!(!status.headphone_present());

        status.set_headphone_present(true);
        status.set_lid_open(false);
        assert!(!status.lid_open());
        assert!(status.headphone_present());
    }

    #[test]
    fn keymap_covers_keypad() {
        use input_linux_sys::{KEY_NUMERIC_0, KEY_NUMERIC_POUND, KEY_PHONE};

        assert_eq!(keymap::lookup(0x03), Some(KEY_NUMERIC_POUND as u16));
        assert_eq!(keymap::lookup(0x0b), Some(KEY_NUMERIC_0 as u16));
        assert_eq!(keymap::lookup(0x08), Some(KEY_PHONE as u16));
        assert_eq!(keymap::lookup(0x42), None);
        assert_eq!(keymap::lookup(-1), None);
        assert_eq!(keymap::lookup(0x300), None);
    }
}
