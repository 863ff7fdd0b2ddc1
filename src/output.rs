//! Output-report construction.
//!
//! All device-directed commands share one fixed 17-value layout: a leading
//! command byte followed by a zero-filled payload with command-specific
//! bits. Building a report is pure; transmission lives in [`crate::hiddev`]
//! behind the write lock.

/// Number of usage values in an output report.
pub const OUTPUT_USAGES: usize = 17;

/// Route audio to the speaker and/or the external headphone.
pub const CMD_SOUND: u8 = 1;
/// Draw one chunk of display data.
pub const CMD_DRAW: u8 = 3;
/// Switch the LCD backlight on or off.
pub const CMD_BACKLIGHT: u8 = 4;
/// Ask the device to replay its current state as an input report.
pub const CMD_STATUS: u8 = 5;

pub const BIT_SPEAKER: u8 = 0x01;
pub const BIT_HEADPHONE: u8 = 0x02;
pub const BIT_BACKLIGHT: u8 = 0x01;

/// Display payload bytes carried by a single draw report.
pub const DRAW_CHUNK: usize = OUTPUT_USAGES - 1;

/// A fixed-layout command report for the handset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputReport {
    bytes: [u8; OUTPUT_USAGES],
}

impl OutputReport {
    fn with_command(command: u8) -> Self {
        let mut bytes = [0u8; OUTPUT_USAGES];
        bytes[0] = command;
        OutputReport { bytes }
    }

    /// Sound-routing command. Both flags off mutes the device.
    pub fn sound(speaker: bool, headphone: bool) -> Self {
        let mut report = Self::with_command(CMD_SOUND);
        if speaker {
            report.bytes[1] |= BIT_SPEAKER;
        }
        if headphone {
            report.bytes[1] |= BIT_HEADPHONE;
        }
        report
    }

    /// Backlight on/off command.
    pub fn backlight(on: bool) -> Self {
        let mut report = Self::with_command(CMD_BACKLIGHT);
        if on {
            report.bytes[1] |= BIT_BACKLIGHT;
        }
        report
    }

    /// Status request. The device answers by emitting its current lid and
    /// headphone state as if it had just changed.
    pub fn status_request() -> Self {
        Self::with_command(CMD_STATUS)
    }

    /// Draw command carrying one 16-byte chunk of display data. The device
    /// advances its own write position between chunks.
    pub fn draw(chunk: &[u8; DRAW_CHUNK]) -> Self {
        let mut report = Self::with_command(CMD_DRAW);
        report.bytes[1..].copy_from_slice(chunk);
        report
    }

    pub fn command(&self) -> u8 {
        self.bytes[0]
    }

    pub fn as_bytes(&self) -> &[u8; OUTPUT_USAGES] {
        &self.bytes
    }
}
