//! Keypad sentinel byte to evdev key code mapping.
//!
//! The handset reports a single sentinel byte per key press; `0x00` means
//! no key. The table covers the telephone keypad, the call keys, redial,
//! the volume pair and the side pickup key.

use input_linux_sys::{
    KEY_AGAIN, KEY_CANCEL, KEY_NUMERIC_0, KEY_NUMERIC_1, KEY_NUMERIC_2, KEY_NUMERIC_3,
    KEY_NUMERIC_4, KEY_NUMERIC_5, KEY_NUMERIC_6, KEY_NUMERIC_7, KEY_NUMERIC_8, KEY_NUMERIC_9,
    KEY_NUMERIC_POUND, KEY_NUMERIC_STAR, KEY_PHONE, KEY_SELECT, KEY_VOLUMEDOWN, KEY_VOLUMEUP,
};

static KEY_CODES: phf::Map<u8, i32> = phf::phf_map! {
    0x03u8 => KEY_NUMERIC_POUND,
    0x04u8 => KEY_NUMERIC_9,
    0x05u8 => KEY_NUMERIC_6,
    0x06u8 => KEY_NUMERIC_3,
    0x07u8 => KEY_CANCEL,     // hangup
    0x08u8 => KEY_PHONE,      // side key pickup/hangup
    0x0bu8 => KEY_NUMERIC_0,
    0x0cu8 => KEY_NUMERIC_8,
    0x0du8 => KEY_NUMERIC_5,
    0x0eu8 => KEY_NUMERIC_2,
    0x0fu8 => KEY_AGAIN,      // Re/HF: redial
    0x10u8 => KEY_VOLUMEDOWN,
    0x13u8 => KEY_NUMERIC_STAR,
    0x14u8 => KEY_NUMERIC_7,
    0x15u8 => KEY_NUMERIC_4,
    0x16u8 => KEY_NUMERIC_1,
    0x17u8 => KEY_SELECT,     // pickup
    0x18u8 => KEY_VOLUMEUP,
};

/// Resolves a key usage value to an evdev key code. Returns `None` for
/// out-of-range or unknown sentinels; callers decide whether to diagnose.
pub fn lookup(value: i32) -> Option<u16> {
    let byte = u8::try_from(value).ok()?;
    KEY_CODES.get(&byte).map(|&code| code as u16)
}
