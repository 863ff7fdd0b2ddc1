//! Decoder state-machine tests: edge-triggered status transitions, key and
//! wheel classification, and report-stream handling, all over in-memory
//! usage-reference streams.

use input_linux_sys::{
    input_event, EV_KEY, EV_REL, EV_SW, KEY_NUMERIC_5, KEY_VOLUMEUP, REL_DIAL,
    SW_HEADPHONE_INSERT, SW_LID,
};
use mousefon::event::read_event;
use mousefon::hiddev::UsageRef;
use mousefon::report::{
    read_report_cycle, Controls, Cycle, DeviceStatus, HEADPHONE_ABSENT, HEADPHONE_PRESENT,
    LID_CLOSED, LID_OPEN,
};
use std::cell::RefCell;
use std::io::{self, Cursor};
use std::mem::size_of;

// --- Test Helpers ---

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Call {
    Sound(bool, bool),
    Backlight(bool),
}

/// Records the side effects the decoder triggers instead of touching a
/// device.
#[derive(Default)]
struct RecordingControls {
    calls: RefCell<Vec<Call>>,
}

impl RecordingControls {
    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

impl Controls for RecordingControls {
    fn set_sound(&self, speaker: bool, headphone: bool) {
        self.calls.borrow_mut().push(Call::Sound(speaker, headphone));
    }

    fn set_backlight(&self, on: bool) {
        self.calls.borrow_mut().push(Call::Backlight(on));
    }
}

fn uref_bytes(report_id: u32, usage_index: u32, value: i32) -> Vec<u8> {
    let uref = UsageRef {
        report_type: 1,
        report_id,
        field_index: 0,
        usage_index,
        usage_code: 0,
        value,
    };
    // Safety: UsageRef is POD and the slice points to memory owned by uref.
    unsafe {
        std::slice::from_raw_parts(&uref as *const _ as *const u8, size_of::<UsageRef>()).to_vec()
    }
}

/// Serializes one id-1 report: a leading usage plus the seven payload
/// fields (key, lid, wheel, headphone, three reserved).
fn device_report(key: i32, lid: i32, wheel: i32, headphone: i32) -> Vec<u8> {
    let values = [key, lid, wheel, headphone, 0xff, 0xff, 0x00];
    let mut bytes = uref_bytes(1, 0, values[0]);
    for (index, value) in values.iter().enumerate() {
        bytes.extend_from_slice(&uref_bytes(1, index as u32, *value));
    }
    bytes
}

/// An idle id-1 report: no key, no wheel motion, lid and headphone sitting
/// at their "closed"/"absent" sentinels.
fn idle_report() -> Vec<u8> {
    device_report(0x00, LID_CLOSED, 0x00, HEADPHONE_ABSENT)
}

/// Serializes one id-2 generic pointer report (header plus six payload
/// usages), which the decoder must drain and discard.
fn pointer_report() -> Vec<u8> {
    let mut bytes = uref_bytes(2, 0, 0);
    for index in 0..6 {
        bytes.extend_from_slice(&uref_bytes(2, index, 0x55));
    }
    bytes
}

fn decode(
    stream: &[u8],
    status: &mut DeviceStatus,
    controls: &RecordingControls,
) -> io::Result<(Cycle, Vec<input_event>)> {
    let mut reader = Cursor::new(stream.to_vec());
    let mut out: Vec<u8> = Vec::new();
    let cycle = read_report_cycle(&mut reader, status, controls, &mut out)?;
    let mut events = Vec::new();
    let mut cursor = Cursor::new(out);
    while let Some(ev) = read_event(&mut cursor).expect("event buffer is well formed") {
        events.push(ev);
    }
    Ok((cycle, events))
}

// --- Lid ---

#[test]
fn lid_close_is_edge_triggered() {
    let mut status = DeviceStatus::default();
    status.set_lid_open(true);
    let controls = RecordingControls::default();

    let (cycle, events) = decode(&idle_report(), &mut status, &controls).unwrap();
    assert_eq!(cycle, Cycle::Decoded);
    assert!(!status.lid_open());
    assert_eq!(controls.calls(), vec![Call::Backlight(false)]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].type_, EV_SW as u16);
    assert_eq!(events[0].code, SW_LID as u16);
    assert_eq!(events[0].value, 1);

    // Same sentinel again: level, not edge. No event, no side effect.
    let (_, events) = decode(&idle_report(), &mut status, &controls).unwrap();
    assert!(!status.lid_open());
    assert_eq!(controls.calls(), vec![Call::Backlight(false)]);
    assert!(events.is_empty());
}

#[test]
fn lid_open_turns_backlight_on() {
    let mut status = DeviceStatus::default();
    let controls = RecordingControls::default();

    let report = device_report(0x00, LID_OPEN, 0x00, HEADPHONE_ABSENT);
    let (_, events) = decode(&report, &mut status, &controls).unwrap();
    assert!(status.lid_open());
    assert_eq!(controls.calls(), vec![Call::Backlight(true)]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].code, SW_LID as u16);
    assert_eq!(events[0].value, 0);
}

#[test]
fn unknown_lid_value_never_changes_status() {
    for initial_open in [false, true] {
        let mut status = DeviceStatus::default();
        status.set_lid_open(initial_open);
        let controls = RecordingControls::default();

        let report = device_report(0x00, 0x7a, 0x00, HEADPHONE_ABSENT);
        let (_, events) = decode(&report, &mut status, &controls).unwrap();
        assert_eq!(status.lid_open(), initial_open);
        assert!(events.iter().all(|ev| ev.code != SW_LID as u16));
    }
}

// --- Headphone ---

#[test]
fn headphone_transitions_reroute_sound() {
    let mut status = DeviceStatus::default();
    let controls = RecordingControls::default();

    // Plug in: headphone only.
    let report = device_report(0x00, LID_CLOSED, 0x00, HEADPHONE_PRESENT);
    let (_, events) = decode(&report, &mut status, &controls).unwrap();
    assert!(status.headphone_present());
    assert_eq!(controls.calls(), vec![Call::Sound(false, true)]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].type_, EV_SW as u16);
    assert_eq!(events[0].code, SW_HEADPHONE_INSERT as u16);
    assert_eq!(events[0].value, 1);

    // Unplug: back to the speaker.
    let (_, events) = decode(&idle_report(), &mut status, &controls).unwrap();
    assert!(!status.headphone_present());
    assert_eq!(
        controls.calls(),
        vec![Call::Sound(false, true), Call::Sound(true, false)]
    );
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].value, 0);
}

#[test]
fn repeated_headphone_sentinel_emits_once() {
    let mut status = DeviceStatus::default();
    let controls = RecordingControls::default();

    let report = device_report(0x00, LID_CLOSED, 0x00, HEADPHONE_PRESENT);
    let (_, first) = decode(&report, &mut status, &controls).unwrap();
    let (_, second) = decode(&report, &mut status, &controls).unwrap();
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
}

#[test]
fn unknown_headphone_value_never_changes_status() {
    let mut status = DeviceStatus::default();
    status.set_headphone_present(true);
    let controls = RecordingControls::default();

    let report = device_report(0x00, LID_CLOSED, 0x00, 0x2b);
    let (_, events) = decode(&report, &mut status, &controls).unwrap();
    assert!(status.headphone_present());
    assert!(events.is_empty());
    assert!(controls.calls().is_empty());
}

// --- Keys ---

#[test]
fn key_press_is_followed_by_synthesized_release() {
    let mut status = DeviceStatus::default();
    let controls = RecordingControls::default();

    // 0x0d is the "5" key.
    let report = device_report(0x0d, LID_CLOSED, 0x00, HEADPHONE_ABSENT);
    let (_, events) = decode(&report, &mut status, &controls).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].type_, EV_KEY as u16);
    assert_eq!(events[0].code, KEY_NUMERIC_5 as u16);
    assert_eq!(events[0].value, 1);
    assert_eq!(events[1].type_, EV_KEY as u16);
    assert_eq!(events[1].code, KEY_NUMERIC_5 as u16);
    assert_eq!(events[1].value, 0);
}

#[test]
fn volume_up_maps_to_evdev_code() {
    let mut status = DeviceStatus::default();
    let controls = RecordingControls::default();

    let report = device_report(0x18, LID_CLOSED, 0x00, HEADPHONE_ABSENT);
    let (_, events) = decode(&report, &mut status, &controls).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].code, KEY_VOLUMEUP as u16);
}

#[test]
fn unknown_key_does_not_abort_remaining_fields() {
    let mut status = DeviceStatus::default();
    let controls = RecordingControls::default();

    // Unknown key sentinel, but the wheel moved in the same report.
    let report = device_report(0x42, LID_CLOSED, 0xff, HEADPHONE_ABSENT);
    let (_, events) = decode(&report, &mut status, &controls).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].type_, EV_REL as u16);
    assert_eq!(events[0].code, REL_DIAL as u16);
    assert_eq!(events[0].value, 1);
}

// --- Wheel ---

#[test]
fn wheel_sentinels_map_to_deltas() {
    let cases = [(0x01, Some(-1)), (0x00, None), (0xff, Some(1)), (0x33, None)];
    for (sentinel, expected) in cases {
        let mut status = DeviceStatus::default();
        let controls = RecordingControls::default();

        let report = device_report(0x00, LID_CLOSED, sentinel, HEADPHONE_ABSENT);
        let (_, events) = decode(&report, &mut status, &controls).unwrap();
        match expected {
            Some(delta) => {
                assert_eq!(events.len(), 1, "sentinel {sentinel:#04x}");
                assert_eq!(events[0].type_, EV_REL as u16);
                assert_eq!(events[0].code, REL_DIAL as u16);
                assert_eq!(events[0].value, delta);
            }
            None => assert!(events.is_empty(), "sentinel {sentinel:#04x}"),
        }
    }
}

// --- Report stream handling ---

#[test]
fn pointer_report_is_drained_and_ignored() {
    let mut status = DeviceStatus::default();
    status.set_lid_open(true);
    let before = status;
    let controls = RecordingControls::default();

    let (cycle, events) = decode(&pointer_report(), &mut status, &controls).unwrap();
    assert_eq!(cycle, Cycle::Ignored);
    assert!(events.is_empty());
    assert!(controls.calls().is_empty());
    assert_eq!(status, before);
}

#[test]
fn pointer_report_leaves_following_report_intact() {
    let mut status = DeviceStatus::default();
    let controls = RecordingControls::default();

    let mut stream = pointer_report();
    stream.extend_from_slice(&device_report(0x0d, LID_CLOSED, 0x00, HEADPHONE_ABSENT));

    let mut reader = Cursor::new(stream);
    let mut out: Vec<u8> = Vec::new();
    assert_eq!(
        read_report_cycle(&mut reader, &mut status, &controls, &mut out).unwrap(),
        Cycle::Ignored
    );
    assert_eq!(
        read_report_cycle(&mut reader, &mut status, &controls, &mut out).unwrap(),
        Cycle::Decoded
    );
    assert!(!out.is_empty());
}

#[test]
fn unexpected_report_id_is_fatal() {
    let mut status = DeviceStatus::default();
    let controls = RecordingControls::default();

    let stream = uref_bytes(9, 0, 0);
    let err = decode(&stream, &mut status, &controls).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
}

#[test]
fn truncated_report_is_fatal() {
    let mut status = DeviceStatus::default();
    let controls = RecordingControls::default();

    let mut stream = uref_bytes(1, 0, 0);
    stream.extend_from_slice(&uref_bytes(1, 0, 0x0d));
    // Only the header and one of seven payload usages: the read must fail.
    let err = decode(&stream, &mut status, &controls).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[test]
fn reserved_field_deviation_is_diagnostic_only() {
    let mut status = DeviceStatus::default();
    let controls = RecordingControls::default();

    let values = [0x00, LID_CLOSED, 0x00, HEADPHONE_ABSENT, 0x12, 0x34, 0x56];
    let mut stream = uref_bytes(1, 0, values[0]);
    for (index, value) in values.iter().enumerate() {
        stream.extend_from_slice(&uref_bytes(1, index as u32, *value));
    }

    let (cycle, events) = decode(&stream, &mut status, &controls).unwrap();
    assert_eq!(cycle, Cycle::Decoded);
    assert!(events.is_empty());
    assert!(controls.calls().is_empty());
    assert_eq!(status, DeviceStatus::default());
}

// Both transition fields unknown while status is already set: silent
// ignore, nothing moves.
#[test]
fn simultaneous_unknown_sentinels_do_nothing() {
    let mut status = DeviceStatus::default();
    status.set_lid_open(true);
    status.set_headphone_present(true);
    let before = status;
    let controls = RecordingControls::default();

    let report = device_report(0x00, 0x01, 0x00, 0x02);
    let (_, events) = decode(&report, &mut status, &controls).unwrap();
    assert!(events.is_empty());
    assert!(controls.calls().is_empty());
    assert_eq!(status, before);
}
