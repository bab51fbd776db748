//! Pure functions that assemble response frames.
//!
//! Grounded on the original firmware's `response_builder.c` (header + checksum + per-shape
//! builders), with one deliberate behavior change: `build_list` accepts an empty roster instead
//! of rejecting it, since an empty `LIST_SENSORS` reply is a legitimate answer, not an error
//! (the original rejected `count == 0`).

use crate::protocol::{status, SOF};
use crate::sample::Sample;

const HEADER_LEN: usize = 6;
const CHECKSUM_LEN: usize = 1;

fn write_header(buf: &mut Vec<u8>, board_id: u8, addr7: u8, cmd: u8, status: u8, length: u8) {
    buf.push(SOF);
    buf.push(board_id);
    buf.push(addr7);
    buf.push(cmd);
    buf.push(status);
    buf.push(length);
}

fn append_checksum(buf: &mut Vec<u8>) {
    let checksum = buf[1..].iter().fold(0u8, |acc, &b| acc ^ b);
    buf.push(checksum);
}

/// Build a bare status response (no payload).
#[must_use]
pub fn build_status(board_id: u8, addr7: u8, cmd: u8, status: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + CHECKSUM_LEN);
    write_header(&mut buf, board_id, addr7, cmd, status, 0);
    append_checksum(&mut buf);
    buf
}

/// Build a single-byte field response.
#[must_use]
pub fn build_field(board_id: u8, addr7: u8, cmd: u8, value: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + 1 + CHECKSUM_LEN);
    write_header(&mut buf, board_id, addr7, cmd, status::OK, 1);
    buf.push(value);
    append_checksum(&mut buf);
    buf
}

/// Build a generic N-byte payload response (`GET_CONFIG`, multi-byte `GET_*` fields).
///
/// Returns `None` if `payload` is empty or longer than 255 bytes (the length field is one byte).
#[must_use]
pub fn build_payload(board_id: u8, addr7: u8, cmd: u8, payload: &[u8]) -> Option<Vec<u8>> {
    if payload.is_empty() || payload.len() > 255 {
        return None;
    }
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
    write_header(&mut buf, board_id, addr7, cmd, status::OK, payload.len() as u8);
    buf.extend_from_slice(payload);
    append_checksum(&mut buf);
    Some(buf)
}

/// Build a `LIST_SENSORS` response from `(type_code, addr7)` pairs. An empty roster is a
/// legitimate, valid length-zero response.
///
/// Returns `None` if `entries.len()` exceeds `MAX_SENSORS`.
#[must_use]
pub fn build_list(board_id: u8, cmd: u8, entries: &[(u8, u8)]) -> Option<Vec<u8>> {
    if entries.len() > crate::protocol::MAX_SENSORS {
        return None;
    }
    let length = entries.len() * 2;
    let mut buf = Vec::with_capacity(HEADER_LEN + length + CHECKSUM_LEN);
    write_header(&mut buf, board_id, 0, cmd, status::OK, length as u8);
    for &(type_code, addr7) in entries {
        buf.push(type_code);
        buf.push(addr7);
    }
    append_checksum(&mut buf);
    Some(buf)
}

/// Build a `READ_SAMPLES` response. Each sample contributes a big-endian 32-bit tick followed by
/// its payload bytes.
///
/// Returns `None` if the total payload would exceed 255 bytes, or if any sample reports more
/// bytes than `sample_size`.
#[must_use]
pub fn build_samples(
    board_id: u8,
    addr7: u8,
    cmd: u8,
    samples: &[Sample],
    sample_size: u8,
) -> Option<Vec<u8>> {
    if samples
        .iter()
        .any(|s| s.len > sample_size)
    {
        return None;
    }
    let length: usize = samples.iter().map(|s| 4 + usize::from(s.len)).sum();
    if length > 255 {
        return None;
    }

    let mut buf = Vec::with_capacity(HEADER_LEN + length + CHECKSUM_LEN);
    write_header(&mut buf, board_id, addr7, cmd, status::OK, length as u8);
    for sample in samples {
        buf.extend_from_slice(&sample.tick.to_be_bytes());
        buf.extend_from_slice(sample.payload());
    }
    append_checksum(&mut buf);
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checksum_of(buf: &[u8]) -> u8 {
        buf[1..buf.len() - 1].iter().fold(0u8, |a, &b| a ^ b)
    }

    #[test]
    fn status_checksum_law_holds() {
        let buf = build_status(0x01, 0x40, 3, status::OK);
        assert_eq!(*buf.last().unwrap(), checksum_of(&buf));
        assert_eq!(buf, vec![0xAA, 0x01, 0x40, 3, 0, 0, 0x01 ^ 0x40 ^ 3]);
    }

    #[test]
    fn ping_matches_literal_bytes() {
        // SOF BOARD_ID addr=0 cmd=PING status=OK length=0 checksum
        let buf = build_status(0x01, 0x00, 3, status::OK);
        assert_eq!(buf, vec![0xAA, 0x01, 0x00, 0x03, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn field_checksum_law_holds() {
        let buf = build_field(0x01, 0x40, 30, 5);
        assert_eq!(*buf.last().unwrap(), checksum_of(&buf));
        assert_eq!(buf[6], 5);
    }

    #[test]
    fn list_allows_empty_roster() {
        let buf = build_list(0x01, 4, &[]).unwrap();
        assert_eq!(buf, vec![0xAA, 0x01, 0x00, 4, 0, 0, 0x01 ^ 4]);
    }

    #[test]
    fn list_with_entries_matches_literal_bytes() {
        let buf = build_list(0x01, 4, &[(1, 0x40)]).unwrap();
        assert_eq!(buf, vec![0xAA, 0x01, 0x00, 4, 0, 2, 1, 0x40, checksum_of(&[0xAA, 0x01, 0x00, 4, 0, 2, 1, 0x40, 0])]);
    }

    #[test]
    fn list_rejects_oversized_roster() {
        let entries: Vec<(u8, u8)> = (0..=crate::protocol::MAX_SENSORS as u8).map(|i| (1, i)).collect();
        assert!(build_list(0x01, 4, &entries).is_none());
    }

    #[test]
    fn samples_checksum_law_and_layout() {
        let samples = vec![Sample::new(0x0000_0001, &[9, 9])];
        let buf = build_samples(0x01, 0x40, 0, &samples, 2).unwrap();
        assert_eq!(*buf.last().unwrap(), checksum_of(&buf));
        assert_eq!(buf[5], 6); // length = 4 (tick) + 2 (payload)
        assert_eq!(&buf[6..10], &1u32.to_be_bytes());
        assert_eq!(&buf[10..12], &[9, 9]);
    }

    #[test]
    fn samples_rejects_oversized_individual_sample() {
        let samples = vec![Sample::new(0, &[1, 2, 3])];
        assert!(build_samples(0x01, 0x40, 0, &samples, 2).is_none());
    }

    #[test]
    fn payload_rejects_empty_and_oversized() {
        assert!(build_payload(0x01, 0x40, 7, &[]).is_none());
        let big = vec![0u8; 256];
        assert!(build_payload(0x01, 0x40, 7, &big).is_none());
    }
}
