//! The byte-at-a-time command framer.
//!
//! Grounded on the teacher's `Command::parse` (a byte-by-byte accumulator over a `dyn Read`
//! that validates as it goes and rejects malformed input without consuming the whole stream),
//! adapted from JSON-brace tracking to a fixed 6-byte frame with an XOR checksum and an
//! inter-byte timeout.

use std::time::{Duration, Instant};

use crate::protocol::{Command, FRAME_TIMEOUT, SOF};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    WaitForStart,
    Collecting,
}

/// A pure byte-at-a-time state machine. It has no notion of the I/O it's fed from, and no
/// knowledge of opcodes — it only assembles and validates 6-byte frames.
pub struct FrameParser {
    board_id: u8,
    state: State,
    buf: [u8; 6],
    pos: usize,
    frame_start: Instant,
}

impl FrameParser {
    #[must_use]
    pub fn new(board_id: u8) -> FrameParser {
        FrameParser {
            board_id,
            state: State::WaitForStart,
            buf: [0u8; 6],
            pos: 0,
            frame_start: Instant::now(),
        }
    }

    /// Feed one byte, arriving at `now`, into the state machine.
    ///
    /// Returns `Some(Command)` exactly when a complete, checksum- and board-id-valid frame has
    /// just been assembled. Any other byte either advances the state machine silently or resets
    /// it (bad checksum, wrong board, timeout, overrun) with no output.
    pub fn feed(&mut self, byte: u8, now: Instant) -> Option<Command> {
        match self.state {
            State::WaitForStart => {
                if byte == SOF {
                    self.buf[0] = byte;
                    self.pos = 1;
                    self.frame_start = now;
                    self.state = State::Collecting;
                }
                None
            }
            State::Collecting => {
                if now.saturating_duration_since(self.frame_start) > FRAME_TIMEOUT {
                    self.reset();
                    // the timed-out byte might itself be a new SOF
                    return self.feed(byte, now);
                }
                self.buf[self.pos] = byte;
                self.pos += 1;
                if self.pos < self.buf.len() {
                    return None;
                }

                let result = self.validate();
                self.reset();
                result
            }
        }
    }

    fn validate(&self) -> Option<Command> {
        let checksum = self.buf[1] ^ self.buf[2] ^ self.buf[3] ^ self.buf[4];
        if self.buf[5] != checksum || self.buf[1] != self.board_id {
            return None;
        }
        Some(Command {
            board_id: self.buf[1],
            addr7: self.buf[2],
            cmd: self.buf[3],
            param: self.buf[4],
        })
    }

    fn reset(&mut self) {
        self.state = State::WaitForStart;
        self.pos = 0;
    }
}

/// Build the raw 6 bytes of a command frame, for tests and for the loopback host helper.
#[must_use]
pub fn encode_command(board_id: u8, addr7: u8, cmd: u8, param: u8) -> [u8; 6] {
    let checksum = board_id ^ addr7 ^ cmd ^ param;
    [SOF, board_id, addr7, cmd, param, checksum]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut FrameParser, bytes: &[u8]) -> Option<Command> {
        let now = Instant::now();
        let mut last = None;
        for &b in bytes {
            last = parser.feed(b, now);
        }
        last
    }

    #[test]
    fn accepts_valid_frame() {
        let mut parser = FrameParser::new(0x01);
        let frame = encode_command(0x01, 0x40, 3, 0);
        let cmd = feed_all(&mut parser, &frame).unwrap();
        assert_eq!(
            cmd,
            Command {
                board_id: 0x01,
                addr7: 0x40,
                cmd: 3,
                param: 0
            }
        );
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut parser = FrameParser::new(0x01);
        let mut frame = encode_command(0x01, 0x40, 3, 0);
        frame[5] ^= 0xFF;
        assert!(feed_all(&mut parser, &frame).is_none());
    }

    #[test]
    fn rejects_wrong_board_id() {
        let mut parser = FrameParser::new(0x01);
        let frame = encode_command(0x02, 0x40, 3, 0);
        assert!(feed_all(&mut parser, &frame).is_none());
    }

    #[test]
    fn resyncs_on_garbage_before_sof() {
        let mut parser = FrameParser::new(0x01);
        let mut bytes = vec![0x00, 0x11, 0x22];
        bytes.extend_from_slice(&encode_command(0x01, 0x40, 3, 0));
        assert!(feed_all(&mut parser, &bytes).is_some());
    }

    #[test]
    fn timeout_resets_state_machine() {
        let mut parser = FrameParser::new(0x01);
        let frame = encode_command(0x01, 0x40, 3, 0);
        let t0 = Instant::now();
        parser.feed(frame[0], t0);
        parser.feed(frame[1], t0);
        // arrive long after the timeout: the parser should drop the in-progress frame
        let late = t0 + FRAME_TIMEOUT + Duration::from_millis(5);
        assert!(parser.feed(frame[2], late).is_none());
        assert_eq!(parser.state, State::WaitForStart);
    }

    #[test]
    fn back_to_back_frames_both_parse() {
        let mut parser = FrameParser::new(0x01);
        let mut bytes = encode_command(0x01, 0x40, 3, 0).to_vec();
        bytes.extend_from_slice(&encode_command(0x01, 0x41, 4, 0));
        let now = Instant::now();
        let mut seen = Vec::new();
        for &b in &bytes {
            if let Some(cmd) = parser.feed(b, now) {
                seen.push(cmd);
            }
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].addr7, 0x40);
        assert_eq!(seen[1].addr7, 0x41);
    }
}
