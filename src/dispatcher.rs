//! Routes a parsed [`Command`] to the sensor manager and builds the response frame.
//!
//! Grounded on the original firmware's `command_dispatcher.c` switch-over-opcode loop; unlike the
//! original, every branch here returns through the shared `respond` path instead of writing
//! directly to the UART, which keeps `CommandDispatcher` a pure function of its manager plus the
//! incoming command and easy to exercise without a real serial port.

use std::io::Write;

use crate::manager::{ManagerError, SensorManager};
use crate::protocol::{opcode, status, Command};
use crate::response;

/// Owns the sensor roster and answers one command at a time. Intended to run on a single thread
/// (the design this crate follows keeps exactly one dispatcher per board, serializing command
/// handling the same way the original firmware's single TX buffer did).
pub struct CommandDispatcher<W: Write + Send + 'static> {
    board_id: u8,
    manager: SensorManager<W>,
}

impl<W: Write + Send + 'static> CommandDispatcher<W> {
    #[must_use]
    pub fn new(board_id: u8, manager: SensorManager<W>) -> CommandDispatcher<W> {
        CommandDispatcher { board_id, manager }
    }

    /// Handle one command and produce the bytes of its response frame. Never fails: every
    /// failure mode known to this crate has a corresponding status code.
    #[must_use]
    pub fn handle(&mut self, cmd: Command) -> Vec<u8> {
        match cmd.cmd {
            opcode::PING => response::build_status(self.board_id, 0, cmd.cmd, status::OK),
            opcode::ADD_SENSOR => self.handle_add(cmd),
            opcode::REMOVE_SENSOR => self.handle_remove(cmd),
            opcode::LIST_SENSORS => self.handle_list(cmd),
            opcode::READ_SAMPLES => self.handle_read_samples(cmd),
            opcode::SET_PAYLOAD_MASK => self.handle_set_payload_mask(cmd),
            opcode::GET_PAYLOAD_MASK => self.handle_get_field(cmd),
            opcode::GET_CONFIG => self.handle_get_config(cmd),
            c if opcode::is_set(c) => self.handle_set(cmd),
            c if opcode::is_get(c) => self.handle_get_field(cmd),
            _ => response::build_status(self.board_id, cmd.addr7, cmd.cmd, status::UNKNOWN_CMD),
        }
    }

    fn status_for(&self, err: &ManagerError) -> u8 {
        match err {
            ManagerError::NotFound => status::NOT_FOUND,
            _ => status::ERROR,
        }
    }

    fn handle_add(&mut self, cmd: Command) -> Vec<u8> {
        match self.manager.add(cmd.param, cmd.addr7, None) {
            Ok(()) => response::build_status(self.board_id, cmd.addr7, cmd.cmd, status::OK),
            Err(e) => {
                let st = self.status_for(&e);
                response::build_status(self.board_id, cmd.addr7, cmd.cmd, st)
            }
        }
    }

    fn handle_remove(&mut self, cmd: Command) -> Vec<u8> {
        match self.manager.remove(cmd.addr7) {
            Ok(()) => response::build_status(self.board_id, cmd.addr7, cmd.cmd, status::OK),
            Err(e) => {
                let st = self.status_for(&e);
                response::build_status(self.board_id, cmd.addr7, cmd.cmd, st)
            }
        }
    }

    fn handle_list(&self, cmd: Command) -> Vec<u8> {
        let entries = self.manager.list();
        response::build_list(self.board_id, cmd.cmd, &entries)
            .unwrap_or_else(|| response::build_status(self.board_id, 0, cmd.cmd, status::ERROR))
    }

    fn handle_read_samples(&self, cmd: Command) -> Vec<u8> {
        let sample_size = match self.manager.sample_size(cmd.addr7) {
            Ok(s) => s,
            Err(e) => {
                let st = self.status_for(&e);
                return response::build_status(self.board_id, cmd.addr7, cmd.cmd, st);
            }
        };
        let samples = match self.manager.read(cmd.addr7, usize::from(cmd.param)) {
            Ok(s) => s,
            Err(e) => {
                let st = self.status_for(&e);
                return response::build_status(self.board_id, cmd.addr7, cmd.cmd, st);
            }
        };
        if samples.is_empty() {
            return response::build_status(self.board_id, cmd.addr7, cmd.cmd, status::ERROR);
        }
        response::build_samples(self.board_id, cmd.addr7, cmd.cmd, &samples, sample_size)
            .unwrap_or_else(|| response::build_status(self.board_id, cmd.addr7, cmd.cmd, status::ERROR))
    }

    fn handle_set_payload_mask(&mut self, cmd: Command) -> Vec<u8> {
        match self.manager.set_payload_mask(cmd.addr7, cmd.param) {
            Ok(()) => response::build_status(self.board_id, cmd.addr7, cmd.cmd, status::OK),
            Err(e) => {
                let st = self.status_for(&e);
                response::build_status(self.board_id, cmd.addr7, cmd.cmd, st)
            }
        }
    }

    fn handle_get_config(&self, cmd: Command) -> Vec<u8> {
        match self.manager.get_all_config_bytes(cmd.addr7) {
            Ok(bytes) if !bytes.is_empty() => {
                response::build_payload(self.board_id, cmd.addr7, cmd.cmd, &bytes)
                    .unwrap_or_else(|| response::build_status(self.board_id, cmd.addr7, cmd.cmd, status::ERROR))
            }
            Ok(_) => response::build_status(self.board_id, cmd.addr7, cmd.cmd, status::ERROR),
            Err(e) => {
                let st = self.status_for(&e);
                response::build_status(self.board_id, cmd.addr7, cmd.cmd, st)
            }
        }
    }

    fn handle_set(&mut self, cmd: Command) -> Vec<u8> {
        let result = if cmd.cmd == opcode::SET_PERIOD {
            self.manager
                .set_period(cmd.addr7, u32::from(cmd.param) * crate::protocol::PERIOD_UNIT_MS)
        } else {
            match self.manager.configure(cmd.addr7, cmd.cmd, cmd.param) {
                Ok(true) => Ok(()),
                Ok(false) => {
                    return response::build_status(self.board_id, cmd.addr7, cmd.cmd, status::ERROR)
                }
                Err(e) => Err(e),
            }
        };
        match result {
            Ok(()) => response::build_status(self.board_id, cmd.addr7, cmd.cmd, status::OK),
            Err(e) => {
                let st = self.status_for(&e);
                response::build_status(self.board_id, cmd.addr7, cmd.cmd, st)
            }
        }
    }

    fn handle_get_field(&self, cmd: Command) -> Vec<u8> {
        match self.manager.get_config_bytes(cmd.addr7, cmd.cmd) {
            Ok(bytes) if bytes.len() == 1 => {
                response::build_field(self.board_id, cmd.addr7, cmd.cmd, bytes[0])
            }
            Ok(bytes) if !bytes.is_empty() => {
                response::build_payload(self.board_id, cmd.addr7, cmd.cmd, &bytes)
                    .unwrap_or_else(|| response::build_status(self.board_id, cmd.addr7, cmd.cmd, status::ERROR))
            }
            Ok(_) => response::build_status(self.board_id, cmd.addr7, cmd.cmd, status::UNKNOWN_CMD),
            Err(e) => {
                let st = self.status_for(&e);
                response::build_status(self.board_id, cmd.addr7, cmd.cmd, st)
            }
        }
    }
}
