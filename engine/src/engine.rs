//! Command dispatcher and event loop (C7, C8).

use crate::badblock::{handle_read_bb, BadBlockTable};
use crate::chip::{ChipDatabase, ChipInfo};
use crate::erase::handle_erase;
use crate::error::{ErrorCode, HandlerError, HandlerResult};
use crate::nand::NandController;
use crate::read::handle_read;
use crate::transport::{Transport, MAX_PAGE_SIZE, PACKET_BUF_SIZE};
use crate::wire::{read_u32, send_data, send_error, send_ok, Command};
use crate::write::{handle_write_end, handle_write_start, WriteSession};

/// Owns every collaborator and the engine's process-wide state, and drives
/// the event loop described in §4.8.
///
/// Generic over the four out-of-scope collaborators so the same engine
/// logic runs against real hardware in the firmware binary and against
/// stub implementations in tests.
pub struct Engine<T: Transport, N: NandController, B: BadBlockTable, C: ChipDatabase> {
    transport: T,
    nand: N,
    bbt: B,
    chips: C,
    chip_info: Option<ChipInfo>,
    write: WriteSession,
    page_buf: [u8; MAX_PAGE_SIZE],
}

impl<T: Transport, N: NandController, B: BadBlockTable, C: ChipDatabase> Engine<T, N, B, C> {
    pub fn new(transport: T, nand: N, bbt: B, chips: C) -> Self {
        Self {
            transport,
            nand,
            bbt,
            chips,
            chip_info: None,
            write: WriteSession::new(),
            page_buf: [0u8; MAX_PAGE_SIZE],
        }
    }

    /// One iteration of the event loop: drains every queued inbound
    /// packet, then runs a single write-status poll if a program is
    /// in flight. Never blocks.
    pub fn tick(&mut self) {
        let mut buf = [0u8; PACKET_BUF_SIZE];
        while let Some(n) = self.transport.peek(&mut buf) {
            self.dispatch(&buf[..n]);
            self.transport.consume();
        }

        if self.write.write_in_progress() {
            if let Err(HandlerError::Code(code)) = self.write.poll_once(&mut self.nand, &mut self.transport)
            {
                send_error(&mut self.transport, code);
            }
        }
    }

    fn dispatch(&mut self, frame: &[u8]) {
        let result = self.handle(frame);
        if let Err(HandlerError::Code(code)) = result {
            #[cfg(feature = "defmt")]
            defmt::debug!("command failed: {}", code);
            send_error(&mut self.transport, code);
        }
        // HandlerError::TransportFailure is deliberately not re-reported:
        // the transport that would carry the error is the one that broke.
    }

    fn handle(&mut self, frame: &[u8]) -> HandlerResult {
        let code = *frame.first().ok_or(ErrorCode::Internal)?;
        let command = if code < Command::LAST {
            Command::from_u8(code)
        } else {
            None
        };
        let command = command.ok_or(ErrorCode::CmdInvalid)?;
        let args = &frame[1..];

        if command != Command::Select && self.chip_info.is_none() {
            return Err(ErrorCode::ChipNotSel.into());
        }

        match command {
            Command::Select => self.handle_select(args),
            Command::ReadId => self.handle_read_id(),
            Command::Erase => self.handle_erase(args),
            Command::Read => self.handle_read(args),
            Command::WriteStart => self.handle_write_start(args),
            Command::WriteData => self.handle_write_data(args),
            Command::WriteEnd => handle_write_end(&mut self.write, &mut self.transport),
            Command::ReadBb => self.handle_read_bb(),
        }
    }

    fn handle_select(&mut self, args: &[u8]) -> HandlerResult {
        let chip_num = read_u32(args, 0)?;
        match self.chips.lookup(chip_num) {
            Ok(chip) => {
                self.nand.init(&chip);
                self.bbt.init();
                self.chip_info = Some(chip);
                send_ok(&mut self.transport);
                Ok(())
            }
            Err(_) => {
                self.chip_info = None;
                Err(ErrorCode::ChipNotFound.into())
            }
        }
    }

    fn handle_read_id(&mut self) -> HandlerResult {
        let mut id = [0u8; 8];
        let n = self.nand.read_id(&mut id);
        send_data(&mut self.transport, &id[..n])
    }

    fn handle_erase(&mut self, args: &[u8]) -> HandlerResult {
        let addr = read_u32(args, 0)?;
        let len = read_u32(args, 4)?;
        let chip = *self.chip_info.as_ref().expect("checked by dispatch");
        handle_erase(&mut self.nand, &self.bbt, &mut self.transport, &chip, addr, len)
    }

    fn handle_read(&mut self, args: &[u8]) -> HandlerResult {
        let addr = read_u32(args, 0)?;
        let len = read_u32(args, 4)?;
        let chip = *self.chip_info.as_ref().expect("checked by dispatch");
        handle_read(
            &mut self.nand,
            &mut self.transport,
            &chip,
            addr,
            len,
            &mut self.page_buf[..chip.page_size as usize],
        )
    }

    fn handle_write_start(&mut self, args: &[u8]) -> HandlerResult {
        let addr = read_u32(args, 0)?;
        let len = read_u32(args, 4)?;
        let chip = *self.chip_info.as_ref().expect("checked by dispatch");
        handle_write_start(&mut self.write, &mut self.transport, &chip, addr, len)
    }

    fn handle_write_data(&mut self, args: &[u8]) -> HandlerResult {
        let chunk_len = *args.first().ok_or(ErrorCode::Internal)? as usize;
        let chunk = args.get(1..1 + chunk_len).ok_or(ErrorCode::CmdDataSize)?;
        let chip = *self.chip_info.as_ref().expect("checked by dispatch");
        self.write.data(&mut self.nand, &mut self.transport, &chip, chunk)
    }

    fn handle_read_bb(&mut self) -> HandlerResult {
        let chip = *self.chip_info.as_ref().expect("checked by dispatch");
        handle_read_bb(&mut self.nand, &mut self.bbt, &mut self.transport, &chip)
    }
}
