//! Streaming write pipeline (C6): WRITE_START / WRITE_DATA / WRITE_END.

use crate::chip::ChipInfo;
use crate::error::{ErrorCode, HandlerResult};
use crate::geometry::validate_write_start;
use crate::nand::{adapt_write_status, NandController, WriteOutcome};
use crate::transport::{Transport, MAX_PAGE_SIZE, PACKET_BUF_SIZE};
use crate::wire::{send_ok, send_write_ack};

/// Capacity of the scratch page buffer; must cover the largest page size
/// any supported chip reports.
pub const MAX_WRITE_PAGE_SIZE: usize = MAX_PAGE_SIZE;

/// State of an in-progress write stream. Initialized by WRITE_START,
/// torn down (implicitly) by WRITE_END or the next WRITE_START.
pub struct WriteSession {
    addr: u32,
    len: u32,
    addr_is_set: bool,
    page_buf: [u8; MAX_WRITE_PAGE_SIZE],
    page: u32,
    offset: usize,
    bytes_written: u32,
    bytes_ack: u32,
    nand_wr_in_progress: bool,
    /// Byte address of the page currently being programmed, valid only
    /// while `nand_wr_in_progress` is set.
    inflight_addr: u32,
    nand_timeout: u32,
}

impl WriteSession {
    pub const fn new() -> Self {
        Self {
            addr: 0,
            len: 0,
            addr_is_set: false,
            page_buf: [0u8; MAX_WRITE_PAGE_SIZE],
            page: 0,
            offset: 0,
            bytes_written: 0,
            bytes_ack: 0,
            nand_wr_in_progress: false,
            inflight_addr: 0,
            nand_timeout: 0,
        }
    }

    pub fn write_in_progress(&self) -> bool {
        self.nand_wr_in_progress
    }

    /// WRITE_START(addr, len): validates and (re)initializes the session.
    pub fn start(&mut self, chip: &ChipInfo, addr: u32, len: u32) -> Result<(), ErrorCode> {
        validate_write_start(chip, addr, len)?;
        self.addr = addr;
        self.len = len;
        self.addr_is_set = true;
        self.page = addr / chip.page_size;
        self.offset = 0;
        self.bytes_written = 0;
        self.bytes_ack = 0;
        Ok(())
    }

    /// WRITE_DATA(chunk): copies `chunk` into the page buffer, launching
    /// an async program at every page boundary, and acks flow control.
    pub fn data<N: NandController, T: Transport>(
        &mut self,
        nand: &mut N,
        transport: &mut T,
        chip: &ChipInfo,
        chunk: &[u8],
    ) -> HandlerResult {
        if chunk.len() + 2 > PACKET_BUF_SIZE {
            return Err(ErrorCode::CmdDataSize.into());
        }
        if !self.addr_is_set {
            return Err(ErrorCode::AddrInvalid.into());
        }

        let page_size = chip.page_size as usize;
        let mut remaining = chunk;
        while !remaining.is_empty() {
            let space = page_size - self.offset;
            let take = remaining.len().min(space);
            self.page_buf[self.offset..self.offset + take].copy_from_slice(&remaining[..take]);
            self.offset += take;
            remaining = &remaining[take..];

            if self.offset == page_size {
                self.drain_in_flight(nand, transport)?;
                self.inflight_addr = self.addr;
                nand.write_page_async(self.page, &self.page_buf[..page_size]);
                self.nand_wr_in_progress = true;
                self.addr += chip.page_size;
                self.page += 1;
                self.offset = 0;
            }
        }

        self.bytes_written += chunk.len() as u32;
        if self.bytes_written > self.len {
            return Err(ErrorCode::LenExceeded.into());
        }

        if self.bytes_written - self.bytes_ack >= chip.page_size || self.bytes_written == self.len
        {
            send_write_ack(transport, self.bytes_written)?;
            self.bytes_ack = self.bytes_written;
        }

        Ok(())
    }

    /// WRITE_END: closes the session. Under-delivery (a partially filled
    /// page buffer) is reported as `NandWr`.
    pub fn end(&mut self) -> HandlerResult {
        self.addr_is_set = false;
        if self.offset != 0 {
            return Err(ErrorCode::NandWr.into());
        }
        Ok(())
    }

    /// Busy-waits for any previously kicked-off program to finish before a
    /// new one may start (at most one program in flight at a time).
    fn drain_in_flight<N: NandController, T: Transport>(
        &mut self,
        nand: &mut N,
        transport: &mut T,
    ) -> HandlerResult {
        while self.nand_wr_in_progress {
            self.poll_once(nand, transport)?;
        }
        Ok(())
    }

    /// Runs exactly one status poll on the in-flight program, if any.
    /// Called from the event loop between host packets.
    pub fn poll_once<N: NandController, T: Transport>(
        &mut self,
        nand: &mut N,
        transport: &mut T,
    ) -> HandlerResult {
        if !self.nand_wr_in_progress {
            return Ok(());
        }
        match adapt_write_status(nand.write_status(), &mut self.nand_timeout, self.inflight_addr) {
            WriteOutcome::Pending => Ok(()),
            WriteOutcome::Done => {
                self.nand_wr_in_progress = false;
                Ok(())
            }
            WriteOutcome::BadBlock(addr) => {
                self.nand_wr_in_progress = false;
                crate::wire::send_bad_block(transport, addr)
            }
            WriteOutcome::Fatal => {
                self.nand_wr_in_progress = false;
                Err(ErrorCode::NandWr.into())
            }
        }
    }
}

impl Default for WriteSession {
    fn default() -> Self {
        Self::new()
    }
}

/// WRITE_START handler: validates and (re)initializes the session, then
/// sends OK.
pub fn handle_write_start<T: Transport>(
    session: &mut WriteSession,
    transport: &mut T,
    chip: &ChipInfo,
    addr: u32,
    len: u32,
) -> HandlerResult {
    session.start(chip, addr, len)?;
    send_ok(transport);
    Ok(())
}

/// WRITE_END handler: closes the session, then sends OK.
pub fn handle_write_end<T: Transport>(session: &mut WriteSession, transport: &mut T) -> HandlerResult {
    session.end()?;
    send_ok(transport);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nand::NandStatus;

    struct StubTransport {
        acks: heapless::Vec<u32, 16>,
        oks: u32,
    }

    impl StubTransport {
        fn new() -> Self {
            Self {
                acks: heapless::Vec::new(),
                oks: 0,
            }
        }
    }

    impl Transport for StubTransport {
        fn peek(&mut self, _buf: &mut [u8; crate::transport::PACKET_BUF_SIZE]) -> Option<usize> {
            None
        }
        fn consume(&mut self) {}
        fn send(&mut self, bytes: &[u8]) -> Result<(), ()> {
            match bytes[1] {
                0x00 => self.oks += 1,
                0x03 => {
                    let ack = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
                    let _ = self.acks.push(ack);
                }
                _ => {}
            }
            Ok(())
        }
        fn send_ready(&mut self) -> bool {
            true
        }
    }

    struct StubNand {
        programs: heapless::Vec<u32, 16>,
    }

    impl StubNand {
        fn new() -> Self {
            Self {
                programs: heapless::Vec::new(),
            }
        }
    }

    impl NandController for StubNand {
        fn init(&mut self, _chip: &ChipInfo) {}
        fn read_id(&mut self, _out: &mut [u8]) -> usize {
            0
        }
        fn erase_block(&mut self, _addr: u32) -> NandStatus {
            NandStatus::Ready
        }
        fn read_page(&mut self, _page: u32, _buf: &mut [u8]) -> NandStatus {
            NandStatus::Ready
        }
        fn read_data(&mut self, _page: u32, _offset: u32, _buf: &mut [u8]) -> NandStatus {
            NandStatus::Ready
        }
        fn write_page_async(&mut self, page: u32, _data: &[u8]) {
            let _ = self.programs.push(page);
        }
        fn write_status(&mut self) -> NandStatus {
            NandStatus::Ready
        }
    }

    const CHIP: ChipInfo = ChipInfo {
        page_size: 2048,
        block_size: 0x20000,
        size: 128 * 1024 * 1024,
    };

    fn feed(session: &mut WriteSession, nand: &mut StubNand, transport: &mut StubTransport, total: usize) {
        let mut sent = 0;
        let mut byte = 0u8;
        while sent < total {
            let take = (total - sent).min(59);
            let mut chunk = [0u8; 59];
            for b in chunk.iter_mut().take(take) {
                *b = byte;
                byte = byte.wrapping_add(1);
            }
            session
                .data(nand, transport, &CHIP, &chunk[..take])
                .unwrap();
            sent += take;
        }
    }

    #[test]
    fn single_page_write_acks_once_at_total_length() {
        let mut session = WriteSession::new();
        let mut nand = StubNand::new();
        let mut transport = StubTransport::new();

        session.start(&CHIP, 0, 2048).unwrap();
        feed(&mut session, &mut nand, &mut transport, 2048);
        session.end().unwrap();

        assert_eq!(transport.acks.as_slice(), &[2048]);
        assert_eq!(nand.programs.len(), 1);
    }

    #[test]
    fn crossing_page_boundary_triggers_two_serialized_programs() {
        let mut session = WriteSession::new();
        let mut nand = StubNand::new();
        let mut transport = StubTransport::new();

        session.start(&CHIP, 0, 4096).unwrap();
        feed(&mut session, &mut nand, &mut transport, 4096);
        session.end().unwrap();

        assert_eq!(nand.programs.as_slice(), &[0, 1]);
        assert!(transport.acks.contains(&2048));
        assert_eq!(*transport.acks.last().unwrap(), 4096);
        for w in transport.acks.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn over_length_write_is_rejected() {
        let mut session = WriteSession::new();
        let mut nand = StubNand::new();
        let mut transport = StubTransport::new();

        session.start(&CHIP, 0, 2048).unwrap();
        let chunk = [0u8; 59];
        session.data(&mut nand, &mut transport, &CHIP, &chunk).unwrap();
        let err = loop {
            match session.data(&mut nand, &mut transport, &CHIP, &chunk) {
                Ok(()) => continue,
                Err(e) => break e,
            }
        };
        assert_eq!(err, ErrorCode::LenExceeded.into());
    }

    #[test]
    fn under_delivered_page_fails_at_end() {
        let mut session = WriteSession::new();
        session.start(&CHIP, 0, 2048).unwrap();
        session.offset = 10;
        assert_eq!(session.end().unwrap_err(), ErrorCode::NandWr.into());
    }

    #[test]
    fn chunk_too_large_for_packet_is_rejected() {
        let mut session = WriteSession::new();
        let mut nand = StubNand::new();
        let mut transport = StubTransport::new();
        session.start(&CHIP, 0, 2048).unwrap();
        let chunk = [0u8; 63];
        let err = session
            .data(&mut nand, &mut transport, &CHIP, &chunk)
            .unwrap_err();
        assert_eq!(err, ErrorCode::CmdDataSize.into());
    }
}
