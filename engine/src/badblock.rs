//! Bad-block table collaborator (storage) and the full-chip scan (C4).

use crate::chip::ChipInfo;
use crate::error::{CollabError, ErrorCode, HandlerResult};
use crate::nand::{adapt_op_status, NandController, Outcome, GOOD_BLOCK_MARK};
use crate::transport::Transport;
use crate::wire::{send_bad_block, send_ok};

/// Out-of-scope collaborator: bad-block table storage.
pub trait BadBlockTable {
    /// Clears the table for a newly selected chip.
    fn init(&mut self);

    /// True if the block starting at byte address `addr` is recorded bad.
    fn lookup(&self, addr: u32) -> bool;

    /// Records `addr` as bad. `Err(CollabError::TableFull)` past capacity —
    /// the scan still reports the block over the wire either way; a missed
    /// table entry only means a later read treats that block as untracked
    /// rather than pre-known-bad.
    fn add(&mut self, addr: u32) -> Result<(), CollabError>;
}

/// Fixed-capacity reference implementation backed by `heapless::Vec`,
/// suitable for both firmware (no heap) and tests.
pub struct FixedBadBlockTable<const N: usize> {
    entries: heapless::Vec<u32, N>,
}

impl<const N: usize> FixedBadBlockTable<N> {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }
}

impl<const N: usize> Default for FixedBadBlockTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> BadBlockTable for FixedBadBlockTable<N> {
    fn init(&mut self) {
        self.entries.clear();
    }

    fn lookup(&self, addr: u32) -> bool {
        self.entries.contains(&addr)
    }

    fn add(&mut self, addr: u32) -> Result<(), CollabError> {
        if self.entries.contains(&addr) {
            return Ok(());
        }
        self.entries.push(addr).map_err(|_| CollabError::TableFull)
    }
}

/// READ_BB: scans every block for a bad-block marker, reporting and
/// registering each hit.
pub fn handle_read_bb<N: NandController, B: BadBlockTable, T: Transport>(
    nand: &mut N,
    bbt: &mut B,
    transport: &mut T,
    chip: &ChipInfo,
) -> HandlerResult {
    let pages_per_block = chip.block_size / chip.page_size;
    let num_blocks = chip.size / chip.block_size;
    let mut marker = [0u8; 1];

    for block in 0..num_blocks {
        let block_addr = block * chip.block_size;
        let page0 = block * pages_per_block;

        let status = nand.read_data(page0, chip.page_size, &mut marker);
        if adapt_op_status(status, block_addr) == Outcome::Fatal {
            return Err(ErrorCode::NandRd.into());
        }
        let mut bad = marker[0] != GOOD_BLOCK_MARK;

        if !bad {
            let status = nand.read_data(page0 + 1, chip.page_size, &mut marker);
            if adapt_op_status(status, block_addr) == Outcome::Fatal {
                return Err(ErrorCode::NandRd.into());
            }
            bad = marker[0] != GOOD_BLOCK_MARK;
        }

        if bad {
            send_bad_block(transport, block_addr)?;
            // A full table still reports the block on the wire; a dropped
            // entry only affects later lookups, not this scan.
            let _ = bbt.add(block_addr);
        }
    }

    send_ok(transport);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nand::NandStatus;

    #[test]
    fn fixed_table_dedupes_and_looks_up() {
        let mut table: FixedBadBlockTable<4> = FixedBadBlockTable::new();
        assert!(!table.lookup(0x20000));
        table.add(0x20000).unwrap();
        table.add(0x20000).unwrap();
        assert!(table.lookup(0x20000));
        assert!(!table.lookup(0x40000));
    }

    #[test]
    fn fixed_table_init_clears_entries() {
        let mut table: FixedBadBlockTable<4> = FixedBadBlockTable::new();
        table.add(0x20000).unwrap();
        table.init();
        assert!(!table.lookup(0x20000));
    }

    #[test]
    fn fixed_table_reports_full_past_capacity() {
        let mut table: FixedBadBlockTable<2> = FixedBadBlockTable::new();
        table.add(0x0).unwrap();
        table.add(0x20000).unwrap();
        assert_eq!(table.add(0x40000), Err(CollabError::TableFull));
    }

    struct StubTransport {
        bad_blocks: heapless::Vec<u32, 16>,
        ok_sent: bool,
    }

    impl StubTransport {
        fn new() -> Self {
            Self {
                bad_blocks: heapless::Vec::new(),
                ok_sent: false,
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
                0x00 => self.ok_sent = true,
                0x02 => {
                    let addr = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
                    let _ = self.bad_blocks.push(addr);
                }
                _ => {}
            }
            Ok(())
        }
        fn send_ready(&mut self) -> bool {
            true
        }
    }

    /// Marks every block in `bad_blocks` bad on its page-0 marker; every
    /// other block needs its page-1 marker read too before it can be
    /// cleared good. Counts total `read_data` calls made.
    struct ScanNand {
        pages_per_block: u32,
        block_size: u32,
        bad_blocks: heapless::Vec<u32, 16>,
        reads: u32,
    }

    impl NandController for ScanNand {
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
        fn read_data(&mut self, page: u32, _offset: u32, buf: &mut [u8]) -> NandStatus {
            self.reads += 1;
            let block_addr = (page / self.pages_per_block) * self.block_size;
            buf[0] = if self.bad_blocks.contains(&block_addr) {
                0x00
            } else {
                GOOD_BLOCK_MARK
            };
            NandStatus::Ready
        }
        fn write_page_async(&mut self, _page: u32, _data: &[u8]) {}
        fn write_status(&mut self) -> NandStatus {
            NandStatus::Ready
        }
    }

    const SCAN_CHIP: ChipInfo = ChipInfo {
        page_size: 2048,
        block_size: 4096,
        size: 4 * 4096,
    };

    #[test]
    fn scan_reports_bad_blocks_in_increasing_order_exactly_once() {
        let mut nand = ScanNand {
            pages_per_block: 2,
            block_size: 4096,
            bad_blocks: heapless::Vec::from_slice(&[4096, 3 * 4096]).unwrap(),
            reads: 0,
        };
        let mut bbt: FixedBadBlockTable<8> = FixedBadBlockTable::new();
        let mut transport = StubTransport::new();

        handle_read_bb(&mut nand, &mut bbt, &mut transport, &SCAN_CHIP).unwrap();

        assert_eq!(transport.bad_blocks.as_slice(), &[4096, 3 * 4096]);
        assert!(transport.ok_sent);
        assert!(bbt.lookup(4096));
        assert!(bbt.lookup(3 * 4096));
        assert!(!bbt.lookup(0));
        assert!(!bbt.lookup(2 * 4096));

        // Blocks 1 and 3 are bad (1 read each, page 0 only); blocks 0 and 2
        // are good (2 reads each, page 0 then page 1).
        assert_eq!(nand.reads, 1 + 2 + 1 + 2);
    }

    #[test]
    fn scan_with_no_bad_blocks_reads_both_pages_of_every_block() {
        let mut nand = ScanNand {
            pages_per_block: 2,
            block_size: 4096,
            bad_blocks: heapless::Vec::new(),
            reads: 0,
        };
        let mut bbt: FixedBadBlockTable<8> = FixedBadBlockTable::new();
        let mut transport = StubTransport::new();

        handle_read_bb(&mut nand, &mut bbt, &mut transport, &SCAN_CHIP).unwrap();

        assert!(transport.bad_blocks.is_empty());
        assert!(transport.ok_sent);
        assert_eq!(nand.reads, 2 * (SCAN_CHIP.size / SCAN_CHIP.block_size));
    }
}
