//! Fixed, compile-time chip geometry table.
//!
//! Real chip detection (ONFI parameter page, ID-byte table lookup) is a
//! collaborator concern outside this spec; this is a minimal concrete
//! `ChipDatabase` so the engine has something to select against on real
//! hardware.

use nand_engine::chip::{ChipDatabase, ChipInfo};
use nand_engine::error::CollabError;

struct Entry {
    chip_num: u32,
    info: ChipInfo,
}

const CHIPS: &[Entry] = &[
    Entry {
        chip_num: 0,
        info: ChipInfo {
            page_size: 2048,
            block_size: 128 * 1024,
            size: 128 * 1024 * 1024,
        },
    },
    Entry {
        chip_num: 1,
        info: ChipInfo {
            page_size: 2048,
            block_size: 128 * 1024,
            size: 256 * 1024 * 1024,
        },
    },
];

pub struct StaticChipTable;

impl ChipDatabase for StaticChipTable {
    fn lookup(&self, chip_num: u32) -> Result<ChipInfo, CollabError> {
        CHIPS
            .iter()
            .find(|entry| entry.chip_num == chip_num)
            .map(|entry| entry.info)
            .ok_or(CollabError::ChipNotFound(chip_num))
    }
}
