//! Chip geometry and the chip database collaborator.

use crate::error::CollabError;

/// Geometry of the currently selected chip, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    pub page_size: u32,
    pub block_size: u32,
    pub size: u32,
}

/// Out-of-scope collaborator: looks up chip geometry by the numeric id the
/// host sent in SELECT. Backed by a real chip database (ONFI table, ID
/// lookup) in the firmware binary; a fixed table in tests.
pub trait ChipDatabase {
    fn lookup(&self, chip_num: u32) -> Result<ChipInfo, CollabError>;
}
