//! Address/length validation against the selected chip's geometry (C2).

use crate::chip::ChipInfo;
use crate::error::ErrorCode;

fn check(align: u32, size: u32, addr: u32, len: u32) -> Result<(), ErrorCode> {
    if addr % align != 0 {
        return Err(ErrorCode::AddrNotAlign);
    }
    if len == 0 {
        return Err(ErrorCode::LenInvalid);
    }
    if len % align != 0 {
        return Err(ErrorCode::LenNotAlign);
    }
    match addr.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(ErrorCode::AddrExceeded),
    }
}

/// Validates an ERASE request (block-aligned).
pub fn validate_erase(chip: &ChipInfo, addr: u32, len: u32) -> Result<(), ErrorCode> {
    check(chip.block_size, chip.size, addr, len)
}

/// Validates a READ or WRITE_D-bearing request (page-aligned).
pub fn validate_read_write(chip: &ChipInfo, addr: u32, len: u32) -> Result<(), ErrorCode> {
    check(chip.page_size, chip.size, addr, len)
}

/// Validates a WRITE_START request.
///
/// Reports `AddrNotAlign` (not `LenNotAlign`) when `len` is misaligned —
/// preserved verbatim to stay host-compatible; see DESIGN.md.
pub fn validate_write_start(chip: &ChipInfo, addr: u32, len: u32) -> Result<(), ErrorCode> {
    let align = chip.page_size;
    if addr % align != 0 {
        return Err(ErrorCode::AddrNotAlign);
    }
    if len == 0 {
        return Err(ErrorCode::LenInvalid);
    }
    if len % align != 0 {
        return Err(ErrorCode::AddrNotAlign);
    }
    match addr.checked_add(len) {
        Some(end) if end <= chip.size => Ok(()),
        _ => Err(ErrorCode::AddrExceeded),
    }
}
