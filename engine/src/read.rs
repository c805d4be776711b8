//! Paged read streamer (C5).

use crate::chip::ChipInfo;
use crate::error::{ErrorCode, HandlerResult};
use crate::geometry::validate_read_write;
use crate::nand::{adapt_op_status, NandController, Outcome};
use crate::transport::{Transport, MAX_DATA_CHUNK};
use crate::wire::{send_bad_block, send_data};

/// READ(addr, len): streams `len` bytes starting at `addr` as a sequence
/// of DATA frames. No terminating STATUS frame — completion is implicit
/// once the host has received `len` bytes.
pub fn handle_read<N: NandController, T: Transport>(
    nand: &mut N,
    transport: &mut T,
    chip: &ChipInfo,
    addr: u32,
    len: u32,
    page_buf: &mut [u8],
) -> HandlerResult {
    validate_read_write(chip, addr, len)?;

    let page_size = chip.page_size as usize;
    let mut page = addr / chip.page_size;
    let mut remaining = len;

    while remaining > 0 {
        let status = nand.read_page(page, &mut page_buf[..page_size]);
        let page_addr = page * chip.page_size;
        let chunk_len = (page_size as u32).min(remaining);

        match adapt_op_status(status, page_addr) {
            Outcome::Done => {
                let mut offset = 0usize;
                let mut left = chunk_len;
                while left > 0 {
                    let n = (page_size - offset).min(MAX_DATA_CHUNK).min(left as usize);
                    while !transport.send_ready() {}
                    send_data(transport, &page_buf[offset..offset + n])?;
                    offset += n;
                    left -= n as u32;
                }
            }
            Outcome::BadBlock(a) => send_bad_block(transport, a)?,
            Outcome::Fatal => return Err(ErrorCode::NandRd.into()),
        }
        remaining -= chunk_len;

        page += 1;
        if remaining > 0 && page * chip.page_size >= chip.size {
            return Err(ErrorCode::AddrExceeded.into());
        }
    }

    Ok(())
}
