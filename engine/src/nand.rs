//! The NAND controller collaborator and the status adapter (C3).
//!
//! The controller itself — bit-banging CLE/ALE/WE#/RE#, timing, the
//! physical status register — is out of scope here; this module only
//! defines the narrow interface the engine drives it through and the
//! logic that turns its status codes into engine-level outcomes.

/// Ceiling on write-status polling iterations before a stuck program is
/// abandoned fatally.
pub const NAND_TIMEOUT: u32 = 0x0100_0000;

/// Factory/engine marker for a block considered good.
pub const GOOD_BLOCK_MARK: u8 = 0xFF;

/// Raw status a controller operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NandStatus {
    Ready,
    ErrorStatus,
    TimeoutError,
    Other,
}

/// Engine-level outcome of a read or erase operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    BadBlock(u32),
    Fatal,
}

/// Engine-level outcome of one write-status poll. `Pending` means the
/// program is still running; the caller should poll again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Done,
    BadBlock(u32),
    Pending,
    Fatal,
}

/// Adapts a read/erase status code at `addr` into an [`Outcome`].
///
/// `TimeoutError` is logged by the caller and treated as `Done` — the
/// operation is abandoned without reporting a bad block (open question:
/// whether this should instead be fatal is left to the caller's judgement,
/// the source's behaviour is preserved here).
pub fn adapt_op_status(status: NandStatus, addr: u32) -> Outcome {
    match status {
        NandStatus::Ready => Outcome::Done,
        NandStatus::ErrorStatus => Outcome::BadBlock(addr),
        NandStatus::TimeoutError => Outcome::Done,
        NandStatus::Other => Outcome::Fatal,
    }
}

/// Adapts a write-status poll at `addr` into a [`WriteOutcome`], advancing
/// `nand_timeout`.
///
/// `Ready` and `ErrorStatus` both end the in-flight program (the source's
/// status switch falls through `ErrorStatus` into the `Ready` arm; both
/// are "write no longer in progress" here). `TimeoutError` means the
/// program simply hasn't completed yet and is only fatal once
/// `nand_timeout` reaches [`NAND_TIMEOUT`].
pub fn adapt_write_status(status: NandStatus, nand_timeout: &mut u32, addr: u32) -> WriteOutcome {
    match status {
        NandStatus::Ready => {
            *nand_timeout = 0;
            WriteOutcome::Done
        }
        NandStatus::ErrorStatus => {
            *nand_timeout = 0;
            WriteOutcome::BadBlock(addr)
        }
        NandStatus::TimeoutError => {
            *nand_timeout += 1;
            if *nand_timeout >= NAND_TIMEOUT {
                WriteOutcome::Fatal
            } else {
                WriteOutcome::Pending
            }
        }
        NandStatus::Other => WriteOutcome::Fatal,
    }
}

/// Out-of-scope collaborator: the low-level NAND controller driver.
pub trait NandController {
    /// Reconfigures the controller for a newly selected chip's geometry
    /// and timing. Not one of the source's six driver calls, but
    /// necessary to actually run the controller against a concrete chip.
    fn init(&mut self, chip: &crate::chip::ChipInfo);

    /// Reads the raw ID structure into `out`, returning the number of
    /// bytes filled.
    fn read_id(&mut self, out: &mut [u8]) -> usize;

    /// Starts (and, on this synchronous driver model, completes) an erase
    /// of the block at `addr` and reports its status.
    fn erase_block(&mut self, addr: u32) -> NandStatus;

    /// Reads one full page into `buf` and reports status.
    fn read_page(&mut self, page: u32, buf: &mut [u8]) -> NandStatus;

    /// Reads `buf.len()` bytes starting at `offset` within `page`.
    fn read_data(&mut self, page: u32, offset: u32, buf: &mut [u8]) -> NandStatus;

    /// Kicks off an asynchronous page program and returns immediately;
    /// completion is observed via repeated [`NandController::write_status`] polls.
    fn write_page_async(&mut self, page: u32, data: &[u8]);

    /// Polls the status of the in-flight program started by
    /// [`NandController::write_page_async`].
    fn write_status(&mut self) -> NandStatus;
}
