//! Transport abstraction the engine is driven through.
//!
//! Modelled after a USB CDC link: non-blocking, packetized, one inbound
//! packet visible at a time. The engine owns no transport of its own —
//! it is handed one that implements this trait.

/// Maximum bytes in a single wire frame (request or response), header
/// included.
pub const PACKET_BUF_SIZE: usize = 64;

/// Bytes consumed by every response frame's `kind` + `info` header.
pub const RESPONSE_HEADER_SIZE: usize = 2;

/// Largest payload a single DATA frame can carry.
pub const MAX_DATA_CHUNK: usize = PACKET_BUF_SIZE - RESPONSE_HEADER_SIZE;

/// Largest page size any supported chip reports; sizes the write session's
/// scratch page buffer. No entry in the firmware's chip table exceeds this.
pub const MAX_PAGE_SIZE: usize = 0x800;

/// Byte-oriented, non-blocking transport.
///
/// `peek` copies the next queued inbound packet into `buf` and returns its
/// length, or `None` if nothing is queued yet. The packet stays queued
/// until `consume` is called, mirroring the peek/consume split of the
/// underlying USB driver (so a handler can fail partway through without
/// losing the packet).
pub trait Transport {
    fn peek(&mut self, buf: &mut [u8; PACKET_BUF_SIZE]) -> Option<usize>;

    fn consume(&mut self);

    /// Sends one frame. `Err(())` means the transport itself is broken.
    fn send(&mut self, bytes: &[u8]) -> Result<(), ()>;

    /// True if the next `send` will not block.
    fn send_ready(&mut self) -> bool;
}
