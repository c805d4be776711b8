//! Wire-facing error taxonomy and the handler return convention.
//!
//! Error codes are positive on the wire; handlers work with the typed
//! [`ErrorCode`] and never see the raw byte directly.

use core::fmt;

/// Error kinds reported to the host in a `STATUS ERROR` frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCode {
    Internal = 1,
    AddrExceeded = 100,
    AddrInvalid = 101,
    AddrNotAlign = 102,
    NandWr = 103,
    NandRd = 104,
    NandErase = 105,
    ChipNotSel = 106,
    ChipNotFound = 107,
    CmdDataSize = 108,
    CmdInvalid = 109,
    BufOverflow = 110,
    LenNotAlign = 111,
    LenExceeded = 112,
    LenInvalid = 113,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrorCode::Internal => "unclassified internal fault",
            ErrorCode::AddrExceeded => "address + length exceeds chip size",
            ErrorCode::AddrInvalid => "write data received before WRITE_S",
            ErrorCode::AddrNotAlign => "address not aligned to block/page",
            ErrorCode::NandWr => "program failed or write under-delivered",
            ErrorCode::NandRd => "NAND read hardware error",
            ErrorCode::NandErase => "NAND erase hardware error",
            ErrorCode::ChipNotSel => "command issued before SELECT",
            ErrorCode::ChipNotFound => "unknown chip id",
            ErrorCode::CmdDataSize => "WRITE_D payload overflows packet",
            ErrorCode::CmdInvalid => "unknown command code",
            ErrorCode::BufOverflow => "reserved",
            ErrorCode::LenNotAlign => "length not aligned",
            ErrorCode::LenExceeded => "wrote more than announced",
            ErrorCode::LenInvalid => "zero length",
        };
        f.write_str(msg)
    }
}

/// The outcome of a command handler.
///
/// `TransportFailure` corresponds to the `-1` sentinel in the source
/// protocol: the transport itself is broken, so the dispatcher must not
/// attempt another send on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandlerError {
    Code(ErrorCode),
    TransportFailure,
}

impl From<ErrorCode> for HandlerError {
    fn from(code: ErrorCode) -> Self {
        HandlerError::Code(code)
    }
}

pub type HandlerResult = Result<(), HandlerError>;

/// Fallibility of the out-of-scope collaborators themselves (chip lookup,
/// bad-block table capacity) — distinct from [`ErrorCode`], which is the
/// wire-facing taxonomy a host ever sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CollabError {
    /// SELECT named a chip number no entry in the database covers.
    ChipNotFound(u32),
    /// The bad-block table is already at capacity; the entry was dropped.
    TableFull,
}

impl fmt::Display for CollabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollabError::ChipNotFound(id) => write!(f, "no chip registered for id {id}"),
            CollabError::TableFull => write!(f, "bad-block table is at capacity"),
        }
    }
}

impl core::error::Error for CollabError {}
