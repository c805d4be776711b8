//! Packed, little-endian wire layout: command codes, response framing,
//! and the send helpers every handler reports through.

use crate::error::{ErrorCode, HandlerError};
use crate::transport::{Transport, MAX_DATA_CHUNK, PACKET_BUF_SIZE, RESPONSE_HEADER_SIZE};

/// Request command codes (first byte of every inbound frame).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ReadId = 0x00,
    Erase = 0x01,
    Read = 0x02,
    WriteStart = 0x03,
    WriteData = 0x04,
    WriteEnd = 0x05,
    Select = 0x06,
    ReadBb = 0x07,
}

impl Command {
    /// One past the last valid command code.
    pub const LAST: u8 = 0x08;

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Command::ReadId),
            0x01 => Some(Command::Erase),
            0x02 => Some(Command::Read),
            0x03 => Some(Command::WriteStart),
            0x04 => Some(Command::WriteData),
            0x05 => Some(Command::WriteEnd),
            0x06 => Some(Command::Select),
            0x07 => Some(Command::ReadBb),
            _ => None,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseKind {
    Data = 0x00,
    Status = 0x01,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusInfo {
    Ok = 0x00,
    Error = 0x01,
    BadBlock = 0x02,
    WriteAck = 0x03,
}

/// Sends `STATUS OK`.
///
/// Mirrors the source's `np_send_ok_status`: the transport's own send
/// failure is swallowed here rather than propagated. `send_bad_block` and
/// `send_write_ack` below do the opposite (see DESIGN.md for why both
/// policies are kept rather than unified).
pub fn send_ok<T: Transport>(transport: &mut T) {
    let _ = transport.send(&[ResponseKind::Status as u8, StatusInfo::Ok as u8]);
}

/// Sends `STATUS ERROR(code)`, ignoring transport send failure.
pub fn send_error<T: Transport>(transport: &mut T, code: ErrorCode) {
    let _ = transport.send(&[
        ResponseKind::Status as u8,
        StatusInfo::Error as u8,
        code as u8,
    ]);
}

/// Sends `STATUS BAD_BLOCK(addr)`, propagating transport failure.
pub fn send_bad_block<T: Transport>(transport: &mut T, addr: u32) -> Result<(), HandlerError> {
    let mut frame = [0u8; 6];
    frame[0] = ResponseKind::Status as u8;
    frame[1] = StatusInfo::BadBlock as u8;
    frame[2..6].copy_from_slice(&addr.to_le_bytes());
    transport
        .send(&frame)
        .map_err(|_| HandlerError::TransportFailure)
}

/// Sends `STATUS WRITE_ACK(bytes_ack)`, propagating transport failure.
pub fn send_write_ack<T: Transport>(transport: &mut T, bytes_ack: u32) -> Result<(), HandlerError> {
    let mut frame = [0u8; 6];
    frame[0] = ResponseKind::Status as u8;
    frame[1] = StatusInfo::WriteAck as u8;
    frame[2..6].copy_from_slice(&bytes_ack.to_le_bytes());
    transport
        .send(&frame)
        .map_err(|_| HandlerError::TransportFailure)
}

/// Sends one `DATA` frame. `bytes` must fit within [`MAX_DATA_CHUNK`].
pub fn send_data<T: Transport>(transport: &mut T, bytes: &[u8]) -> Result<(), HandlerError> {
    debug_assert!(bytes.len() <= MAX_DATA_CHUNK);
    let mut frame = [0u8; PACKET_BUF_SIZE];
    frame[0] = ResponseKind::Data as u8;
    frame[1] = bytes.len() as u8;
    let end = RESPONSE_HEADER_SIZE + bytes.len();
    frame[RESPONSE_HEADER_SIZE..end].copy_from_slice(bytes);
    transport
        .send(&frame[..end])
        .map_err(|_| HandlerError::TransportFailure)
}

/// Reads a little-endian `u32` out of `args` at `offset`, or
/// [`ErrorCode::Internal`] if the packet is too short to hold it.
pub fn read_u32(args: &[u8], offset: usize) -> Result<u32, ErrorCode> {
    args.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ErrorCode::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trips_known_codes() {
        for code in 0x00u8..0x08 {
            assert!(Command::from_u8(code).is_some());
        }
        assert_eq!(Command::from_u8(Command::LAST), None);
        assert_eq!(Command::from_u8(0x7F), None);
    }

    #[test]
    fn read_u32_rejects_short_packets() {
        assert_eq!(read_u32(&[1, 2, 3], 0), Err(ErrorCode::Internal));
        assert_eq!(read_u32(&[1, 2, 3, 4], 0), Ok(0x0403_0201));
    }
}
