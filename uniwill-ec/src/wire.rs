//! Firmware RPC wire format
//!
//! Every register access goes through a single vendor firmware method that
//! takes a fixed 8-byte request record and answers with a byte buffer whose
//! leading 4 bytes form a little-endian u32.

use zerocopy::byteorder::little_endian::U16;
use zerocopy::{Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::EcError;

/// Operation code: write the data field to the addressed register.
pub const OP_WRITE: u16 = 0x0000;
/// Operation code: read the addressed register.
pub const OP_READ: u16 = 0x0100;

/// Response sentinel: the firmware does not implement the addressed
/// register (or the operation on it).
pub const NO_SUCH_REGISTER: u32 = 0xFEFE_FEFE;

/// Fixed 8-byte request record passed to the firmware method.
///
/// All fields are little-endian on the wire. The reserved word must be
/// zero; firmware revisions are known to reject requests with it set.
#[derive(Debug, Clone, Copy, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct MethodBuffer {
    address: U16,
    data: U16,
    operation: U16,
    reserved: U16,
}

impl MethodBuffer {
    /// Build a read request for `address`.
    pub fn read(address: u16) -> Self {
        Self {
            address: U16::new(address),
            data: U16::new(0),
            operation: U16::new(OP_READ),
            reserved: U16::new(0),
        }
    }

    /// Build a write request storing `data` at `address`.
    pub fn write(address: u16, data: u16) -> Self {
        Self {
            address: U16::new(address),
            data: U16::new(data),
            operation: U16::new(OP_WRITE),
            reserved: U16::new(0),
        }
    }

    pub fn address(&self) -> u16 {
        self.address.get()
    }

    pub fn data(&self) -> u16 {
        self.data.get()
    }

    pub fn is_read(&self) -> bool {
        self.operation.get() == OP_READ
    }
}

/// Decode a firmware response buffer into its leading u32.
///
/// An empty buffer means the firmware produced no output object; a buffer
/// shorter than 4 bytes is a malformed response.
pub fn decode_response(buffer: &[u8]) -> Result<u32, EcError> {
    if buffer.is_empty() {
        return Err(EcError::NoData);
    }
    let bytes: [u8; 4] = buffer
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| EcError::Protocol(format!("response too short: {} bytes", buffer.len())))?;
    Ok(u32::from_le_bytes(bytes))
}
