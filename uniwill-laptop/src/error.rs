//! Device-level error types

use thiserror::Error;
use uniwill_ec::EcError;

/// Errors that can occur during device operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("EC access failed: {0}")]
    Ec(#[from] EcError),

    #[error("Value {value} out of range ({min}..={max})")]
    Range { value: i64, min: i64, max: i64 },

    /// The hardware holds a bit pattern this driver has no decoding for.
    /// Surfaced instead of guessing a default.
    #[error("Register 0x{address:04X} holds unrecognized state 0x{value:02X}")]
    UnrecognizedState { address: u16, value: u16 },

    #[error("Not supported on this hardware: {0}")]
    NotSupported(&'static str),
}
