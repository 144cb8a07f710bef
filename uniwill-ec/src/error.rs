//! EC transport and register map error types

use thiserror::Error;

/// Errors that can occur during EC register access
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcError {
    // Firmware call errors
    #[error("Firmware method call failed: {0}")]
    Io(String),

    #[error("Firmware returned no response")]
    NoData,

    #[error("Malformed firmware response: {0}")]
    Protocol(String),

    /// The firmware answered with its "no such register" sentinel.
    #[error("Register 0x{address:04X} not implemented by this firmware")]
    NoSuchRegister { address: u16 },

    // Register map errors
    #[error("Register 0x{address:04X} is not readable")]
    NotReadable { address: u16 },

    #[error("Register 0x{address:04X} is not writable")]
    NotWritable { address: u16 },

    /// The map is in cache-only mode and the access cannot be satisfied
    /// from the cache.
    #[error("Register map is offline (cache-only)")]
    Offline,

    #[error("Register 0x{address:04X} claimed twice in the register table")]
    DuplicateRegister { address: u16 },
}
