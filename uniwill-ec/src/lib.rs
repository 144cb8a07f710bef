//! EC register transport for Uniwill notebook firmware
//!
//! Layered access to the embedded controller:
//! - [`wire`]: the 8-byte firmware RPC record and response decoding
//! - [`transport`]: the [`FirmwareMethod`] seam and the typed [`EcBus`]
//! - [`registers`]: the reverse-engineered address table and bit overlays
//! - [`regmap`]: cached, descriptor-checked register map with offline mode
//! - [`events`]: synchronous fan-out bus for firmware event codes
//! - [`sim`]: in-memory EC model for tests and hardware-less use

pub mod error;
pub mod events;
pub mod registers;
pub mod regmap;
pub mod sim;
pub mod transport;
pub mod wire;

pub use error::EcError;
pub use events::{EventBus, EventHandler, EventOutcome, EventSubscription};
pub use regmap::{RegisterMap, RegisterWidth};
pub use registers::{uniwill_register_table, RegisterDesc, RegisterTable};
pub use sim::{SimCall, SimulatedEc};
pub use transport::{EcBus, FirmwareMethod};
pub use wire::{MethodBuffer, NO_SUCH_REGISTER, OP_READ, OP_WRITE};
