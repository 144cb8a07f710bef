//! Firmware method seam and the typed EC bus built on top of it

use tracing::{debug, trace};

use crate::error::EcError;
use crate::wire::{decode_response, MethodBuffer, NO_SUCH_REGISTER};

/// The vendor firmware RPC.
///
/// On real hardware this evaluates the platform's firmware method with the
/// 8-byte request record. Tests and hardware-less consumers plug in
/// [`SimulatedEc`](crate::sim::SimulatedEc) instead.
///
/// Calls block for the duration of the firmware round trip; there is no
/// timeout beyond what the underlying channel provides.
pub trait FirmwareMethod: Send + Sync {
    /// Evaluate the method with the given request record and return the
    /// raw response buffer.
    fn evaluate(&self, input: &MethodBuffer) -> Result<Vec<u8>, EcError>;
}

/// Typed register access over a [`FirmwareMethod`].
///
/// Builds request records, decodes responses and maps the firmware's
/// "no such register" sentinel to a typed error so callers never see the
/// sentinel as data.
pub struct EcBus {
    method: Box<dyn FirmwareMethod>,
}

impl EcBus {
    pub fn new(method: Box<dyn FirmwareMethod>) -> Self {
        Self { method }
    }

    /// Read one register.
    pub fn read(&self, address: u16) -> Result<u32, EcError> {
        let value = self.call(&MethodBuffer::read(address))?;
        trace!("EC read 0x{address:04X} -> 0x{value:08X}");
        Ok(value)
    }

    /// Write one register. The firmware acks writes with a status word
    /// which is only checked for the sentinel.
    pub fn write(&self, address: u16, value: u16) -> Result<(), EcError> {
        trace!("EC write 0x{address:04X} <- 0x{value:04X}");
        self.call(&MethodBuffer::write(address, value))?;
        Ok(())
    }

    fn call(&self, input: &MethodBuffer) -> Result<u32, EcError> {
        let raw = self.method.evaluate(input)?;
        let output = decode_response(&raw)?;
        if output == NO_SUCH_REGISTER {
            let address = input.address();
            debug!("firmware has no register 0x{address:04X}");
            return Err(EcError::NoSuchRegister { address });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResponse(Vec<u8>);

    impl FirmwareMethod for FixedResponse {
        fn evaluate(&self, _input: &MethodBuffer) -> Result<Vec<u8>, EcError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn sentinel_maps_to_no_such_register() {
        let bus = EcBus::new(Box::new(FixedResponse(vec![0xFE, 0xFE, 0xFE, 0xFE])));
        assert_eq!(
            bus.read(0x0800),
            Err(EcError::NoSuchRegister { address: 0x0800 })
        );
        assert_eq!(
            bus.write(0x0800, 0x01),
            Err(EcError::NoSuchRegister { address: 0x0800 })
        );
    }

    #[test]
    fn value_one_below_sentinel_is_data() {
        let bus = EcBus::new(Box::new(FixedResponse(vec![0xFD, 0xFE, 0xFE, 0xFE])));
        assert_eq!(bus.read(0x0765), Ok(0xFEFE_FEFD));
    }

    #[test]
    fn empty_response_is_no_data() {
        let bus = EcBus::new(Box::new(FixedResponse(Vec::new())));
        assert_eq!(bus.read(0x0740), Err(EcError::NoData));
    }
}
