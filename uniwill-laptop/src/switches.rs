//! Lock switches and toggle-only controls
//!
//! Fn lock and touchpad state live in ordinary read-write bits. The super
//! key lock, lightbar switch and fan boost can only be flipped through the
//! trigger register, so driving them to a target state means reading the
//! status register and pulsing only on a mismatch.

use uniwill_ec::registers::{addr, BiosOem, Oem4, SwitchStatus, Trigger};

use crate::error::DeviceError;
use crate::UniwillLaptop;

/// Switches that can only be flipped via trigger pulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleSwitch {
    SuperKeyLock,
    Lightbar,
    FanBoost,
}

impl ToggleSwitch {
    fn trigger(self) -> Trigger {
        match self {
            Self::SuperKeyLock => Trigger::SUPER_KEY_LOCK,
            Self::Lightbar => Trigger::LIGHTBAR,
            Self::FanBoost => Trigger::FAN_BOOST,
        }
    }

    fn status(self) -> SwitchStatus {
        match self {
            Self::SuperKeyLock => SwitchStatus::SUPER_KEY_LOCK,
            Self::Lightbar => SwitchStatus::LIGHTBAR,
            Self::FanBoost => SwitchStatus::FAN_BOOST,
        }
    }

    /// The super key lock status bit reads inverted: set means unlocked.
    fn inverted(self) -> bool {
        matches!(self, Self::SuperKeyLock)
    }
}

impl UniwillLaptop {
    pub fn fn_lock(&self) -> Result<bool, DeviceError> {
        let raw = self.regmap().read(addr::BIOS_OEM)?;
        Ok(BiosOem::from_bits_truncate(raw as u8).contains(BiosOem::FN_LOCK_STATUS))
    }

    pub fn set_fn_lock(&self, enabled: bool) -> Result<(), DeviceError> {
        let value = if enabled { BiosOem::FN_LOCK_STATUS.bits() } else { 0 };
        self.regmap().update_bits(
            addr::BIOS_OEM,
            BiosOem::FN_LOCK_STATUS.bits().into(),
            value.into(),
        )?;
        Ok(())
    }

    pub fn touchpad_enabled(&self) -> Result<bool, DeviceError> {
        let raw = self.regmap().read(addr::OEM_4)?;
        Ok(!Oem4::from_bits_truncate(raw as u8).contains(Oem4::TOUCHPAD_TOGGLE_OFF))
    }

    pub fn set_touchpad_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        let value = if enabled { 0 } else { Oem4::TOUCHPAD_TOGGLE_OFF.bits() };
        self.regmap().update_bits(
            addr::OEM_4,
            Oem4::TOUCHPAD_TOGGLE_OFF.bits().into(),
            value.into(),
        )?;
        Ok(())
    }

    /// Current state of a toggle-only switch.
    pub fn switch_state(&self, switch: ToggleSwitch) -> Result<bool, DeviceError> {
        let status = self.regmap().read(addr::SWITCH_STATUS)?;
        Ok(Self::decode_switch(switch, status as u8))
    }

    /// Drive a toggle-only switch to `target`.
    ///
    /// The trigger pulse flips the switch unconditionally, so it is fired
    /// only when the current state differs; pulsing an already-correct
    /// switch would flip it wrong.
    pub fn set_switch_state(&self, switch: ToggleSwitch, target: bool) -> Result<(), DeviceError> {
        let _guard = self.seq_lock.lock();
        let status = self.regmap().read(addr::SWITCH_STATUS)?;
        if Self::decode_switch(switch, status as u8) == target {
            return Ok(());
        }
        let pulse = switch.trigger().bits();
        self.regmap()
            .write_bits(addr::TRIGGER, pulse.into(), pulse.into())?;
        Ok(())
    }

    /// Whether the super key is locked (its hotkey functions disabled).
    pub fn super_key_lock(&self) -> Result<bool, DeviceError> {
        self.switch_state(ToggleSwitch::SuperKeyLock)
    }

    pub fn set_super_key_lock(&self, locked: bool) -> Result<(), DeviceError> {
        self.set_switch_state(ToggleSwitch::SuperKeyLock, locked)
    }

    fn decode_switch(switch: ToggleSwitch, status: u8) -> bool {
        let set = SwitchStatus::from_bits_truncate(status).contains(switch.status());
        if switch.inverted() {
            !set
        } else {
            set
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::attach_sim;

    #[test]
    fn fn_lock_round_trip() {
        let (_sim, laptop) = attach_sim();
        assert_eq!(laptop.fn_lock(), Ok(false));
        laptop.set_fn_lock(true).unwrap();
        assert_eq!(laptop.fn_lock(), Ok(true));
        laptop.set_fn_lock(false).unwrap();
        assert_eq!(laptop.fn_lock(), Ok(false));
    }

    #[test]
    fn touchpad_bit_is_inverted() {
        let (sim, laptop) = attach_sim();
        assert_eq!(laptop.touchpad_enabled(), Ok(true));
        laptop.set_touchpad_enabled(false).unwrap();
        assert_eq!(sim.register(addr::OEM_4).map(|v| v & 0x40), Some(0x40));
        assert_eq!(laptop.touchpad_enabled(), Ok(false));
    }

    #[test]
    fn toggle_fires_only_on_mismatch() {
        let (sim, laptop) = attach_sim();
        // Defaults: super key unlocked (status bit set).
        assert_eq!(laptop.super_key_lock(), Ok(false));

        laptop.set_super_key_lock(false).unwrap();
        assert_eq!(sim.writes_of(addr::TRIGGER), 0);

        laptop.set_super_key_lock(true).unwrap();
        assert_eq!(sim.writes_of(addr::TRIGGER), 1);
        assert_eq!(laptop.super_key_lock(), Ok(true));

        laptop.set_super_key_lock(true).unwrap();
        assert_eq!(sim.writes_of(addr::TRIGGER), 1);
    }

    #[test]
    fn fan_boost_toggle_is_not_inverted() {
        let (sim, laptop) = attach_sim();
        assert_eq!(laptop.switch_state(ToggleSwitch::FanBoost), Ok(false));
        laptop.set_switch_state(ToggleSwitch::FanBoost, true).unwrap();
        assert_eq!(sim.writes_of(addr::TRIGGER), 1);
        assert_eq!(laptop.switch_state(ToggleSwitch::FanBoost), Ok(true));
    }
}
