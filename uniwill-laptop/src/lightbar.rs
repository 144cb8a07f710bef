//! Lightbar control
//!
//! The EC keeps two lightbar banks, one used on AC and one on battery.
//! The driver treats them as a single light: every setting and channel
//! write goes to both banks so the bar does not change when the power
//! source flips.

use uniwill_ec::registers::{addr, LightbarCtrl};

use crate::error::DeviceError;
use crate::UniwillLaptop;

const AC_CHANNELS: [u16; 3] = [
    addr::LIGHTBAR_AC_RED,
    addr::LIGHTBAR_AC_GREEN,
    addr::LIGHTBAR_AC_BLUE,
];
const BAT_CHANNELS: [u16; 3] = [
    addr::LIGHTBAR_BAT_RED,
    addr::LIGHTBAR_BAT_GREEN,
    addr::LIGHTBAR_BAT_BLUE,
];

impl UniwillLaptop {
    /// Take the lightbar under driver control: stop the firmware's welcome
    /// animation, keep the suspend breathing animation off and mirror the
    /// AC bank onto the battery bank.
    pub(crate) fn lightbar_init(&self) -> Result<(), DeviceError> {
        let mut ctrl = self.regmap().read(addr::LIGHTBAR_AC_CTRL)? as u8;
        ctrl |= LightbarCtrl::APP_EXISTS.bits() | LightbarCtrl::S3_OFF.bits();
        ctrl &= !LightbarCtrl::WELCOME.bits();
        self.regmap().write(addr::LIGHTBAR_AC_CTRL, ctrl.into())?;
        self.regmap().update_bits(
            addr::LIGHTBAR_BAT_CTRL,
            LightbarCtrl::SETTINGS_MASK.into(),
            ctrl.into(),
        )?;
        for (ac, bat) in AC_CHANNELS.iter().zip(BAT_CHANNELS) {
            let value = self.regmap().read(*ac)?;
            self.regmap().write(bat, value)?;
        }
        Ok(())
    }

    /// Set the lightbar color on both banks.
    pub fn set_lightbar_color(&self, rgb: [u8; 3]) -> Result<(), DeviceError> {
        if !self.capabilities().lightbar {
            return Err(DeviceError::NotSupported("lightbar"));
        }
        let _guard = self.seq_lock.lock();
        for ((ac, bat), value) in AC_CHANNELS.iter().zip(BAT_CHANNELS).zip(rgb) {
            self.regmap().write(*ac, value.into())?;
            self.regmap().write(bat, value.into())?;
        }
        Ok(())
    }

    pub fn lightbar_color(&self) -> Result<[u8; 3], DeviceError> {
        if !self.capabilities().lightbar {
            return Err(DeviceError::NotSupported("lightbar"));
        }
        let mut rgb = [0u8; 3];
        for (slot, address) in rgb.iter_mut().zip(AC_CHANNELS) {
            *slot = self.regmap().read(address)? as u8;
        }
        Ok(rgb)
    }

    /// Switch the bar on or off without touching the channel intensities.
    pub fn set_lightbar_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        if !self.capabilities().lightbar {
            return Err(DeviceError::NotSupported("lightbar"));
        }
        let off = if enabled { 0 } else { LightbarCtrl::S0_OFF.bits() };
        let _guard = self.seq_lock.lock();
        self.regmap()
            .update_bits(addr::LIGHTBAR_AC_CTRL, LightbarCtrl::S0_OFF.bits().into(), off.into())?;
        self.regmap()
            .update_bits(addr::LIGHTBAR_BAT_CTRL, LightbarCtrl::S0_OFF.bits().into(), off.into())?;
        Ok(())
    }

    pub fn lightbar_enabled(&self) -> Result<bool, DeviceError> {
        if !self.capabilities().lightbar {
            return Err(DeviceError::NotSupported("lightbar"));
        }
        let ctrl = self.regmap().read(addr::LIGHTBAR_AC_CTRL)?;
        Ok(!LightbarCtrl::from_bits_truncate(ctrl as u8).contains(LightbarCtrl::S0_OFF))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::attach_sim;

    #[test]
    fn init_stops_welcome_and_claims_the_bar() {
        let (sim, _laptop) = attach_sim();
        let ctrl = LightbarCtrl::from_bits_truncate(sim.register(addr::LIGHTBAR_AC_CTRL).unwrap());
        assert!(ctrl.contains(LightbarCtrl::APP_EXISTS));
        assert!(ctrl.contains(LightbarCtrl::S3_OFF));
        assert!(!ctrl.contains(LightbarCtrl::WELCOME));
        let bat = LightbarCtrl::from_bits_truncate(sim.register(addr::LIGHTBAR_BAT_CTRL).unwrap());
        assert_eq!(bat & LightbarCtrl::from_bits_truncate(LightbarCtrl::SETTINGS_MASK), ctrl);
    }

    #[test]
    fn color_writes_hit_both_banks() {
        let (sim, laptop) = attach_sim();
        laptop.set_lightbar_color([0x10, 0x20, 0x30]).unwrap();
        assert_eq!(sim.register(addr::LIGHTBAR_AC_RED), Some(0x10));
        assert_eq!(sim.register(addr::LIGHTBAR_AC_GREEN), Some(0x20));
        assert_eq!(sim.register(addr::LIGHTBAR_AC_BLUE), Some(0x30));
        assert_eq!(sim.register(addr::LIGHTBAR_BAT_RED), Some(0x10));
        assert_eq!(sim.register(addr::LIGHTBAR_BAT_GREEN), Some(0x20));
        assert_eq!(sim.register(addr::LIGHTBAR_BAT_BLUE), Some(0x30));
        assert_eq!(laptop.lightbar_color(), Ok([0x10, 0x20, 0x30]));
    }

    #[test]
    fn enable_toggles_only_the_s0_bit() {
        let (sim, laptop) = attach_sim();
        laptop.set_lightbar_color([1, 2, 3]).unwrap();
        laptop.set_lightbar_enabled(false).unwrap();
        assert_eq!(laptop.lightbar_enabled(), Ok(false));
        // Channel values survive the off switch.
        assert_eq!(sim.register(addr::LIGHTBAR_AC_RED), Some(1));
        laptop.set_lightbar_enabled(true).unwrap();
        assert_eq!(laptop.lightbar_enabled(), Ok(true));
    }

    #[test]
    fn absent_lightbar_is_not_supported() {
        let (sim, _) = attach_sim();
        sim.remove_register(addr::LIGHTBAR_AC_CTRL);
        let laptop2 = crate::UniwillLaptop::attach(Box::new(sim)).unwrap();
        assert_eq!(
            laptop2.set_lightbar_color([0, 0, 0]),
            Err(DeviceError::NotSupported("lightbar"))
        );
    }
}
