//! Platform performance profile
//!
//! The profile lives in bits 5:4 of the shared fan control register,
//! disjoint from the fan mode bits.

use uniwill_ec::registers::{addr, ManualFanCtrl};

use crate::error::DeviceError;
use crate::UniwillLaptop;

/// Platform performance profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformProfile {
    Balanced,
    BalancedPerformance,
    Performance,
}

impl PlatformProfile {
    /// Register bits covered by the profile encoding.
    pub const MASK: u8 = ManualFanCtrl::TURBO | ManualFanCtrl::HIGH;

    pub fn encode(self) -> u8 {
        match self {
            Self::Balanced => 0,
            Self::BalancedPerformance => ManualFanCtrl::HIGH,
            Self::Performance => ManualFanCtrl::HIGH | ManualFanCtrl::TURBO,
        }
    }

    /// Decode the profile bits. The fourth pattern (turbo without high) is
    /// not a profile this driver knows; it is surfaced, never defaulted.
    pub fn decode(raw: u8) -> Result<Self, DeviceError> {
        let bits = raw & Self::MASK;
        if bits == 0 {
            Ok(Self::Balanced)
        } else if bits == ManualFanCtrl::HIGH {
            Ok(Self::BalancedPerformance)
        } else if bits == (ManualFanCtrl::HIGH | ManualFanCtrl::TURBO) {
            Ok(Self::Performance)
        } else {
            Err(DeviceError::UnrecognizedState {
                address: addr::MANUAL_FAN_CTRL,
                value: raw as u16,
            })
        }
    }

    /// Next profile in the hotkey cycling order, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Balanced => Self::BalancedPerformance,
            Self::BalancedPerformance => Self::Performance,
            Self::Performance => Self::Balanced,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::BalancedPerformance => "balanced-performance",
            Self::Performance => "performance",
        }
    }
}

impl UniwillLaptop {
    pub fn platform_profile(&self) -> Result<PlatformProfile, DeviceError> {
        let raw = self.regmap().read(addr::MANUAL_FAN_CTRL)?;
        PlatformProfile::decode(raw as u8)
    }

    pub fn set_platform_profile(&self, profile: PlatformProfile) -> Result<(), DeviceError> {
        let _guard = self.seq_lock.lock();
        self.regmap().update_bits(
            addr::MANUAL_FAN_CTRL,
            PlatformProfile::MASK.into(),
            profile.encode().into(),
        )?;
        Ok(())
    }

    /// Advance to the next profile, as the performance hotkey does.
    pub fn cycle_platform_profile(&self) -> Result<PlatformProfile, DeviceError> {
        let _guard = self.seq_lock.lock();
        let raw = self.regmap().read(addr::MANUAL_FAN_CTRL)?;
        let next = PlatformProfile::decode(raw as u8)?.next();
        self.regmap().update_bits(
            addr::MANUAL_FAN_CTRL,
            PlatformProfile::MASK.into(),
            next.encode().into(),
        )?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fan::FanMode;
    use crate::testutil::attach_sim;

    #[test]
    fn codec_covers_all_profiles() {
        for profile in [
            PlatformProfile::Balanced,
            PlatformProfile::BalancedPerformance,
            PlatformProfile::Performance,
        ] {
            assert_eq!(PlatformProfile::decode(profile.encode()), Ok(profile));
        }
    }

    #[test]
    fn unknown_pattern_is_surfaced() {
        assert_eq!(
            PlatformProfile::decode(ManualFanCtrl::TURBO),
            Err(DeviceError::UnrecognizedState {
                address: addr::MANUAL_FAN_CTRL,
                value: ManualFanCtrl::TURBO as u16,
            })
        );
    }

    #[test]
    fn decode_ignores_fan_mode_bits() {
        let raw = ManualFanCtrl::USER | 0x03 | ManualFanCtrl::HIGH;
        assert_eq!(PlatformProfile::decode(raw), Ok(PlatformProfile::BalancedPerformance));
    }

    #[test]
    fn cycle_wraps_around() {
        let (_sim, laptop) = attach_sim();
        assert_eq!(laptop.platform_profile(), Ok(PlatformProfile::Balanced));
        assert_eq!(laptop.cycle_platform_profile(), Ok(PlatformProfile::BalancedPerformance));
        assert_eq!(laptop.cycle_platform_profile(), Ok(PlatformProfile::Performance));
        assert_eq!(laptop.cycle_platform_profile(), Ok(PlatformProfile::Balanced));
    }

    #[test]
    fn profile_writes_leave_fan_mode_alone() {
        let (_sim, laptop) = attach_sim();
        laptop.set_fan_mode(FanMode::Manual(5)).unwrap();
        laptop.set_platform_profile(PlatformProfile::Performance).unwrap();
        assert_eq!(laptop.fan_mode(), Ok(FanMode::Manual(5)));
        assert_eq!(laptop.platform_profile(), Ok(PlatformProfile::Performance));
    }
}
