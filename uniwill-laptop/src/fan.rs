//! Fan mode and manual fan speed control

use tracing::warn;

use uniwill_ec::registers::{addr, ApOem, ManualFanCtrl};

use crate::error::DeviceError;
use crate::UniwillLaptop;

/// Highest manual fan level the firmware accepts.
pub const FAN_LEVEL_MAX: u8 = 7;
/// Full scale of the manual duty registers.
pub const PWM_MAX: u8 = 200;

/// Fan channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fan {
    Main,
    Secondary,
}

impl Fan {
    pub fn label(self) -> &'static str {
        match self {
            Self::Main => "Main",
            Self::Secondary => "Secondary",
        }
    }

    pub(crate) fn rpm_address(self) -> u16 {
        match self {
            Self::Main => addr::MAIN_FAN_RPM_1,
            Self::Secondary => addr::SECOND_FAN_RPM_1,
        }
    }

    pub(crate) fn pwm_address(self) -> u16 {
        match self {
            Self::Main => addr::PWM_1,
            Self::Secondary => addr::PWM_2,
        }
    }

    pub(crate) fn duty_address(self) -> u16 {
        match self {
            Self::Main => addr::PWM_1_WRITEABLE,
            Self::Secondary => addr::PWM_2_WRITEABLE,
        }
    }
}

/// Fan operating mode, decoded from the manual-fan-control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    /// The EC runs its own fan curve.
    Automatic,
    /// Fans pinned to maximum duty.
    Boost,
    /// User-selected level 0 to [`FAN_LEVEL_MAX`].
    Manual(u8),
}

impl FanMode {
    /// Register bits covered by the fan mode encoding. Disjoint from the
    /// performance profile bits in the same register.
    pub const MASK: u8 =
        ManualFanCtrl::LEVEL_MASK | ManualFanCtrl::BOOST | ManualFanCtrl::USER;

    pub fn encode(self) -> Result<u8, DeviceError> {
        match self {
            Self::Automatic => Ok(0),
            Self::Boost => Ok(ManualFanCtrl::BOOST),
            Self::Manual(level) if level <= FAN_LEVEL_MAX => Ok(ManualFanCtrl::USER | level),
            Self::Manual(level) => Err(DeviceError::Range {
                value: level as i64,
                min: 0,
                max: FAN_LEVEL_MAX as i64,
            }),
        }
    }

    /// Decode the fan mode bits. Patterns outside the encoding (boost and
    /// user set together, a level without the user bit) are surfaced, not
    /// guessed at.
    pub fn decode(raw: u8) -> Result<Self, DeviceError> {
        let bits = raw & Self::MASK;
        let boost = bits & ManualFanCtrl::BOOST != 0;
        let user = bits & ManualFanCtrl::USER != 0;
        let level = bits & ManualFanCtrl::LEVEL_MASK;
        match (boost, user, level) {
            (false, false, 0) => Ok(Self::Automatic),
            (true, false, 0) => Ok(Self::Boost),
            (false, true, level) => Ok(Self::Manual(level)),
            _ => Err(DeviceError::UnrecognizedState {
                address: addr::MANUAL_FAN_CTRL,
                value: raw as u16,
            }),
        }
    }
}

impl UniwillLaptop {
    pub fn fan_mode(&self) -> Result<FanMode, DeviceError> {
        let raw = self.regmap().read(addr::MANUAL_FAN_CTRL)?;
        FanMode::decode(raw as u8)
    }

    pub fn set_fan_mode(&self, mode: FanMode) -> Result<(), DeviceError> {
        let encoded = mode.encode()?;
        let _guard = self.seq_lock.lock();
        self.regmap()
            .update_bits(addr::MANUAL_FAN_CTRL, FanMode::MASK.into(), encoded.into())?;
        Ok(())
    }

    /// Set a fan's duty as a percentage.
    ///
    /// Requires manual control mode, which is switched on if the EC lost
    /// it. If the duty write fails the fans are handed back to the
    /// automatic curve rather than left at a stale manual duty.
    pub fn set_fan_speed(&self, fan: Fan, percent: u8) -> Result<(), DeviceError> {
        if percent > 100 {
            return Err(DeviceError::Range { value: percent as i64, min: 0, max: 100 });
        }
        if !self.capabilities().fan_control {
            return Err(DeviceError::NotSupported("manual fan control"));
        }

        let _guard = self.seq_lock.lock();
        self.regmap()
            .set_bits(addr::AP_OEM, ApOem::ENABLE_MANUAL_CTRL.bits().into())?;

        let duty = (percent as u16 * PWM_MAX as u16) / 100;
        if let Err(err) = self.regmap().write(fan.duty_address(), duty) {
            warn!("manual duty write for {} fan failed, reverting to automatic: {err}", fan.label());
            if let Err(revert) = self
                .regmap()
                .update_bits(addr::MANUAL_FAN_CTRL, FanMode::MASK.into(), 0)
            {
                warn!("fallback to automatic fan curve also failed: {revert}");
            }
            return Err(err.into());
        }
        Ok(())
    }

    /// Firmware-flagged fan failure.
    pub fn fan_abnormal(&self) -> Result<bool, DeviceError> {
        let raw = self.regmap().read(addr::AP_OEM)?;
        Ok(ApOem::from_bits_truncate(raw as u8).contains(ApOem::FAN_ABNORMAL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::attach_sim;
    use uniwill_ec::EcError;

    #[test]
    fn mode_codec_round_trips() {
        for mode in [FanMode::Automatic, FanMode::Boost, FanMode::Manual(0), FanMode::Manual(7)] {
            assert_eq!(FanMode::decode(mode.encode().unwrap()), Ok(mode));
        }
    }

    #[test]
    fn decode_rejects_mixed_patterns() {
        // Boost and user set together.
        assert!(matches!(
            FanMode::decode(ManualFanCtrl::BOOST | ManualFanCtrl::USER),
            Err(DeviceError::UnrecognizedState { .. })
        ));
        // Level bits without the user bit.
        assert!(matches!(
            FanMode::decode(0x03),
            Err(DeviceError::UnrecognizedState { .. })
        ));
    }

    #[test]
    fn decode_ignores_profile_bits() {
        assert_eq!(FanMode::decode(ManualFanCtrl::HIGH), Ok(FanMode::Automatic));
    }

    #[test]
    fn manual_level_out_of_range() {
        assert!(matches!(
            FanMode::Manual(8).encode(),
            Err(DeviceError::Range { .. })
        ));
    }

    #[test]
    fn set_fan_speed_scales_to_duty_range() {
        let (sim, laptop) = attach_sim();
        laptop.set_fan_speed(Fan::Main, 50).unwrap();
        assert_eq!(sim.register(addr::PWM_1_WRITEABLE), Some(100));
        laptop.set_fan_speed(Fan::Secondary, 100).unwrap();
        assert_eq!(sim.register(addr::PWM_2_WRITEABLE), Some(PWM_MAX));
    }

    #[test]
    fn failed_duty_write_reverts_to_automatic() {
        let (sim, laptop) = attach_sim();
        laptop.set_fan_mode(FanMode::Manual(3)).unwrap();
        sim.remove_register(addr::PWM_1_WRITEABLE);
        let result = laptop.set_fan_speed(Fan::Main, 40);
        assert_eq!(
            result.err(),
            Some(DeviceError::Ec(EcError::NoSuchRegister {
                address: addr::PWM_1_WRITEABLE
            }))
        );
        assert_eq!(laptop.fan_mode(), Ok(FanMode::Automatic));
    }
}
