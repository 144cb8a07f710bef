//! Battery charge limit and telemetry
//!
//! The charge limit shares its register with a status bit, so limit writes
//! are masked read-modify-writes. Telemetry comes from the battery
//! controller block, little-endian byte pairs.

use uniwill_ec::registers::{addr, BatStatus, ChargeCtrl};

use crate::error::DeviceError;
use crate::UniwillLaptop;

/// Battery condition derived from the alert register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryHealth {
    Good,
    /// The EC raised a battery alert; the code is vendor-opaque.
    Alert(u8),
}

impl UniwillLaptop {
    /// Battery charge limit in percent.
    ///
    /// Firmware revisions have been seen reporting values above 100; the
    /// readout is clamped, writes are strict.
    pub fn charge_limit(&self) -> Result<u8, DeviceError> {
        let raw = self.regmap().read(addr::CHARGE_CTRL)?;
        Ok(ChargeCtrl(raw as u8).limit().min(100))
    }

    /// Set the battery charge limit in percent, 1 to 100.
    pub fn set_charge_limit(&self, percent: u8) -> Result<(), DeviceError> {
        if !(1..=100).contains(&percent) {
            return Err(DeviceError::Range { value: percent as i64, min: 1, max: 100 });
        }
        self.regmap().update_bits(
            addr::CHARGE_CTRL,
            ChargeCtrl::LIMIT_MASK.into(),
            percent.into(),
        )?;
        Ok(())
    }

    /// Whether the battery has charged up to the configured limit.
    pub fn charge_limit_reached(&self) -> Result<bool, DeviceError> {
        let raw = self.regmap().read(addr::CHARGE_CTRL)?;
        Ok(ChargeCtrl(raw as u8).reached())
    }

    pub fn battery_health(&self) -> Result<BatteryHealth, DeviceError> {
        let alert = self.regmap().read(addr::BAT_ALERT)? as u8;
        Ok(if alert == 0 { BatteryHealth::Good } else { BatteryHealth::Alert(alert) })
    }

    pub fn battery_discharging(&self) -> Result<bool, DeviceError> {
        let raw = self.regmap().read(addr::BAT_STATUS_1)?;
        Ok(BatStatus::from_bits_truncate(raw as u8).contains(BatStatus::DISCHARGING))
    }

    pub fn battery_voltage_mv(&self) -> Result<u16, DeviceError> {
        Ok(self.regmap().read_le16(addr::BAT_VOLTAGE_1)?)
    }

    pub fn battery_current_ma(&self) -> Result<u16, DeviceError> {
        Ok(self.regmap().read_le16(addr::BAT_CURRENT_1)?)
    }

    pub fn battery_remaining_capacity(&self) -> Result<u16, DeviceError> {
        Ok(self.regmap().read_le16(addr::BAT_REMAIN_CAPACITY_1)?)
    }

    pub fn battery_full_capacity(&self) -> Result<u16, DeviceError> {
        Ok(self.regmap().read_le16(addr::BAT_FULL_CAPACITY_1)?)
    }

    pub fn battery_design_capacity(&self) -> Result<u16, DeviceError> {
        Ok(self.regmap().read_le16(addr::BAT_DESIGN_CAPACITY_1)?)
    }

    pub fn battery_design_voltage_mv(&self) -> Result<u16, DeviceError> {
        Ok(self.regmap().read_le16(addr::BAT_DESIGN_VOLTAGE_1)?)
    }

    pub fn battery_cycle_count(&self) -> Result<u16, DeviceError> {
        Ok(self.regmap().read_le16(addr::BAT_CYCLE_COUNT_1)?)
    }
}
