//! Thermal and fan telemetry

use uniwill_ec::registers::addr;

use crate::error::DeviceError;
use crate::fan::{Fan, PWM_MAX};
use crate::UniwillLaptop;

/// Temperature channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempSensor {
    Cpu,
    Gpu,
}

impl TempSensor {
    pub fn label(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Gpu => "GPU",
        }
    }

    fn address(self) -> u16 {
        match self {
            Self::Cpu => addr::CPU_TEMP,
            Self::Gpu => addr::GPU_TEMP,
        }
    }
}

impl UniwillLaptop {
    /// Temperature in millidegrees Celsius.
    pub fn temperature_mdeg(&self, sensor: TempSensor) -> Result<u32, DeviceError> {
        let raw = self.regmap().read(sensor.address())?;
        Ok(raw as u32 * 1000)
    }

    /// Fan speed in RPM, read as a big-endian byte pair.
    pub fn fan_rpm(&self, fan: Fan) -> Result<u16, DeviceError> {
        Ok(self.regmap().read_be16(fan.rpm_address())?)
    }

    /// Current fan duty scaled from the hardware's 0-200 range to the
    /// conventional 0-255.
    pub fn pwm(&self, fan: Fan) -> Result<u8, DeviceError> {
        let raw = self.regmap().read(fan.pwm_address())?.min(PWM_MAX as u16);
        Ok((raw as u32 * 255 / PWM_MAX as u32) as u8)
    }
}
