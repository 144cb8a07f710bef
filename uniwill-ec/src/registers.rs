//! EC register address space for Uniwill notebook firmware
//!
//! The address table is reverse engineered. Some registers overlap in
//! function (fan mode and performance profile share 0x0751) and the set
//! below is the vetted subset, not the full EC RAM.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::error::EcError;

// =============================================================================
// Register addresses
// =============================================================================

pub mod addr {
    // Battery controller block (little-endian byte pairs)
    pub const BAT_POWER_UNIT_1: u16 = 0x0400;
    pub const BAT_DESIGN_CAPACITY_1: u16 = 0x0402;
    pub const BAT_FULL_CAPACITY_1: u16 = 0x0404;
    pub const BAT_DESIGN_VOLTAGE_1: u16 = 0x0408;
    pub const BAT_STATUS_1: u16 = 0x0432;
    pub const BAT_CURRENT_1: u16 = 0x0434;
    pub const BAT_REMAIN_CAPACITY_1: u16 = 0x0436;
    pub const BAT_VOLTAGE_1: u16 = 0x0438;
    pub const BAT_ALERT: u16 = 0x0494;
    pub const BAT_CYCLE_COUNT_1: u16 = 0x04A6;

    // Thermal and fan telemetry
    pub const CPU_TEMP: u16 = 0x043E;
    pub const GPU_TEMP: u16 = 0x044F;
    /// Big-endian byte pair, most significant byte first.
    pub const MAIN_FAN_RPM_1: u16 = 0x0464;
    pub const SECOND_FAN_RPM_1: u16 = 0x046C;
    pub const PWM_1: u16 = 0x075B;
    pub const PWM_2: u16 = 0x075C;
    /// Manual duty registers, distinct from the read-only PWM telemetry.
    pub const PWM_1_WRITEABLE: u16 = 0x1804;
    pub const PWM_2_WRITEABLE: u16 = 0x1809;

    // OEM control block
    pub const PROJECT_ID: u16 = 0x0740;
    pub const AP_OEM: u16 = 0x0741;
    pub const SUPPORT_5: u16 = 0x0742;
    pub const BIOS_OEM: u16 = 0x074E;
    /// Shared register: fan mode in bits 7:6 and 2:0, performance profile
    /// in bits 5:4 of the same byte.
    pub const MANUAL_FAN_CTRL: u16 = 0x0751;
    pub const SUPPORT_1: u16 = 0x0765;
    pub const TRIGGER: u16 = 0x0767;
    pub const SWITCH_STATUS: u16 = 0x0768;
    pub const OEM_4: u16 = 0x07A6;
    pub const CHARGE_CTRL: u16 = 0x07B9;

    // Known but unvetted addresses, kept for reference and future
    // descriptor entries. Not part of [`uniwill_register_table`].
    pub const DEVICE_STATUS: u16 = 0x047B;
    pub const CTGP_DB_CTRL: u16 = 0x0743;
    pub const CTGP_OFFSET: u16 = 0x0744;
    pub const TPP_OFFSET: u16 = 0x0745;
    pub const MAX_TGP: u16 = 0x0746;
    pub const SUPPORT_2: u16 = 0x0766;
    /// Keyboard backlight channels, driven by the EC's own effects engine.
    pub const RGB_RED: u16 = 0x0769;
    pub const RGB_GREEN: u16 = 0x076A;
    pub const RGB_BLUE: u16 = 0x076B;
    pub const ROMID_START: u16 = 0x0770;
    pub const ROMID_EXTRA_1: u16 = 0x077E;
    pub const ROMID_EXTRA_2: u16 = 0x077F;
    pub const BIOS_OEM_2: u16 = 0x0782;
    pub const PL1_SETTING: u16 = 0x0783;
    pub const PL2_SETTING: u16 = 0x0784;
    pub const PL4_SETTING: u16 = 0x0785;
    pub const FAN_DEFAULT: u16 = 0x0786;
    pub const KBD_STATUS: u16 = 0x078C;
    pub const FAN_CTRL: u16 = 0x078E;
    pub const BIOS_OEM_3: u16 = 0x07A3;
    pub const BIOS_BYTE: u16 = 0x07A4;
    pub const OEM_3: u16 = 0x07A5;
    pub const UNIVERSAL_FAN_CTRL: u16 = 0x07C5;
    pub const AP_OEM_6: u16 = 0x07C6;
    pub const CHARGE_PRIO: u16 = 0x07CC;
    // Fan curve tables, FAN_TABLE_LENGTH entries each.
    pub const CPU_TEMP_END_TABLE: u16 = 0x0F00;
    pub const CPU_TEMP_START_TABLE: u16 = 0x0F10;
    pub const CPU_FAN_SPEED_TABLE: u16 = 0x0F20;
    pub const GPU_TEMP_END_TABLE: u16 = 0x0F30;
    pub const GPU_TEMP_START_TABLE: u16 = 0x0F40;
    pub const GPU_FAN_SPEED_TABLE: u16 = 0x0F50;

    // Lightbar, one block per power source
    pub const LIGHTBAR_AC_CTRL: u16 = 0x0748;
    pub const LIGHTBAR_AC_RED: u16 = 0x0749;
    pub const LIGHTBAR_AC_GREEN: u16 = 0x074A;
    pub const LIGHTBAR_AC_BLUE: u16 = 0x074B;
    pub const LIGHTBAR_BAT_CTRL: u16 = 0x07E2;
    pub const LIGHTBAR_BAT_RED: u16 = 0x07E3;
    pub const LIGHTBAR_BAT_GREEN: u16 = 0x07E4;
    pub const LIGHTBAR_BAT_BLUE: u16 = 0x07E5;
}

// =============================================================================
// Bit overlays
// =============================================================================

bitflags! {
    /// Bits of [`addr::AP_OEM`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ApOem: u8 {
        const ENABLE_MANUAL_CTRL = 1 << 0;
        const ITE_KBD_EFFECT_REACTIVE = 1 << 3;
        const FAN_ABNORMAL = 1 << 5;
    }
}

bitflags! {
    /// Capability bits of [`addr::SUPPORT_5`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Support5: u8 {
        const FAN_TURBO_SUPPORTED = 1 << 4;
        const FAN_SUPPORT = 1 << 5;
    }
}

bitflags! {
    /// Capability bits of [`addr::SUPPORT_1`]. Known to read unreliably on
    /// some firmware revisions; probe the feature registers directly instead.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Support1: u8 {
        const SUPER_KEY_LOCK = 1 << 5;
        const LIGHTBAR = 1 << 6;
        const FAN_BOOST = 1 << 7;
    }
}

bitflags! {
    /// Bits of [`addr::BIOS_OEM`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BiosOem: u8 {
        const FN_LOCK_STATUS = 1 << 4;
    }
}

bitflags! {
    /// Bits of [`addr::OEM_4`]. The touchpad bit is inverted: set means
    /// the touchpad is toggled off.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Oem4: u8 {
        const TOUCHPAD_TOGGLE_OFF = 1 << 6;
    }
}

bitflags! {
    /// Toggle pulse bits of [`addr::TRIGGER`]. Writing a set bit flips the
    /// corresponding switch; the register does not hold state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Trigger: u8 {
        const SUPER_KEY_LOCK = 1 << 0;
        const LIGHTBAR = 1 << 1;
        const FAN_BOOST = 1 << 2;
        const SILENT_MODE = 1 << 3;
        const USB_CHARGING = 1 << 4;
    }
}

bitflags! {
    /// Status bits of [`addr::SWITCH_STATUS`]. The super key lock bit is
    /// inverted: set means the super key is unlocked.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SwitchStatus: u8 {
        const SUPER_KEY_LOCK = 1 << 0;
        const LIGHTBAR = 1 << 1;
        const FAN_BOOST = 1 << 2;
    }
}

bitflags! {
    /// Control bits shared by both lightbar banks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LightbarCtrl: u8 {
        const APP_EXISTS = 1 << 0;
        const POWER_SAVE = 1 << 1;
        const S0_OFF = 1 << 2;
        /// Breathing animation while suspended.
        const S3_OFF = 1 << 3;
        /// Rainbow animation until an app takes over.
        const WELCOME = 1 << 7;
    }
}

impl LightbarCtrl {
    /// Settings bits mirrored between the AC and battery banks.
    pub const SETTINGS_MASK: u8 = Self::APP_EXISTS.bits()
        | Self::S0_OFF.bits()
        | Self::S3_OFF.bits()
        | Self::WELCOME.bits();
}

bitflags! {
    /// Bits of [`addr::BAT_STATUS_1`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BatStatus: u8 {
        const DISCHARGING = 1 << 0;
    }
}

/// Overlay of [`addr::MANUAL_FAN_CTRL`].
///
/// Bits 2:0 hold the manual fan level, bits 7:6 select the fan mode and
/// bits 5:4 encode the performance profile. The two features share the
/// byte; their masks are disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualFanCtrl(pub u8);

impl ManualFanCtrl {
    pub const LEVEL_MASK: u8 = 0b0000_0111;
    pub const TURBO: u8 = 1 << 4;
    pub const HIGH: u8 = 1 << 5;
    pub const BOOST: u8 = 1 << 6;
    pub const USER: u8 = 1 << 7;

    pub fn level(self) -> u8 {
        self.0 & Self::LEVEL_MASK
    }
}

/// Overlay of [`addr::CHARGE_CTRL`]: charge limit percentage in bits 6:0,
/// limit-reached status in bit 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeCtrl(pub u8);

impl ChargeCtrl {
    pub const LIMIT_MASK: u8 = 0b0111_1111;
    pub const REACHED: u8 = 1 << 7;

    pub fn limit(self) -> u8 {
        self.0 & Self::LIMIT_MASK
    }

    pub fn reached(self) -> bool {
        self.0 & Self::REACHED != 0
    }
}

// =============================================================================
// Descriptor table
// =============================================================================

/// Access description for one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDesc {
    pub address: u16,
    pub readable: bool,
    pub writable: bool,
    /// Volatile registers change behind the driver's back and are never
    /// cached.
    pub volatile: bool,
}

impl RegisterDesc {
    /// Read-only telemetry that the hardware updates continuously.
    pub const fn telemetry(address: u16) -> Self {
        Self { address, readable: true, writable: false, volatile: true }
    }

    /// Read-only register with a stable value.
    pub const fn read_only(address: u16) -> Self {
        Self { address, readable: true, writable: false, volatile: false }
    }

    /// Read-write register whose value only changes through this driver.
    pub const fn stable(address: u16) -> Self {
        Self { address, readable: true, writable: true, volatile: false }
    }

    /// Read-write register the hardware also changes on its own.
    pub const fn live(address: u16) -> Self {
        Self { address, readable: true, writable: true, volatile: true }
    }

    /// Write-only register.
    pub const fn write_only(address: u16) -> Self {
        Self { address, readable: false, writable: true, volatile: true }
    }
}

/// Validated register descriptor table.
///
/// Construction fails if any address is claimed twice; a silent overwrite
/// would mask a table bug with access-policy consequences.
#[derive(Debug, Clone)]
pub struct RegisterTable {
    descs: HashMap<u16, RegisterDesc>,
}

impl RegisterTable {
    pub fn new(descs: &[RegisterDesc]) -> Result<Self, EcError> {
        let mut map = HashMap::with_capacity(descs.len());
        for desc in descs {
            if map.insert(desc.address, *desc).is_some() {
                return Err(EcError::DuplicateRegister { address: desc.address });
            }
        }
        Ok(Self { descs: map })
    }

    pub fn get(&self, address: u16) -> Option<&RegisterDesc> {
        self.descs.get(&address)
    }

    pub fn len(&self) -> usize {
        self.descs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }
}

/// The vetted register table for current Uniwill firmware.
pub fn uniwill_register_table() -> Result<RegisterTable, EcError> {
    RegisterTable::new(&[
        // Battery controller
        RegisterDesc::telemetry(addr::BAT_POWER_UNIT_1),
        RegisterDesc::telemetry(addr::BAT_POWER_UNIT_1 + 1),
        RegisterDesc::telemetry(addr::BAT_DESIGN_CAPACITY_1),
        RegisterDesc::telemetry(addr::BAT_DESIGN_CAPACITY_1 + 1),
        RegisterDesc::telemetry(addr::BAT_FULL_CAPACITY_1),
        RegisterDesc::telemetry(addr::BAT_FULL_CAPACITY_1 + 1),
        RegisterDesc::telemetry(addr::BAT_DESIGN_VOLTAGE_1),
        RegisterDesc::telemetry(addr::BAT_DESIGN_VOLTAGE_1 + 1),
        RegisterDesc::telemetry(addr::BAT_STATUS_1),
        RegisterDesc::telemetry(addr::BAT_STATUS_1 + 1),
        RegisterDesc::telemetry(addr::BAT_CURRENT_1),
        RegisterDesc::telemetry(addr::BAT_CURRENT_1 + 1),
        RegisterDesc::telemetry(addr::BAT_REMAIN_CAPACITY_1),
        RegisterDesc::telemetry(addr::BAT_REMAIN_CAPACITY_1 + 1),
        RegisterDesc::telemetry(addr::BAT_VOLTAGE_1),
        RegisterDesc::telemetry(addr::BAT_VOLTAGE_1 + 1),
        RegisterDesc::telemetry(addr::BAT_ALERT),
        RegisterDesc::telemetry(addr::BAT_CYCLE_COUNT_1),
        RegisterDesc::telemetry(addr::BAT_CYCLE_COUNT_1 + 1),
        // Thermal and fans
        RegisterDesc::telemetry(addr::CPU_TEMP),
        RegisterDesc::telemetry(addr::GPU_TEMP),
        RegisterDesc::telemetry(addr::MAIN_FAN_RPM_1),
        RegisterDesc::telemetry(addr::MAIN_FAN_RPM_1 + 1),
        RegisterDesc::telemetry(addr::SECOND_FAN_RPM_1),
        RegisterDesc::telemetry(addr::SECOND_FAN_RPM_1 + 1),
        RegisterDesc::telemetry(addr::PWM_1),
        RegisterDesc::telemetry(addr::PWM_2),
        RegisterDesc::write_only(addr::PWM_1_WRITEABLE),
        RegisterDesc::write_only(addr::PWM_2_WRITEABLE),
        // OEM control
        RegisterDesc::read_only(addr::PROJECT_ID),
        RegisterDesc::stable(addr::AP_OEM),
        RegisterDesc::read_only(addr::SUPPORT_5),
        RegisterDesc::stable(addr::BIOS_OEM),
        RegisterDesc::stable(addr::MANUAL_FAN_CTRL),
        RegisterDesc::live(addr::TRIGGER),
        RegisterDesc::telemetry(addr::SWITCH_STATUS),
        RegisterDesc::stable(addr::OEM_4),
        RegisterDesc::live(addr::CHARGE_CTRL),
        // Lightbar
        RegisterDesc::stable(addr::LIGHTBAR_AC_CTRL),
        RegisterDesc::stable(addr::LIGHTBAR_AC_RED),
        RegisterDesc::stable(addr::LIGHTBAR_AC_GREEN),
        RegisterDesc::stable(addr::LIGHTBAR_AC_BLUE),
        RegisterDesc::stable(addr::LIGHTBAR_BAT_CTRL),
        RegisterDesc::stable(addr::LIGHTBAR_BAT_RED),
        RegisterDesc::stable(addr::LIGHTBAR_BAT_GREEN),
        RegisterDesc::stable(addr::LIGHTBAR_BAT_BLUE),
    ])
}
