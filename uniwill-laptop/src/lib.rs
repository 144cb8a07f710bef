//! High-level notebook controls for Uniwill EC firmware
//!
//! [`UniwillLaptop`] wraps the cached register map from `uniwill-ec` and
//! exposes the device features as typed operations: fan mode and speed,
//! performance profile, battery charge limit, lightbar, toggle switches,
//! thermal sensors and the suspend/resume sequence.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use uniwill_ec::registers::{addr, ApOem, Support5};
use uniwill_ec::{
    uniwill_register_table, EcBus, EcError, EventBus, EventOutcome, EventSubscription,
    FirmwareMethod, RegisterMap, RegisterWidth,
};

pub mod battery;
pub mod error;
pub mod fan;
pub mod lightbar;
pub mod pm;
pub mod profile;
pub mod sensors;
pub mod switches;

pub use battery::BatteryHealth;
pub use error::DeviceError;
pub use fan::{Fan, FanMode};
pub use profile::PlatformProfile;
pub use switches::ToggleSwitch;
pub use sensors::TempSensor;

/// Feature support discovered at attach time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub lightbar: bool,
    pub fan_control: bool,
    pub fan_turbo: bool,
    /// Number of fan duty channels answering on the PWM registers.
    pub pwm_channels: u8,
}

impl Capabilities {
    fn probe(regmap: &RegisterMap) -> Self {
        let support5 = match regmap.read(addr::SUPPORT_5) {
            Ok(value) => Support5::from_bits_truncate(value as u8),
            Err(err) => {
                warn!("capability register unreadable: {err}");
                Support5::empty()
            }
        };
        let pwm_channels = [addr::PWM_1, addr::PWM_2]
            .into_iter()
            .take_while(|&address| probe_register(regmap, address))
            .count() as u8;
        Self {
            lightbar: probe_register(regmap, addr::LIGHTBAR_AC_CTRL),
            fan_control: support5.contains(Support5::FAN_SUPPORT),
            fan_turbo: support5.contains(Support5::FAN_TURBO_SUPPORTED),
            pwm_channels,
        }
    }
}

fn probe_register(regmap: &RegisterMap, address: u16) -> bool {
    match regmap.read(address) {
        Ok(_) => true,
        Err(EcError::NoSuchRegister { .. }) => false,
        Err(err) => {
            warn!("probe of 0x{address:04X} failed: {err}");
            false
        }
    }
}

/// State carried across a suspend/resume cycle.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PmSnapshot {
    pub(crate) switch_status: u8,
    pub(crate) charge_limit: u8,
    pub(crate) suspended: bool,
}

/// One attached Uniwill notebook.
pub struct UniwillLaptop {
    regmap: Arc<RegisterMap>,
    caps: Capabilities,
    /// Serializes feature sequences that span multiple register accesses
    /// (toggle-if-different, mirrored lightbar writes, suspend/resume).
    pub(crate) seq_lock: Mutex<()>,
    pub(crate) snapshot: Mutex<PmSnapshot>,
}

impl UniwillLaptop {
    /// Attach to the EC through the given firmware method.
    ///
    /// Validates the register table, reads the project id, switches the EC
    /// into manual-control mode and, where supported, puts the lightbar
    /// under driver control.
    pub fn attach(method: Box<dyn FirmwareMethod>) -> Result<Self, DeviceError> {
        let bus = EcBus::new(method);
        let table = uniwill_register_table()?;
        let regmap = Arc::new(RegisterMap::new(bus, table, RegisterWidth::W8));

        let project_id = regmap.read(addr::PROJECT_ID)?;
        debug!("EC project id 0x{project_id:02X}");

        regmap.set_bits(addr::AP_OEM, ApOem::ENABLE_MANUAL_CTRL.bits().into())?;

        let caps = Capabilities::probe(&regmap);
        info!(
            "attached: lightbar={} fan_control={} fan_turbo={} pwm_channels={}",
            caps.lightbar, caps.fan_control, caps.fan_turbo, caps.pwm_channels
        );

        let laptop = Self {
            regmap,
            caps,
            seq_lock: Mutex::new(()),
            snapshot: Mutex::new(PmSnapshot::default()),
        };
        if laptop.caps.lightbar {
            laptop.lightbar_init()?;
        }
        Ok(laptop)
    }

    /// Hand fan and lighting control back to the EC. Called before the
    /// driver goes away; not on suspend, which has its own sequence.
    pub fn shutdown(&self) -> Result<(), DeviceError> {
        self.regmap
            .clear_bits(addr::AP_OEM, ApOem::ENABLE_MANUAL_CTRL.bits().into())?;
        Ok(())
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// The underlying register map, for callers that need raw access.
    pub fn regmap(&self) -> &Arc<RegisterMap> {
        &self.regmap
    }

    /// Wire the device's own event reactions onto the bus.
    ///
    /// A performance-mode hotkey event advances the platform profile and is
    /// claimed; switch-state-changed events refresh the switch snapshot and
    /// fall through so observers still see them. The returned subscriptions
    /// unregister on drop.
    pub fn subscribe_events(self: &Arc<Self>, bus: &EventBus) -> Vec<EventSubscription> {
        use uniwill_ec::events::code;

        let device = Arc::downgrade(self);
        let subscription = bus.subscribe(Box::new(move |event| {
            let Some(device) = device.upgrade() else {
                return EventOutcome::Pass;
            };
            match event {
                code::OSD_PERF_MODE_CHANGED => {
                    if let Err(err) = device.cycle_platform_profile() {
                        warn!("profile cycle from hotkey failed: {err}");
                    }
                    EventOutcome::Handled
                }
                code::OSD_SUPER_KEY_LOCK_TOGGLE
                | code::OSD_LIGHTBAR_STATE_CHANGED
                | code::OSD_FAN_BOOST_STATE_CHANGED => {
                    device.refresh_switch_snapshot();
                    EventOutcome::Pass
                }
                _ => EventOutcome::Pass,
            }
        }));
        vec![subscription]
    }

    fn refresh_switch_snapshot(&self) {
        match self.regmap.read(addr::SWITCH_STATUS) {
            Ok(status) => self.snapshot.lock().switch_status = status as u8,
            Err(err) => warn!("switch status refresh failed: {err}"),
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use uniwill_ec::SimulatedEc;

    /// Attach a device over a freshly seeded simulator, with the call log
    /// cleared of the attach traffic.
    pub(crate) fn attach_sim() -> (SimulatedEc, UniwillLaptop) {
        let sim = SimulatedEc::with_uniwill_defaults();
        let laptop = UniwillLaptop::attach(Box::new(sim.clone())).expect("attach failed");
        sim.clear_calls();
        (sim, laptop)
    }
}
