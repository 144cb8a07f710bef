//! Simulated EC firmware backend
//!
//! Implements [`FirmwareMethod`] over an in-memory register file, close
//! enough to the hardware for tests and hardware-less consumers: unknown
//! addresses answer with the sentinel, trigger-pulse writes flip the
//! corresponding switch status bits, and faults and latency can be
//! injected per call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::EcError;
use crate::registers::{addr, SwitchStatus, Trigger};
use crate::transport::FirmwareMethod;
use crate::wire::{MethodBuffer, NO_SUCH_REGISTER};

/// One observed firmware call, for test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimCall {
    pub address: u16,
    pub value: u16,
    pub is_read: bool,
}

#[derive(Default)]
struct SimState {
    registers: HashMap<u16, u8>,
    calls: Vec<SimCall>,
    fail_next: Option<EcError>,
    call_delay: Option<Duration>,
}

/// In-memory EC model. Clones share the same state, so a test can keep a
/// handle after handing the simulator to the bus.
#[derive(Clone, Default)]
pub struct SimulatedEc {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedEc {
    /// Empty register file; every access answers with the sentinel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register file seeded with plausible values for every address in the
    /// vetted Uniwill table.
    pub fn with_uniwill_defaults() -> Self {
        let sim = Self::new();
        {
            let mut state = sim.state.lock();
            let regs = &mut state.registers;
            // Battery controller: ~48 Wh pack, discharging at 1.2 A.
            regs.insert(addr::BAT_POWER_UNIT_1, 0x00);
            regs.insert(addr::BAT_POWER_UNIT_1 + 1, 0x00);
            regs.insert(addr::BAT_DESIGN_CAPACITY_1, 0xC0);
            regs.insert(addr::BAT_DESIGN_CAPACITY_1 + 1, 0x12);
            regs.insert(addr::BAT_FULL_CAPACITY_1, 0x50);
            regs.insert(addr::BAT_FULL_CAPACITY_1 + 1, 0x11);
            regs.insert(addr::BAT_DESIGN_VOLTAGE_1, 0xF0);
            regs.insert(addr::BAT_DESIGN_VOLTAGE_1 + 1, 0x2A);
            regs.insert(addr::BAT_STATUS_1, 0x01);
            regs.insert(addr::BAT_STATUS_1 + 1, 0x00);
            regs.insert(addr::BAT_CURRENT_1, 0xB0);
            regs.insert(addr::BAT_CURRENT_1 + 1, 0x04);
            regs.insert(addr::BAT_REMAIN_CAPACITY_1, 0x10);
            regs.insert(addr::BAT_REMAIN_CAPACITY_1 + 1, 0x0E);
            regs.insert(addr::BAT_VOLTAGE_1, 0x2C);
            regs.insert(addr::BAT_VOLTAGE_1 + 1, 0x2B);
            regs.insert(addr::BAT_ALERT, 0x00);
            regs.insert(addr::BAT_CYCLE_COUNT_1, 0x2A);
            regs.insert(addr::BAT_CYCLE_COUNT_1 + 1, 0x00);
            // Thermal and fans
            regs.insert(addr::CPU_TEMP, 45);
            regs.insert(addr::GPU_TEMP, 40);
            regs.insert(addr::MAIN_FAN_RPM_1, 0x0B);
            regs.insert(addr::MAIN_FAN_RPM_1 + 1, 0xB8);
            regs.insert(addr::SECOND_FAN_RPM_1, 0x0A);
            regs.insert(addr::SECOND_FAN_RPM_1 + 1, 0x28);
            regs.insert(addr::PWM_1, 80);
            regs.insert(addr::PWM_2, 60);
            regs.insert(addr::PWM_1_WRITEABLE, 0);
            regs.insert(addr::PWM_2_WRITEABLE, 0);
            // OEM control
            regs.insert(addr::PROJECT_ID, 0x10);
            regs.insert(addr::AP_OEM, 0x00);
            regs.insert(
                addr::SUPPORT_5,
                0x10 | 0x20, // FAN_TURBO_SUPPORTED | FAN_SUPPORT
            );
            regs.insert(addr::BIOS_OEM, 0x00);
            regs.insert(addr::MANUAL_FAN_CTRL, 0x00);
            regs.insert(addr::SUPPORT_1, 0xE0);
            regs.insert(addr::TRIGGER, 0x00);
            // Super key lock bit set means unlocked.
            regs.insert(addr::SWITCH_STATUS, 0x01);
            regs.insert(addr::OEM_4, 0x00);
            regs.insert(addr::CHARGE_CTRL, 100);
            // Lightbar: welcome animation running, as after cold boot.
            regs.insert(addr::LIGHTBAR_AC_CTRL, 0x80);
            regs.insert(addr::LIGHTBAR_AC_RED, 0x00);
            regs.insert(addr::LIGHTBAR_AC_GREEN, 0x00);
            regs.insert(addr::LIGHTBAR_AC_BLUE, 0x00);
            regs.insert(addr::LIGHTBAR_BAT_CTRL, 0x80);
            regs.insert(addr::LIGHTBAR_BAT_RED, 0x00);
            regs.insert(addr::LIGHTBAR_BAT_GREEN, 0x00);
            regs.insert(addr::LIGHTBAR_BAT_BLUE, 0x00);
        }
        sim
    }

    pub fn set_register(&self, address: u16, value: u8) {
        self.state.lock().registers.insert(address, value);
    }

    pub fn register(&self, address: u16) -> Option<u8> {
        self.state.lock().registers.get(&address).copied()
    }

    pub fn remove_register(&self, address: u16) {
        self.state.lock().registers.remove(&address);
    }

    /// Fail the next firmware call with the given error.
    pub fn inject_failure(&self, error: EcError) {
        self.state.lock().fail_next = Some(error);
    }

    /// Sleep for `delay` inside every firmware call, to widen race windows.
    pub fn set_call_delay(&self, delay: Duration) {
        self.state.lock().call_delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn reads_of(&self, address: u16) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.is_read && c.address == address)
            .count()
    }

    pub fn writes_of(&self, address: u16) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| !c.is_read && c.address == address)
            .count()
    }

    /// Trigger-pulse side effect: each set pulse bit flips its switch
    /// status bit.
    fn apply_trigger(registers: &mut HashMap<u16, u8>, pulse: u8) {
        let pulse = Trigger::from_bits_truncate(pulse);
        let mut status =
            SwitchStatus::from_bits_truncate(registers.get(&addr::SWITCH_STATUS).copied().unwrap_or(0));
        if pulse.contains(Trigger::SUPER_KEY_LOCK) {
            status.toggle(SwitchStatus::SUPER_KEY_LOCK);
        }
        if pulse.contains(Trigger::LIGHTBAR) {
            status.toggle(SwitchStatus::LIGHTBAR);
        }
        if pulse.contains(Trigger::FAN_BOOST) {
            status.toggle(SwitchStatus::FAN_BOOST);
        }
        registers.insert(addr::SWITCH_STATUS, status.bits());
    }
}

impl FirmwareMethod for SimulatedEc {
    fn evaluate(&self, input: &MethodBuffer) -> Result<Vec<u8>, EcError> {
        let delay = self.state.lock().call_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock();
        state.calls.push(SimCall {
            address: input.address(),
            value: input.data(),
            is_read: input.is_read(),
        });

        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }

        if !state.registers.contains_key(&input.address()) {
            return Ok(NO_SUCH_REGISTER.to_le_bytes().to_vec());
        }

        if input.is_read() {
            let value = state.registers[&input.address()] as u32;
            Ok(value.to_le_bytes().to_vec())
        } else {
            let value = input.data() as u8;
            if input.address() == addr::TRIGGER {
                Self::apply_trigger(&mut state.registers, value);
            } else {
                state.registers.insert(input.address(), value);
            }
            Ok(0u32.to_le_bytes().to_vec())
        }
    }
}
