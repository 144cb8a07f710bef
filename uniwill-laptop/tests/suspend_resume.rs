//! Suspend/resume behavior against the simulated EC.

use uniwill_ec::registers::addr;
use uniwill_ec::{EcError, SimulatedEc};
use uniwill_laptop::{DeviceError, UniwillLaptop};

fn attach() -> (SimulatedEc, UniwillLaptop) {
    let sim = SimulatedEc::with_uniwill_defaults();
    let laptop = UniwillLaptop::attach(Box::new(sim.clone())).expect("attach failed");
    sim.clear_calls();
    (sim, laptop)
}

#[test]
fn suspend_hands_control_back_and_goes_offline() {
    let (sim, laptop) = attach();
    laptop.suspend().unwrap();

    // Manual control bit cleared on the hardware...
    assert_eq!(sim.register(addr::AP_OEM).map(|v| v & 0x01), Some(0x00));
    // ...but the map is offline and still serves cached configuration.
    assert!(laptop.regmap().is_cache_only());
    assert_eq!(laptop.regmap().read(addr::AP_OEM), Ok(0x01));

    // Volatile state is unreachable while asleep.
    assert_eq!(
        laptop.temperature_mdeg(uniwill_laptop::TempSensor::Cpu),
        Err(DeviceError::Ec(EcError::Offline))
    );
    sim.clear_calls();
    let _ = laptop.super_key_lock();
    assert!(sim.calls().is_empty(), "no transport traffic while offline");
}

#[test]
fn resume_replays_configuration_lost_in_sleep() {
    let (sim, laptop) = attach();
    laptop.set_charge_limit(80).unwrap();
    laptop.suspend().unwrap();

    // Firmware forgets the driver's configuration during sleep.
    sim.set_register(addr::AP_OEM, 0x00);
    sim.set_register(addr::CHARGE_CTRL, 100);

    laptop.resume().unwrap();
    assert!(!laptop.regmap().is_cache_only());
    assert_eq!(sim.register(addr::AP_OEM).map(|v| v & 0x01), Some(0x01));
    assert_eq!(sim.register(addr::CHARGE_CTRL).map(|v| v & 0x7F), Some(80));
}

#[test]
fn resume_without_drift_writes_nothing_corrective() {
    let (sim, laptop) = attach();
    laptop.set_charge_limit(90).unwrap();
    laptop.suspend().unwrap();
    sim.clear_calls();

    laptop.resume().unwrap();
    // Charge limit still matches the snapshot: no corrective write.
    assert_eq!(sim.writes_of(addr::CHARGE_CTRL), 0);
    // Switch status matches the snapshot: no toggle pulse.
    assert_eq!(sim.writes_of(addr::TRIGGER), 0);
}

#[test]
fn super_key_drift_gets_exactly_one_corrective_pulse() {
    let (sim, laptop) = attach();
    laptop.set_super_key_lock(true).unwrap();
    laptop.suspend().unwrap();

    // The user flips the super key lock while the OS is asleep.
    let status = sim.register(addr::SWITCH_STATUS).unwrap();
    sim.set_register(addr::SWITCH_STATUS, status ^ 0x01);
    sim.clear_calls();

    laptop.resume().unwrap();
    assert_eq!(sim.writes_of(addr::TRIGGER), 1);
    assert_eq!(laptop.super_key_lock(), Ok(true));
}

#[test]
fn writes_while_asleep_are_buffered_and_replayed() {
    let (sim, laptop) = attach();
    // Warm the cache so the offline read-modify-write can be served.
    laptop.fn_lock().unwrap();
    laptop.suspend().unwrap();
    sim.clear_calls();

    laptop.set_fn_lock(true).unwrap();
    assert_eq!(sim.writes_of(addr::BIOS_OEM), 0, "buffered, not written");
    assert_eq!(laptop.fn_lock(), Ok(true), "visible through the cache");

    laptop.resume().unwrap();
    assert_eq!(sim.register(addr::BIOS_OEM).map(|v| v & 0x10), Some(0x10));
}

#[test]
fn failed_suspend_is_reverted() {
    let (sim, laptop) = attach();
    sim.inject_failure(EcError::Io("firmware busy".into()));

    assert!(laptop.suspend().is_err());
    assert!(!laptop.regmap().is_cache_only());
    // The device keeps running with manual control enabled.
    assert_eq!(sim.register(addr::AP_OEM).map(|v| v & 0x01), Some(0x01));
    assert!(laptop.set_charge_limit(70).is_ok());
}

#[test]
fn resume_without_suspend_is_a_no_op() {
    let (sim, laptop) = attach();
    laptop.resume().unwrap();
    assert!(sim.calls().is_empty());
}
