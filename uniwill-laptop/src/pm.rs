//! Suspend/resume synchronization
//!
//! Across system sleep the firmware may change registers on its own: the
//! user can flip the super key lock, firmware can reset the charge limit,
//! and manual fan control is lost. Suspend snapshots the volatile state
//! and takes the register map offline; resume replays the cached
//! configuration and issues corrective writes only where the hardware
//! drifted from the snapshot.

use tracing::{debug, warn};

use uniwill_ec::registers::{addr, ApOem, ChargeCtrl, SwitchStatus, Trigger};

use crate::error::DeviceError;
use crate::UniwillLaptop;

impl UniwillLaptop {
    /// Prepare the EC for system sleep.
    ///
    /// Snapshots the switch status and charge limit, hands fan and
    /// lighting control back to the EC for the duration of the sleep and
    /// takes the register map offline with all cached values marked for
    /// write-back. On failure the device is restored to its running
    /// configuration as far as possible and the original error returned.
    pub fn suspend(&self) -> Result<(), DeviceError> {
        let _guard = self.seq_lock.lock();
        let result = self.enter_suspend();
        if let Err(ref err) = result {
            warn!("suspend preparation failed, reverting: {err}");
            self.revert_suspend();
        }
        result
    }

    fn enter_suspend(&self) -> Result<(), DeviceError> {
        let switch_status = self.regmap().read(addr::SWITCH_STATUS)? as u8;
        let charge_limit = ChargeCtrl(self.regmap().read(addr::CHARGE_CTRL)? as u8).limit();
        {
            let mut snapshot = self.snapshot.lock();
            snapshot.switch_status = switch_status;
            snapshot.charge_limit = charge_limit;
            snapshot.suspended = true;
        }

        // The EC runs its own fan curve while the OS sleeps. The write goes
        // through bypass so the cache keeps the bit set and resume's sync
        // re-enables manual control.
        self.regmap().set_bypass(true);
        let handover = self
            .regmap()
            .clear_bits(addr::AP_OEM, ApOem::ENABLE_MANUAL_CTRL.bits().into());
        self.regmap().set_bypass(false);
        handover?;

        self.regmap().set_cache_only(true);
        self.regmap().mark_dirty();
        Ok(())
    }

    /// Best-effort unwind of a failed suspend. Errors are logged, the
    /// suspend error itself stays authoritative.
    fn revert_suspend(&self) {
        self.regmap().set_cache_only(false);
        self.regmap().set_bypass(true);
        let bit = ApOem::ENABLE_MANUAL_CTRL.bits();
        if let Err(err) = self.regmap().write_bits(addr::AP_OEM, bit.into(), bit.into()) {
            warn!("could not re-enable manual control: {err}");
        }
        self.regmap().set_bypass(false);
        self.snapshot.lock().suspended = false;
    }

    /// Bring the device back after system sleep.
    ///
    /// Replays the cached configuration (which re-enables manual control),
    /// then reconciles the volatile state against the suspend snapshot:
    /// the charge limit is rewritten only if the firmware reset it, and a
    /// super key lock toggle is pulsed only if the user flipped it while
    /// asleep.
    pub fn resume(&self) -> Result<(), DeviceError> {
        let _guard = self.seq_lock.lock();
        if !self.snapshot.lock().suspended {
            debug!("resume without matching suspend, ignored");
            return Ok(());
        }

        self.regmap().set_cache_only(false);
        self.regmap().sync()?;

        let snapshot = *self.snapshot.lock();
        if snapshot.charge_limit > 0 {
            self.regmap().update_bits(
                addr::CHARGE_CTRL,
                ChargeCtrl::LIMIT_MASK.into(),
                snapshot.charge_limit.into(),
            )?;
        }

        let status = self.regmap().read(addr::SWITCH_STATUS)? as u8;
        let drift = (status ^ snapshot.switch_status) & SwitchStatus::SUPER_KEY_LOCK.bits();
        if drift != 0 {
            debug!("super key lock changed during sleep, pulsing it back");
            let pulse = Trigger::SUPER_KEY_LOCK.bits();
            self.regmap()
                .write_bits(addr::TRIGGER, pulse.into(), pulse.into())?;
        }

        self.snapshot.lock().suspended = false;
        Ok(())
    }
}
