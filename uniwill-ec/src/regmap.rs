//! Cached, descriptor-checked register map over the EC bus
//!
//! Mirrors the access policy of the firmware interface: every register has
//! a descriptor saying whether it may be read, written and cached. Reads of
//! cacheable registers are served from the cache after the first transport
//! round trip; volatile registers always hit the transport. The map can be
//! taken offline around system sleep, buffering writes for replay.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::EcError;
use crate::registers::{RegisterDesc, RegisterTable};
use crate::transport::EcBus;

/// Register value width of the hardware generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegisterWidth {
    /// 8-bit registers (current firmware).
    #[default]
    W8,
    /// 16-bit registers.
    W16,
}

impl RegisterWidth {
    pub fn mask(self) -> u16 {
        match self {
            Self::W8 => 0x00FF,
            Self::W16 => 0xFFFF,
        }
    }

    fn truncate(self, raw: u32) -> u16 {
        (raw as u16) & self.mask()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum AccessMode {
    /// Cache serves non-volatile reads, transport everything else.
    #[default]
    Live,
    /// Every access goes to the transport and the cache is left untouched.
    Bypass,
    /// No transport traffic at all; cacheable writes are buffered.
    CacheOnly,
}

#[derive(Default)]
struct CacheState {
    mode: AccessMode,
    entries: HashMap<u16, u16>,
    dirty: HashSet<u16>,
}

/// Cached register map.
///
/// All access is serialized through the internal state lock, so a `&self`
/// reference is safe to share across threads.
pub struct RegisterMap {
    bus: EcBus,
    table: RegisterTable,
    width: RegisterWidth,
    state: Mutex<CacheState>,
    /// Held across every read-modify-write so two concurrent `update_bits`
    /// calls cannot interleave between the read and the write.
    rmw_lock: Mutex<()>,
}

impl RegisterMap {
    pub fn new(bus: EcBus, table: RegisterTable, width: RegisterWidth) -> Self {
        Self {
            bus,
            table,
            width,
            state: Mutex::new(CacheState::default()),
            rmw_lock: Mutex::new(()),
        }
    }

    pub fn width(&self) -> RegisterWidth {
        self.width
    }

    /// Read one register, honoring its descriptor and the current mode.
    pub fn read(&self, address: u16) -> Result<u16, EcError> {
        let desc = self.readable_desc(address)?;
        let cacheable = !desc.volatile;
        let mut state = self.state.lock();
        match state.mode {
            AccessMode::CacheOnly => {
                if cacheable {
                    if let Some(&value) = state.entries.get(&address) {
                        return Ok(value);
                    }
                }
                return Err(EcError::Offline);
            }
            AccessMode::Live => {
                if cacheable {
                    if let Some(&value) = state.entries.get(&address) {
                        return Ok(value);
                    }
                }
            }
            AccessMode::Bypass => {}
        }
        let value = self.width.truncate(self.bus.read(address)?);
        if cacheable && state.mode == AccessMode::Live {
            state.entries.insert(address, value);
        }
        Ok(value)
    }

    /// Write one register, honoring its descriptor and the current mode.
    pub fn write(&self, address: u16, value: u16) -> Result<(), EcError> {
        let desc = self.writable_desc(address)?;
        let value = value & self.width.mask();
        let cacheable = !desc.volatile;
        let mut state = self.state.lock();
        match state.mode {
            AccessMode::CacheOnly => {
                if !cacheable {
                    return Err(EcError::Offline);
                }
                debug!("buffering offline write 0x{address:04X} <- 0x{value:02X}");
                state.entries.insert(address, value);
                state.dirty.insert(address);
                Ok(())
            }
            AccessMode::Bypass => self.bus.write(address, value),
            AccessMode::Live => {
                self.bus.write(address, value)?;
                if cacheable {
                    state.entries.insert(address, value);
                    state.dirty.remove(&address);
                }
                Ok(())
            }
        }
    }

    /// Read-modify-write of the bits selected by `mask`.
    ///
    /// The physical write is skipped when the masked value is already in
    /// place. Returns whether a write was issued.
    pub fn update_bits(&self, address: u16, mask: u16, value: u16) -> Result<bool, EcError> {
        let _guard = self.rmw_lock.lock();
        self.rmw(address, mask, value, false)
    }

    /// Like [`update_bits`](Self::update_bits) but always issues the write.
    ///
    /// Needed for trigger-pulse registers, which act on the write itself
    /// rather than on a value change.
    pub fn write_bits(&self, address: u16, mask: u16, value: u16) -> Result<bool, EcError> {
        let _guard = self.rmw_lock.lock();
        self.rmw(address, mask, value, true)
    }

    pub fn set_bits(&self, address: u16, bits: u16) -> Result<bool, EcError> {
        self.update_bits(address, bits, bits)
    }

    pub fn clear_bits(&self, address: u16, bits: u16) -> Result<bool, EcError> {
        self.update_bits(address, bits, 0)
    }

    fn rmw(&self, address: u16, mask: u16, value: u16, force: bool) -> Result<bool, EcError> {
        let current = self.read(address)?;
        let next = (current & !mask) | (value & mask);
        if !force && next == current {
            return Ok(false);
        }
        self.write(address, next)?;
        Ok(true)
    }

    /// Read a big-endian 16-bit quantity from two consecutive byte
    /// registers (fan tachometers store MSB first).
    pub fn read_be16(&self, address: u16) -> Result<u16, EcError> {
        let hi = self.read(address)?;
        let lo = self.read(address + 1)?;
        Ok(u16::from_be_bytes([hi as u8, lo as u8]))
    }

    /// Read a little-endian 16-bit quantity from two consecutive byte
    /// registers (battery controller block).
    pub fn read_le16(&self, address: u16) -> Result<u16, EcError> {
        let lo = self.read(address)?;
        let hi = self.read(address + 1)?;
        Ok(u16::from_le_bytes([lo as u8, hi as u8]))
    }

    /// Force every access through the transport, leaving the cache as-is.
    ///
    /// Used for writes that must reach the hardware without becoming the
    /// cached value, such as handing control back to the EC before sleep.
    pub fn set_bypass(&self, enable: bool) {
        let mut state = self.state.lock();
        state.mode = if enable { AccessMode::Bypass } else { AccessMode::Live };
    }

    /// Take the map offline (cache-only) or back online.
    ///
    /// Offline, reads are served from the cache and writes to cacheable
    /// registers are buffered; anything else fails with [`EcError::Offline`].
    pub fn set_cache_only(&self, enable: bool) {
        let mut state = self.state.lock();
        state.mode = if enable { AccessMode::CacheOnly } else { AccessMode::Live };
    }

    pub fn is_cache_only(&self) -> bool {
        self.state.lock().mode == AccessMode::CacheOnly
    }

    /// Mark every cached entry dirty so the next [`sync`](Self::sync)
    /// writes it back.
    pub fn mark_dirty(&self) {
        let mut state = self.state.lock();
        let addresses: Vec<u16> = state.entries.keys().copied().collect();
        state.dirty.extend(addresses);
    }

    /// Write every dirty cached value back to the hardware.
    ///
    /// The map must be back online. Entries are written in address order;
    /// on the first failure the remaining entries stay dirty and the error
    /// is returned.
    pub fn sync(&self) -> Result<(), EcError> {
        let mut state = self.state.lock();
        if state.mode == AccessMode::CacheOnly {
            warn!("cache sync requested while offline");
            return Err(EcError::Offline);
        }
        let mut pending: Vec<u16> = state.dirty.iter().copied().collect();
        pending.sort_unstable();
        for address in pending {
            // Read-only registers can land in the cache and get marked
            // dirty; they have nothing to write back.
            let writable = self.table.get(address).is_some_and(|d| d.writable);
            let value = state.entries.get(&address).copied();
            let Some(value) = value.filter(|_| writable) else {
                state.dirty.remove(&address);
                continue;
            };
            debug!("cache sync 0x{address:04X} <- 0x{value:02X}");
            self.bus.write(address, value)?;
            state.dirty.remove(&address);
        }
        Ok(())
    }

    fn readable_desc(&self, address: u16) -> Result<RegisterDesc, EcError> {
        self.table
            .get(address)
            .copied()
            .filter(|d| d.readable)
            .ok_or(EcError::NotReadable { address })
    }

    fn writable_desc(&self, address: u16) -> Result<RegisterDesc, EcError> {
        self.table
            .get(address)
            .copied()
            .filter(|d| d.writable)
            .ok_or(EcError::NotWritable { address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{addr, uniwill_register_table};
    use crate::sim::SimulatedEc;

    fn map_over_sim() -> (SimulatedEc, RegisterMap) {
        let sim = SimulatedEc::with_uniwill_defaults();
        let bus = EcBus::new(Box::new(sim.clone()));
        let table = uniwill_register_table().unwrap();
        (sim, RegisterMap::new(bus, table, RegisterWidth::W8))
    }

    #[test]
    fn cacheable_read_hits_transport_once() {
        let (sim, map) = map_over_sim();
        map.read(addr::BIOS_OEM).unwrap();
        map.read(addr::BIOS_OEM).unwrap();
        map.read(addr::BIOS_OEM).unwrap();
        assert_eq!(sim.reads_of(addr::BIOS_OEM), 1);
    }

    #[test]
    fn cacheable_write_then_read_stays_cached() {
        let (sim, map) = map_over_sim();
        map.write(addr::LIGHTBAR_AC_RED, 0x42).unwrap();
        assert_eq!(map.read(addr::LIGHTBAR_AC_RED), Ok(0x42));
        assert_eq!(sim.reads_of(addr::LIGHTBAR_AC_RED), 0);
    }

    #[test]
    fn volatile_read_always_hits_transport() {
        let (sim, map) = map_over_sim();
        map.read(addr::CPU_TEMP).unwrap();
        map.read(addr::CPU_TEMP).unwrap();
        assert_eq!(sim.reads_of(addr::CPU_TEMP), 2);
    }

    #[test]
    fn unknown_address_is_rejected_by_descriptor() {
        let (sim, map) = map_over_sim();
        assert_eq!(map.read(0x0999), Err(EcError::NotReadable { address: 0x0999 }));
        assert_eq!(map.write(0x0999, 1), Err(EcError::NotWritable { address: 0x0999 }));
        // The transport must not have been touched.
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn read_only_register_rejects_writes() {
        let (_sim, map) = map_over_sim();
        assert_eq!(
            map.write(addr::PROJECT_ID, 0),
            Err(EcError::NotWritable { address: addr::PROJECT_ID })
        );
    }

    #[test]
    fn update_bits_skips_write_when_unchanged() {
        let (sim, map) = map_over_sim();
        map.write(addr::BIOS_OEM, 0x10).unwrap();
        sim.clear_calls();
        assert_eq!(map.update_bits(addr::BIOS_OEM, 0x10, 0x10), Ok(false));
        assert_eq!(sim.writes_of(addr::BIOS_OEM), 0);
        assert_eq!(map.update_bits(addr::BIOS_OEM, 0x10, 0x00), Ok(true));
        assert_eq!(sim.writes_of(addr::BIOS_OEM), 1);
    }

    #[test]
    fn write_bits_always_writes() {
        let (sim, map) = map_over_sim();
        sim.set_register(addr::TRIGGER, 0);
        sim.clear_calls();
        assert_eq!(map.write_bits(addr::TRIGGER, 0x01, 0x01), Ok(true));
        assert_eq!(map.write_bits(addr::TRIGGER, 0x01, 0x01), Ok(true));
        assert_eq!(sim.writes_of(addr::TRIGGER), 2);
    }

    #[test]
    fn cache_only_serves_cached_and_rejects_the_rest() {
        let (sim, map) = map_over_sim();
        map.read(addr::BIOS_OEM).unwrap();
        map.set_cache_only(true);
        sim.clear_calls();

        assert!(map.read(addr::BIOS_OEM).is_ok());
        assert_eq!(map.read(addr::CPU_TEMP), Err(EcError::Offline));
        assert_eq!(map.write(addr::PWM_1_WRITEABLE, 50), Err(EcError::Offline));
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn offline_write_is_buffered_and_synced() {
        let (sim, map) = map_over_sim();
        map.set_cache_only(true);
        map.write(addr::LIGHTBAR_AC_RED, 0x33).unwrap();
        assert_eq!(map.read(addr::LIGHTBAR_AC_RED), Ok(0x33));
        assert_eq!(sim.writes_of(addr::LIGHTBAR_AC_RED), 0);

        map.set_cache_only(false);
        map.sync().unwrap();
        assert_eq!(sim.writes_of(addr::LIGHTBAR_AC_RED), 1);
        assert_eq!(sim.register(addr::LIGHTBAR_AC_RED), Some(0x33));

        // A second sync has nothing left to write.
        sim.clear_calls();
        map.sync().unwrap();
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn sync_while_offline_fails() {
        let (_sim, map) = map_over_sim();
        map.set_cache_only(true);
        assert_eq!(map.sync(), Err(EcError::Offline));
    }

    #[test]
    fn bypass_write_leaves_cache_untouched() {
        let (sim, map) = map_over_sim();
        map.write(addr::AP_OEM, 0x01).unwrap();
        map.set_bypass(true);
        map.write(addr::AP_OEM, 0x00).unwrap();
        map.set_bypass(false);

        // Hardware saw the bypass write, the cache still holds the old value.
        assert_eq!(sim.register(addr::AP_OEM), Some(0x00));
        assert_eq!(map.read(addr::AP_OEM), Ok(0x01));
    }

    #[test]
    fn mark_dirty_resyncs_cached_values() {
        let (sim, map) = map_over_sim();
        map.write(addr::AP_OEM, 0x01).unwrap();
        map.mark_dirty();
        // Simulate the hardware losing the value across sleep.
        sim.set_register(addr::AP_OEM, 0x00);
        map.sync().unwrap();
        assert_eq!(sim.register(addr::AP_OEM), Some(0x01));
    }

    #[test]
    fn be16_reads_msb_first() {
        let (sim, map) = map_over_sim();
        sim.set_register(addr::MAIN_FAN_RPM_1, 0x12);
        sim.set_register(addr::MAIN_FAN_RPM_1 + 1, 0x34);
        assert_eq!(map.read_be16(addr::MAIN_FAN_RPM_1), Ok(0x1234));
    }

    #[test]
    fn le16_reads_lsb_first() {
        let (sim, map) = map_over_sim();
        sim.set_register(addr::BAT_VOLTAGE_1, 0x2C);
        sim.set_register(addr::BAT_VOLTAGE_1 + 1, 0x2B);
        assert_eq!(map.read_le16(addr::BAT_VOLTAGE_1), Ok(0x2B2C));
    }
}
