//! Firmware event notification bus
//!
//! The firmware raises asynchronous integer event codes for hotkeys and
//! hardware state changes. Subscribers run synchronously in registration
//! order; the first one to claim an event stops the fan-out, so unclaimed
//! events can fall through to a default key-event translation layer.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

/// Known firmware event codes.
pub mod code {
    pub const KEY_CAPSLOCK: u32 = 0x01;
    pub const KEY_NUMLOCK: u32 = 0x02;
    pub const KEY_SCROLLLOCK: u32 = 0x03;
    pub const KEY_TOUCHPAD_ON: u32 = 0x04;
    pub const KEY_TOUCHPAD_OFF: u32 = 0x05;
    pub const KEY_BRIGHTNESSUP: u32 = 0x14;
    pub const KEY_BRIGHTNESSDOWN: u32 = 0x15;
    pub const OSD_RADIOON: u32 = 0x1A;
    pub const OSD_RADIOOFF: u32 = 0x1B;
    pub const KEY_MUTE: u32 = 0x35;
    pub const KEY_VOLUMEDOWN: u32 = 0x36;
    pub const KEY_VOLUMEUP: u32 = 0x37;
    pub const OSD_LIGHTBAR_ON: u32 = 0x39;
    pub const OSD_LIGHTBAR_OFF: u32 = 0x3A;
    pub const OSD_KB_LED_LEVEL0: u32 = 0x3B;
    pub const OSD_KB_LED_LEVEL1: u32 = 0x3C;
    pub const OSD_KB_LED_LEVEL2: u32 = 0x3D;
    pub const OSD_KB_LED_LEVEL3: u32 = 0x3E;
    pub const OSD_KB_LED_LEVEL4: u32 = 0x3F;
    pub const OSD_SUPER_KEY_LOCK_ENABLE: u32 = 0x40;
    pub const OSD_SUPER_KEY_LOCK_DISABLE: u32 = 0x41;
    pub const KEY_RFKILL: u32 = 0xA4;
    pub const OSD_SUPER_KEY_LOCK_TOGGLE: u32 = 0xA5;
    pub const OSD_LIGHTBAR_STATE_CHANGED: u32 = 0xA6;
    pub const OSD_FAN_BOOST_STATE_CHANGED: u32 = 0xA7;
    pub const OSD_DC_ADAPTER_CHANGED: u32 = 0xAB;
    pub const OSD_PERF_MODE_CHANGED: u32 = 0xB0;
    pub const KEY_KBDILLUMDOWN: u32 = 0xB1;
    pub const KEY_KBDILLUMUP: u32 = 0xB2;
    pub const KEY_FN_LOCK: u32 = 0xB8;
    pub const KEY_KBDILLUMTOGGLE: u32 = 0xB9;
    pub const OSD_KBD_BACKLIGHT_CHANGED: u32 = 0xF0;
}

/// What a subscriber did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Fully consumed; later subscribers and any default translation are
    /// suppressed.
    Handled,
    /// Not interested; the event continues to the next subscriber.
    Pass,
}

pub type EventHandler = Box<dyn Fn(u32) -> EventOutcome + Send + Sync>;

struct Registration {
    id: u64,
    handler: EventHandler,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    handlers: Vec<Registration>,
}

/// Fan-out bus for firmware event codes.
///
/// Handlers must not publish or subscribe from within a handler; delivery
/// holds the bus lock.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler at the end of the delivery order.
    ///
    /// Dropping the returned subscription unregisters the handler; no
    /// delivery is in flight for it once the drop returns.
    pub fn subscribe(&self, handler: EventHandler) -> EventSubscription {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.push(Registration { id, handler });
        EventSubscription { inner: Arc::clone(&self.inner), id }
    }

    /// Deliver one event code to subscribers in registration order.
    ///
    /// Returns whether any subscriber claimed the event.
    pub fn publish(&self, event: u32) -> bool {
        trace!("firmware event 0x{event:02X}");
        let inner = self.inner.lock();
        for registration in &inner.handlers {
            if (registration.handler)(event) == EventOutcome::Handled {
                debug!("event 0x{event:02X} claimed by subscriber {}", registration.id);
                return true;
            }
        }
        false
    }
}

/// RAII handle for a registered event handler.
pub struct EventSubscription {
    inner: Arc<Mutex<BusInner>>,
    id: u64,
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.inner.lock().handlers.retain(|r| r.id != self.id);
    }
}
