use core::sync::atomic::{AtomicBool, Ordering};

use domino_protocol::{Fragment, ManualCommand, BLE_WRITE_LEN, MIN_FRAGMENT_LEN};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel, signal::Signal};

use crate::DrawConfig;

/// How many fragments can be waiting for the next tick.
pub const FRAGMENT_QUEUE_LEN: usize = 8;

/// The hand-off point between the transport and the control loop.
///
/// The transport side (GATT write callbacks, typically) calls the
/// `receive_*` and `set_connected` methods. They check sizes, decode, and
/// queue; they never touch the robot state. The control loop drains the
/// inbox once per tick.
pub struct Inbox {
    fragments: Channel<CriticalSectionRawMutex, Fragment, FRAGMENT_QUEUE_LEN>,
    manual: Signal<CriticalSectionRawMutex, ManualCommand>,
    connected: AtomicBool,
    min_fragment_len: usize,
    max_fragment_len: usize,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbox {
    pub const fn new() -> Self {
        Self::with_fragment_len(MIN_FRAGMENT_LEN, BLE_WRITE_LEN)
    }

    pub const fn with_fragment_len(min: usize, max: usize) -> Self {
        Self {
            fragments: Channel::new(),
            manual: Signal::new(),
            connected: AtomicBool::new(false),
            min_fragment_len: min,
            max_fragment_len: max,
        }
    }

    pub fn from_config(config: &DrawConfig) -> Self {
        Self::with_fragment_len(config.min_fragment_len, config.max_fragment_len)
    }

    /// Handles a write to the draw characteristic.
    ///
    /// Returns false if the write was dropped.
    pub fn receive_fragment(&self, data: &[u8]) -> bool {
        if data.len() < self.min_fragment_len || data.len() > self.max_fragment_len {
            log::debug!("dropping draw write of {} bytes", data.len());
            return false;
        }
        match Fragment::decode(data) {
            Ok(frag) => match self.fragments.try_send(frag) {
                Ok(()) => true,
                Err(_) => {
                    log::warn!("fragment queue is full, dropping fragment");
                    false
                }
            },
            Err(e) => {
                log::debug!("dropping draw write: {e}");
                false
            }
        }
    }

    /// Handles a write to the manual-control characteristic.
    ///
    /// A newer command replaces one that hasn't been picked up yet.
    pub fn receive_manual(&self, data: &[u8]) -> bool {
        match ManualCommand::decode(data) {
            Ok(cmd) => {
                self.manual.signal(cmd);
                true
            }
            Err(e) => {
                log::debug!("dropping manual write: {e}");
                false
            }
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn next_fragment(&self) -> Option<Fragment> {
        self.fragments.try_receive().ok()
    }

    pub fn take_manual(&self) -> Option<ManualCommand> {
        self.manual.try_take()
    }
}
