use std::sync::{
    Arc,
    atomic::{AtomicU8, AtomicU16, Ordering},
};

use crate::u4;

/// Read-only view of the hex keypad used by the interpreter.
pub trait Keypad {
    /// Returns true while `key` is held down.
    fn is_down(&self, key: u4) -> bool;

    /// The most recently pressed key if it is still held, otherwise the
    /// lowest key that is held. `None` when no key is down.
    fn last_pressed(&self) -> Option<u4>;
}

const NO_KEY: u8 = 0xFF;

struct KeyState {
    /// One bit per key, set while the key is down.
    down: AtomicU16,
    last: AtomicU8,
}

/// Keypad state shared between an input handler and the interpreter.
///
/// Clones refer to the same keys, so one clone can be written from an
/// input thread while the interpreter reads another.
#[derive(Clone)]
pub struct SharedKeypad {
    state: Arc<KeyState>,
}

impl SharedKeypad {
    pub fn new() -> Self {
        Self {
            state: Arc::new(KeyState {
                down: AtomicU16::new(0),
                last: AtomicU8::new(NO_KEY),
            }),
        }
    }

    /// Marks `key` down and records it as the last pressed key.
    pub fn press(&self, key: u4) {
        self.state.down.fetch_or(1 << key.get(), Ordering::AcqRel);
        self.state.last.store(key.get(), Ordering::Release);
    }

    /// Marks `key` up, forgetting it as the last pressed key if it was.
    pub fn release(&self, key: u4) {
        self.state.down.fetch_and(!(1 << key.get()), Ordering::AcqRel);
        let _ = self.state.last.compare_exchange(
            key.get(),
            NO_KEY,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Sets `key` to the given state.
    pub fn set(&self, key: u4, pressed: bool) {
        if pressed {
            self.press(key);
        } else {
            self.release(key);
        }
    }

    /// Marks every key up.
    pub fn release_all(&self) {
        self.state.down.store(0, Ordering::Release);
        self.state.last.store(NO_KEY, Ordering::Release);
    }
}

impl Default for SharedKeypad {
    fn default() -> Self {
        Self::new()
    }
}

impl Keypad for SharedKeypad {
    fn is_down(&self, key: u4) -> bool {
        self.state.down.load(Ordering::Acquire) & (1 << key.get()) != 0
    }

    fn last_pressed(&self) -> Option<u4> {
        match self.state.last.load(Ordering::Acquire) {
            NO_KEY => match self.state.down.load(Ordering::Acquire) {
                0 => None,
                mask => Some(u4::masked(mask.trailing_zeros() as u8)),
            },
            key => Some(u4::masked(key)),
        }
    }
}
