//! CHIP-8 interpreter core.
//!
//! [`emu::Chip8`] owns memory, registers, the call stack, timers and the
//! framebuffer. The keypad is injected, while sound and rendering are handed
//! in by the driver on each timer tick and presentation.

pub mod emu;
mod nibble;

pub use nibble::*;
