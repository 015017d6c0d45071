mod chip8;
mod display;
mod execute;
mod font;
mod keypad;
mod memory;
mod opcode;
mod registers;
mod runner;
mod stack;
mod timers;
mod types;

pub use chip8::*;
pub use display::*;
pub use execute::bcd;
pub use font::*;
pub use keypad::*;
pub use memory::*;
pub use opcode::*;
pub use registers::*;
pub use runner::*;
pub use stack::*;
pub use timers::*;
pub use types::*;
