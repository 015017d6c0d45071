/// Result type for CHIP-8 CPU cycle execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip8Result {
    /// Continue executing instructions in the current frame.
    Continue,
    /// The key-wait instruction found no key and rewound the program counter.
    /// Stepping again this frame would only re-fetch the same instruction.
    WaitingForKey,
}

/// Error types that can occur during CHIP-8 emulation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomLoadError { size: usize, max_size: usize },

    #[error("Font must be {expected} bytes, got {size} bytes")]
    FontLoadError { size: usize, expected: usize },

    #[error("Memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: usize },

    #[error("Stack overflow: subroutine call nested deeper than {depth} levels")]
    StackOverflow { depth: usize },

    #[error("Stack underflow: attempted to return from a subroutine with empty call stack")]
    StackUnderflow,
}

/// How the call stack behaves once it runs out of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackPolicy {
    /// Calls past the stack depth and returns on an empty stack are errors.
    #[default]
    Strict,
    /// The stack pointer is masked to 4 bits and silently wraps around.
    Wrap,
}

/// Interpreter and driver configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chip8Config {
    /// Instructions executed per logical frame, before the timers tick.
    pub cycles_per_frame: u32,
    /// Logical frames per second, this is also the timer frequency.
    pub frame_rate: f32,
    pub stack_policy: StackPolicy,
}

impl Default for Chip8Config {
    fn default() -> Self {
        Self {
            cycles_per_frame: 10,
            frame_rate: 60.0,
            stack_policy: StackPolicy::Strict,
        }
    }
}
