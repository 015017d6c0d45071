use super::{Chip8Error, ROM_START_ADDRESS, StackPolicy};

pub const STACK_DEPTH: usize = 16;

/// Program counter plus the call stack used for subroutine linkage.
pub struct ProgramCounter {
    pc: u16,
    stack: [u16; STACK_DEPTH],
    sp: usize,
    /// Live entries; under the wrapping policy it saturates at the stack depth.
    depth: usize,
    policy: StackPolicy,
}

impl ProgramCounter {
    pub fn new(policy: StackPolicy) -> Self {
        Self {
            pc: ROM_START_ADDRESS as u16,
            stack: [0; STACK_DEPTH],
            sp: 0,
            depth: 0,
            policy,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.policy);
    }

    pub fn current(&self) -> u16 {
        self.pc
    }

    /// Moves past one instruction.
    pub fn next(&mut self) {
        self.pc = self.pc.wrapping_add(2);
    }

    /// Moves back one instruction, so it gets fetched again.
    pub fn back(&mut self) {
        self.pc = self.pc.wrapping_sub(2);
    }

    pub fn skip_next(&mut self) {
        self.next();
    }

    pub fn jump(&mut self, addr: u16) {
        self.pc = addr;
    }

    /// Pushes the current counter, then jumps to `addr`.
    pub fn call(&mut self, addr: u16) -> Result<(), Chip8Error> {
        match self.policy {
            StackPolicy::Strict => {
                if self.sp == STACK_DEPTH {
                    return Err(Chip8Error::StackOverflow { depth: STACK_DEPTH });
                }
                self.stack[self.sp] = self.pc;
                self.sp += 1;
            }
            StackPolicy::Wrap => {
                self.stack[self.sp] = self.pc;
                self.sp = (self.sp + 1) & 0xF;
            }
        }
        self.depth = (self.depth + 1).min(STACK_DEPTH);

        self.pc = addr;
        Ok(())
    }

    /// Pops the most recently saved counter.
    pub fn ret(&mut self) -> Result<(), Chip8Error> {
        match self.policy {
            StackPolicy::Strict => {
                if self.sp == 0 {
                    return Err(Chip8Error::StackUnderflow);
                }
                self.sp -= 1;
            }
            StackPolicy::Wrap => {
                self.sp = self.sp.wrapping_sub(1) & 0xF;
            }
        }
        self.depth = self.depth.saturating_sub(1);

        self.pc = self.stack[self.sp];
        Ok(())
    }

    /// Saved return addresses, oldest first.
    ///
    /// Once a wrapping stack has gone around, all slots are live and the
    /// oldest one sits at the stack pointer.
    pub fn saved(&self) -> Vec<u16> {
        (0..self.depth)
            .map(|n| self.stack[(self.sp + STACK_DEPTH - self.depth + n) % STACK_DEPTH])
            .collect()
    }
}
