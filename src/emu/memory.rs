use super::{Chip8Error, FONT_SIZE, FONT_START_ADDRESS};

// Standard CHIP-8 memory map
pub const MEMORY_SIZE: usize = 4096;
pub const ROM_START_ADDRESS: usize = 0x200;
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - ROM_START_ADDRESS;

/// 4KB flat memory holding the font glyphs and the loaded program.
pub struct Memory {
    bytes: [u8; MEMORY_SIZE],
}

impl Memory {
    pub fn new() -> Self {
        Self {
            bytes: [0; MEMORY_SIZE],
        }
    }

    /// Zero-fills memory, then copies the font to 0x050 and the program to 0x200.
    ///
    /// Memory is left untouched when either input has the wrong size.
    pub fn load(&mut self, font: &[u8], program: &[u8]) -> Result<(), Chip8Error> {
        if font.len() != FONT_SIZE {
            return Err(Chip8Error::FontLoadError {
                size: font.len(),
                expected: FONT_SIZE,
            });
        }
        if program.len() > MAX_ROM_SIZE {
            return Err(Chip8Error::RomLoadError {
                size: program.len(),
                max_size: MAX_ROM_SIZE,
            });
        }

        self.bytes.fill(0);
        self.bytes[FONT_START_ADDRESS..FONT_START_ADDRESS + FONT_SIZE].copy_from_slice(font);
        self.bytes[ROM_START_ADDRESS..ROM_START_ADDRESS + program.len()].copy_from_slice(program);

        Ok(())
    }

    /// Reads a single byte with bounds checking.
    pub fn read(&self, addr: u16) -> Result<u8, Chip8Error> {
        self.bytes
            .get(addr as usize)
            .copied()
            .ok_or(Chip8Error::MemoryOutOfBounds {
                address: addr as usize,
            })
    }

    /// Reads a big-endian 16-bit word at `addr` and `addr + 1`.
    pub fn read_word(&self, addr: u16) -> Result<u16, Chip8Error> {
        let bytes = self.slice(addr, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Borrows `len` bytes starting at `addr`, failing if any of them is out of range.
    pub fn slice(&self, addr: u16, len: usize) -> Result<&[u8], Chip8Error> {
        let start = addr as usize;
        self.bytes
            .get(start..start + len)
            .ok_or(Chip8Error::MemoryOutOfBounds {
                address: start + len - 1,
            })
    }

    /// Mutably borrows `len` bytes starting at `addr`, failing if any of them is out of range.
    pub fn slice_mut(&mut self, addr: u16, len: usize) -> Result<&mut [u8], Chip8Error> {
        let start = addr as usize;
        self.bytes
            .get_mut(start..start + len)
            .ok_or(Chip8Error::MemoryOutOfBounds {
                address: start + len - 1,
            })
    }

    pub fn as_bytes(&self) -> &[u8; MEMORY_SIZE] {
        &self.bytes
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
