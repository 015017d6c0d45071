use crate::u4;

/// Index of VF, the register flag-setting instructions overwrite.
pub const FLAG: u4 = u4::MAX;

/// General-purpose registers V0-VF plus the index register I.
///
/// VF is an ordinary register that some instructions also use as a flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    pub v: [u8; 16],
    pub i: u16,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn set_flag(&mut self, set: bool) {
        self.v[FLAG] = set as u8;
    }
}
