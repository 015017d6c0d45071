use std::fmt;
use std::ops::{Index, IndexMut};

/// A 4-bit unsigned integer (nibble).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(non_camel_case_types)]
pub struct u4(u8);

impl u4 {
    pub const MAX: u4 = u4(0x0F);

    /// Creates a new `u4` from a `u8`.
    ///
    /// Panics if the value is greater than 0x0F.
    pub const fn new(value: u8) -> Self {
        assert!(value <= 0x0F, "u4 value must be in range 0x0-0xF");
        Self(value)
    }

    /// Creates a new `u4` from the low nibble of a `u8`, discarding the high bits.
    pub const fn masked(value: u8) -> Self {
        Self(value & 0x0F)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// All sixteen nibble values in ascending order.
    pub fn all() -> impl Iterator<Item = u4> {
        (0..=0x0F).map(u4)
    }
}

impl From<u4> for usize {
    fn from(v: u4) -> usize {
        v.0 as usize
    }
}

impl From<u4> for u8 {
    fn from(v: u4) -> u8 {
        v.0
    }
}

impl fmt::Display for u4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

impl<T> Index<u4> for [T; 16] {
    type Output = T;

    fn index(&self, index: u4) -> &Self::Output {
        &self[index.0 as usize]
    }
}

impl<T> IndexMut<u4> for [T; 16] {
    fn index_mut(&mut self, index: u4) -> &mut Self::Output {
        &mut self[index.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_keeps_low_nibble() {
        assert_eq!(u4::masked(0x1F), u4::new(0xF));
        assert_eq!(u4::masked(0x20), u4::new(0x0));
    }

    #[test]
    #[should_panic]
    fn new_rejects_wide_values() {
        let _ = u4::new(0x10);
    }

    #[test]
    fn indexes_sixteen_element_arrays() {
        let mut regs = [0u8; 16];
        regs[u4::new(0xA)] = 7;
        assert_eq!(regs[10], 7);
        assert_eq!(u4::all().count(), 16);
    }
}
