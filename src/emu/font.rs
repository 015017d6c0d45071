pub const FONT_START_ADDRESS: usize = 0x50;
pub const FONT_GLYPH_SIZE: usize = 5;
pub const FONT_SIZE: usize = FONT_GLYPH_SIZE * 16;
pub const FONT_END_ADDRESS: usize = FONT_START_ADDRESS + FONT_SIZE;

/// Built-in hexadecimal digit glyphs 0-F, each 4 pixels wide and 5 rows high.
pub const FONT: [u8; FONT_SIZE] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Address of the glyph for `digit` inside a loaded font.
///
/// The digit is not masked, so values past 0xF point beyond the glyph table.
pub fn glyph_address(digit: u8) -> u16 {
    FONT_START_ADDRESS as u16 + digit as u16 * FONT_GLYPH_SIZE as u16
}
