pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
/// A type alias for the CHIP-8 display buffer representation
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];

/// Receives the framebuffer whenever it changed since the last presentation.
pub trait RenderSink {
    fn present(&mut self, frame: &Framebuffer);
}

impl<F: FnMut(&Framebuffer)> RenderSink for F {
    fn present(&mut self, frame: &Framebuffer) {
        self(frame)
    }
}

/// 64x32 monochrome framebuffer with a dirty flag.
pub struct Framebuffer {
    pixels: Display<bool>,
    dirty: bool,
}

impl Framebuffer {
    pub fn new() -> Self {
        Self {
            pixels: [[false; DISPLAY_X]; DISPLAY_Y],
            dirty: true,
        }
    }

    pub fn clear(&mut self) {
        self.pixels = [[false; DISPLAY_X]; DISPLAY_Y];
        self.dirty = true;
    }

    /// XORs a set pixel onto the screen, wrapping coordinates around the edges.
    ///
    /// Returns true if the pixel was set before, i.e. the plot erased it.
    pub fn plot(&mut self, x: usize, y: usize) -> bool {
        let pixel = &mut self.pixels[y % DISPLAY_Y][x % DISPLAY_X];
        let was_set = *pixel;
        *pixel = !was_set;
        self.dirty = true;
        was_set
    }

    /// Draws an 8-pixel wide sprite, one byte per row, most significant bit leftmost.
    ///
    /// Only set sprite bits touch the screen. Returns true if any pixel got erased.
    pub fn draw_sprite(&mut self, x: usize, y: usize, rows: &[u8]) -> bool {
        let mut collision = false;

        for (row, sprite_byte) in rows.iter().enumerate() {
            for col in 0..8 {
                if sprite_byte & (0x80 >> col) != 0 {
                    collision |= self.plot(x + col, y + row);
                }
            }
        }

        collision
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    ///
    /// Coordinates wrap the same way `plot` wraps them.
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.pixels[y % DISPLAY_Y][x % DISPLAY_X]
    }

    pub fn rows(&self) -> &Display<bool> {
        &self.pixels
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Hands the frame to `sink` if it changed, then clears the dirty flag.
    pub fn present(&mut self, sink: &mut dyn RenderSink) {
        if !self.dirty {
            return;
        }
        sink.present(self);
        self.dirty = false;
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}
