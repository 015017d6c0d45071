/// Audio output hook, signalled once per timer tick while the sound timer runs.
pub trait Sound {
    fn beep(&mut self);
}

/// Sound sink that discards every beep.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mute;

impl Sound for Mute {
    fn beep(&mut self) {}
}

/// Delay and sound countdown timers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timers {
    /// Delay timer: decrements once per frame until it reaches 0
    pub delay: u8,
    /// Sound timer: decrements once per frame, beeps while non-zero
    pub sound: u8,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Counts both timers down by one. Should be called once per logical frame.
    pub fn tick(&mut self, sound: &mut dyn Sound) {
        self.delay = self.delay.saturating_sub(1);

        if self.sound > 0 {
            sound.beep();
            self.sound -= 1;
        }
    }
}
