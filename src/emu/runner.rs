use super::{Chip8, Chip8Error, Chip8Result, RenderSink, Sound};

/// Frames the runner will run in one `update` before dropping the backlog.
const MAX_CATCH_UP_FRAMES: u32 = 4;

/// High-level emulator runner that runs whole logical frames.
///
/// A frame is a batch of CPU cycles followed by one timer tick. The batch
/// size and the frame rate come from the interpreter's config.
pub struct Chip8Runner {
    chip8: Chip8,
    frame_dt_accumulator: f32,
}

impl Chip8Runner {
    pub fn new(chip8: Chip8) -> Self {
        Self {
            chip8,
            frame_dt_accumulator: 0.0,
        }
    }

    /// Update emulator by delta time.
    ///
    /// Runs as many frames as fit into the elapsed time `dt` and returns how
    /// many ran. A long stall does not make the emulator race to catch up.
    pub fn update(&mut self, dt: f32, sound: &mut dyn Sound) -> Result<u32, Chip8Error> {
        let frame_time_step = 1.0 / self.chip8.config().frame_rate;
        self.frame_dt_accumulator += dt;

        let mut frames = 0;
        while self.frame_dt_accumulator >= frame_time_step {
            self.frame_dt_accumulator -= frame_time_step;
            self.run_frame(sound)?;

            frames += 1;
            if frames == MAX_CATCH_UP_FRAMES {
                self.frame_dt_accumulator = 0.0;
                break;
            }
        }

        Ok(frames)
    }

    /// Runs one frame of CPU cycles, then ticks the timers once.
    ///
    /// The batch ends early while the program waits for a key, since further
    /// cycles would only fetch the same instruction again.
    pub fn run_frame(&mut self, sound: &mut dyn Sound) -> Result<(), Chip8Error> {
        for _ in 0..self.chip8.config().cycles_per_frame {
            match self.chip8.step()? {
                Chip8Result::WaitingForKey => break,
                Chip8Result::Continue => {}
            }
        }

        self.chip8.tick(sound);
        Ok(())
    }

    /// Hands the display to `sink` if it changed since the last call.
    pub fn present(&mut self, sink: &mut dyn RenderSink) {
        self.chip8.present(sink)
    }

    pub fn chip8_ref(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn chip8_mut(&mut self) -> &mut Chip8 {
        &mut self.chip8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::{Chip8Config, Mute, SharedKeypad};

    fn runner(program: &[u8], cycles_per_frame: u32) -> Chip8Runner {
        let config = Chip8Config {
            cycles_per_frame,
            ..Default::default()
        };
        let mut chip8 = Chip8::with_config(SharedKeypad::new(), config);
        chip8.load(program).unwrap();
        Chip8Runner::new(chip8)
    }

    #[test]
    fn frame_runs_configured_cycles_then_ticks() {
        // 7001 repeated: V0 += 1
        let program = [0x70, 0x01].repeat(32);
        let mut runner = runner(&program, 10);
        runner.chip8_mut().timers.delay = 5;

        runner.run_frame(&mut Mute).unwrap();

        assert_eq!(runner.chip8_ref().registers()[0], 10);
        assert_eq!(runner.chip8_ref().pc(), 0x214);
        assert_eq!(runner.chip8_ref().delay_timer(), 4);
    }

    #[test]
    fn frame_ends_early_while_waiting_for_key() {
        let mut runner = runner(&[0xF0, 0x0A], 10);
        runner.chip8_mut().timers.delay = 5;

        runner.run_frame(&mut Mute).unwrap();

        assert_eq!(runner.chip8_ref().pc(), 0x200);
        assert_eq!(runner.chip8_ref().delay_timer(), 4);
    }

    #[test]
    fn update_runs_frames_by_elapsed_time() {
        let mut runner = runner(&[0x12, 0x00], 10);
        runner.chip8_mut().timers.delay = 50;

        assert_eq!(runner.update(0.5 / 60.0, &mut Mute).unwrap(), 0);
        assert_eq!(runner.update(0.6 / 60.0, &mut Mute).unwrap(), 1);
        assert_eq!(runner.update(2.0 / 60.0, &mut Mute).unwrap(), 2);
        assert_eq!(runner.chip8_ref().delay_timer(), 47);
    }

    #[test]
    fn update_drops_backlog_after_a_stall() {
        let mut runner = runner(&[0x12, 0x00], 10);
        assert_eq!(runner.update(10.0, &mut Mute).unwrap(), MAX_CATCH_UP_FRAMES);
        assert_eq!(runner.update(0.0, &mut Mute).unwrap(), 0);
    }

    #[test]
    fn errors_stop_the_frame() {
        // 00EE on an empty stack
        let mut runner = runner(&[0x00, 0xEE], 10);
        assert_eq!(
            runner.run_frame(&mut Mute),
            Err(Chip8Error::StackUnderflow)
        );
    }
}
