use super::{Chip8, Chip8Error, Chip8Result, Opcode, OpcodeALU, glyph_address};
use crate::u4;

/// Splits `value` into its hundreds, tens and ones digits.
pub fn bcd(value: u8) -> [u8; 3] {
    [value / 100, (value / 10) % 10, value % 10]
}

impl Chip8 {
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<Chip8Result, Chip8Error> {
        match opcode {
            Opcode::ClearDisplay => {
                self.framebuffer.clear();
            }
            Opcode::Jump { nnn } => {
                self.pc.jump(nnn);
            }
            Opcode::JumpWithOffset { nnn } => {
                self.pc.jump(nnn.wrapping_add(self.registers.v[0].into()));
            }
            Opcode::Call { nnn } => {
                self.pc.call(nnn)?;
            }
            Opcode::Return => {
                self.pc.ret()?;
            }
            Opcode::SkipRegEqualImm { x, nn } => {
                self.skip_if(self.registers.v[x] == nn);
            }
            Opcode::SkipRegNotEqualImm { x, nn } => {
                self.skip_if(self.registers.v[x] != nn);
            }
            Opcode::SkipRegEqualReg { x, y } => {
                self.skip_if(self.registers.v[x] == self.registers.v[y]);
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                self.skip_if(self.registers.v[x] != self.registers.v[y]);
            }
            Opcode::SetRegImm { x, nn } => {
                self.registers.v[x] = nn;
            }
            Opcode::AddRegImm { x, nn } => {
                self.registers.v[x] = self.registers.v[x].wrapping_add(nn);
            }
            Opcode::ALU { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, nn } => {
                let rand_byte: u8 = rand::random();
                self.registers.v[x] = rand_byte & nn;
            }
            Opcode::SetIndexImm { nnn } => {
                self.registers.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                let sum = u32::from(self.registers.i) + u32::from(self.registers.v[x]);
                self.registers.set_flag(sum > 0xFFF);
                self.registers.i = sum as u16;
            }
            Opcode::Draw { x, y, n } => {
                self.execute_draw(x, y, n)?;
            }
            Opcode::SkipIfPressed { x } => {
                let key = u4::masked(self.registers.v[x]);
                self.skip_if(self.keypad.is_down(key));
            }
            Opcode::SkipIfNotPressed { x } => {
                let key = u4::masked(self.registers.v[x]);
                self.skip_if(!self.keypad.is_down(key));
            }
            Opcode::WaitForKey { x } => {
                return Ok(self.execute_wait_for_key(x));
            }
            Opcode::ReadDelayTimer { x } => {
                self.registers.v[x] = self.timers.delay;
            }
            Opcode::SetDelayTimer { x } => {
                self.timers.delay = self.registers.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                self.timers.sound = self.registers.v[x];
            }
            Opcode::FontChar { x } => {
                self.registers.i = glyph_address(self.registers.v[x]);
            }
            Opcode::BCD { x } => {
                let digits = bcd(self.registers.v[x]);
                self.memory
                    .slice_mut(self.registers.i, digits.len())?
                    .copy_from_slice(&digits);
            }
            Opcode::StoreRegs { x } => {
                let count = usize::from(x) + 1;
                self.memory
                    .slice_mut(self.registers.i, count)?
                    .copy_from_slice(&self.registers.v[..count]);
            }
            Opcode::LoadRegs { x } => {
                let count = usize::from(x) + 1;
                let bytes = self.memory.slice(self.registers.i, count)?;
                self.registers.v[..count].copy_from_slice(bytes);
            }
            Opcode::Unknown(opcode) => {
                log::warn!(
                    "Unknown opcode {opcode:#06X} at {:#05X}, skipping",
                    self.pc.current().wrapping_sub(2)
                );
            }
        };

        Ok(Chip8Result::Continue)
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc.skip_next();
        }
    }

    // The flag is written before the result, so with x = F the result wins.
    fn execute_alu(&mut self, x: u4, y: u4, op: OpcodeALU) {
        let vx = self.registers.v[x];
        let vy = self.registers.v[y];

        let result = match op {
            OpcodeALU::Set => vy,
            OpcodeALU::Or => vx | vy,
            OpcodeALU::And => vx & vy,
            OpcodeALU::Xor => vx ^ vy,
            OpcodeALU::Add => {
                let (sum, carry) = vx.overflowing_add(vy);
                self.registers.set_flag(carry);
                sum
            }
            OpcodeALU::Sub => {
                self.registers.set_flag(vx >= vy);
                vx.wrapping_sub(vy)
            }
            OpcodeALU::SubReverse => {
                self.registers.set_flag(vy >= vx);
                vy.wrapping_sub(vx)
            }
            OpcodeALU::ShiftRight => {
                self.registers.set_flag(vy & 0x01 != 0);
                vy >> 1
            }
            OpcodeALU::ShiftLeft => {
                self.registers.set_flag(vy & 0x80 != 0);
                vy << 1
            }
        };

        self.registers.v[x] = result;
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<(), Chip8Error> {
        let x_pos = self.registers.v[x] as usize;
        let y_pos = self.registers.v[y] as usize;

        // Fails before anything is drawn if the sprite runs off the end of memory
        let rows = self.memory.slice(self.registers.i, usize::from(n))?;

        self.registers.set_flag(false);
        if self.framebuffer.draw_sprite(x_pos, y_pos, rows) {
            self.registers.set_flag(true);
        }

        Ok(())
    }

    fn execute_wait_for_key(&mut self, x: u4) -> Chip8Result {
        match self.keypad.last_pressed() {
            Some(key) => {
                log::debug!("Key {key} pressed while waiting, stored in V{x}");
                self.registers.v[x] = key.get();
                Chip8Result::Continue
            }
            None => {
                // Fetch this instruction again until a key is held
                self.pc.back();
                Chip8Result::WaitingForKey
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::{Chip8Config, SharedKeypad, StackPolicy};

    fn setup(program: &[u8]) -> Chip8 {
        let mut chip8 = Chip8::new(SharedKeypad::new());
        chip8.load(program).unwrap();
        chip8
    }

    fn setup_with_keypad(program: &[u8]) -> (Chip8, SharedKeypad) {
        let keypad = SharedKeypad::new();
        let mut chip8 = Chip8::new(keypad.clone());
        chip8.load(program).unwrap();
        (chip8, keypad)
    }

    fn run(chip8: &mut Chip8, steps: usize) {
        for _ in 0..steps {
            chip8.step().unwrap();
        }
    }

    #[test]
    fn bcd_extracts_three_digits() {
        assert_eq!(bcd(123), [1, 2, 3]);
        assert_eq!(bcd(6), [0, 0, 6]);
        assert_eq!(bcd(80), [0, 8, 0]);
        assert_eq!(bcd(0), [0, 0, 0]);
        assert_eq!(bcd(255), [2, 5, 5]);
    }

    #[test]
    fn bcd_opcode_writes_digits_at_index() {
        // V3 = 0x9C (156), I = 0x300, BCD V3
        let mut chip8 = setup(&[0x63, 0x9C, 0xA3, 0x00, 0xF3, 0x33]);
        run(&mut chip8, 3);

        assert_eq!(&chip8.memory()[0x300..0x303], &[1, 5, 6]);
        assert_eq!(chip8.index(), 0x300);
    }

    #[test]
    fn alu_results_and_flags_follow_reference_formulas() {
        let ops: [(u8, fn(u8, u8) -> (u8, u8)); 9] = [
            (0x0, |_, y| (y, 0xAA)),
            (0x1, |x, y| (x | y, 0xAA)),
            (0x2, |x, y| (x & y, 0xAA)),
            (0x3, |x, y| (x ^ y, 0xAA)),
            (0x4, |x, y| {
                let sum = x as u16 + y as u16;
                ((sum % 256) as u8, (sum > 255) as u8)
            }),
            (0x5, |x, y| (x.wrapping_sub(y), (x >= y) as u8)),
            (0x6, |_, y| (y >> 1, y & 1)),
            (0x7, |x, y| (y.wrapping_sub(x), (y >= x) as u8)),
            (0xE, |_, y| (((y as u16) << 1) as u8, y >> 7)),
        ];
        let values: Vec<u8> = (0..=255).step_by(3).chain([1, 0x7F, 0x80, 0xFF]).collect();

        // 8 1 2 N at 0x200, V1 and V2 are set directly before every step
        let mut chip8 = setup(&[0x81, 0x20]);
        for (n, reference) in ops {
            chip8.memory.slice_mut(0x201, 1).unwrap()[0] = 0x20 | n;

            for &vx in &values {
                for &vy in &values {
                    chip8.pc.jump(0x200);
                    chip8.registers.v[1] = vx;
                    chip8.registers.v[2] = vy;
                    chip8.registers.v[0xF] = 0xAA;
                    chip8.step().unwrap();

                    let (result, flag) = reference(vx, vy);
                    assert_eq!(chip8.registers()[1], result, "8x2{n:X} {vx} {vy}");
                    assert_eq!(chip8.registers()[0xF], flag, "8x2{n:X} {vx} {vy} flag");
                }
            }
        }
    }

    #[test]
    fn alu_result_overrides_flag_when_target_is_vf() {
        // VF = 0xFF, V1 = 0x02, VF += V1
        let mut chip8 = setup(&[0x6F, 0xFF, 0x61, 0x02, 0x8F, 0x14]);
        run(&mut chip8, 3);
        assert_eq!(chip8.registers()[0xF], 0x01);
    }

    #[test]
    fn add_immediate_wraps_without_flag() {
        let mut chip8 = setup(&[0x65, 0xF0, 0x75, 0x20]);
        run(&mut chip8, 2);
        assert_eq!(chip8.registers()[5], 0x10);
        assert_eq!(chip8.registers()[0xF], 0);
    }

    #[test]
    fn skips_advance_by_two_instructions() {
        #[rustfmt::skip]
        let program = [
            0x61, 0x05, // V1 = 5
            0x62, 0x05, // V2 = 5
            0x31, 0x05, // skip if V1 == 5 (taken)
            0x00, 0x00,
            0x41, 0x05, // skip if V1 != 5 (not taken)
            0x51, 0x20, // skip if V1 == V2 (taken)
            0x00, 0x00,
            0x91, 0x20, // skip if V1 != V2 (not taken)
        ];
        let mut chip8 = setup(&program);

        run(&mut chip8, 3);
        assert_eq!(chip8.pc(), 0x208);
        run(&mut chip8, 1);
        assert_eq!(chip8.pc(), 0x20A);
        run(&mut chip8, 1);
        assert_eq!(chip8.pc(), 0x20E);
        run(&mut chip8, 1);
        assert_eq!(chip8.pc(), 0x210);
    }

    #[test]
    fn call_and_return_round_trip() {
        #[rustfmt::skip]
        let program = [
            0x22, 0x06, // call 0x206
            0x60, 0x01, // V0 = 1
            0x00, 0x00,
            0x00, 0xEE, // return
        ];
        let mut chip8 = setup(&program);

        run(&mut chip8, 1);
        assert_eq!(chip8.pc(), 0x206);
        assert_eq!(chip8.stack(), &[0x202]);

        run(&mut chip8, 1);
        assert_eq!(chip8.pc(), 0x202);
        assert!(chip8.stack().is_empty());
    }

    #[test]
    fn jump_and_jump_with_offset() {
        let mut chip8 = setup(&[0x60, 0x10, 0xB3, 0x00]);
        run(&mut chip8, 2);
        assert_eq!(chip8.pc(), 0x310);

        let mut chip8 = setup(&[0x1A, 0xBC]);
        run(&mut chip8, 1);
        assert_eq!(chip8.pc(), 0xABC);
    }

    #[test]
    fn deep_recursion_overflows_strict_stack() {
        // 0x200: call 0x200
        let mut chip8 = setup(&[0x22, 0x00]);
        run(&mut chip8, 16);

        assert_eq!(chip8.step(), Err(Chip8Error::StackOverflow { depth: 16 }));
        assert_eq!(chip8.stack().len(), 16);
    }

    #[test]
    fn deep_recursion_wraps_lenient_stack() {
        let config = Chip8Config {
            stack_policy: StackPolicy::Wrap,
            ..Default::default()
        };
        let mut chip8 = Chip8::with_config(SharedKeypad::new(), config);
        chip8.load(&[0x22, 0x00]).unwrap();

        run(&mut chip8, 40);
        assert_eq!(chip8.pc(), 0x200);
    }

    #[test]
    fn random_is_masked() {
        let mut chip8 = setup(&[0xC0, 0x0F, 0xC1, 0x00]);
        run(&mut chip8, 2);
        assert!(chip8.registers()[0] <= 0x0F);
        assert_eq!(chip8.registers()[1], 0);
    }

    #[test]
    fn add_index_sets_flag_past_twelve_bits() {
        // I = 0xFFE, V0 = 1, I += V0, I += V0
        let mut chip8 = setup(&[0xAF, 0xFE, 0x60, 0x01, 0xF0, 0x1E, 0xF0, 0x1E]);
        run(&mut chip8, 3);
        assert_eq!(chip8.index(), 0xFFF);
        assert_eq!(chip8.registers()[0xF], 0);

        run(&mut chip8, 1);
        assert_eq!(chip8.index(), 0x1000);
        assert_eq!(chip8.registers()[0xF], 1);
    }

    #[test]
    fn add_index_wraps_at_sixteen_bits() {
        let mut chip8 = setup(&[0xF0, 0x1E]);
        chip8.registers.i = 0xFFFF;
        chip8.registers.v[0] = 2;
        run(&mut chip8, 1);
        assert_eq!(chip8.index(), 0x0001);
        assert_eq!(chip8.registers()[0xF], 1);
    }

    #[test]
    fn draw_sets_collision_only_on_overlap() {
        #[rustfmt::skip]
        let program = [
            0x60, 0x05, // V0 = 5
            0xF0, 0x29, // I = glyph 5
            0xD1, 0x25, // draw at (V1, V2)
            0xD1, 0x25, // draw again
        ];
        let mut chip8 = setup(&program);

        run(&mut chip8, 3);
        assert_eq!(chip8.registers()[0xF], 0);
        assert!(chip8.framebuffer().is_set(0, 0));

        run(&mut chip8, 1);
        assert_eq!(chip8.registers()[0xF], 1);
        assert!(chip8.framebuffer().rows().iter().flatten().all(|p| !p));
        assert!(chip8.framebuffer().is_dirty());
    }

    #[test]
    fn draw_wraps_around_screen_edges() {
        // V0 = 65, V1 = 33, I = glyph 0, draw 1 row
        let mut chip8 = setup(&[0x60, 0x41, 0x61, 0x21, 0xA0, 0x50, 0xD0, 0x11]);
        run(&mut chip8, 4);

        // Glyph 0 top row is 0xF0
        for x in 1..5 {
            assert!(chip8.framebuffer().is_set(x, 1));
        }
        assert!(!chip8.framebuffer().is_set(5, 1));
    }

    #[test]
    fn draw_past_end_of_memory_leaves_state_untouched() {
        let mut chip8 = setup(&[0xAF, 0xFE, 0x6F, 0x07, 0xD0, 0x05]);
        run(&mut chip8, 2);

        assert!(matches!(
            chip8.step(),
            Err(Chip8Error::MemoryOutOfBounds { .. })
        ));
        assert_eq!(chip8.registers()[0xF], 0x07);
        assert!(chip8.framebuffer().rows().iter().flatten().all(|p| !p));
    }

    #[test]
    fn clear_display_marks_dirty() {
        let mut chip8 = setup(&[0xA0, 0x50, 0xD0, 0x05, 0x00, 0xE0]);
        run(&mut chip8, 2);
        chip8.present(&mut |_: &crate::emu::Framebuffer| {});

        run(&mut chip8, 1);
        assert!(chip8.framebuffer().is_dirty());
        assert!(chip8.framebuffer().rows().iter().flatten().all(|p| !p));
    }

    #[test]
    fn key_skips_use_low_nibble_of_register() {
        #[rustfmt::skip]
        let program = [
            0x60, 0x1A, // V0 = 0x1A, masks to key A
            0xE0, 0x9E, // skip if key A down (taken)
            0x00, 0x00,
            0xE0, 0xA1, // skip if key A up (not taken)
        ];
        let (mut chip8, keypad) = setup_with_keypad(&program);
        keypad.press(u4::new(0xA));

        run(&mut chip8, 2);
        assert_eq!(chip8.pc(), 0x206);
        run(&mut chip8, 1);
        assert_eq!(chip8.pc(), 0x208);
    }

    #[test]
    fn wait_for_key_rewinds_until_key_is_held() {
        let (mut chip8, keypad) = setup_with_keypad(&[0xF3, 0x0A, 0x00, 0x00]);

        for _ in 0..3 {
            assert_eq!(chip8.step(), Ok(Chip8Result::WaitingForKey));
            assert_eq!(chip8.pc(), 0x200);
        }

        keypad.press(u4::new(0x7));
        assert_eq!(chip8.step(), Ok(Chip8Result::Continue));
        assert_eq!(chip8.registers()[3], 0x7);
        assert_eq!(chip8.pc(), 0x202);
    }

    #[test]
    fn wait_for_key_takes_key_still_held_after_another_release() {
        let (mut chip8, keypad) = setup_with_keypad(&[0xF3, 0x0A, 0x00, 0x00]);
        keypad.press(u4::new(0x1));
        keypad.press(u4::new(0x2));
        keypad.release(u4::new(0x2));

        assert_eq!(chip8.step(), Ok(Chip8Result::Continue));
        assert_eq!(chip8.registers()[3], 0x1);
        assert_eq!(chip8.pc(), 0x202);
    }

    #[test]
    fn timer_opcodes_read_and_write() {
        #[rustfmt::skip]
        let program = [
            0x60, 0x30, // V0 = 0x30
            0xF0, 0x15, // DT = V0
            0xF0, 0x18, // ST = V0
            0xF1, 0x07, // V1 = DT
        ];
        let mut chip8 = setup(&program);
        run(&mut chip8, 3);
        chip8.tick(&mut crate::emu::Mute);
        run(&mut chip8, 1);

        assert_eq!(chip8.delay_timer(), 0x2F);
        assert_eq!(chip8.sound_timer(), 0x2F);
        assert_eq!(chip8.registers()[1], 0x2F);
    }

    #[test]
    fn font_char_points_at_glyph() {
        let mut chip8 = setup(&[0x6A, 0x0B, 0xFA, 0x29]);
        run(&mut chip8, 2);
        assert_eq!(chip8.index(), 0x50 + 0xB * 5);
        assert_eq!(chip8.memory()[chip8.index() as usize], 0xE0);
    }

    #[test]
    fn store_and_load_registers() {
        #[rustfmt::skip]
        let program = [
            0x60, 0x11, 0x61, 0x22, 0x62, 0x33, // V0..V2
            0xA4, 0x00, // I = 0x400
            0xF2, 0x55, // store V0..V2
            0x60, 0x00, 0x61, 0x00, 0x62, 0x00,
            0xF1, 0x65, // load V0..V1
        ];
        let mut chip8 = setup(&program);
        run(&mut chip8, 5);
        assert_eq!(&chip8.memory()[0x400..0x404], &[0x11, 0x22, 0x33, 0x00]);
        assert_eq!(chip8.index(), 0x400);

        run(&mut chip8, 4);
        assert_eq!(&chip8.registers()[..3], &[0x11, 0x22, 0x00]);
    }

    #[test]
    fn store_registers_past_end_of_memory_fails_without_writing() {
        let mut chip8 = setup(&[0xAF, 0xFE, 0x60, 0x55, 0xF2, 0x55]);
        run(&mut chip8, 2);

        assert!(chip8.step().is_err());
        assert_eq!(&chip8.memory()[0xFFE..], &[0, 0]);
    }

    #[test]
    fn unknown_opcode_is_skipped() {
        let mut chip8 = setup(&[0x60, 0x09, 0xF0, 0xFF, 0x80, 0x0F]);
        run(&mut chip8, 1);
        let registers = *chip8.registers();

        assert_eq!(chip8.step(), Ok(Chip8Result::Continue));
        assert_eq!(chip8.step(), Ok(Chip8Result::Continue));
        assert_eq!(chip8.pc(), 0x206);
        assert_eq!(chip8.registers(), &registers);
        assert_eq!(chip8.index(), 0);
    }
}
