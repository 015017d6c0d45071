use crate::u4;

/// CHIP-8 instruction opcodes.
///
/// The fields (x, y, n, nn, nnn) correspond to the operands encoded in the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// 1nnn - Jump to location nnn.
    Jump { nnn: u16 },
    /// Bnnn - Jump to location nnn + V0.
    JumpWithOffset { nnn: u16 },

    /// 2nnn - Call subroutine at nnn.
    Call { nnn: u16 },
    /// 00EE - Return from a subroutine.
    Return,

    /// 3xnn - Skip next instruction if Vx == nn.
    SkipRegEqualImm { x: u4, nn: u8 },
    /// 4xnn - Skip next instruction if Vx != nn.
    SkipRegNotEqualImm { x: u4, nn: u8 },
    /// 5xyN - Skip next instruction if Vx == Vy. N is ignored.
    SkipRegEqualReg { x: u4, y: u4 },
    /// 9xyN - Skip next instruction if Vx != Vy. N is ignored.
    SkipRegNotEqualReg { x: u4, y: u4 },

    /// 6xnn - Set Vx = nn.
    SetRegImm { x: u4, nn: u8 },
    /// 7xnn - Set Vx = Vx + nn.
    AddRegImm { x: u4, nn: u8 },
    /// Annn - Set I = nnn.
    SetIndexImm { nnn: u16 },
    /// Fx1E - Set I = I + Vx, VF = 1 when the sum leaves 12 bits.
    AddIndexReg { x: u4 },

    /// 8xyN - ALU operations
    ALU { x: u4, y: u4, op: OpcodeALU },
    /// Cxnn - Set Vx = random byte AND nn.
    Random { x: u4, nn: u8 },

    /// 00E0 - Clear the display.
    ClearDisplay,
    /// Dxyn - Display sprite.
    Draw { x: u4, y: u4, n: u4 },

    /// Ex9E - Skip next instruction if key with the value of Vx is pressed.
    SkipIfPressed { x: u4 },
    /// ExA1 - Skip next instruction if key with the value of Vx is not pressed.
    SkipIfNotPressed { x: u4 },
    /// Fx0A - Wait for a key press, store the value of the key in Vx.
    WaitForKey { x: u4 },

    /// Fx07 - Set Vx = delay timer value.
    ReadDelayTimer { x: u4 },
    /// Fx15 - Set delay timer = Vx.
    SetDelayTimer { x: u4 },
    /// Fx18 - Set sound timer = Vx.
    SetSoundTimer { x: u4 },

    /// Fx29 - Set I = location of sprite for digit Vx.
    FontChar { x: u4 },
    /// Fx33 - Store BCD representation of Vx in memory locations I, I+1, and I+2.
    BCD { x: u4 },

    /// Fx55 - Store registers V0 through Vx in memory starting at location I.
    StoreRegs { x: u4 },
    /// Fx65 - Read registers V0 through Vx from memory starting at location I.
    LoadRegs { x: u4 },

    /// Represents an unknown opcode.
    Unknown(u16),
}

/// ALU operations for the 8xyN instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeALU {
    /// 8xy0 - Vx = Vy
    Set,
    /// 8xy1 - Vx = Vx OR Vy
    Or,
    /// 8xy2 - Vx = Vx AND Vy
    And,
    /// 8xy3 - Vx = Vx XOR Vy
    Xor,
    /// 8xy4 - Vx = Vx + Vy
    Add,
    /// 8xy5 - Vx = Vx - Vy
    Sub,
    /// 8xy6 - Vx = Vy SHR 1
    ShiftRight,
    /// 8xy7 - Vx = Vy - Vx
    SubReverse,
    /// 8xyE - Vx = Vy SHL 1
    ShiftLeft,
}

impl Opcode {
    /// Decode a 16-bit raw opcode into an `Opcode` enum variant.
    ///
    /// The top nibble selects the instruction family. Families 0, 8, E and F
    /// select the instruction with a second field.
    pub fn decode(opcode: u16) -> Self {
        let family = ((opcode & 0xF000) >> 12) as u8;
        let x = u4::new(((opcode & 0x0F00) >> 8) as u8);
        let y = u4::new(((opcode & 0x00F0) >> 4) as u8);
        let n = u4::new((opcode & 0x000F) as u8);
        let nn = (opcode & 0x00FF) as u8;
        let nnn = opcode & 0x0FFF;

        match family {
            0x0 => match nn {
                0xE0 => Opcode::ClearDisplay,
                0xEE => Opcode::Return,
                _ => Opcode::Unknown(opcode),
            },
            0x1 => Opcode::Jump { nnn },
            0x2 => Opcode::Call { nnn },
            0x3 => Opcode::SkipRegEqualImm { x, nn },
            0x4 => Opcode::SkipRegNotEqualImm { x, nn },
            0x5 => Opcode::SkipRegEqualReg { x, y },
            0x6 => Opcode::SetRegImm { x, nn },
            0x7 => Opcode::AddRegImm { x, nn },
            0x8 => match OpcodeALU::decode(n) {
                Some(op) => Opcode::ALU { x, y, op },
                None => Opcode::Unknown(opcode),
            },
            0x9 => Opcode::SkipRegNotEqualReg { x, y },
            0xA => Opcode::SetIndexImm { nnn },
            0xB => Opcode::JumpWithOffset { nnn },
            0xC => Opcode::Random { x, nn },
            0xD => Opcode::Draw { x, y, n },
            0xE => match nn {
                0x9E => Opcode::SkipIfPressed { x },
                0xA1 => Opcode::SkipIfNotPressed { x },
                _ => Opcode::Unknown(opcode),
            },
            0xF => match nn {
                0x07 => Opcode::ReadDelayTimer { x },
                0x0A => Opcode::WaitForKey { x },
                0x15 => Opcode::SetDelayTimer { x },
                0x18 => Opcode::SetSoundTimer { x },
                0x1E => Opcode::AddIndexReg { x },
                0x29 => Opcode::FontChar { x },
                0x33 => Opcode::BCD { x },
                0x55 => Opcode::StoreRegs { x },
                0x65 => Opcode::LoadRegs { x },
                _ => Opcode::Unknown(opcode),
            },

            _ => Opcode::Unknown(opcode),
        }
    }
}

impl OpcodeALU {
    fn decode(n: u4) -> Option<Self> {
        Some(match n.get() {
            0x0 => OpcodeALU::Set,
            0x1 => OpcodeALU::Or,
            0x2 => OpcodeALU::And,
            0x3 => OpcodeALU::Xor,
            0x4 => OpcodeALU::Add,
            0x5 => OpcodeALU::Sub,
            0x6 => OpcodeALU::ShiftRight,
            0x7 => OpcodeALU::SubReverse,
            0xE => OpcodeALU::ShiftLeft,
            _ => return None,
        })
    }
}
