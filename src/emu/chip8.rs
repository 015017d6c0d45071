use super::{
    Chip8Config, Chip8Error, Chip8Result, FONT, Framebuffer, Keypad, MEMORY_SIZE, Memory,
    Opcode, ProgramCounter, Registers, RenderSink, Sound, Timers,
};

/// CHIP-8 virtual machine state
pub struct Chip8 {
    /// 4KB memory holding the font and the program
    pub(crate) memory: Memory,
    /// V0-VF and the index register
    pub(crate) registers: Registers,
    /// Program counter and call stack
    pub(crate) pc: ProgramCounter,
    /// Delay and sound timers, counted down once per frame
    pub(crate) timers: Timers,
    /// Display buffer: 64x32 monochrome pixels
    pub(crate) framebuffer: Framebuffer,
    /// Injected keypad, written by whoever handles input
    pub(crate) keypad: Box<dyn Keypad>,

    config: Chip8Config,
}

impl Chip8 {
    pub fn new(keypad: impl Keypad + 'static) -> Self {
        Self::with_config(keypad, Chip8Config::default())
    }

    pub fn with_config(keypad: impl Keypad + 'static, config: Chip8Config) -> Self {
        Chip8 {
            memory: Memory::new(),
            registers: Registers::new(),
            pc: ProgramCounter::new(config.stack_policy),
            timers: Timers::new(),
            framebuffer: Framebuffer::new(),
            keypad: Box::new(keypad),
            config,
        }
    }

    /// Resets the machine, then loads the built-in font and `rom` into memory.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        self.load_with_font(&FONT, rom)
    }

    /// Resets the machine, then loads a caller-supplied font and `rom` into memory.
    ///
    /// Nothing is changed if the font or the ROM has an unusable size.
    pub fn load_with_font(&mut self, font: &[u8], rom: &[u8]) -> Result<(), Chip8Error> {
        self.memory.load(font, rom)?;
        self.reset();

        log::debug!("Loaded {} byte ROM", rom.len());
        Ok(())
    }

    /// Resets registers, timers, stack and display. Memory is kept.
    pub fn reset(&mut self) {
        self.registers.reset();
        self.pc.reset();
        self.timers.reset();
        self.framebuffer.clear();
    }

    /// Executes a single CPU cycle (fetch, decode, execute).
    ///
    /// The program counter moves past the instruction before it executes,
    /// so a call saves the address of the following instruction.
    pub fn step(&mut self) -> Result<Chip8Result, Chip8Error> {
        let addr = self.pc.current();
        let opcode = self.memory.read_word(addr)?;
        self.pc.next();

        let decoded_opcode = Opcode::decode(opcode);
        log::trace!("{addr:03X}: {opcode:04X} {decoded_opcode:?}");

        self.execute(decoded_opcode)
    }

    /// Updates the delay and sound timers. Should be called once per frame.
    pub fn tick(&mut self, sound: &mut dyn Sound) {
        self.timers.tick(sound);
    }

    /// Hands the display to `sink` if anything was drawn since the last call.
    pub fn present(&mut self, sink: &mut dyn RenderSink) {
        self.framebuffer.present(sink);
    }

    pub fn config(&self) -> &Chip8Config {
        &self.config
    }

    pub fn pc(&self) -> u16 {
        self.pc.current()
    }

    pub fn index(&self) -> u16 {
        self.registers.i
    }

    pub fn registers(&self) -> &[u8; 16] {
        &self.registers.v
    }

    /// Saved return addresses, oldest first.
    pub fn stack(&self) -> Vec<u16> {
        self.pc.saved()
    }

    pub fn delay_timer(&self) -> u8 {
        self.timers.delay
    }

    pub fn sound_timer(&self) -> u8 {
        self.timers.sound
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn keypad(&self) -> &dyn Keypad {
        self.keypad.as_ref()
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        self.memory.as_bytes()
    }
}
