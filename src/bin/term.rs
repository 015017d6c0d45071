use std::{
    fs::File,
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    DefaultTerminal,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::Stylize,
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget},
};

use chip8_interp::{
    emu::{
        Chip8, Chip8Config, Chip8Error, Chip8Runner, DISPLAY_X, DISPLAY_Y, Display, Framebuffer,
        Keypad, STACK_DEPTH, SharedKeypad, Sound, StackPolicy,
    },
    u4,
};

/// Keyboard characters laid out like the COSMAC VIP hex keypad.
#[rustfmt::skip]
const KEYPAD_ROWS: [[(char, u8); 4]; 4] = [
    [('1', 0x1), ('2', 0x2), ('3', 0x3), ('4', 0xC)],
    [('q', 0x4), ('w', 0x5), ('e', 0x6), ('r', 0xD)],
    [('a', 0x7), ('s', 0x8), ('d', 0x9), ('f', 0xE)],
    [('z', 0xA), ('x', 0x0), ('c', 0xB), ('v', 0xF)],
];

/// Most terminals never report key releases, so a key counts as released
/// this long after its last press or repeat.
const KEY_HOLD: Duration = Duration::from_millis(50);

const INPUT_POLL: Duration = Duration::from_millis(4);

const SIDE_WIDTH: u16 = 21;
const DISPLAY_WIDTH: u16 = DISPLAY_X as u16 + 2;
const DISPLAY_HEIGHT: u16 = DISPLAY_Y as u16 + 2;

fn keypad_key(c: char) -> Option<u4> {
    let c = c.to_ascii_lowercase();
    KEYPAD_ROWS
        .iter()
        .flatten()
        .find(|(label, _)| *label == c)
        .map(|&(_, key)| u4::new(key))
}

/// Release deadlines for keys pressed in the terminal.
struct HeldKeys {
    keypad: SharedKeypad,
    deadlines: [Option<Instant>; 16],
}

impl HeldKeys {
    fn press(&mut self, key: u4) {
        self.keypad.press(key);
        self.deadlines[key] = Some(Instant::now() + KEY_HOLD);
    }

    fn release_expired(&mut self, now: Instant) {
        for key in u4::all() {
            if self.deadlines[key].is_some_and(|deadline| now >= deadline) {
                self.deadlines[key] = None;
                self.keypad.release(key);
            }
        }
    }
}

/// Lights the status title for a moment after each beep.
#[derive(Default)]
struct BeepIndicator {
    last_beep: Option<Instant>,
}

impl BeepIndicator {
    fn is_on(&self) -> bool {
        self.last_beep
            .is_some_and(|time| time.elapsed() < Duration::from_millis(100))
    }
}

impl Sound for BeepIndicator {
    fn beep(&mut self) {
        self.last_beep = Some(Instant::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Running,
    Paused,
    /// The interpreter returned an error and will not run again.
    Halted,
}

struct App {
    runner: Chip8Runner,
    keys: HeldKeys,
    screen: Display<bool>,
    beep: BeepIndicator,
    mode: Mode,
    status: String,
    quit: bool,
    last_update: Instant,
}

impl App {
    fn new(rom: &[u8], config: Chip8Config) -> anyhow::Result<Self> {
        let keypad = SharedKeypad::new();
        let mut chip8 = Chip8::with_config(keypad.clone(), config);
        chip8.load(rom).context("Failed to load ROM")?;

        Ok(Self {
            runner: Chip8Runner::new(chip8),
            keys: HeldKeys {
                keypad,
                deadlines: [None; 16],
            },
            screen: [[false; DISPLAY_X]; DISPLAY_Y],
            beep: BeepIndicator::default(),
            mode: Mode::Running,
            status: "Tab pause  Enter step  Esc quit".to_string(),
            quit: false,
            last_update: Instant::now(),
        })
    }

    fn run(&mut self, terminal: &mut DefaultTerminal) -> anyhow::Result<()> {
        while !self.quit {
            let now = Instant::now();
            let dt = now.duration_since(self.last_update).as_secs_f32();
            self.last_update = now;

            if self.mode == Mode::Running
                && let Err(e) = self.runner.update(dt, &mut self.beep)
            {
                self.halt(e);
            }
            self.keys.release_expired(now);

            let screen = &mut self.screen;
            self.runner
                .present(&mut |frame: &Framebuffer| *screen = *frame.rows());
            terminal.draw(|frame| frame.render_widget(&*self, frame.area()))?;

            if event::poll(INPUT_POLL)?
                && let Event::Key(key) = event::read()?
            {
                self.on_key(key);
            }
        }

        Ok(())
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.quit = true,
            KeyCode::Char('c') if ctrl => self.quit = true,
            KeyCode::Tab => self.toggle_pause(),
            KeyCode::Enter if self.mode == Mode::Paused => self.step(),
            KeyCode::Char(c) => {
                if let Some(key) = keypad_key(c) {
                    self.keys.press(key);
                }
            }
            _ => (),
        }
    }

    fn toggle_pause(&mut self) {
        self.mode = match self.mode {
            Mode::Running => Mode::Paused,
            Mode::Paused => {
                self.last_update = Instant::now();
                Mode::Running
            }
            Mode::Halted => return,
        };
        self.status = format!("{:?}", self.mode);
    }

    fn step(&mut self) {
        let chip8 = self.runner.chip8_mut();
        let pc = chip8.pc();

        match chip8.step() {
            Ok(result) => self.status = format!("{pc:03X}: {result:?}"),
            Err(e) => self.halt(e),
        }
    }

    fn halt(&mut self, error: Chip8Error) {
        log::error!(
            "Interpreter halted at {:03X}: {error}",
            self.runner.chip8_ref().pc()
        );
        self.status = format!("Halted: {error}");
        self.mode = Mode::Halted;
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (min_width, min_height) = (DISPLAY_WIDTH + SIDE_WIDTH, DISPLAY_HEIGHT + 3);
        if area.width < min_width || area.height < min_height {
            Line::from(format!("Needs a {min_width}x{min_height} terminal"))
                .red()
                .centered()
                .render(area, buf);
            return;
        }

        let [main, side] = Layout::horizontal([
            Constraint::Min(DISPLAY_WIDTH),
            Constraint::Length(SIDE_WIDTH),
        ])
        .areas(area);
        let [display, status] =
            Layout::vertical([Constraint::Length(DISPLAY_HEIGHT), Constraint::Min(3)])
                .areas(main);
        let [registers, keypad, stack] = Layout::vertical([
            Constraint::Length(11 + 2),
            Constraint::Length(4 + 2),
            Constraint::Min(3),
        ])
        .areas(side);

        self.render_display(display, buf);
        self.render_status(status, buf);
        self.render_registers(registers, buf);
        self.render_keypad(keypad, buf);
        self.render_stack(stack, buf);
    }
}

impl App {
    fn render_display(&self, area: Rect, buf: &mut Buffer) {
        let lines: Vec<Line> = self
            .screen
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&lit| if lit { '█' } else { ' ' })
                    .collect::<String>()
                    .into()
            })
            .collect();

        Paragraph::new(lines)
            .green()
            .centered()
            .block(Block::bordered().title(" Display "))
            .render(area, buf);
    }

    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        let mode = match (self.mode, self.beep.is_on()) {
            (Mode::Running, true) => Line::from(" BEEP ").magenta(),
            (Mode::Running, false) => Line::from(" RUNNING ").green(),
            (Mode::Paused, _) => Line::from(" PAUSED ").yellow(),
            (Mode::Halted, _) => Line::from(" HALTED ").red(),
        };

        Paragraph::new(self.status.as_str())
            .block(Block::bordered().title(mode))
            .render(area, buf);
    }

    fn render_registers(&self, area: Rect, buf: &mut Buffer) {
        let chip8 = self.runner.chip8_ref();
        let v = chip8.registers();

        let mut lines = vec![
            Line::from(format!("PC {:03X}   I {:03X}", chip8.pc(), chip8.index())),
            Line::from(format!(
                "DT  {:02X}  ST  {:02X}",
                chip8.delay_timer(),
                chip8.sound_timer()
            )),
            Line::default(),
        ];
        lines.extend((0..8).map(|n| {
            Line::from(format!(
                "V{n:X}  {:02X}  V{:X}  {:02X}",
                v[n],
                n + 8,
                v[n + 8]
            ))
        }));

        Paragraph::new(lines)
            .block(Block::bordered().title(" CPU "))
            .render(area, buf);
    }

    fn render_keypad(&self, area: Rect, buf: &mut Buffer) {
        let keypad = &self.keys.keypad;
        let lines: Vec<Line> = KEYPAD_ROWS
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&(_, key)| {
                        let label = Span::raw(format!(" {key:X} "));
                        if keypad.is_down(u4::new(key)) {
                            label.reversed()
                        } else {
                            label
                        }
                    })
                    .collect::<Vec<_>>()
                    .into()
            })
            .collect();

        Paragraph::new(lines)
            .centered()
            .block(Block::bordered().title(" Keypad "))
            .render(area, buf);
    }

    fn render_stack(&self, area: Rect, buf: &mut Buffer) {
        let stack = self.runner.chip8_ref().stack();
        let rows = usize::from(area.height.saturating_sub(2));

        // Newest return address on top
        let lines: Vec<Line> = if stack.is_empty() {
            vec![Line::from("empty").dim()]
        } else {
            stack
                .iter()
                .enumerate()
                .rev()
                .take(rows)
                .map(|(depth, addr)| Line::from(format!("{depth:>2}  {addr:03X}")))
                .collect()
        };

        Paragraph::new(lines)
            .centered()
            .block(Block::bordered().title(format!(" Stack {}/{STACK_DEPTH} ", stack.len())))
            .render(area, buf);
    }
}

/// Terminal CHIP-8 interpreter with a live view of its registers and stack.
///
/// The hex keypad sits on 1-4, Q-R, A-F and Z-V. Tab pauses, Enter steps one
/// instruction while paused, Escape quits.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// ROM image to run
    rom_path: PathBuf,

    /// Instructions executed per frame
    #[arg(long, default_value_t = 10)]
    cycles_per_frame: u32,

    /// Frames per second, also the timer frequency
    #[arg(long, default_value_t = 60.0)]
    frame_rate: f32,

    /// Let the call stack wrap around instead of failing on overflow
    #[arg(long)]
    wrap_stack: bool,

    /// Write logs to this file, filtered by RUST_LOG
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> Chip8Config {
        Chip8Config {
            cycles_per_frame: self.cycles_per_frame,
            frame_rate: self.frame_rate,
            stack_policy: if self.wrap_stack {
                StackPolicy::Wrap
            } else {
                StackPolicy::Strict
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    anyhow::ensure!(args.frame_rate > 0.0, "Frame rate must be positive");

    // The terminal belongs to the UI, so logs only go to a file
    if let Some(path) = &args.log_file {
        let file = File::create(path).context("Failed to create log file")?;
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }

    let rom = std::fs::read(&args.rom_path)
        .with_context(|| format!("Failed to read {}", args.rom_path.display()))?;
    let mut app = App::new(&rom, args.config())?;
    log::info!("Running {}", args.rom_path.display());

    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal);
    ratatui::restore();

    result
}
