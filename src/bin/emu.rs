use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Context;
use clap::Parser;
use pixels::{Pixels, SurfaceTexture};
use rodio::{OutputStream, OutputStreamBuilder, Sink, Source, source::SquareWave};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, KeyCode, NamedKey, PhysicalKey},
    window::{Window, WindowId},
};

use chip8_interp::{
    emu::{
        Chip8, Chip8Config, Chip8Runner, DISPLAY_X, DISPLAY_Y, Display, Framebuffer,
        SharedKeypad, Sound, StackPolicy,
    },
    u4,
};

/// Brightness a dark pixel loses per second.
const FADE_PER_SECOND: f32 = 10.0;

const TONE_HZ: f32 = 440.0;

/// Physical keys laid out like the COSMAC VIP hex keypad.
#[rustfmt::skip]
const KEYPAD_ROWS: [[(KeyCode, u8); 4]; 4] = [
    [(KeyCode::Digit1, 0x1), (KeyCode::Digit2, 0x2), (KeyCode::Digit3, 0x3), (KeyCode::Digit4, 0xC)],
    [(KeyCode::KeyQ, 0x4), (KeyCode::KeyW, 0x5), (KeyCode::KeyE, 0x6), (KeyCode::KeyR, 0xD)],
    [(KeyCode::KeyA, 0x7), (KeyCode::KeyS, 0x8), (KeyCode::KeyD, 0x9), (KeyCode::KeyF, 0xE)],
    [(KeyCode::KeyZ, 0xA), (KeyCode::KeyX, 0x0), (KeyCode::KeyC, 0xB), (KeyCode::KeyV, 0xF)],
];

fn keypad_key(code: KeyCode) -> Option<u4> {
    KEYPAD_ROWS
        .iter()
        .flatten()
        .find(|(physical, _)| *physical == code)
        .map(|&(_, key)| u4::new(key))
}

/// Square wave that sounds while the interpreter keeps beeping.
struct Tone {
    /// Dropping the stream stops all output.
    _stream: OutputStream,
    sink: Sink,
    requested: bool,
}

impl Tone {
    fn open() -> anyhow::Result<Self> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .context("Failed to open audio output stream")?;
        stream.log_on_drop(false);

        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        sink.append(SquareWave::new(TONE_HZ).amplify(0.5));

        Ok(Self {
            _stream: stream,
            sink,
            requested: false,
        })
    }

    /// Plays if any frame since the last call beeped, pauses otherwise.
    fn settle(&mut self) {
        if std::mem::take(&mut self.requested) {
            self.sink.play();
        } else {
            self.sink.pause();
        }
    }
}

impl Sound for Tone {
    fn beep(&mut self) {
        self.requested = true;
    }
}

/// Per-pixel brightness, so pixels that go dark fade out like a CRT.
struct Phosphor {
    level: Display<f32>,
}

impl Phosphor {
    fn new() -> Self {
        Self {
            level: [[0.0; DISPLAY_X]; DISPLAY_Y],
        }
    }

    fn expose(&mut self, screen: &Display<bool>, dt: f32) {
        let fade = FADE_PER_SECOND * dt;

        for (levels, row) in self.level.iter_mut().zip(screen) {
            for (level, &lit) in levels.iter_mut().zip(row) {
                *level = if lit { 1.0 } else { (*level - fade).max(0.0) };
            }
        }
    }

    fn write_rgba(&self, frame: &mut [u8]) {
        for (pixel, level) in frame.chunks_exact_mut(4).zip(self.level.iter().flatten()) {
            pixel.copy_from_slice(&[0, 0xff, 0, (level * 255.0) as u8]);
        }
    }
}

struct App {
    scale: u32,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,

    /// Last frame the interpreter presented.
    screen: Display<bool>,
    phosphor: Phosphor,
    tone: Tone,

    runner: Chip8Runner,
    keypad: SharedKeypad,
    last_redraw: Instant,

    /// First error raised inside the event loop.
    error: Option<anyhow::Error>,
}

impl App {
    fn new(rom: &[u8], config: Chip8Config, scale: u32) -> anyhow::Result<Self> {
        let tone = Tone::open()?;

        let keypad = SharedKeypad::new();
        let mut chip8 = Chip8::with_config(keypad.clone(), config);
        chip8.load(rom).context("Failed to load ROM")?;

        Ok(Self {
            scale,
            window: None,
            pixels: None,
            screen: [[false; DISPLAY_X]; DISPLAY_Y],
            phosphor: Phosphor::new(),
            tone,
            runner: Chip8Runner::new(chip8),
            keypad,
            last_redraw: Instant::now(),
            error: None,
        })
    }

    fn create_surface(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let (width, height) = (DISPLAY_X as u32, DISPLAY_Y as u32);
        let attributes = Window::default_attributes()
            .with_title("chip8-interp")
            .with_inner_size(LogicalSize::new(width * self.scale, height * self.scale))
            .with_min_inner_size(LogicalSize::new(width, height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("Failed to create window")?,
        );

        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width, size.height, window.clone());
        let pixels =
            Pixels::new(width, height, surface).context("Failed to create pixel buffer")?;

        window.request_redraw();
        self.window = Some(window);
        self.pixels = Some(pixels);
        // Time spent creating the window is not interpreter time
        self.last_redraw = Instant::now();
        Ok(())
    }

    fn redraw(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_redraw).as_secs_f32();
        self.last_redraw = now;

        let frames = self
            .runner
            .update(dt, &mut self.tone)
            .context("Interpreter stopped")?;
        if frames > 0 {
            self.tone.settle();
        }

        let screen = &mut self.screen;
        self.runner
            .present(&mut |frame: &Framebuffer| *screen = *frame.rows());
        self.phosphor.expose(&self.screen, dt);

        if let Some(pixels) = self.pixels.as_mut() {
            self.phosphor.write_rgba(pixels.frame_mut());
            pixels.render().context("Failed to render frame")?;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
        Ok(())
    }

    fn handle_key(&self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.logical_key == Key::Named(NamedKey::Escape) {
            event_loop.exit();
        } else if let PhysicalKey::Code(code) = event.physical_key
            && let Some(key) = keypad_key(code)
        {
            let pressed = event.state.is_pressed();
            log::trace!("Key {key} {}", if pressed { "down" } else { "up" });
            self.keypad.set(key, pressed);
        }
    }

    fn handle_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        event: WindowEvent,
    ) -> anyhow::Result<()> {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            // Releases are not delivered to an unfocused window
            WindowEvent::Focused(false) => self.keypad.release_all(),
            WindowEvent::Resized(size) => {
                if let Some(pixels) = self.pixels.as_mut() {
                    pixels
                        .resize_surface(size.width, size.height)
                        .context("Failed to resize pixel buffer")?;
                }
            }
            WindowEvent::RedrawRequested => self.redraw()?,
            _ => (),
        }
        Ok(())
    }

    fn stop_on_error(&mut self, event_loop: &ActiveEventLoop, result: anyhow::Result<()>) {
        if let Err(e) = result {
            self.error = Some(e);
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let result = self.create_surface(event_loop);
        self.stop_on_error(event_loop, result);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let result = self.handle_event(event_loop, event);
        self.stop_on_error(event_loop, result);
    }
}

/// Windowed CHIP-8 interpreter.
///
/// The hex keypad sits on 1-4, Q-R, A-F and Z-V. Escape quits.
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

    /// Window scale factor
    #[arg(long, default_value_t = 10)]
    scale: u32,
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
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    anyhow::ensure!(args.frame_rate > 0.0, "Frame rate must be positive");

    let rom = std::fs::read(&args.rom_path)
        .with_context(|| format!("Failed to read {}", args.rom_path.display()))?;
    log::info!("Running {}", args.rom_path.display());

    let mut app = App::new(&rom, args.config(), args.scale)?;

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop
        .run_app(&mut app)
        .context("Event loop failed")?;

    app.error.map_or(Ok(()), Err)
}
