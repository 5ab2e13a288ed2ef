// Engine — the single scheduler.
//
// The host delivers one wake-up per display frame; the engine runs a bounded
// cycle budget in slices, advances peripheral time at slice boundaries,
// raises vblank once the frame's CPU cycles have retired, scans out the
// framebuffer, and yields.

pub mod rom;

#[cfg(test)]
mod tests;

use crate::cpu::{Cpu, CpuFault, CYCLES_PER_INSTRUCTION};
use crate::debugger::{self, CpuSnapshot, Debugger};
use crate::intc::IRQ_VBLANK;
use crate::miu::Miu;
use crate::vdu::PixelFormat;

use rom::{LoadError, RomImage};

pub const CPU_HZ: u32 = 33_868_800;
pub const TARGET_FPS: u32 = 60;
pub const CYCLES_PER_FRAME: i64 = 564_480;
pub const CYCLES_PER_SLICE: i64 = 10_000;
/// Slice-loop runaway guard.
const RUNAWAY_BOUND: i64 = -10_000;

/// Cached env-var parsed as `u32` with a non-zero filter and default.
macro_rules! env_u32 {
    ($name:ident, $var:expr, $default:expr) => {
        #[inline]
        fn $name() -> u32 {
            use std::sync::OnceLock;
            static V: OnceLock<u32> = OnceLock::new();
            *V.get_or_init(|| {
                std::env::var($var)
                    .ok()
                    .and_then(|s| s.parse::<u32>().ok())
                    .filter(|&n| n > 0)
                    .unwrap_or($default)
            })
        }
    };
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunState {
    Stopped,
    Loading,
    Paused,
    Running,
    Error,
}

/// What the host gets when the interpreter dies: the architectural position
/// plus a window of the memory it was executing from.
#[derive(Clone, Debug)]
pub struct FatalError {
    pub kind: &'static str,
    pub pc: u32,
    pub message: String,
    pub memory: Vec<u8>,
}

#[derive(Clone, Copy, Debug)]
pub struct EngineStatus {
    pub state: RunState,
    pub frames: u64,
    pub fps: f64,
    pub cycles: u64,
    pub instructions: u64,
    pub pc: u32,
}

pub struct Engine {
    pub cpu: Cpu,
    pub miu: Miu,
    state: RunState,
    rom: Option<RomImage>,
    pixels: Vec<u8>,
    frames: u64,
    fps: f64,
    last_timestamp: Option<f64>,
    fatal: Option<FatalError>,
    debugger: Option<Debugger>,
    latest_snapshot: Option<CpuSnapshot>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    env_u32!(env_snapshot_interval, "SPG_SNAPSHOT_INTERVAL", 8);

    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            miu: Miu::new(),
            state: RunState::Stopped,
            rom: None,
            pixels: Vec::new(),
            frames: 0,
            fps: 0.0,
            last_timestamp: None,
            fatal: None,
            debugger: None,
            latest_snapshot: None,
        }
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state,
            frames: self.frames,
            fps: self.fps,
            cycles: self.cpu.cycles,
            instructions: self.cpu.instructions,
            pc: self.cpu.pc,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn fatal(&self) -> Option<&FatalError> {
        self.fatal.as_ref()
    }

    /// The scan-out target: W·H RGBA8888 bytes after a rendered frame.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn set_pixel_target(&mut self, width: usize, height: usize, format: PixelFormat) {
        self.miu.io.vdu.configure(width, height, format);
    }

    pub fn attach_debugger(&mut self, debugger: Debugger) {
        self.debugger = Some(debugger);
    }

    pub fn debugger_mut(&mut self) -> Option<&mut Debugger> {
        self.debugger.as_mut()
    }

    pub fn latest_snapshot(&self) -> Option<&CpuSnapshot> {
        self.latest_snapshot.as_ref()
    }

    /// Host-side UART plumbing.
    pub fn enqueue_rx(&mut self, byte: u8) {
        if self.miu.io.uart.enqueue_rx(byte) {
            self.raise_irq(crate::intc::IRQ_UART);
        }
    }

    pub fn drain_tx(&mut self) -> Vec<u8> {
        self.miu.io.uart.drain_tx()
    }

    /// Stage, verify and commit a ROM.  A failed parse moves to ERROR and
    /// leaves the previous machine untouched.
    pub fn load_rom(&mut self, image: &[u8]) -> Result<(), LoadError> {
        self.state = RunState::Loading;
        match RomImage::parse(image) {
            Ok(rom) => {
                self.rom = Some(rom);
                self.rebuild_machine();
                self.state = RunState::Paused;
                Ok(())
            }
            Err(err) => {
                self.state = RunState::Error;
                Err(err)
            }
        }
    }

    pub fn start(&mut self) {
        if self.state == RunState::Paused {
            self.state = RunState::Running;
        }
    }

    pub fn pause(&mut self) {
        if self.state == RunState::Running {
            self.state = RunState::Paused;
        }
    }

    /// One instruction while paused.
    pub fn step(&mut self) {
        if self.state != RunState::Paused {
            return;
        }
        if let Err(fault) = self.cpu.step(&mut self.miu) {
            self.enter_error(fault);
        }
    }

    /// Rebuild the hardware from power-on state, re-commit the ROM, and sit
    /// in PAUSED.
    pub fn reset(&mut self) {
        self.rebuild_machine();
        self.state = if self.rom.is_some() {
            RunState::Paused
        } else {
            RunState::Stopped
        };
    }

    fn rebuild_machine(&mut self) {
        let (width, height) = self.miu.io.vdu.dimensions();
        let format = self.miu.io.vdu.format();
        self.cpu = Cpu::new();
        self.miu = Miu::new();
        self.miu.io.vdu.configure(width, height, format);
        self.fatal = None;
        self.frames = 0;
        self.latest_snapshot = None;
        if let Some(rom) = &self.rom {
            self.miu.flash_mut().load(0, &rom.bytes);
            self.cpu.pc = rom.entry;
        }
    }

    /// One host frame: run the cycle budget in slices, then vblank and
    /// scan-out.  `timestamp_ms` comes from the host's frame clock and only
    /// feeds the realized-FPS report.
    pub fn run_frame(&mut self, timestamp_ms: f64) {
        if let Some(previous) = self.last_timestamp {
            let delta = timestamp_ms - previous;
            if delta > 0.0 {
                self.fps = 1000.0 / delta;
            }
        }
        self.last_timestamp = Some(timestamp_ms);

        if self.state != RunState::Running {
            return;
        }

        // Vblank from the previous frame ends when the new frame starts.
        self.miu.io.vdu.clear_vblank();

        let mut cycles_remaining = CYCLES_PER_FRAME;
        let mut slice_remaining = CYCLES_PER_SLICE;
        while cycles_remaining > 0 {
            if let Some(dbg) = self.debugger.as_ref() {
                if dbg.has_breakpoint(self.cpu.pc) {
                    self.state = RunState::Paused;
                    return;
                }
            }

            if let Err(fault) = self.cpu.step(&mut self.miu) {
                self.enter_error(fault);
                return;
            }

            if let Some(dbg) = self.debugger.as_mut() {
                if dbg.has_watchpoints() && dbg.poll_watchpoints(&mut self.miu).is_some() {
                    self.state = RunState::Paused;
                    return;
                }
            }

            let charged = i64::from(CYCLES_PER_INSTRUCTION);
            cycles_remaining -= charged;
            slice_remaining -= charged;
            if slice_remaining <= 0 {
                slice_remaining += CYCLES_PER_SLICE;
                self.advance_peripherals(CYCLES_PER_SLICE);
                if self.state == RunState::Error {
                    return;
                }
            }

            if cycles_remaining < RUNAWAY_BOUND {
                break;
            }
        }

        self.frames += 1;

        // Vblank is raised after the frame's CPU cycles retire and before
        // the framebuffer is read.
        self.miu.io.vdu.set_vblank();
        self.raise_irq(IRQ_VBLANK);
        if self.state == RunState::Error {
            return;
        }

        self.render_frame();

        if self.debugger.is_some() && self.frames % u64::from(Self::env_snapshot_interval()) == 0 {
            self.latest_snapshot = Some(CpuSnapshot::capture(&self.cpu));
        }
    }

    /// Timer time is slice-quantized: one call per drained slice, in
    /// instruction units (engine cycles / 4).
    fn advance_peripherals(&mut self, cycles: i64) {
        let units = (cycles / i64::from(CYCLES_PER_INSTRUCTION)) as u64;
        if self.miu.io.timer.advance(units) {
            self.raise_irq(crate::intc::IRQ_TIMER);
        }
    }

    fn raise_irq(&mut self, line: u32) {
        if let Err(fault) = self.miu.io.intc.raise(line, &mut self.cpu) {
            self.enter_error(fault);
        }
    }

    /// Scan-out: resolve FB_ADDR, bounds-check against the backing region,
    /// convert into the pixel target.  Never faults; failures bump the VDU
    /// counters and skip the frame.
    fn render_frame(&mut self) {
        let Engine { miu, pixels, .. } = self;
        if !miu.io.vdu.display_enabled() {
            return;
        }
        let fb_addr = miu.io.vdu.framebuffer_addr();
        let needed = miu.io.vdu.required_bytes();
        match miu.segment_slice(fb_addr, needed) {
            Some(src) => miu.io.vdu.blit(src, pixels),
            None => {
                // Distinguish "no backing storage" from "ran off the end".
                if miu.segment_slice(fb_addr, 1).is_some() {
                    miu.io.vdu.bounds_errors += 1;
                } else {
                    miu.io.vdu.unmapped_frames += 1;
                }
            }
        }
    }

    fn enter_error(&mut self, fault: CpuFault) {
        let memory = debugger::memory_window(&mut self.miu, fault.pc);
        self.fatal = Some(FatalError {
            kind: "cpu-fault",
            pc: fault.pc,
            message: fault.to_string(),
            memory,
        });
        self.state = RunState::Error;
    }
}
