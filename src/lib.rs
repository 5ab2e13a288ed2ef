pub mod cpu;
pub mod debugger;
pub mod engine;
pub mod intc;
pub mod miu;
pub mod timer;
pub mod uart;
pub mod vdu;

pub use cpu::{Cpu, CpuFault};
pub use debugger::{CpuSnapshot, Debugger};
pub use engine::rom::{LoadError, RomImage};
pub use engine::{Engine, EngineStatus, FatalError, RunState};
pub use intc::Intc;
pub use miu::{ArrayRegion, Miu, Region, SegmentTarget};
pub use timer::TimerBlock;
pub use uart::Uart;
pub use vdu::{PixelFormat, Vdu};
