use super::rom::ENTRY_DEFAULT;
use super::*;
use crate::debugger::Debugger;
use crate::intc::{IRQ_TIMER, IRQ_VBLANK};
use crate::miu::io::{INTC_BASE, TIMER_BASE, UART_BASE, VDU_BASE};
use crate::timer::{TIMER_CTRL_ENABLE, TIMER_CTRL_IRQ_ENABLE};
use crate::uart::UART_STATUS_RX_READY;
use crate::vdu::PixelFormat;

fn rom_of_words(words: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 4);
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes
}

/// j back to the entry point: an idle loop the frame budget can spin on.
fn idle_rom() -> Vec<u8> {
    rom_of_words(&[0x02 << 27])
}

fn running_engine(rom: &[u8]) -> Engine {
    let mut engine = Engine::new();
    engine.load_rom(rom).expect("test ROM must load");
    engine.start();
    engine
}

#[test]
fn lifecycle_transitions_follow_the_state_machine() {
    let mut engine = Engine::new();
    assert_eq!(engine.state(), RunState::Stopped);

    engine.load_rom(&idle_rom()).unwrap();
    assert_eq!(engine.state(), RunState::Paused);
    assert_eq!(engine.cpu.pc, ENTRY_DEFAULT);

    engine.start();
    assert_eq!(engine.state(), RunState::Running);
    engine.pause();
    assert_eq!(engine.state(), RunState::Paused);

    engine.step();
    assert_eq!(engine.state(), RunState::Paused);
    assert_eq!(engine.cpu.instructions, 1);

    engine.reset();
    assert_eq!(engine.state(), RunState::Paused);
    assert_eq!(engine.cpu.instructions, 0);
    assert_eq!(engine.cpu.pc, ENTRY_DEFAULT);
}

#[test]
fn failed_load_moves_to_error_without_committing() {
    let mut engine = Engine::new();
    engine.load_rom(&idle_rom()).unwrap();
    engine.miu.dram_mut().load(0, &[0xAB]);

    assert!(engine.load_rom(&[]).is_err());
    assert_eq!(engine.state(), RunState::Error);
    // The previous machine was not rebuilt.
    assert_eq!(engine.miu.read8(0xA000_0000), 0xAB);

    engine.load_rom(&idle_rom()).unwrap();
    assert_eq!(engine.state(), RunState::Paused);
}

#[test]
fn one_frame_retires_the_cycle_budget_and_raises_vblank() {
    let mut engine = running_engine(&idle_rom());
    engine.run_frame(0.0);

    assert_eq!(engine.state(), RunState::Running);
    assert_eq!(engine.status().frames, 1);
    assert_eq!(
        engine.cpu.cycles,
        CYCLES_PER_FRAME as u64,
        "the budget is charged at four cycles per instruction"
    );
    assert!(engine.miu.io.vdu.in_vblank());
    assert_ne!(engine.miu.io.intc.pending() & (1 << IRQ_VBLANK), 0);

    // The next frame opens by clearing vblank.
    engine.run_frame(16.67);
    let fps = engine.status().fps;
    assert!((fps - 59.99).abs() < 0.1, "fps report was {fps}");
}

#[test]
fn timer_irq_reaches_the_cpu_through_the_full_mmio_path() {
    let mut engine = running_engine(&idle_rom());
    engine.cpu.cr[0] = 1;
    engine.cpu.cr[3] = 0x9E00_4000;

    engine.miu.write32(INTC_BASE, 1 << IRQ_TIMER);
    engine.miu.write32(TIMER_BASE + 0x08, 100); // CMP
    engine
        .miu
        .write32(TIMER_BASE + 0x04, TIMER_CTRL_ENABLE | TIMER_CTRL_IRQ_ENABLE);

    engine.run_frame(0.0);

    assert_ne!(engine.miu.io.intc.pending() & (1 << IRQ_TIMER), 0);
    assert_eq!(
        (engine.cpu.cr[2] >> 18) & 0x3F,
        IRQ_TIMER,
        "cause field records the timer line"
    );
    assert_eq!(engine.cpu.cr[0] & 1, 0, "entry dropped the interrupt enable");
}

#[test]
fn four_hundred_cycles_fire_a_scale_zero_cmp_100_timer_once() {
    // The engine feeds the timer instruction units: 400 engine cycles are
    // 100 units, exactly one compare hit for CMP=100 at scale 0.
    let mut cpu = Cpu::new();
    cpu.pc = 0x9E00_0000;
    cpu.cr[0] = 1;
    cpu.cr[3] = 0x9E00_4000;
    let mut miu = Miu::new();
    miu.write32(INTC_BASE, 1 << IRQ_TIMER);
    miu.write32(TIMER_BASE + 0x08, 100);
    miu.write32(TIMER_BASE + 0x04, TIMER_CTRL_ENABLE | TIMER_CTRL_IRQ_ENABLE);

    assert!(!miu.io.timer.advance(99), "fired a unit early");
    assert!(miu.io.timer.advance(1), "did not fire on the 400th cycle");
    miu.io.intc.raise(IRQ_TIMER, &mut cpu).unwrap();

    assert_eq!(cpu.pc, 0x9E00_4000 + IRQ_TIMER * 4);
    assert_eq!(cpu.cr[5], 0x9E00_0000);
    // Exactly once: the non-repeat channel disarmed itself.
    assert!(!miu.io.timer.advance(1000));
}

#[test]
fn uart_echo_over_mmio() {
    let mut engine = running_engine(&idle_rom());
    engine.enqueue_rx(0x41);

    let status = engine.miu.read32(UART_BASE + 0x0C);
    assert_ne!(status & UART_STATUS_RX_READY, 0);

    assert_eq!(engine.miu.read32(UART_BASE), 0x41);
    let status = engine.miu.read32(UART_BASE + 0x0C);
    assert_eq!(status & UART_STATUS_RX_READY, 0);
}

#[test]
fn transmitted_bytes_surface_through_drain_tx() {
    // ldis r2, 0x080B: UART base; sw r1, [r2, 0] transmits the low byte.
    let program = [
        (0x01u32 << 27) | (1 << 20) | (6 << 17) | (0x48 << 1), // ldi r1, 0x48
        (0x05u32 << 27) | (2 << 20) | (6 << 17) | (0x080B << 1), // ldis r2, 0x080B0000
        (0x14u32 << 27) | (1 << 20) | (2 << 15),               // sw r1, [r2, 0]
    ];
    let mut engine = Engine::new();
    engine.load_rom(&rom_of_words(&program)).unwrap();
    for _ in 0..3 {
        engine.step();
    }
    assert_eq!(engine.drain_tx(), vec![0x48]);
}

#[test]
fn scan_out_converts_the_dram_framebuffer() {
    let mut engine = running_engine(&idle_rom());
    engine.set_pixel_target(2, 1, PixelFormat::Rgb565);

    engine.miu.write32(0xA000_0000, u32::from(0x07E0u16) << 16 | 0xF800);
    // FB_ADDR = 0xA0000000 via the halfword register pair.
    engine.miu.write16(VDU_BASE + 4, 0xA000);
    engine.miu.write16(VDU_BASE + 6, 0x0000);
    engine.miu.write16(VDU_BASE, 1); // display enable

    engine.run_frame(0.0);

    assert_eq!(engine.pixels(), &[0xFF, 0, 0, 0xFF, 0, 0xFF, 0, 0xFF]);
}

#[test]
fn scan_out_errors_count_and_never_stop_the_engine() {
    let mut engine = running_engine(&idle_rom());
    engine.set_pixel_target(4, 4, PixelFormat::Rgb565);
    engine.miu.write16(VDU_BASE, 1);

    // Framebuffer aimed at an unmapped segment.
    engine.miu.write16(VDU_BASE + 4, 0x4400);
    engine.run_frame(0.0);
    assert_eq!(engine.miu.io.vdu.unmapped_frames, 1);

    // Framebuffer so close to the end of DRAM that the frame runs out.
    engine.miu.write16(VDU_BASE + 4, 0xA0FF);
    engine.miu.write16(VDU_BASE + 6, 0xFFF8);
    engine.run_frame(16.0);
    assert_eq!(engine.miu.io.vdu.bounds_errors, 1);

    assert_eq!(engine.state(), RunState::Running);
    assert_eq!(engine.status().frames, 2);
}

#[test]
fn breakpoint_pauses_before_the_instruction_executes() {
    let mut engine = running_engine(&idle_rom());
    let mut debugger = Debugger::new();
    debugger.add_breakpoint(ENTRY_DEFAULT);
    engine.attach_debugger(debugger);

    engine.run_frame(0.0);
    assert_eq!(engine.state(), RunState::Paused);
    assert_eq!(engine.cpu.instructions, 0);
    assert_eq!(engine.status().frames, 0);
}

#[test]
fn watchpoint_pauses_after_the_write() {
    // sw r1, [r2, 0] then idle loop.
    let program = [
        (0x05u32 << 27) | (2 << 20) | (6 << 17) | (0xA000 << 1), // ldis r2, 0xA0000000
        (0x01u32 << 27) | (1 << 20) | (6 << 17) | (0x77 << 1),   // ldi r1, 0x77
        (0x14u32 << 27) | (1 << 20) | (2 << 15),                 // sw r1, [r2, 0]
        (0x02u32 << 27) | ((0x0Cu32 >> 1) << 1),                 // j .
    ];
    let mut engine = Engine::new();
    engine.load_rom(&rom_of_words(&program)).unwrap();
    let mut debugger = Debugger::new();
    debugger.add_watchpoint(0xA000_0000, &mut engine.miu);
    engine.attach_debugger(debugger);
    engine.start();

    engine.run_frame(0.0);
    assert_eq!(engine.state(), RunState::Paused);
    assert_eq!(engine.cpu.instructions, 3);
    assert_eq!(engine.miu.read32(0xA000_0000), 0x77);
}

#[test]
fn cpu_fault_surfaces_a_fatal_error_with_a_memory_window() {
    // sdbbp with no vector base installed.
    let mut engine = running_engine(&rom_of_words(&[0x06 << 1]));
    engine.run_frame(0.0);

    assert_eq!(engine.state(), RunState::Error);
    let fatal = engine.fatal().expect("fault must be reported");
    assert_eq!(fatal.kind, "cpu-fault");
    assert_eq!(fatal.pc, ENTRY_DEFAULT);
    assert_eq!(fatal.memory.len(), crate::debugger::MEMORY_WINDOW_BYTES);
    assert!(fatal.message.contains("no vector base"));

    // A later frame wake-up is a no-op in ERROR.
    engine.run_frame(16.0);
    assert_eq!(engine.status().frames, 0);
}
