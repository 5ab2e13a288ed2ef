use std::{env, error::Error, fs, path::PathBuf};

use spg290::cpu::disasm;
use spg290::{Engine, RunState};

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let mut rom_path: Option<PathBuf> = None;
    let mut frame_limit = 60usize;
    let mut trace_entry = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--frames" => {
                let Some(value) = args.next() else {
                    eprintln!("--frames requires a value");
                    return Ok(());
                };
                match value.parse::<usize>() {
                    Ok(limit) => frame_limit = limit,
                    Err(_) => {
                        eprintln!("invalid --frames value: {value}");
                        return Ok(());
                    }
                }
            }
            "--trace-entry" => trace_entry = true,
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            _ if rom_path.is_none() => rom_path = Some(PathBuf::from(arg)),
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                return Ok(());
            }
        }
    }

    let rom_path = match rom_path {
        Some(path) => path,
        None => {
            print_usage();
            return Ok(());
        }
    };

    let rom = fs::read(&rom_path)?;
    let mut engine = Engine::new();
    engine.load_rom(&rom)?;

    if trace_entry {
        let pc = engine.cpu.pc;
        for i in 0..8 {
            let addr = pc + i * 4;
            let word = engine.miu.read32(addr);
            println!("{addr:#010X}  {:08X}  {}", word, disasm::disasm32(word, addr));
        }
    }

    engine.start();
    // Stand in for the host's display clock: one wake-up per 60 Hz frame.
    for frame in 0..frame_limit {
        engine.run_frame(frame as f64 * (1000.0 / 60.0));
        if engine.state() != RunState::Running {
            break;
        }
    }

    let tx = engine.drain_tx();
    if !tx.is_empty() {
        println!("uart: {}", String::from_utf8_lossy(&tx));
    }

    let status = engine.status();
    println!(
        "{:?} after {} frame(s): {} instructions, {} cycles, PC={:#010X}",
        status.state, status.frames, status.instructions, status.cycles, status.pc,
    );
    if let Some(fatal) = engine.fatal() {
        eprintln!("fatal: {} at {:#010X}: {}", fatal.kind, fatal.pc, fatal.message);
    }

    Ok(())
}

fn print_usage() {
    eprintln!("Usage: spg290 <rom.bin> [--frames N] [--trace-entry]");
    eprintln!("  --frames N      Run N video frames before exiting (default 60)");
    eprintln!("  --trace-entry   Disassemble the first words at the entry PC");
}
