//! Debugger primitives: breakpoints, word watchpoints, and state snapshots.
//! Everything here is a thin query/mutate layer over the CPU and MIU; the
//! interactive surface (prompt, commands) belongs to the host.

use std::collections::HashSet;

use crate::cpu::Cpu;
use crate::miu::Miu;

/// Bytes captured around a PC for fault reports and inspection.
pub const MEMORY_WINDOW_BYTES: usize = 256;
const MEMORY_WINDOW_BACK: u32 = 16;

#[derive(Clone, Copy)]
struct Watchpoint {
    addr: u32,
    last: u32,
}

#[derive(Default)]
pub struct Debugger {
    breakpoints: HashSet<u32>,
    watchpoints: Vec<Watchpoint>,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_breakpoint(&mut self, pc: u32) {
        self.breakpoints.insert(pc);
    }

    pub fn remove_breakpoint(&mut self, pc: u32) {
        self.breakpoints.remove(&pc);
    }

    pub fn has_breakpoint(&self, pc: u32) -> bool {
        !self.breakpoints.is_empty() && self.breakpoints.contains(&pc)
    }

    /// Arm a word watchpoint, capturing the current value as the baseline.
    pub fn add_watchpoint(&mut self, addr: u32, miu: &mut Miu) {
        let last = miu.read32(addr);
        self.watchpoints.push(Watchpoint { addr, last });
    }

    pub fn clear_watchpoints(&mut self) {
        self.watchpoints.clear();
    }

    pub fn has_watchpoints(&self) -> bool {
        !self.watchpoints.is_empty()
    }

    /// Re-read every watched word; the first change wins and becomes the new
    /// baseline.
    pub fn poll_watchpoints(&mut self, miu: &mut Miu) -> Option<u32> {
        let mut hit = None;
        for wp in self.watchpoints.iter_mut() {
            let value = miu.read32(wp.addr);
            if value != wp.last {
                wp.last = value;
                if hit.is_none() {
                    hit = Some(wp.addr);
                }
            }
        }
        hit
    }

    /// Whole-machine snapshot for in-session restore (step-back while
    /// paused).  Not a save-state file format.
    pub fn snapshot_machine(cpu: &Cpu, miu: &Miu) -> Vec<u8> {
        bincode::encode_to_vec((cpu, miu), bincode::config::standard())
            .expect("machine state always encodes")
    }

    pub fn restore_machine(bytes: &[u8]) -> Option<(Cpu, Miu)> {
        bincode::decode_from_slice(bytes, bincode::config::standard())
            .ok()
            .map(|(machine, _)| machine)
    }
}

/// Register-level snapshot handed to the host UI.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpuSnapshot {
    pub pc: u32,
    pub r: [u32; 32],
    pub cr: [u32; 32],
    pub flags: u32,
    pub cel: u32,
    pub ceh: u32,
    pub cycles: u64,
    pub instructions: u64,
    pub halted: bool,
}

impl CpuSnapshot {
    pub fn capture(cpu: &Cpu) -> Self {
        Self {
            pc: cpu.pc,
            r: cpu.r,
            cr: cpu.cr,
            flags: cpu.pack_flags(),
            cel: cpu.cel,
            ceh: cpu.ceh,
            cycles: cpu.cycles,
            instructions: cpu.instructions,
            halted: cpu.halted,
        }
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// 256 bytes starting just before `pc`, for fault reports.
pub fn memory_window(miu: &mut Miu, pc: u32) -> Vec<u8> {
    let start = pc.wrapping_sub(MEMORY_WINDOW_BACK);
    (0..MEMORY_WINDOW_BYTES as u32)
        .map(|i| miu.read8(start.wrapping_add(i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchpoints_report_changed_words_once() {
        let mut miu = Miu::new();
        let mut dbg = Debugger::new();
        let addr = 0xA000_0040;
        dbg.add_watchpoint(addr, &mut miu);

        assert_eq!(dbg.poll_watchpoints(&mut miu), None);
        miu.write32(addr, 0x1111_2222);
        assert_eq!(dbg.poll_watchpoints(&mut miu), Some(addr));
        assert_eq!(dbg.poll_watchpoints(&mut miu), None, "baseline advances");
    }

    #[test]
    fn machine_snapshot_round_trips_cpu_and_memory() {
        let mut cpu = Cpu::new();
        let mut miu = Miu::new();
        cpu.pc = 0x9E00_0040;
        cpu.r[7] = 0xDEAD_BEEF;
        cpu.t = true;
        miu.write32(0xA000_0010, 0xCAFE_F00D);

        let snapshot = Debugger::snapshot_machine(&cpu, &miu);
        let (cpu2, mut miu2) = Debugger::restore_machine(&snapshot).unwrap();
        assert_eq!(cpu2.pc, 0x9E00_0040);
        assert_eq!(cpu2.r[7], 0xDEAD_BEEF);
        assert!(cpu2.t);
        assert_eq!(miu2.read32(0xA000_0010), 0xCAFE_F00D);
    }

    #[test]
    fn memory_window_centers_just_before_pc() {
        let mut miu = Miu::new();
        miu.write32(0xA000_0100, 0x0403_0201);
        let window = memory_window(&mut miu, 0xA000_0100 + 16);
        assert_eq!(window.len(), MEMORY_WINDOW_BYTES);
        assert_eq!(&window[0..4], &[1, 2, 3, 4]);
    }
}
