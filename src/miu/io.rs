use crate::intc::Intc;
use crate::timer::TimerBlock;
use crate::uart::Uart;
use crate::vdu::Vdu;

use super::Region;

/// CPU-visible peripheral bases inside segment 0x08.
pub const TIMER_BASE: u32 = 0x080A_0000;
pub const INTC_BASE: u32 = 0x080A_0030;
pub const UART_BASE: u32 = 0x080B_0000;
pub const VDU_BASE: u32 = 0x080C_0000;

const PAGE_TIMER_INTC: u32 = 0x0A;
const PAGE_UART: u32 = 0x0B;
const PAGE_VDU: u32 = 0x0C;

const INTC_PAGE_OFFSET: u32 = 0x30;

/// Unclaimed word offsets fall back to plain storage, folded onto a small
/// cell array.
const FALLBACK_WORDS: usize = 0x1000;

/// The I/O segment.  Word offsets dispatch to the owning peripheral; byte
/// and halfword accesses are read-modify-write of the containing word, so a
/// peripheral handler always sees (and produces) a coherent word.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct IoBlock {
    pub intc: Intc,
    pub timer: TimerBlock,
    pub uart: Uart,
    pub vdu: Vdu,
    words: Vec<u32>,
}

impl Default for IoBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBlock {
    pub fn new() -> Self {
        Self {
            intc: Intc::new(),
            timer: TimerBlock::new(),
            uart: Uart::new(),
            vdu: Vdu::new(),
            words: vec![0; FALLBACK_WORDS],
        }
    }

    pub fn reset(&mut self) {
        self.intc.reset();
        self.timer.reset();
        self.uart.reset();
        self.vdu.reset();
        self.words.fill(0);
    }

    fn read_word(&mut self, offset: u32) -> u32 {
        let offset = offset & !3;
        let value = match offset >> 16 {
            // Timer channels own the low offsets of the 0x0A page; the
            // interrupt controller sits directly above them.  The page
            // mirrors on a 0x40-byte window.
            PAGE_TIMER_INTC => {
                let local = offset & 0x3F;
                if local < INTC_PAGE_OFFSET {
                    self.timer.read_reg(local)
                } else {
                    self.intc.read_reg(local - INTC_PAGE_OFFSET)
                }
            }
            PAGE_UART => self.uart.read_reg(offset & 0x1F),
            PAGE_VDU => self.vdu.read_reg(offset & 0x07),
            _ => self.words[((offset >> 2) as usize) & (FALLBACK_WORDS - 1)],
        };
        #[cfg(feature = "trace_mmio")]
        eprintln!("io R {offset:06X} -> {value:08X}");
        value
    }

    fn write_word(&mut self, offset: u32, value: u32) {
        let offset = offset & !3;
        #[cfg(feature = "trace_mmio")]
        eprintln!("io W {offset:06X} <- {value:08X}");
        match offset >> 16 {
            PAGE_TIMER_INTC => {
                let local = offset & 0x3F;
                if local < INTC_PAGE_OFFSET {
                    self.timer.write_reg(local, value);
                } else {
                    self.intc.write_reg(local - INTC_PAGE_OFFSET, value);
                }
            }
            PAGE_UART => self.uart.write_reg(offset & 0x1F, value),
            PAGE_VDU => self.vdu.write_reg(offset & 0x07, value),
            _ => self.words[((offset >> 2) as usize) & (FALLBACK_WORDS - 1)] = value,
        }
    }
}

impl Region for IoBlock {
    fn read8(&mut self, offset: u32) -> u8 {
        let word = self.read_word(offset);
        (word >> ((offset & 3) * 8)) as u8
    }

    fn read16(&mut self, offset: u32) -> u16 {
        let word = self.read_word(offset);
        (word >> ((offset & 2) * 8)) as u16
    }

    fn read32(&mut self, offset: u32) -> u32 {
        self.read_word(offset)
    }

    fn write8(&mut self, offset: u32, value: u8) {
        let shift = (offset & 3) * 8;
        let word = self.read_word(offset);
        let merged = (word & !(0xFF << shift)) | (u32::from(value) << shift);
        self.write_word(offset, merged);
    }

    fn write16(&mut self, offset: u32, value: u16) {
        let shift = (offset & 2) * 8;
        let word = self.read_word(offset);
        let merged = (word & !(0xFFFF << shift)) | (u32::from(value) << shift);
        self.write_word(offset, merged);
    }

    fn write32(&mut self, offset: u32, value: u32) {
        self.write_word(offset, value);
    }
}
