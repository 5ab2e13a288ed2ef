use crate::cpu::{Cpu, CpuFault};

pub const IRQ_VBLANK: u32 = 4;
pub const IRQ_TIMER: u32 = 5;
pub const IRQ_ADC: u32 = 6;
pub const IRQ_UART: u32 = 7;

const REG_MASK: u32 = 0x00;
const REG_PRIO: u32 = 0x04;
const REG_STATUS: u32 = 0x08;
const REG_ACK: u32 = 0x0C;

/// Interrupt controller.  STATUS carries one pending bit per IRQ line;
/// MASK gates which lines reach the CPU.  Delivery is edge-triggered at the
/// moment a peripheral raises the line: unmasking a line that is already
/// pending does not replay the exception.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct Intc {
    mask: u32,
    prio: u32,
    status: u32,
}

impl Default for Intc {
    fn default() -> Self {
        Self::new()
    }
}

impl Intc {
    pub fn new() -> Self {
        Self {
            mask: 0,
            prio: 0,
            status: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Raise IRQ `line`: mark it pending and, when unmasked, enter the
    /// matching CPU exception.  The CPU refuses delivery while its global
    /// interrupt-enable bit (cr0.0) is clear; the line stays pending either
    /// way.
    pub fn raise(&mut self, line: u32, cpu: &mut Cpu) -> Result<(), CpuFault> {
        let bit = 1u32 << (line & 0x1F);
        self.status |= bit;
        if self.mask & bit != 0 {
            cpu.deliver_irq(line & 0x1F)?;
        }
        Ok(())
    }

    pub fn pending(&self) -> u32 {
        self.status
    }

    pub fn read_reg(&mut self, offset: u32) -> u32 {
        match offset & 0x0C {
            REG_MASK => self.mask,
            REG_PRIO => self.prio,
            REG_STATUS => self.status,
            // ACK is write-only; reads return 0.
            _ => 0,
        }
    }

    pub fn write_reg(&mut self, offset: u32, value: u32) {
        match offset & 0x0C {
            REG_MASK => self.mask = value,
            REG_PRIO => self.prio = value,
            // STATUS is read-only from software.
            REG_STATUS => {}
            REG_ACK => self.status &= !value,
            _ => {}
        }
    }
}
