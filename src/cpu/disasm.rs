//! Pretty-printer for both instruction widths.  Output is for humans at the
//! debugger prompt; it is not a round-trippable assembly syntax.

use super::sext;

const COND_NAMES: [&str; 16] = [
    "cs", "cc", "hi", "ls", "eq", "ne", "gt", "le", "ge", "lt", "mi", "pl", "vs", "vc", "t", "al",
];

fn cond_suffix(cc: u32) -> &'static str {
    match cc & 0xF {
        0xF => "",
        other => COND_NAMES[other as usize],
    }
}

fn mem_mnemonic(func3: u32) -> &'static str {
    match func3 & 7 {
        0 => "lw",
        1 => "lh",
        2 => "lhu",
        3 => "lb",
        4 => "sw",
        5 => "sh",
        6 => "lbu",
        _ => "sb",
    }
}

/// Disassemble a 32-bit slot fetched at `pc`.
pub fn disasm32(word: u32, pc: u32) -> String {
    let op = word >> 27;
    let rd = (word >> 20) & 0x1F;
    let ra = (word >> 15) & 0x1F;
    match op {
        0x00 => disasm_special(word),
        0x01 | 0x05 => {
            let raw = (word >> 1) & 0xFFFF;
            let suffix = if op == 0x05 { "is" } else { "i" };
            let imm = if op == 0x05 { raw << 16 } else { sext(raw, 16) };
            match (word >> 17) & 7 {
                0 => format!("add{suffix} r{rd}, {:#x}", imm),
                2 => format!("cmp{suffix} r{rd}, {:#x}", imm),
                4 => format!("and{suffix} r{rd}, {:#x}", imm),
                5 => format!("or{suffix} r{rd}, {:#x}", imm),
                6 => format!("ld{suffix} r{rd}, {:#x}", imm),
                _ => format!(".word {word:#010X}"),
            }
        }
        0x02 => {
            let target = (pc & 0xFE00_0000) | (((word >> 1) & 0x00FF_FFFF) << 1);
            let mnemonic = if word & 1 != 0 { "jl" } else { "j" };
            format!("{mnemonic} {target:#010X}")
        }
        0x03 | 0x07 => {
            let imm = sext((word >> 3) & 0xFFF, 12) as i32;
            let suffix = if op == 0x03 { "]+" } else { "]" };
            let mnemonic = mem_mnemonic(word & 7);
            format!("{mnemonic} r{rd}, [r{ra}, {imm}{suffix}")
        }
        0x04 => {
            let cc = (word >> 10) & 0xF;
            let disp = ((word >> 15) & 0x3FF) << 9 | ((word >> 1) & 0x1FF);
            let target = pc.wrapping_add(sext(disp, 19) << 1);
            let link = if word & 1 != 0 { "l" } else { "" };
            format!("b{}{link} {target:#010X}", cond_suffix(cc))
        }
        0x06 => match word & 0xFF {
            0x00 => format!("mfcr r{rd}, cr{ra}"),
            0x01 => format!("mtcr cr{ra}, r{rd}"),
            0x84 => "rte".to_string(),
            _ => format!(".word {word:#010X}"),
        },
        0x08..=0x0D => {
            let imm = sext((word >> 1) & 0x3FFF, 14) as i32;
            let cu = if op & 1 != 0 { ".c" } else { "" };
            let mnemonic = match op {
                0x08 | 0x09 => "addri",
                0x0A | 0x0B => "andri",
                _ => "orri",
            };
            format!("{mnemonic}{cu} r{rd}, r{ra}, {imm}")
        }
        0x10..=0x17 => {
            let imm = sext(word & 0x7FFF, 15) as i32;
            format!("{} r{rd}, [r{ra}, {imm}]", mem_mnemonic(op & 7))
        }
        _ => {
            // Compact slot: render the half (or pair) the fetch path would
            // execute.
            let lo = (word & 0xFFFF) as u16;
            let hi = (word >> 16) as u16;
            if lo & 0x8000 != 0 && hi & 0x8000 != 0 {
                format!(
                    "{} || {}",
                    disasm16(lo & 0x7FFF, pc),
                    disasm16(hi & 0x7FFF, pc)
                )
            } else {
                disasm16(lo & 0x7FFF, pc)
            }
        }
    }
}

fn disasm_special(word: u32) -> String {
    let rd = (word >> 20) & 0x1F;
    let ra = (word >> 15) & 0x1F;
    let rb = (word >> 10) & 0x1F;
    let cu = if word & 1 != 0 { ".c" } else { "" };
    match (word >> 1) & 0x3F {
        0x00 => "nop".to_string(),
        0x02 => "syscall".to_string(),
        0x04 => {
            let link = if word & 1 != 0 { "l" } else { "" };
            format!("br{}{link} r{ra}", cond_suffix(rd))
        }
        0x06 => "sdbbp".to_string(),
        0x08 => format!("add{cu} r{rd}, r{ra}, r{rb}"),
        0x09 => format!("addc{cu} r{rd}, r{ra}, r{rb}"),
        0x0A => format!("sub{cu} r{rd}, r{ra}, r{rb}"),
        0x0B => format!("subc{cu} r{rd}, r{ra}, r{rb}"),
        0x0C => format!("cmp{} r{ra}, r{rb}", cond_suffix(rd)),
        0x0D => format!("cmpz{} r{ra}", cond_suffix(rd)),
        0x0F => format!("neg{cu} r{rd}, r{ra}"),
        0x10 => format!("and{cu} r{rd}, r{ra}, r{rb}"),
        0x11 => format!("or{cu} r{rd}, r{ra}, r{rb}"),
        0x12 => format!("not{cu} r{rd}, r{ra}"),
        0x13 => format!("xor{cu} r{rd}, r{ra}, r{rb}"),
        0x14 => format!("bitclr{cu} r{rd}, r{ra}, r{rb}"),
        0x15 => format!("bitset{cu} r{rd}, r{ra}, r{rb}"),
        0x16 => format!("bittst r{ra}, r{rb}"),
        0x17 => format!("bittgl{cu} r{rd}, r{ra}, r{rb}"),
        0x18 => format!("sll{cu} r{rd}, r{ra}, r{rb}"),
        0x1A => format!("srl{cu} r{rd}, r{ra}, r{rb}"),
        0x1B => format!("sra{cu} r{rd}, r{ra}, r{rb}"),
        0x1C => format!("ror{cu} r{rd}, r{ra}, r{rb}"),
        0x1D => format!("rorc{cu} r{rd}, r{ra}"),
        0x1E => format!("rol{cu} r{rd}, r{ra}, r{rb}"),
        0x1F => format!("rolc{cu} r{rd}, r{ra}"),
        0x20 => format!("mul r{ra}, r{rb}"),
        0x21 => format!("mulu r{ra}, r{rb}"),
        0x22 => format!("div r{ra}, r{rb}"),
        0x23 => format!("divu r{ra}, r{rb}"),
        0x24 => format!("mfce r{rd}, {}", rb & 3),
        0x25 => format!("mtce r{rd}, {}", rb & 3),
        0x28 => format!("mfsr r{rd}, sr{rb}"),
        0x29 => format!("mtsr sr{rb}, r{ra}"),
        0x2C => format!("extsb{cu} r{rd}, r{ra}"),
        0x2D => format!("extsh{cu} r{rd}, r{ra}"),
        0x2E => format!("extzb{cu} r{rd}, r{ra}"),
        0x2F => format!("extzh{cu} r{rd}, r{ra}"),
        _ => format!(".word {word:#010X}"),
    }
}

/// Disassemble a 16-bit half (parallel flag already stripped) at `pc`.
pub fn disasm16(half: u16, pc: u32) -> String {
    let half = u32::from(half);
    let rd = (half >> 8) & 0xF;
    let ra = (half >> 4) & 0xF;
    match (half >> 12) & 7 {
        0 => match half & 0xF {
            0x0 => "nop!".to_string(),
            0x1 => format!("mv! r{rd}, r{ra}"),
            0x2 => format!("br{}! r{ra}", cond_suffix(rd)),
            0x3 => format!("brl{}! r{ra}", cond_suffix(rd)),
            _ => format!(".half {half:#06X}"),
        },
        1 => match half & 0xF {
            0x1 => format!("mfcel! r{rd}"),
            0x2 => format!("mfceh! r{rd}"),
            0x5 => format!("mtcel! r{rd}"),
            0x6 => format!("mtceh! r{rd}"),
            _ => format!(".half {half:#06X}"),
        },
        2 => match half & 0xF {
            0x0 => format!("add! r{rd}, r{ra}"),
            0x1 => format!("sub! r{rd}, r{ra}"),
            0x2 => format!("neg! r{rd}, r{ra}"),
            0x3 => format!("cmp! r{rd}, r{ra}"),
            0x4 => format!("and! r{rd}, r{ra}"),
            0x5 => format!("or! r{rd}, r{ra}"),
            0x6 => format!("not! r{rd}, r{ra}"),
            0x7 => format!("xor! r{rd}, r{ra}"),
            0x8 => format!("push! r{rd}"),
            0x9 => format!("pop! r{rd}"),
            _ => format!(".half {half:#06X}"),
        },
        3 => {
            let target = (pc & 0xFFFF_F000) | (((half >> 1) & 0x7FF) << 1);
            let mnemonic = if half & 1 != 0 { "jl!" } else { "j!" };
            format!("{mnemonic} {target:#010X}")
        }
        4 => {
            let target = pc.wrapping_add(sext(half & 0xFF, 8) << 1);
            format!("b{}! {target:#010X}", cond_suffix(rd))
        }
        5 => format!("ldiu! r{rd}, {:#x}", half & 0xFF),
        6 => {
            let s = half & 0x1F;
            match (half >> 5) & 7 {
                0 => format!("slli! r{rd}, {s}"),
                1 => format!("srli! r{rd}, {s}"),
                2 => format!("srai! r{rd}, {s}"),
                3 => format!("bitclr! r{rd}, {s}"),
                4 => format!("bitset! r{rd}, {s}"),
                5 => format!("bittst! r{rd}, {s}"),
                _ => format!(".half {half:#06X}"),
            }
        }
        _ => {
            let imm = (half & 0x7F) << 2;
            if half & 0x80 != 0 {
                format!("swp! r{rd}, [sp, {imm:#x}]")
            } else {
                format!("lwp! r{rd}, [sp, {imm:#x}]")
            }
        }
    }
}
