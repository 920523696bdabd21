use anyhow::{Result, bail};

use super::{Cpu, Register, Step};
use crate::memory::AddressSpace;

const SP: usize = 6;
const PC: usize = 7;

/// `sys n`: trap to the kernel, call number in the low six bits.
const SYS: u16 = 0o104400;
const NOP: u16 = 0o000240;
const JMP_ABSOLUTE: u16 = 0o000137;

/// Just enough PDP-11 to run straight-line system-call sequences.
#[derive(Debug, Clone, Default)]
pub struct Pdp11Core {
    regs: [u16; 8],
    carry: bool,
}

impl Pdp11Core {
    pub fn new(entry: u16) -> Self {
        let mut core = Self::default();
        core.regs[PC] = entry;
        core
    }
}

impl Cpu for Pdp11Core {
    fn step(&mut self, memory: &mut AddressSpace) -> Result<Step> {
        let at = self.regs[PC];
        let word = self.fetch(memory)?;
        match word {
            NOP => {}
            JMP_ABSOLUTE => self.regs[PC] = self.fetch(memory)?,
            w if w & 0o177700 == SYS => return Ok(Step::Trap(w & 0o77)),
            // mov #imm, rn
            w if w & 0o177770 == 0o012700 => {
                self.regs[(w & 7) as usize] = self.fetch(memory)?;
            }
            // mov rs, rd
            w if w & 0o177070 == 0o010000 => {
                self.regs[(w & 7) as usize] = self.regs[((w >> 6) & 7) as usize];
            }
            // clr rn
            w if w & 0o177770 == 0o005000 => {
                self.regs[(w & 7) as usize] = 0;
                self.carry = false;
            }
            // br
            w if w & 0o177400 == 0o000400 => {
                let offset = (w & 0xff) as u8 as i8 as i16;
                self.regs[PC] = self.regs[PC].wrapping_add((offset * 2) as u16);
            }
            _ => bail!("unsupported PDP-11 instruction {word:06o} at {at:06o}"),
        }
        Ok(Step::Continue)
    }

    fn pc(&self) -> u32 {
        self.regs[PC] as u32
    }

    fn set_pc(&mut self, pc: u32) {
        self.regs[PC] = pc as u16;
    }

    fn sp(&self) -> u32 {
        self.regs[SP] as u32
    }

    fn set_sp(&mut self, sp: u32) {
        self.regs[SP] = sp as u16;
    }

    fn reg(&self, reg: Register) -> u32 {
        match reg {
            Register::R0 => self.regs[0] as u32,
            Register::R1 => self.regs[1] as u32,
            _ => 0,
        }
    }

    fn set_reg(&mut self, reg: Register, value: u32) {
        match reg {
            Register::R0 => self.regs[0] = value as u16,
            Register::R1 => self.regs[1] = value as u16,
            _ => {}
        }
    }

    fn carry(&self) -> bool {
        self.carry
    }

    fn set_carry(&mut self, carry: bool) {
        self.carry = carry;
    }
}
