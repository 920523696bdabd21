use anyhow::{Result, bail};

use super::{Cpu, Register, Step};
use crate::memory::AddressSpace;

const NOP: u16 = 0x4e71;

/// Just enough 68000 to build a message and `trap #0`.
#[derive(Debug, Clone, Default)]
pub struct M68kCore {
    data_regs: [u32; 8],
    addr_regs: [u32; 8],
    pc: u32,
    carry: bool,
}

impl M68kCore {
    pub fn new(entry: u32) -> Self {
        Self {
            pc: entry,
            ..Self::default()
        }
    }

    fn fetch_long(&mut self, memory: &AddressSpace) -> Result<u32> {
        let hi = self.fetch(memory)? as u32;
        let lo = self.fetch(memory)? as u32;
        Ok((hi << 16) | lo)
    }
}

impl Cpu for M68kCore {
    fn step(&mut self, memory: &mut AddressSpace) -> Result<Step> {
        let at = self.pc;
        let opcode = self.fetch(memory)?;
        let reg = ((opcode >> 9) & 7) as usize;
        match opcode {
            NOP => {}
            0x4e40..=0x4e4f => return Ok(Step::Trap(opcode & 0xf)),
            // move.l #imm, dn
            op if op & 0xf1ff == 0x203c => {
                self.data_regs[reg] = self.fetch_long(memory)?;
                self.carry = false;
            }
            // moveq #imm, dn
            op if op & 0xf100 == 0x7000 => {
                self.data_regs[reg] = (op & 0xff) as u8 as i8 as i32 as u32;
                self.carry = false;
            }
            // lea abs.l, an
            op if op & 0xf1ff == 0x41f9 => {
                self.addr_regs[reg] = self.fetch_long(memory)?;
            }
            // bra.s: displacement is relative to the word after the opcode
            op if op & 0xff00 == 0x6000 && op & 0xff != 0 && op & 0xff != 0xff => {
                let displacement = (op & 0xff) as u8 as i8 as i32;
                self.pc = (at as i64 + 2 + displacement as i64) as u32;
            }
            _ => bail!("unsupported m68k instruction {opcode:#06x} at {at:#x}"),
        }
        Ok(Step::Continue)
    }

    fn pc(&self) -> u32 {
        self.pc
    }

    fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    fn sp(&self) -> u32 {
        self.addr_regs[7]
    }

    fn set_sp(&mut self, sp: u32) {
        self.addr_regs[7] = sp;
    }

    fn reg(&self, reg: Register) -> u32 {
        match reg {
            Register::D0 => self.data_regs[0],
            Register::D1 => self.data_regs[1],
            Register::A0 => self.addr_regs[0],
            _ => 0,
        }
    }

    fn set_reg(&mut self, reg: Register, value: u32) {
        match reg {
            Register::D0 => self.data_regs[0] = value,
            Register::D1 => self.data_regs[1] = value,
            Register::A0 => self.addr_regs[0] = value,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aout::Personality;

    fn load(words: &[u16]) -> AddressSpace {
        let mut mem = AddressSpace::new(Personality::M68k, 0x1000);
        for (i, w) in words.iter().enumerate() {
            mem.write_word(0x400 + 2 * i as u32, *w).unwrap();
        }
        mem
    }

    #[test]
    fn builds_a_sendrec() {
        let mut mem = load(&[
            0x41f9, 0x0000, 0x0800, // lea $800, a0
            0x203c, 0x0000, 0x0003, // move.l #3, d0
            0x7201, // moveq #1, d1
            0x4e40, // trap #0
        ]);
        let mut cpu = M68kCore::new(0x400);
        for _ in 0..3 {
            assert_eq!(cpu.step(&mut mem).unwrap(), Step::Continue);
        }
        assert_eq!(cpu.reg(Register::A0), 0x800);
        assert_eq!(cpu.reg(Register::D0), 3);
        assert_eq!(cpu.reg(Register::D1), 1);
        assert_eq!(cpu.step(&mut mem).unwrap(), Step::Trap(0));
        assert_eq!(cpu.pc(), 0x410);
    }

    #[test]
    fn moveq_sign_extends_and_bra_skips() {
        // moveq #-1, d0 ; bra.s +2 ; nop ; nop
        let mut mem = load(&[0x70ff, 0x6002, NOP, NOP]);
        let mut cpu = M68kCore::new(0x400);
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg(Register::D0), 0xffff_ffff);
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.pc(), 0x406);
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let mut mem = load(&[0x4afc]);
        assert!(M68kCore::new(0x400).step(&mut mem).is_err());
    }
}
