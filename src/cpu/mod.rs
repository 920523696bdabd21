//! The instruction-level interface the emulator drives, and two small
//! reference cores that implement it.

mod m68k;
mod pdp11;

use anyhow::Result;

use crate::aout::Personality;
use crate::memory::AddressSpace;

pub use m68k::M68kCore;
pub use pdp11::Pdp11Core;

/// Registers the system-call layer reads and writes.
///
/// A core exposes the names of its own architecture; the others read as
/// zero and ignore writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    R0,
    R1,
    D0,
    D1,
    A0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// A trap instruction was executed; the payload is its number.
    Trap(u16),
}

pub trait Cpu {
    /// Execute one instruction.
    fn step(&mut self, memory: &mut AddressSpace) -> Result<Step>;

    fn pc(&self) -> u32;
    fn set_pc(&mut self, pc: u32);
    fn sp(&self) -> u32;
    fn set_sp(&mut self, sp: u32);
    fn reg(&self, reg: Register) -> u32;
    fn set_reg(&mut self, reg: Register, value: u32);
    fn carry(&self) -> bool;
    fn set_carry(&mut self, carry: bool);

    /// Read the word at the program counter and step past it.
    fn fetch(&mut self, memory: &AddressSpace) -> Result<u16> {
        let pc = self.pc();
        let word = memory.read_word(pc)?;
        self.set_pc(pc.wrapping_add(2));
        Ok(word)
    }

    /// Make the pending trap return to `target`.
    ///
    /// Cores that run trap handlers on a supervisor stack patch the saved
    /// return address in the exception frame instead.
    fn redirect_trap_return(&mut self, _memory: &mut AddressSpace, target: u32) -> Result<()> {
        self.set_pc(target);
        Ok(())
    }
}

/// A reference core for `personality`, positioned at `entry`.
pub fn builtin(personality: Personality, entry: u32) -> Result<Box<dyn Cpu>> {
    Ok(match personality {
        Personality::Pdp11 => Box::new(Pdp11Core::new(entry as u16)),
        Personality::M68k => Box::new(M68kCore::new(entry)),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Register file with no instruction set, for driving system calls
    /// directly.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedCpu {
        pub pc: u32,
        pub sp: u32,
        pub r0: u32,
        pub r1: u32,
        pub d0: u32,
        pub d1: u32,
        pub a0: u32,
        pub carry: bool,
    }

    impl Cpu for ScriptedCpu {
        fn step(&mut self, _memory: &mut AddressSpace) -> Result<Step> {
            anyhow::bail!("scripted core cannot execute instructions")
        }

        fn pc(&self) -> u32 {
            self.pc
        }

        fn set_pc(&mut self, pc: u32) {
            self.pc = pc;
        }

        fn sp(&self) -> u32 {
            self.sp
        }

        fn set_sp(&mut self, sp: u32) {
            self.sp = sp;
        }

        fn reg(&self, reg: Register) -> u32 {
            match reg {
                Register::R0 => self.r0,
                Register::R1 => self.r1,
                Register::D0 => self.d0,
                Register::D1 => self.d1,
                Register::A0 => self.a0,
            }
        }

        fn set_reg(&mut self, reg: Register, value: u32) {
            match reg {
                Register::R0 => self.r0 = value,
                Register::R1 => self.r1 = value,
                Register::D0 => self.d0 = value,
                Register::D1 => self.d1 = value,
                Register::A0 => self.a0 = value,
            }
        }

        fn carry(&self) -> bool {
            self.carry
        }

        fn set_carry(&mut self, carry: bool) {
            self.carry = carry;
        }
    }
}
