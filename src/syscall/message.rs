//! Minix message layouts, read and written in place in guest memory.
//!
//! Every message starts with the sender at offset 0 and the call or reply
//! type at offset 2; the payload variants overlay the bytes from offset 4.
//! All fields are big-endian and pointers are 32-bit guest addresses.

use crate::memory::{AddressSpace, MemoryError};

/// Bytes a message occupies.
pub const MESSAGE_SIZE: u32 = 24;
pub const M3_STRING: usize = 14;

/// sendrec: send, then wait for the reply.
pub const BOTH: u32 = 3;

/// Servers a message can be addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Server {
    /// The memory manager: process lifecycle, signals and the break.
    Mm,
    /// The file system.
    Fs,
}

impl Server {
    pub fn from_raw(raw: u32) -> Option<Server> {
        match raw {
            0 => Some(Server::Mm),
            1 => Some(Server::Fs),
            _ => None,
        }
    }
}

const TYPE: u32 = 2;
const I1: u32 = 4;
const I2: u32 = 6;
const I3: u32 = 8;
const L1: u32 = 10;
const P1: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mess1 {
    pub i1: u16,
    pub i2: u16,
    pub i3: u16,
    pub p1: u32,
    pub p2: u32,
    pub p3: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mess2 {
    pub i1: u16,
    pub i2: u16,
    pub i3: u16,
    pub l1: u32,
    pub l2: u32,
    pub p1: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mess3 {
    pub i1: u16,
    pub i2: u16,
    pub p1: u32,
    /// Inline copy of short path names.
    pub ca1: [u8; M3_STRING],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mess6 {
    pub i1: u16,
    pub i2: u16,
    pub i3: u16,
    pub l1: u32,
    /// Handler address.
    pub f1: u32,
}

/// A message at a fixed guest address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    base: u32,
}

impl Message {
    pub fn at(base: u32) -> Self {
        Self { base }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn source(&self, memory: &AddressSpace) -> Result<u16, MemoryError> {
        memory.read_word(self.base)
    }

    /// The call number of a request.
    pub fn call(&self, memory: &AddressSpace) -> Result<u16, MemoryError> {
        memory.read_word(self.base + TYPE)
    }

    pub fn m1(&self, memory: &AddressSpace) -> Result<Mess1, MemoryError> {
        let b = self.base;
        Ok(Mess1 {
            i1: memory.read_word(b + 4)?,
            i2: memory.read_word(b + 6)?,
            i3: memory.read_word(b + 8)?,
            p1: memory.read_long(b + 10)?,
            p2: memory.read_long(b + 14)?,
            p3: memory.read_long(b + 18)?,
        })
    }

    pub fn m2(&self, memory: &AddressSpace) -> Result<Mess2, MemoryError> {
        let b = self.base;
        Ok(Mess2 {
            i1: memory.read_word(b + 4)?,
            i2: memory.read_word(b + 6)?,
            i3: memory.read_word(b + 8)?,
            l1: memory.read_long(b + 10)?,
            l2: memory.read_long(b + 14)?,
            p1: memory.read_long(b + 18)?,
        })
    }

    pub fn m3(&self, memory: &AddressSpace) -> Result<Mess3, MemoryError> {
        let b = self.base;
        let mut ca1 = [0u8; M3_STRING];
        ca1.copy_from_slice(memory.slice(b + 12, M3_STRING)?);
        Ok(Mess3 {
            i1: memory.read_word(b + 4)?,
            i2: memory.read_word(b + 6)?,
            p1: memory.read_long(b + 8)?,
            ca1,
        })
    }

    /// The four longs of an m4 message.
    pub fn m4(&self, memory: &AddressSpace) -> Result<[u32; 4], MemoryError> {
        let b = self.base;
        Ok([
            memory.read_long(b + 4)?,
            memory.read_long(b + 8)?,
            memory.read_long(b + 12)?,
            memory.read_long(b + 16)?,
        ])
    }

    pub fn m6(&self, memory: &AddressSpace) -> Result<Mess6, MemoryError> {
        let b = self.base;
        Ok(Mess6 {
            i1: memory.read_word(b + 4)?,
            i2: memory.read_word(b + 6)?,
            i3: memory.read_word(b + 8)?,
            l1: memory.read_long(b + 10)?,
            f1: memory.read_long(b + 14)?,
        })
    }

    /// Store a kernel-convention result in the reply type: the value itself
    /// or `-errno`, truncated to 16 bits.
    pub fn reply(&self, memory: &mut AddressSpace, result: i64) -> Result<(), MemoryError> {
        memory.write_word(self.base + TYPE, result as u16)
    }

    pub fn reply_i1(&self, memory: &mut AddressSpace, value: u16) -> Result<(), MemoryError> {
        memory.write_word(self.base + I1, value)
    }

    pub fn reply_i2(&self, memory: &mut AddressSpace, value: u16) -> Result<(), MemoryError> {
        memory.write_word(self.base + I2, value)
    }

    pub fn reply_i3(&self, memory: &mut AddressSpace, value: u16) -> Result<(), MemoryError> {
        memory.write_word(self.base + I3, value)
    }

    pub fn reply_l1(&self, memory: &mut AddressSpace, value: u32) -> Result<(), MemoryError> {
        memory.write_long(self.base + L1, value)
    }

    pub fn reply_p1(&self, memory: &mut AddressSpace, value: u32) -> Result<(), MemoryError> {
        memory.write_long(self.base + P1, value)
    }

    pub fn reply_m4(&self, memory: &mut AddressSpace, longs: [u32; 4]) -> Result<(), MemoryError> {
        for (i, value) in longs.into_iter().enumerate() {
            memory.write_long(self.base + 4 + 4 * i as u32, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aout::Personality;

    #[test]
    fn overlays_share_the_payload() {
        let mut mem = AddressSpace::new(Personality::M68k, 0x1000);
        let bytes: Vec<u8> = (0..MESSAGE_SIZE as u8).collect();
        mem.write_data(0x100, &bytes).unwrap();
        let msg = Message::at(0x100);

        assert_eq!(msg.source(&mem).unwrap(), 0x0001);
        assert_eq!(msg.call(&mem).unwrap(), 0x0203);
        let m1 = msg.m1(&mem).unwrap();
        assert_eq!((m1.i1, m1.i2, m1.i3), (0x0405, 0x0607, 0x0809));
        assert_eq!((m1.p1, m1.p2, m1.p3), (0x0a0b_0c0d, 0x0e0f_1011, 0x1213_1415));
        let m2 = msg.m2(&mem).unwrap();
        assert_eq!((m2.l1, m2.l2, m2.p1), (0x0a0b_0c0d, 0x0e0f_1011, 0x1213_1415));
        let m3 = msg.m3(&mem).unwrap();
        assert_eq!(m3.p1, 0x0809_0a0b);
        assert_eq!(m3.ca1[0], 0x0c);
        assert_eq!(msg.m4(&mem).unwrap()[3], 0x1011_1213);
        assert_eq!(msg.m6(&mem).unwrap().f1, 0x0e0f_1011);
    }

    #[test]
    fn replies_land_at_fixed_offsets() {
        let mut mem = AddressSpace::new(Personality::M68k, 0x1000);
        let msg = Message::at(0x200);
        msg.reply(&mut mem, -(libc::ENOENT as i64)).unwrap();
        msg.reply_i1(&mut mem, 7).unwrap();
        msg.reply_l1(&mut mem, 0xdead_beef).unwrap();
        msg.reply_p1(&mut mem, 0xffff_ffff).unwrap();
        assert_eq!(mem.read_word(0x202).unwrap(), (-libc::ENOENT) as u16);
        assert_eq!(mem.read_word(0x204).unwrap(), 7);
        assert_eq!(mem.read_long(0x20a).unwrap(), 0xdead_beef);
        assert_eq!(mem.read_long(0x212).unwrap(), 0xffff_ffff);
    }
}
