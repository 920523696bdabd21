use std::ops::Range;

use thiserror::Error;

use crate::aout::Personality;

/// Longest NUL-terminated string a guest may hand to the host.
const MAX_CSTRING: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("guest range {addr:#x} (+{len}) lies outside the {size:#x}-byte address space")]
    OutOfBounds { addr: u32, len: usize, size: usize },
    #[error("host offset {offset:#x} lies outside the {size:#x}-byte address space")]
    NotGuest { offset: usize, size: usize },
    #[error("unterminated string starting at {addr:#x}")]
    Unterminated { addr: u32 },
}

/// The whole guest address space: one flat buffer, always resident.
///
/// Every guest access is translated here. 16-bit addresses wrap at 64 KiB;
/// 32-bit addresses are checked against the buffer length. A range that does
/// not fit is a `MemoryError`, which callers treat as fatal guest-memory
/// corruption.
#[derive(Debug, Clone, Default)]
pub struct AddressSpace {
    bytes: Vec<u8>,
    personality: Personality,
}

impl AddressSpace {
    pub fn new(personality: Personality, size: usize) -> Self {
        Self {
            bytes: vec![0; size],
            personality,
        }
    }

    pub fn personality(&self) -> Personality {
        self.personality
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The sentinel address whose fetch ends the current image.
    pub fn end_of_memory(&self) -> u32 {
        self.bytes.len().saturating_sub(1) as u32
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Guest address to buffer offset.
    pub fn to_host(&self, vaddr: u32) -> Result<usize, MemoryError> {
        self.range(vaddr, 1).map(|r| r.start)
    }

    /// Buffer offset to guest address.
    pub fn to_guest(&self, offset: usize) -> Result<u32, MemoryError> {
        if offset >= self.bytes.len() {
            return Err(MemoryError::NotGuest {
                offset,
                size: self.bytes.len(),
            });
        }
        Ok(match self.personality {
            Personality::Pdp11 => (offset & 0xffff) as u32,
            Personality::M68k => offset as u32,
        })
    }

    fn range(&self, addr: u32, len: usize) -> Result<Range<usize>, MemoryError> {
        let start = match self.personality {
            Personality::Pdp11 => (addr & 0xffff) as usize,
            Personality::M68k => addr as usize,
        };
        let out_of_bounds = || MemoryError::OutOfBounds {
            addr,
            len,
            size: self.bytes.len(),
        };
        let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > self.bytes.len() || (len == 0 && start > self.bytes.len()) {
            return Err(out_of_bounds());
        }
        Ok(start..end)
    }

    pub fn slice(&self, addr: u32, len: usize) -> Result<&[u8], MemoryError> {
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }

    pub fn slice_mut(&mut self, addr: u32, len: usize) -> Result<&mut [u8], MemoryError> {
        let range = self.range(addr, len)?;
        Ok(&mut self.bytes[range])
    }

    pub fn write_data(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        self.slice_mut(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    pub fn fill(&mut self, addr: u32, len: usize, value: u8) -> Result<(), MemoryError> {
        self.slice_mut(addr, len)?.fill(value);
        Ok(())
    }

    pub fn read_byte(&self, addr: u32) -> Result<u8, MemoryError> {
        Ok(self.slice(addr, 1)?[0])
    }

    pub fn write_byte(&mut self, addr: u32, value: u8) -> Result<(), MemoryError> {
        self.slice_mut(addr, 1)?[0] = value;
        Ok(())
    }

    /// 16-bit word in the personality's byte order.
    pub fn read_word(&self, addr: u32) -> Result<u16, MemoryError> {
        let raw = self.slice(addr, 2)?;
        let bytes = [raw[0], raw[1]];
        Ok(match self.personality {
            Personality::Pdp11 => u16::from_le_bytes(bytes),
            Personality::M68k => u16::from_be_bytes(bytes),
        })
    }

    pub fn write_word(&mut self, addr: u32, value: u16) -> Result<(), MemoryError> {
        let bytes = match self.personality {
            Personality::Pdp11 => value.to_le_bytes(),
            Personality::M68k => value.to_be_bytes(),
        };
        self.write_data(addr, &bytes)
    }

    /// 32-bit value stored as two words, high word first.
    ///
    /// Big-endian on m68k; the PDP-11 "middle-endian" long otherwise.
    pub fn read_long(&self, addr: u32) -> Result<u32, MemoryError> {
        let hi = self.read_word(addr)? as u32;
        let lo = self.read_word(addr.wrapping_add(2))? as u32;
        Ok((hi << 16) | lo)
    }

    pub fn write_long(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        self.write_word(addr, (value >> 16) as u16)?;
        self.write_word(addr.wrapping_add(2), value as u16)
    }

    /// Pointer of the personality's width.
    pub fn read_ptr(&self, addr: u32) -> Result<u32, MemoryError> {
        match self.personality {
            Personality::Pdp11 => self.read_word(addr).map(u32::from),
            Personality::M68k => self.read_long(addr),
        }
    }

    pub fn write_ptr(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        match self.personality {
            Personality::Pdp11 => self.write_word(addr, value as u16),
            Personality::M68k => self.write_long(addr, value),
        }
    }

    /// Bytes of the NUL-terminated string at `addr`, without the terminator.
    pub fn c_string(&self, addr: u32) -> Result<Vec<u8>, MemoryError> {
        let start = self.to_host(addr)?;
        let window = &self.bytes[start..self.bytes.len().min(start + MAX_CSTRING)];
        match window.iter().position(|&b| b == 0) {
            Some(len) => Ok(window[..len].to_vec()),
            None => Err(MemoryError::Unterminated { addr }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdp11_addresses_wrap_at_16_bits() {
        let mut mem = AddressSpace::new(Personality::Pdp11, 0x10000);
        mem.write_word(0x1_0010, 0x1234).unwrap();
        assert_eq!(mem.bytes()[0x10..0x12], [0x34, 0x12]);
        assert_eq!(mem.to_host(0xdead_0002).unwrap(), 2);
    }

    #[test]
    fn m68k_words_are_big_endian() {
        let mut mem = AddressSpace::new(Personality::M68k, 0x100);
        mem.write_long(0x10, 0x0102_0304).unwrap();
        assert_eq!(mem.bytes()[0x10..0x14], [1, 2, 3, 4]);
        assert_eq!(mem.read_ptr(0x10).unwrap(), 0x0102_0304);
    }

    #[test]
    fn pdp11_long_is_high_word_first() {
        let mut mem = AddressSpace::new(Personality::Pdp11, 0x10000);
        mem.write_long(0, 0x0102_0304).unwrap();
        assert_eq!(mem.bytes()[..4], [0x02, 0x01, 0x04, 0x03]);
    }

    #[test]
    fn out_of_range_accesses_fail() {
        let mem = AddressSpace::new(Personality::M68k, 0x100);
        assert!(matches!(
            mem.slice(0xff, 2),
            Err(MemoryError::OutOfBounds { addr: 0xff, .. })
        ));
        assert!(mem.read_byte(0x100).is_err());
        assert!(mem.to_guest(0x100).is_err());

        let pdp = AddressSpace::new(Personality::Pdp11, 0x10000);
        assert!(pdp.read_word(0xffff).is_err());
    }

    #[test]
    fn c_string_stops_at_nul() {
        let mut mem = AddressSpace::new(Personality::Pdp11, 0x10000);
        mem.write_data(0x100, b"/bin/sh\0junk").unwrap();
        assert_eq!(mem.c_string(0x100).unwrap(), b"/bin/sh");

        let mut tail = AddressSpace::new(Personality::M68k, 0x10);
        tail.fill(0, 0x10, b'x').unwrap();
        assert_eq!(
            tail.c_string(4),
            Err(MemoryError::Unterminated { addr: 4 })
        );
    }
}
