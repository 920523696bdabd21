//! a.out executable headers for the two supported personalities.

use std::fmt;

/// Which guest system an image was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Personality {
    /// Sixth Edition UNIX on the PDP-11: 16-bit, little-endian, direct traps.
    #[default]
    Pdp11,
    /// Minix on the 68000: 32-bit pointers, big-endian, message passing.
    M68k,
}

impl Personality {
    pub fn pointer_size(self) -> usize {
        match self {
            Personality::Pdp11 => 2,
            Personality::M68k => 4,
        }
    }

    /// Bytes kept free above the initial stack.
    pub fn reserved_tail(self) -> u32 {
        match self {
            Personality::Pdp11 => 2,
            Personality::M68k => 4,
        }
    }

    pub fn brk_alignment(self) -> u32 {
        match self {
            Personality::Pdp11 => 64,
            Personality::M68k => 256,
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Personality::Pdp11 => f.write_str("PDP-11"),
            Personality::M68k => f.write_str("m68k"),
        }
    }
}

pub const PDP11_HEADER_SIZE: usize = 16;
pub const M68K_HEADER_SIZE: usize = 32;

/// Text and data contiguous.
pub const PDP11_MAGIC_CONTIGUOUS: u16 = 0o407;
/// Data starts on the next 8 KiB boundary after text.
pub const PDP11_MAGIC_ALIGNED: u16 = 0o410;
pub const PDP11_DATA_ALIGNMENT: u32 = 0x2000;

pub const M68K_MAGIC: u32 = 0x0103_0000;
pub const M68K_MAGIC_MASK: u32 = 0xffff_0000;
/// Separate instruction and data spaces.
pub const M68K_SEPARATE_ID: u32 = 0x0000_2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pdp11Header {
    pub magic: u16,
    pub text: u16,
    pub data: u16,
    pub bss: u16,
    pub syms: u16,
    pub entry: u16,
    pub unused: u16,
    pub flags: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct M68kHeader {
    pub magic: u32,
    /// Header length byte, then version and cpu fields.
    pub hdrlen: u32,
    pub text: u32,
    pub data: u32,
    pub bss: u32,
    pub entry: u32,
    pub total: u32,
    pub syms: u32,
}

impl M68kHeader {
    pub fn header_len(&self) -> usize {
        (self.hdrlen >> 24) as usize
    }

    pub fn separate_id(&self) -> bool {
        self.magic & M68K_SEPARATE_ID != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    Pdp11(Pdp11Header),
    M68k(M68kHeader),
}

impl Header {
    /// Decode the header at the front of `file`.
    ///
    /// The first four bytes are checked once for the m68k magic; anything
    /// else is read as a PDP-11 header. Returns `None` when the file is
    /// shorter than the header it claims to carry.
    pub fn parse(file: &[u8]) -> Option<Header> {
        let first = u32::from_be_bytes(file.get(..4)?.try_into().ok()?);
        if first & M68K_MAGIC_MASK == M68K_MAGIC {
            let raw = file.get(..M68K_HEADER_SIZE)?;
            let long = |i: usize| u32::from_be_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
            return Some(Header::M68k(M68kHeader {
                magic: long(0),
                hdrlen: long(4),
                text: long(8),
                data: long(12),
                bss: long(16),
                entry: long(20),
                total: long(24),
                syms: long(28),
            }));
        }

        let raw = file.get(..PDP11_HEADER_SIZE)?;
        let word = |i: usize| u16::from_le_bytes([raw[2 * i], raw[2 * i + 1]]);
        Some(Header::Pdp11(Pdp11Header {
            magic: word(0),
            text: word(1),
            data: word(2),
            bss: word(3),
            syms: word(4),
            entry: word(5),
            unused: word(6),
            flags: word(7),
        }))
    }

    pub fn personality(&self) -> Personality {
        match self {
            Header::Pdp11(_) => Personality::Pdp11,
            Header::M68k(_) => Personality::M68k,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Header::Pdp11(_) => PDP11_HEADER_SIZE,
            Header::M68k(_) => M68K_HEADER_SIZE,
        }
    }

    pub fn magic(&self) -> u32 {
        match self {
            Header::Pdp11(h) => h.magic as u32,
            Header::M68k(h) => h.magic,
        }
    }

    pub fn text_size(&self) -> u32 {
        match self {
            Header::Pdp11(h) => h.text as u32,
            Header::M68k(h) => h.text,
        }
    }

    pub fn data_size(&self) -> u32 {
        match self {
            Header::Pdp11(h) => h.data as u32,
            Header::M68k(h) => h.data,
        }
    }

    pub fn bss_size(&self) -> u32 {
        match self {
            Header::Pdp11(h) => h.bss as u32,
            Header::M68k(h) => h.bss,
        }
    }

    pub fn entry(&self) -> u32 {
        match self {
            Header::Pdp11(h) => h.entry as u32,
            Header::M68k(h) => h.entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pdp11_header() {
        let mut file = Vec::new();
        for word in [0o407u16, 0x20, 0x10, 0x30, 0, 0, 0, 1] {
            file.extend_from_slice(&word.to_le_bytes());
        }
        let header = Header::parse(&file).unwrap();
        assert_eq!(header.personality(), Personality::Pdp11);
        assert_eq!(header.magic(), 0o407);
        assert_eq!(
            (header.text_size(), header.data_size(), header.bss_size()),
            (0x20, 0x10, 0x30)
        );
    }

    #[test]
    fn parses_m68k_header() {
        let mut file = Vec::new();
        for long in [0x0103_2000u32, 0x2004_0000, 0x100, 0x40, 0x80, 0, 0x1000, 0] {
            file.extend_from_slice(&long.to_be_bytes());
        }
        let Some(Header::M68k(header)) = Header::parse(&file) else {
            panic!("expected an m68k header");
        };
        assert_eq!(header.header_len(), 32);
        assert!(header.separate_id());
        assert_eq!(header.text, 0x100);
    }

    #[test]
    fn short_file_has_no_header() {
        assert_eq!(Header::parse(&[0x07, 0x01, 0, 0]), None);
        assert_eq!(Header::parse(&[0x01, 0x03, 0, 0, 0x20]), None);
    }
}
