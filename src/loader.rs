use std::io;
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::aout::{
    Header, M68kHeader, PDP11_DATA_ALIGNMENT, PDP11_MAGIC_ALIGNED, PDP11_MAGIC_CONTIGUOUS,
    Pdp11Header, Personality,
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: truncated executable", path.display())]
    Truncated { path: PathBuf },
    #[error("{}: not an executable (magic {magic:#o})", path.display())]
    BadMagic { path: PathBuf, magic: u32 },
    #[error("{}: {found} executable cannot replace a {running} image", path.display())]
    PersonalityMismatch {
        path: PathBuf,
        running: Personality,
        found: Personality,
    },
    #[error("{}: corrupt executable: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

impl LoadError {
    /// Host errno describing the failure to a guest `exec`.
    pub fn errno(&self) -> i32 {
        match self {
            LoadError::Io { source, .. } => source.raw_os_error().unwrap_or(libc::EIO),
            LoadError::Truncated { .. }
            | LoadError::BadMagic { .. }
            | LoadError::PersonalityMismatch { .. }
            | LoadError::Corrupt { .. } => libc::ENOEXEC,
        }
    }

    /// A well-formed header describing an impossible layout aborts the
    /// emulator rather than failing the guest call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoadError::Corrupt { .. })
    }
}

/// Guest addresses of every segment boundary of the current image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Segments {
    pub text_start: u32,
    pub text_end: u32,
    pub data_start: u32,
    pub data_end: u32,
    pub bss_start: u32,
    pub bss_end: u32,
    pub brk: u32,
}

/// Address-space geometry an image is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub memory_size: usize,
    /// m68k text start; the link base is zero.
    pub vector_table_size: u32,
}

/// A parsed, placed and relocated executable not yet installed into the
/// live address space.
#[derive(Debug, Clone)]
pub struct Image {
    pub header: Header,
    pub segments: Segments,
    /// Guest bytes from address 0 up to `segments.data_end`.
    pub placed: Vec<u8>,
    pub relocations: usize,
}

/// Read, validate, place and relocate the executable at `path`.
///
/// Nothing outside the returned `Image` is touched, so a failure leaves the
/// running image intact.
pub fn read_image(path: &Path, layout_for: impl Fn(Personality) -> Layout) -> Result<Image, LoadError> {
    let file = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let truncated = || LoadError::Truncated {
        path: path.to_path_buf(),
    };
    let header = Header::parse(&file).ok_or_else(truncated)?;
    let layout = layout_for(header.personality());
    let corrupt = |reason: String| LoadError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let segments = match &header {
        Header::Pdp11(h) => pdp11_segments(h, &layout).map_err(|err| match err {
            SegmentError::BadMagic => LoadError::BadMagic {
                path: path.to_path_buf(),
                magic: h.magic as u32,
            },
            SegmentError::Corrupt(reason) => corrupt(reason),
        })?,
        Header::M68k(h) => m68k_segments(h, &layout).map_err(|err| match err {
            SegmentError::BadMagic => LoadError::BadMagic {
                path: path.to_path_buf(),
                magic: h.magic,
            },
            SegmentError::Corrupt(reason) => corrupt(reason),
        })?,
    };

    let body = &file[header.size()..];
    let text = header.text_size() as usize;
    let data = header.data_size() as usize;
    if body.len() < text + data {
        return Err(truncated());
    }

    let mut placed = vec![0u8; segments.data_end as usize];
    let text_at = segments.text_start as usize;
    placed[text_at..text_at + text].copy_from_slice(&body[..text]);
    // Only 0410 images move data away from the end of text.
    let data_at = if segments.data_start > segments.text_start {
        segments.data_start as usize
    } else {
        segments.text_end as usize
    };
    placed[data_at..data_at + data].copy_from_slice(&body[text..text + data]);

    let relocations = match header {
        Header::M68k(_) if segments.text_start != 0 => {
            relocate(&mut placed, &body[text + data..], segments.text_start).map_err(corrupt)?
        }
        _ => 0,
    };

    Ok(Image {
        header,
        segments,
        placed,
        relocations,
    })
}

enum SegmentError {
    BadMagic,
    Corrupt(String),
}

fn pdp11_segments(h: &Pdp11Header, layout: &Layout) -> Result<Segments, SegmentError> {
    if h.magic != PDP11_MAGIC_CONTIGUOUS && h.magic != PDP11_MAGIC_ALIGNED {
        return Err(SegmentError::BadMagic);
    }
    if h.text == 0 {
        return Err(SegmentError::Corrupt("empty text segment".into()));
    }
    let text_end = h.text as u32;
    let data_start = if h.magic == PDP11_MAGIC_ALIGNED {
        text_end.next_multiple_of(PDP11_DATA_ALIGNMENT)
    } else {
        text_end
    };
    let data_end = data_start + h.data as u32;
    let bss_end = data_end + h.bss as u32;
    let limit = layout.memory_size as u32 - Personality::Pdp11.reserved_tail();
    if bss_end > limit {
        return Err(SegmentError::Corrupt(format!(
            "bss ends at {bss_end:#o}, past {limit:#o}"
        )));
    }
    Ok(Segments {
        text_start: 0,
        text_end,
        data_start,
        data_end,
        bss_start: data_end,
        bss_end,
        brk: bss_end,
    })
}

fn m68k_segments(h: &M68kHeader, layout: &Layout) -> Result<Segments, SegmentError> {
    if h.header_len() != crate::aout::M68K_HEADER_SIZE {
        return Err(SegmentError::Corrupt(format!(
            "header length {} is not {}",
            h.header_len(),
            crate::aout::M68K_HEADER_SIZE
        )));
    }
    if h.text == 0 {
        return Err(SegmentError::Corrupt("empty text segment".into()));
    }
    let limit = (layout.memory_size as u64) - Personality::M68k.reserved_tail() as u64;
    let text_start = layout.vector_table_size as u64;
    let text_end = text_start + h.text as u64;
    // Without separate I&D the data segment is counted from the text base.
    let (data_start, data_end) = if h.separate_id() {
        (text_end, text_end + h.data as u64)
    } else {
        (text_start, text_end + h.data as u64)
    };
    let bss_end = data_end + h.bss as u64;
    if bss_end > limit {
        return Err(SegmentError::Corrupt(format!(
            "bss ends at {bss_end:#x}, past {limit:#x}"
        )));
    }
    if bss_end % 2 != 0 {
        return Err(SegmentError::Corrupt(format!("odd break {bss_end:#x}")));
    }
    Ok(Segments {
        text_start: text_start as u32,
        text_end: text_end as u32,
        data_start: data_start as u32,
        data_end: data_end as u32,
        bss_start: data_end as u32,
        bss_end: bss_end as u32,
        brk: bss_end as u32,
    })
}

/// Apply a Minix relocation table to an image placed `offset` bytes above
/// its link address and return how many longs were patched.
///
/// The table opens with the big-endian link address of the first long to
/// patch (zero: nothing to do). Each following byte moves to the next one:
/// 0 ends the table, 1 skips 254 bytes without patching, any other even
/// value is the distance to the next patch.
pub fn relocate(placed: &mut [u8], table: &[u8], offset: u32) -> Result<usize, String> {
    let Some(first) = table.get(..4) else {
        return Ok(0);
    };
    let first = u32::from_be_bytes([first[0], first[1], first[2], first[3]]);
    if first == 0 {
        return Ok(0);
    }

    let mut addr = first as u64 + offset as u64;
    let mut deltas = table[4..].iter();
    let mut patched = 0;
    loop {
        let at = addr as usize;
        if addr + 4 > placed.len() as u64 {
            return Err(format!("relocation at {addr:#x} lies outside text and data"));
        }
        let word = u32::from_be_bytes([placed[at], placed[at + 1], placed[at + 2], placed[at + 3]]);
        placed[at..at + 4].copy_from_slice(&word.wrapping_add(offset).to_be_bytes());
        patched += 1;

        loop {
            match deltas.next() {
                None => return Err("relocation table runs past end of file".into()),
                Some(0) => return Ok(patched),
                Some(1) => addr += 254,
                Some(&delta) if delta % 2 == 1 => {
                    return Err(format!("odd relocation delta {delta}"));
                }
                Some(&delta) => {
                    addr += delta as u64;
                    break;
                }
            }
        }
    }
}

pub(crate) fn log_image(path: &Path, image: &Image) {
    let s = &image.segments;
    info!(
        "{}: {} a.out magic {:#o}, entry {:#x}",
        path.display(),
        image.header.personality(),
        image.header.magic(),
        image.header.entry()
    );
    info!(
        "text {:#x}..{:#x} data {:#x}..{:#x} bss {:#x}..{:#x}, {} relocations",
        s.text_start, s.text_end, s.data_start, s.data_end, s.bss_start, s.bss_end, image.relocations
    );
}
