//! Argument and environment marshalling between host, guest and the
//! initial stack of a freshly loaded image.

use thiserror::Error;

use crate::aout::Personality;
use crate::memory::{AddressSpace, MemoryError};

/// Capacity of the argument buffer, terminators and padding included.
pub const ARG_MAX: usize = 4096;
const MAX_POINTERS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    #[error("argument list exceeds {ARG_MAX} bytes")]
    TooLong,
    #[error("exec frame declares {declared} arguments but holds {found}")]
    CountMismatch { declared: u32, found: usize },
    #[error("argument at frame offset {offset:#x} runs past the {len}-byte exec frame")]
    OutsideFrame { offset: u32, len: usize },
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl MarshalError {
    /// Host errno reported to the guest, or `None` when the guest's memory
    /// itself is unusable.
    pub fn errno(&self) -> Option<i32> {
        match self {
            MarshalError::TooLong => Some(libc::E2BIG),
            MarshalError::CountMismatch { .. } => Some(libc::EINVAL),
            MarshalError::OutsideFrame { .. } => Some(libc::EFAULT),
            MarshalError::Memory(_) => None,
        }
    }
}

/// Argument and environment strings of the next image, packed back to back
/// with their NUL terminators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgBuffer {
    argc: usize,
    envc: usize,
    arg_bytes: usize,
    strings: Vec<u8>,
}

impl ArgBuffer {
    pub fn from_host<A, E>(args: &[A], env: &[E]) -> Result<Self, MarshalError>
    where
        A: AsRef<[u8]>,
        E: AsRef<[u8]>,
    {
        let mut buffer = Self::default();
        for arg in args {
            buffer.push_arg(arg.as_ref())?;
        }
        for var in env {
            buffer.push_env(var.as_ref())?;
        }
        Ok(buffer)
    }

    /// Read a guest `argv` array of absolute pointers ending in a null
    /// pointer, as a PDP-11 `exec` passes it.
    pub fn from_guest_vector(memory: &AddressSpace, argv: u32) -> Result<Self, MarshalError> {
        let step = memory.personality().pointer_size() as u32;
        let mut buffer = Self::default();
        let mut slot = argv;
        for _ in 0..MAX_POINTERS {
            let ptr = memory.read_ptr(slot)?;
            if ptr == 0 {
                return Ok(buffer);
            }
            buffer.push_arg(&memory.c_string(ptr)?)?;
            slot = slot.wrapping_add(step);
        }
        Err(MarshalError::TooLong)
    }

    /// Read a Minix exec frame: `argc`, argv pointers, 0, envp pointers, 0,
    /// then the strings. Pointers are offsets from the start of the frame
    /// and every string must end inside its `len` bytes.
    pub fn from_guest_frame(
        memory: &AddressSpace,
        frame: u32,
        len: usize,
    ) -> Result<Self, MarshalError> {
        if len > ARG_MAX + 4 * MAX_POINTERS {
            return Err(MarshalError::TooLong);
        }
        let declared = memory.read_long(frame)?;
        let mut buffer = Self::default();
        let mut slot = frame.wrapping_add(4);
        let mut in_env = false;
        loop {
            if slot.wrapping_sub(frame) as usize + 4 > len {
                return Err(MarshalError::OutsideFrame {
                    offset: slot.wrapping_sub(frame),
                    len,
                });
            }
            let offset = memory.read_long(slot)?;
            slot = slot.wrapping_add(4);
            if offset == 0 {
                if in_env {
                    break;
                }
                in_env = true;
                continue;
            }
            let string = memory.c_string(frame.wrapping_add(offset))?;
            if offset as usize + string.len() + 1 > len {
                return Err(MarshalError::OutsideFrame { offset, len });
            }
            if in_env {
                buffer.push_env(&string)?;
            } else {
                buffer.push_arg(&string)?;
            }
        }
        if declared as usize != buffer.argc {
            return Err(MarshalError::CountMismatch {
                declared,
                found: buffer.argc,
            });
        }
        Ok(buffer)
    }

    fn reserve(&self, extra: usize) -> Result<(), MarshalError> {
        let padded = (self.strings.len() + extra + 1) & !1;
        if padded > ARG_MAX {
            return Err(MarshalError::TooLong);
        }
        Ok(())
    }

    fn push_arg(&mut self, arg: &[u8]) -> Result<(), MarshalError> {
        self.reserve(arg.len() + 1)?;
        // Environment strings follow the arguments.
        let tail = self.strings.split_off(self.arg_bytes);
        self.strings.extend_from_slice(arg);
        self.strings.push(0);
        self.arg_bytes = self.strings.len();
        self.strings.extend_from_slice(&tail);
        self.argc += 1;
        Ok(())
    }

    fn push_env(&mut self, var: &[u8]) -> Result<(), MarshalError> {
        self.reserve(var.len() + 1)?;
        self.strings.extend_from_slice(var);
        self.strings.push(0);
        self.envc += 1;
        Ok(())
    }

    pub fn argc(&self) -> usize {
        self.argc
    }

    pub fn envc(&self) -> usize {
        self.envc
    }

    pub fn args(&self) -> impl Iterator<Item = &[u8]> {
        split_strings(&self.strings[..self.arg_bytes])
    }

    pub fn env(&self) -> impl Iterator<Item = &[u8]> {
        split_strings(&self.strings[self.arg_bytes..])
    }

    /// First argument, the conventional program name.
    pub fn program(&self) -> Option<&[u8]> {
        self.args().next()
    }

    /// Lay the initial stack out below `top` and return the new stack pointer.
    ///
    /// From the stack pointer upward: `argc`, the argv pointers, a sentinel
    /// (all ones on the PDP-11, null on m68k), on m68k the envp pointers and
    /// a null, then the strings themselves ending just below `top`. PDP-11
    /// images receive no environment.
    pub fn push(&self, memory: &mut AddressSpace, top: u32) -> Result<u32, MemoryError> {
        let personality = memory.personality();
        let width = personality.pointer_size() as u32;
        let (strings, envc, sentinel) = match personality {
            Personality::Pdp11 => (&self.strings[..self.arg_bytes], 0, 0xffff),
            Personality::M68k => (&self.strings[..], self.envc, 0),
        };

        let padded = (strings.len() + 1) & !1;
        let env_slots = match personality {
            Personality::Pdp11 => 0,
            Personality::M68k => envc + 1,
        };
        let slots = 1 + self.argc + 1 + env_slots;
        let underflow = || MemoryError::OutOfBounds {
            addr: top,
            len: padded + slots * width as usize,
            size: memory.len(),
        };
        let strings_at = top.checked_sub(padded as u32).ok_or_else(underflow)?;
        let sp = strings_at
            .checked_sub(slots as u32 * width)
            .ok_or_else(underflow)?;

        memory.write_data(strings_at, strings)?;
        memory.fill(strings_at + strings.len() as u32, padded - strings.len(), 0)?;

        memory.write_ptr(sp, self.argc as u32)?;
        let mut slot = sp + width;
        let mut cursor = strings_at;
        let mut lengths = strings.split_inclusive(|&b| b == 0).map(|s| s.len() as u32);
        for _ in 0..self.argc {
            memory.write_ptr(slot, cursor)?;
            cursor += lengths.next().unwrap_or(0);
            slot += width;
        }
        memory.write_ptr(slot, sentinel)?;
        slot += width;
        if personality == Personality::M68k {
            for _ in 0..envc {
                memory.write_ptr(slot, cursor)?;
                cursor += lengths.next().unwrap_or(0);
                slot += width;
            }
            memory.write_ptr(slot, 0)?;
        }
        Ok(sp)
    }
}

fn split_strings(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    bytes
        .split_inclusive(|&b| b == 0)
        .map(|s| &s[..s.len() - 1])
}
