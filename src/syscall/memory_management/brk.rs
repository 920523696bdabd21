use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    /// brk(addr): round the request up to the break granule and move the
    /// break there unless that lands below the end of bss or above the
    /// stack pointer. Returns the previous break, or `-ENOMEM`.
    pub(crate) fn sys_brk(&mut self, requested: u32, sp: u32) -> Result<u32, i64> {
        let align = self.memory.personality().brk_alignment();
        let aligned = requested
            .checked_add(align - 1)
            .map(|end| end & !(align - 1));
        let result = match aligned {
            Some(end) if end >= self.segments.bss_end && end <= sp => {
                let previous = self.segments.brk;
                self.segments.brk = end;
                Ok(previous)
            }
            _ => Err(-(libc::ENOMEM as i64)),
        };
        debug!("brk({requested:#x}) = {result:x?} [sp {sp:#x}]");
        result
    }
}
