use anyhow::Result;
use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    /// read(fd, buf, count); a tracked directory yields 16-byte records.
    pub(crate) fn sys_read(&mut self, fd: i32, buf: u32, count: usize) -> Result<i64> {
        let personality = self.memory.personality();
        let host = self.memory.slice_mut(buf, count)?;
        let result = if self.dirs.is_tracked(fd) {
            self.dirs.read_records(host, personality)?
        } else {
            let result = unsafe { libc::read(fd, host.as_mut_ptr().cast(), count) as i64 };
            Self::libc_to_kernel(result)
        };
        debug!("read({fd}, {buf:#x}, {count}) = {result}");
        Ok(result)
    }
}
