use anyhow::Result;
use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    pub(crate) fn sys_write(&mut self, fd: i32, buf: u32, count: usize) -> Result<i64> {
        let host = self.memory.slice(buf, count)?;
        let result = unsafe { libc::write(fd, host.as_ptr().cast(), count) as i64 };
        let result = Self::libc_to_kernel(result);
        debug!("write({fd}, {buf:#x}, {count}) = {result}");
        Ok(result)
    }
}
