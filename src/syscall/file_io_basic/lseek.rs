use anyhow::Result;
use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    /// lseek(fd, offset, whence); on the tracked directory only a rewind or
    /// a position query is accepted.
    pub(crate) fn sys_lseek(&mut self, fd: i32, offset: i64, whence: i32) -> Result<i64> {
        let result = if self.dirs.is_tracked(fd) {
            self.dirs.seek(offset, whence)?
        } else {
            let result = unsafe { libc::lseek(fd, offset as libc::off_t, whence) as i64 };
            Self::libc_to_kernel(result)
        };
        debug!("lseek({fd}, {offset}, {whence}) = {result}");
        Ok(result)
    }
}
