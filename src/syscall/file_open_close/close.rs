use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    pub(crate) fn sys_close(&mut self, fd: i32) -> i64 {
        let result = if self.dirs.is_tracked(fd) {
            self.dirs.close()
        } else {
            Self::libc_to_kernel(unsafe { libc::close(fd) as i64 })
        };
        debug!("close({fd}) = {result}");
        result
    }
}
