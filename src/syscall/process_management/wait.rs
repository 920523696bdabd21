use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    /// wait(); returns the kernel result and the raw exit status.
    pub(crate) fn sys_wait(&mut self) -> (i64, i32) {
        let mut status: libc::c_int = 0;
        let result = Self::libc_to_kernel(unsafe { libc::wait(&mut status) as i64 });
        debug!("wait() = {result} [status {status:#x}]");
        (result, status)
    }
}
