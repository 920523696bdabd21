use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    /// time(); seconds since the epoch.
    pub(crate) fn sys_time(&mut self) -> i64 {
        let result = Self::libc_to_kernel(unsafe { libc::time(std::ptr::null_mut()) as i64 });
        debug!("time() = {result}");
        result
    }
}
