use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    /// fork(); the child sees 0, the parent the child's pid.
    pub(crate) fn sys_fork(&mut self) -> i64 {
        let result = Self::libc_to_kernel(unsafe { libc::fork() as i64 });
        debug!("fork() = {result}");
        result
    }
}
