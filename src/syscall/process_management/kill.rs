use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    pub(crate) fn sys_kill(&mut self, pid: i32, sig: i32) -> i64 {
        let result = Self::libc_to_kernel(unsafe { libc::kill(pid, sig) as i64 });
        debug!("kill({pid}, {sig}) = {result}");
        result
    }
}
