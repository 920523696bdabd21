use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    /// umask(mask); returns the previous mask.
    pub(crate) fn sys_umask(&mut self, mask: u32) -> i64 {
        let previous = unsafe { libc::umask((mask & 0o777) as libc::mode_t) } as i64;
        debug!("umask({mask:#o}) = {previous:#o}");
        previous
    }
}
