use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    /// pipe(); returns the kernel result and the two descriptors.
    pub(crate) fn sys_pipe(&mut self) -> (i64, [i32; 2]) {
        let mut fds = [0 as libc::c_int; 2];
        let result = unsafe { libc::pipe(fds.as_mut_ptr()) as i64 };
        let result = Self::libc_to_kernel(result);
        debug!("pipe() = {result} [{}, {}]", fds[0], fds[1]);
        (result, fds)
    }
}
