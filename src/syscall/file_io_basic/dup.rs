use log::debug;

use crate::process::GuestProcess;

/// Set in the descriptor to ask for dup2 semantics.
const DUP2_FLAG: i32 = 0o100;

impl GuestProcess {
    /// dup(fd), or dup2(fd & ~0100, fd2) when the 0100 bit is set.
    pub(crate) fn sys_dup(&mut self, fd: i32, fd2: i32) -> i64 {
        let result = if fd & DUP2_FLAG != 0 {
            unsafe { libc::dup2(fd & !DUP2_FLAG, fd2) as i64 }
        } else {
            unsafe { libc::dup(fd) as i64 }
        };
        let result = Self::libc_to_kernel(result);
        debug!("dup({fd:#o}, {fd2}) = {result}");
        result
    }
}
