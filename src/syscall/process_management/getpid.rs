use crate::process::GuestProcess;

impl GuestProcess {
    pub(crate) fn sys_getpid(&mut self) -> i64 {
        unsafe { libc::getpid() as i64 }
    }
}
