use crate::process::GuestProcess;

impl GuestProcess {
    /// Real and effective user id.
    pub(crate) fn sys_getuid(&mut self) -> (u32, u32) {
        unsafe { (libc::getuid(), libc::geteuid()) }
    }

    /// Real and effective group id.
    pub(crate) fn sys_getgid(&mut self) -> (u32, u32) {
        unsafe { (libc::getgid(), libc::getegid()) }
    }
}
