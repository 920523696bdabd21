use log::debug;

use crate::process::GuestProcess;

/// Guests count process times in sixtieths of a second.
const GUEST_HZ: i64 = 60;

impl GuestProcess {
    /// times(); user, system, children's user and children's system time,
    /// rescaled from host clock ticks to 60 Hz.
    pub(crate) fn sys_times(&mut self) -> (i64, [u32; 4]) {
        let mut tms = libc::tms {
            tms_utime: 0,
            tms_stime: 0,
            tms_cutime: 0,
            tms_cstime: 0,
        };
        let clock = unsafe { libc::times(&mut tms) } as i64;
        if clock == -1 {
            return (Self::libc_to_kernel(-1), [0; 4]);
        }
        let host_hz = (unsafe { libc::sysconf(libc::_SC_CLK_TCK) } as i64).max(1);
        let scale = |ticks: libc::clock_t| (ticks as i64 * GUEST_HZ / host_hz) as u32;
        let times = [
            scale(tms.tms_utime),
            scale(tms.tms_stime),
            scale(tms.tms_cutime),
            scale(tms.tms_cstime),
        ];
        debug!("times() = {times:?}");
        (0, times)
    }
}
