use anyhow::Result;
use log::debug;

use crate::process::GuestProcess;

/// Bytes in a V6 `gtty` reply: speeds, erase and kill, mode.
const SGTTY_SIZE: usize = 6;

impl GuestProcess {
    /// 1 if `fd` is a terminal, `-errno` otherwise.
    pub(crate) fn sys_isatty(&mut self, fd: i32) -> i64 {
        let result = if unsafe { libc::isatty(fd) } == 1 {
            1
        } else {
            Self::libc_to_kernel(-1)
        };
        debug!("isatty({fd}) = {result}");
        result
    }

    /// gtty(fd, buf): a zeroed terminal description for a terminal.
    pub(crate) fn sys_gtty(&mut self, fd: i32, buf: u32) -> Result<i64> {
        let result = self.sys_isatty(fd);
        if result < 0 {
            return Ok(result);
        }
        self.memory.fill(buf, SGTTY_SIZE, 0)?;
        Ok(0)
    }
}
