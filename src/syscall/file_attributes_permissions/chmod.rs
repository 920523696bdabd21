use anyhow::Result;
use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    pub(crate) fn sys_chmod(&mut self, path: &[u8], mode: u32) -> Result<i64> {
        let host = self.host_path(path)?;
        let result = unsafe { libc::chmod(host.as_ptr(), mode as libc::mode_t) as i64 };
        let result = Self::libc_to_kernel(result);
        debug!(
            "chmod({:?}, {mode:#o}) = {result}",
            String::from_utf8_lossy(path)
        );
        Ok(result)
    }
}
