use anyhow::Result;
use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    pub(crate) fn sys_access(&mut self, path: &[u8], mode: i32) -> Result<i64> {
        let host = self.host_path(path)?;
        let result = unsafe { libc::access(host.as_ptr(), mode) as i64 };
        let result = Self::libc_to_kernel(result);
        debug!(
            "access({:?}, {mode:#o}) = {result}",
            String::from_utf8_lossy(path)
        );
        Ok(result)
    }
}
