use anyhow::Result;
use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    pub(crate) fn sys_link(&mut self, existing: &[u8], new: &[u8]) -> Result<i64> {
        let from = self.host_path(existing)?;
        let to = self.host_path(new)?;
        let result = unsafe { libc::link(from.as_ptr(), to.as_ptr()) as i64 };
        let result = Self::libc_to_kernel(result);
        debug!(
            "link({:?}, {:?}) = {result}",
            String::from_utf8_lossy(existing),
            String::from_utf8_lossy(new)
        );
        Ok(result)
    }

    pub(crate) fn sys_unlink(&mut self, path: &[u8]) -> Result<i64> {
        let host = self.host_path(path)?;
        let result = unsafe { libc::unlink(host.as_ptr()) as i64 };
        let result = Self::libc_to_kernel(result);
        debug!("unlink({:?}) = {result}", String::from_utf8_lossy(path));
        Ok(result)
    }
}
