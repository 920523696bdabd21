use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;

use anyhow::Result;
use log::debug;

use crate::process::GuestProcess;

impl GuestProcess {
    /// chdir(path). Only the guest's resolution base moves; `..` at the
    /// root directory stays put.
    pub(crate) fn sys_chdir(&mut self, path: &[u8]) -> Result<i64> {
        let result = if path == b".." && self.cur_dir == self.root_dir {
            0
        } else {
            self.change_dir(path)
        };
        debug!(
            "chdir({:?}) = {result} [{}]",
            String::from_utf8_lossy(path),
            self.cur_dir.display()
        );
        Ok(result)
    }

    fn change_dir(&mut self, path: &[u8]) -> i64 {
        let target = match std::fs::canonicalize(self.resolve(path)) {
            Ok(target) => target,
            Err(err) => return -(err.raw_os_error().unwrap_or(libc::ENOENT) as i64),
        };
        if !target.is_dir() {
            return -(libc::ENOTDIR as i64);
        }
        let Ok(host) = CString::new(target.as_os_str().as_bytes()) else {
            return -(libc::EINVAL as i64);
        };
        let result = Self::libc_to_kernel(unsafe { libc::access(host.as_ptr(), libc::X_OK) as i64 });
        if result == 0 {
            self.cur_dir = target;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::aout::Personality;
    use crate::syscall::tests::bare_process;

    #[test]
    fn dot_dot_at_root_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = bare_process(dir.path(), Personality::Pdp11);
        let root = process.root_dir.clone();
        assert_eq!(process.sys_chdir(b"..").unwrap(), 0);
        assert_eq!(process.cur_dir, root);
    }

    #[test]
    fn chdir_moves_the_resolution_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("usr")).unwrap();
        std::fs::write(dir.path().join("file"), b"").unwrap();
        let mut process = bare_process(dir.path(), Personality::Pdp11);

        assert_eq!(process.sys_chdir(b"/usr").unwrap(), 0);
        assert_eq!(process.resolve(b"x"), process.root_dir.join("usr/x"));
        assert_eq!(process.sys_chdir(b"..").unwrap(), 0);
        assert_eq!(process.cur_dir, process.root_dir);

        assert_eq!(process.sys_chdir(b"/file").unwrap(), -(libc::ENOTDIR as i64));
        assert_eq!(process.sys_chdir(b"/nope").unwrap(), -(libc::ENOENT as i64));
        assert_eq!(process.cur_dir, process.root_dir);
    }
}
