use anyhow::Result;
use log::debug;

use crate::process::GuestProcess;

/// Guest open(2) flag bits, shared by V6/V7 and Minix.
const GUEST_ACCMODE: i32 = 0o3;
const GUEST_CREAT: i32 = 0o100;
const GUEST_EXCL: i32 = 0o200;
const GUEST_NOCTTY: i32 = 0o400;
const GUEST_TRUNC: i32 = 0o1000;
const GUEST_APPEND: i32 = 0o2000;
const GUEST_NONBLOCK: i32 = 0o4000;

/// Translate guest open flags to the host's values.
pub(crate) fn translate_open_flags(guest: i32) -> i32 {
    let mut host = match guest & GUEST_ACCMODE {
        0 => libc::O_RDONLY,
        1 => libc::O_WRONLY,
        _ => libc::O_RDWR,
    };
    for (bit, flag) in [
        (GUEST_CREAT, libc::O_CREAT),
        (GUEST_EXCL, libc::O_EXCL),
        (GUEST_NOCTTY, libc::O_NOCTTY),
        (GUEST_TRUNC, libc::O_TRUNC),
        (GUEST_APPEND, libc::O_APPEND),
        (GUEST_NONBLOCK, libc::O_NONBLOCK),
    ] {
        if guest & bit != 0 {
            host |= flag;
        }
    }
    host
}

impl GuestProcess {
    /// open(path, flags, mode). A directory is handed to the directory
    /// emulator so later reads return 16-byte records.
    pub(crate) fn sys_open(&mut self, path: &[u8], flags: i32, mode: u32) -> Result<i64> {
        let host = self.host_path(path)?;
        let fd = unsafe {
            libc::open(
                host.as_ptr(),
                translate_open_flags(flags),
                mode as libc::c_uint,
            )
        };
        let mut result = Self::libc_to_kernel(fd as i64);
        if result >= 0 {
            let mut stat: libc::stat = unsafe { std::mem::zeroed() };
            let is_dir = unsafe { libc::fstat(fd, &mut stat) } == 0
                && stat.st_mode & libc::S_IFMT == libc::S_IFDIR;
            if is_dir {
                result = self.dirs.adopt(fd)?;
            }
        }
        debug!(
            "open({:?}, {flags:#o}, {mode:#o}) = {result}",
            String::from_utf8_lossy(path)
        );
        Ok(result)
    }
}
