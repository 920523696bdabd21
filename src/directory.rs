//! Old-style directory reads: `read(2)` on a directory yields fixed 16-byte
//! entries, a 16-bit inode number followed by a 14-byte name.

use std::ffi::CStr;
use std::io;
use std::ptr::NonNull;

use anyhow::{Result, bail};

use crate::aout::Personality;

pub const RECORD_SIZE: usize = 16;
const NAME_LEN: usize = 14;

#[derive(Debug)]
struct OpenDirectory {
    fd: i32,
    stream: NonNull<libc::DIR>,
}

/// At most one guest directory descriptor, backed by a host directory stream.
#[derive(Debug, Default)]
pub struct DirectoryEmulator {
    open: Option<OpenDirectory>,
}

fn errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO)
}

fn clear_errno() {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    unsafe {
        *libc::__errno_location() = 0;
    }
    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    unsafe {
        *libc::__error() = 0;
    }
}

/// One directory record in the guest's byte order.
pub fn encode_record(inode: u64, name: &[u8], personality: Personality) -> [u8; RECORD_SIZE] {
    let mut record = [0u8; RECORD_SIZE];
    let inode = inode as u16;
    record[..2].copy_from_slice(&match personality {
        Personality::Pdp11 => inode.to_le_bytes(),
        Personality::M68k => inode.to_be_bytes(),
    });
    let len = name.len().min(NAME_LEN);
    record[2..2 + len].copy_from_slice(&name[..len]);
    record
}

impl DirectoryEmulator {
    pub fn is_tracked(&self, fd: i32) -> bool {
        self.open.as_ref().is_some_and(|dir| dir.fd == fd)
    }

    /// Start tracking `fd`, a freshly opened directory.
    ///
    /// Returns `fd`, or `-errno` after closing it when the host refuses a
    /// directory stream.
    pub fn adopt(&mut self, fd: i32) -> Result<i64> {
        if let Some(dir) = &self.open {
            bail!(
                "only one open directory is supported (fd {} is still open)",
                dir.fd
            );
        }
        let stream = unsafe { libc::fdopendir(fd) };
        match NonNull::new(stream) {
            Some(stream) => {
                self.open = Some(OpenDirectory { fd, stream });
                Ok(fd as i64)
            }
            None => {
                let err = errno();
                unsafe { libc::close(fd) };
                Ok(-(err as i64))
            }
        }
    }

    /// Fill `buf` with as many whole records as fit and return the byte
    /// count; 0 at end of directory.
    pub fn read_records(&mut self, buf: &mut [u8], personality: Personality) -> Result<i64> {
        let Some(dir) = &self.open else {
            bail!("directory read without an open directory");
        };
        if buf.len() % RECORD_SIZE != 0 {
            bail!(
                "directory read of {} bytes is not a multiple of {RECORD_SIZE}",
                buf.len()
            );
        }
        let mut filled = 0;
        for slot in buf.chunks_exact_mut(RECORD_SIZE) {
            clear_errno();
            let entry = unsafe { libc::readdir(dir.stream.as_ptr()) };
            if entry.is_null() {
                let err = errno();
                if err != 0 && filled == 0 {
                    return Ok(-(err as i64));
                }
                break;
            }
            let entry = unsafe { &*entry };
            let name = unsafe { CStr::from_ptr(entry.d_name.as_ptr()) };
            slot.copy_from_slice(&encode_record(
                entry.d_ino as u64,
                name.to_bytes(),
                personality,
            ));
            filled += RECORD_SIZE;
        }
        Ok(filled as i64)
    }

    /// Seeking is limited to a rewind and to asking for the position.
    pub fn seek(&mut self, offset: i64, whence: i32) -> Result<i64> {
        let Some(dir) = &self.open else {
            bail!("directory seek without an open directory");
        };
        match (offset, whence) {
            (0, libc::SEEK_SET) => {
                unsafe { libc::rewinddir(dir.stream.as_ptr()) };
                Ok(0)
            }
            (0, libc::SEEK_CUR) => Ok(0),
            _ => bail!("unsupported directory seek (offset {offset}, whence {whence})"),
        }
    }

    /// Close the tracked directory and its descriptor.
    pub fn close(&mut self) -> i64 {
        match self.open.take() {
            Some(dir) => {
                let ret = unsafe { libc::closedir(dir.stream.as_ptr()) };
                if ret < 0 { -(errno() as i64) } else { 0 }
            }
            None => -(libc::EBADF as i64),
        }
    }
}

impl Drop for DirectoryEmulator {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    fn open_dir(path: &std::path::Path) -> i32 {
        let path = CString::new(path.as_os_str().as_bytes()).unwrap();
        let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY) };
        assert!(fd >= 0);
        fd
    }

    fn names(buf: &[u8]) -> BTreeSet<Vec<u8>> {
        buf.chunks_exact(RECORD_SIZE)
            .map(|r| {
                let name = &r[2..];
                let end = name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
                name[..end].to_vec()
            })
            .collect()
    }

    #[test]
    fn records_then_end_of_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alpha"), b"").unwrap();
        std::fs::write(dir.path().join("a_rather_long_file_name"), b"").unwrap();

        let mut dirs = DirectoryEmulator::default();
        let fd = open_dir(dir.path());
        assert_eq!(dirs.adopt(fd).unwrap(), fd as i64);
        assert!(dirs.is_tracked(fd));

        let mut buf = vec![0u8; RECORD_SIZE * 8];
        let n = dirs.read_records(&mut buf, Personality::M68k).unwrap();
        assert_eq!(n, 4 * RECORD_SIZE as i64);
        let expected: BTreeSet<Vec<u8>> = [&b"."[..], b"..", b"alpha", b"a_rather_long_"]
            .iter()
            .map(|n| n.to_vec())
            .collect();
        assert_eq!(names(&buf[..n as usize]), expected);
        assert_eq!(dirs.read_records(&mut buf, Personality::M68k).unwrap(), 0);

        assert_eq!(dirs.seek(0, libc::SEEK_SET).unwrap(), 0);
        let mut one = [0u8; RECORD_SIZE];
        assert_eq!(dirs.read_records(&mut one, Personality::Pdp11).unwrap(), 16);

        assert_eq!(dirs.close(), 0);
        assert!(!dirs.is_tracked(fd));
    }

    #[test]
    fn second_directory_and_ragged_reads_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut dirs = DirectoryEmulator::default();
        dirs.adopt(open_dir(dir.path())).unwrap();
        let other = open_dir(dir.path());
        assert!(dirs.adopt(other).is_err());
        unsafe { libc::close(other) };

        let mut buf = [0u8; 20];
        assert!(dirs.read_records(&mut buf, Personality::Pdp11).is_err());
        assert!(dirs.seek(32, libc::SEEK_SET).is_err());
    }

    #[test]
    fn record_layout_follows_byte_order() {
        let pdp = encode_record(0x1234, b"file", Personality::Pdp11);
        assert_eq!(pdp[..6], [0x34, 0x12, b'f', b'i', b'l', b'e']);
        let m68k = encode_record(0x1_1234, b"fourteen_bytes_plus", Personality::M68k);
        assert_eq!(m68k[..2], [0x12, 0x34]);
        assert_eq!(&m68k[2..], b"fourteen_bytes");
    }
}
