use anyhow::Result;
use log::debug;

use crate::aout::Personality;
use crate::process::GuestProcess;

pub(crate) const PDP11_STAT_SIZE: usize = 36;
pub(crate) const M68K_STAT_SIZE: usize = 30;

/// V6 inode image: dev, ino and mode as little-endian words, single-byte
/// nlink, uid and gid, then a 24-bit size as a high byte and a low word.
/// Block addresses and times are left zero.
pub(crate) fn pdp11_stat_record(s: &libc::stat) -> [u8; PDP11_STAT_SIZE] {
    let mut record = [0u8; PDP11_STAT_SIZE];
    let size = s.st_size as u32;
    record[0..2].copy_from_slice(&(s.st_dev as u16).to_le_bytes());
    record[2..4].copy_from_slice(&(s.st_ino as u16).to_le_bytes());
    record[4..6].copy_from_slice(&(s.st_mode as u16).to_le_bytes());
    record[6] = s.st_nlink as u8;
    record[7] = s.st_uid as u8;
    record[8] = s.st_gid as u8;
    record[9] = (size >> 16) as u8;
    record[10..12].copy_from_slice(&(size as u16).to_le_bytes());
    record
}

/// Minix stat: seven big-endian shorts, then size and the three times as
/// big-endian longs.
pub(crate) fn m68k_stat_record(s: &libc::stat) -> [u8; M68K_STAT_SIZE] {
    let mut record = [0u8; M68K_STAT_SIZE];
    let shorts = [
        s.st_dev as u16,
        s.st_ino as u16,
        s.st_mode as u16,
        s.st_nlink as u16,
        s.st_uid as u16,
        s.st_gid as u16,
        s.st_rdev as u16,
    ];
    for (i, value) in shorts.iter().enumerate() {
        record[2 * i..2 * i + 2].copy_from_slice(&value.to_be_bytes());
    }
    let longs = [
        s.st_size as u32,
        s.st_atime as u32,
        s.st_mtime as u32,
        s.st_ctime as u32,
    ];
    for (i, value) in longs.iter().enumerate() {
        record[14 + 4 * i..18 + 4 * i].copy_from_slice(&value.to_be_bytes());
    }
    record
}

impl GuestProcess {
    fn write_stat(&mut self, addr: u32, s: &libc::stat) -> Result<()> {
        match self.memory.personality() {
            Personality::Pdp11 => self.memory.write_data(addr, &pdp11_stat_record(s))?,
            Personality::M68k => self.memory.write_data(addr, &m68k_stat_record(s))?,
        }
        Ok(())
    }

    pub(crate) fn sys_stat(&mut self, path: &[u8], buf: u32) -> Result<i64> {
        let host = self.host_path(path)?;
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::stat(host.as_ptr(), &mut stat) as i64 };
        let result = Self::libc_to_kernel(result);
        if result == 0 {
            self.write_stat(buf, &stat)?;
        }
        debug!(
            "stat({:?}, {buf:#x}) = {result}",
            String::from_utf8_lossy(path)
        );
        Ok(result)
    }

    pub(crate) fn sys_fstat(&mut self, fd: i32, buf: u32) -> Result<i64> {
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::fstat(fd, &mut stat) as i64 };
        let result = Self::libc_to_kernel(result);
        if result == 0 {
            self.write_stat(buf, &stat)?;
        }
        debug!("fstat({fd}, {buf:#x}) = {result}");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> libc::stat {
        let mut s: libc::stat = unsafe { std::mem::zeroed() };
        s.st_dev = 0x0102;
        s.st_ino = 0x1_0304;
        s.st_mode = 0o100644;
        s.st_nlink = 2;
        s.st_uid = 0x1f5;
        s.st_gid = 20;
        s.st_size = 0x12_3456;
        s.st_mtime = 0x6000_0001;
        s
    }

    #[test]
    fn pdp11_record_matches_the_v6_inode() {
        let r = pdp11_stat_record(&sample());
        assert_eq!(r[..12], [0x02, 0x01, 0x04, 0x03, 0xa4, 0x81, 2, 0xf5, 20, 0x12, 0x56, 0x34]);
        assert!(r[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn m68k_record_is_big_endian() {
        let r = m68k_stat_record(&sample());
        assert_eq!(r[..6], [0x01, 0x02, 0x03, 0x04, 0x81, 0xa4]);
        assert_eq!(r[14..18], [0x00, 0x12, 0x34, 0x56]);
        assert_eq!(r[22..26], [0x60, 0x00, 0x00, 0x01]);
    }
}
