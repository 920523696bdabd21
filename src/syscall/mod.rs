//! System-call translation. `trap` speaks the PDP-11 direct-trap protocol,
//! `ipc` the Minix message protocol; both decode their arguments and encode
//! replies around the same host operations, which return the kernel
//! convention of a non-negative result or `-errno`.

mod directory_and_path_ops;
mod file_attributes_permissions;
mod file_io_basic;
mod file_metadata;
mod file_open_close;
mod ipc;
mod memory_management;
pub mod message;
mod process_management;
mod signal_handling;
mod terminal;
mod timers_and_clocks;
mod trap;
mod user_identity;

use anyhow::{Result, bail};

use crate::aout::Personality;
use crate::cpu::Cpu;
use crate::process::GuestProcess;

/// What the run loop does after a system call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(i32),
}

impl GuestProcess {
    /// Service the trap `trap` raised by `cpu`.
    pub fn syscall(&mut self, cpu: &mut dyn Cpu, trap: u16) -> Result<Flow> {
        match self.personality() {
            Some(Personality::Pdp11) => self.trap_syscall(cpu, trap),
            Some(Personality::M68k) => self.ipc_syscall(cpu, trap),
            None => bail!("system call before any image was loaded"),
        }
    }

    fn libc_to_kernel(result: i64) -> i64 {
        if result == -1 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(1);
            -(errno as i64)
        } else {
            result
        }
    }

    /// NUL-terminated guest string at `addr`.
    fn guest_bytes(&self, addr: u32) -> Result<Vec<u8>> {
        Ok(self.memory.c_string(addr)?)
    }
}

/// Process ids handed to guests are 15 bits wide.
fn guest_pid(pid: i64) -> i64 {
    if pid < 0 { pid } else { pid & 0x7fff }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::args::ArgBuffer;
    use crate::config::Config;
    use crate::memory::AddressSpace;

    /// A process with an empty address space of the given personality,
    /// rooted at `root`.
    pub(crate) fn bare_process(root: &std::path::Path, personality: Personality) -> GuestProcess {
        let config = Config {
            root: root.to_path_buf(),
            ..Config::default()
        }
        .validate()
        .unwrap();
        let mut process = GuestProcess::new(config, ArgBuffer::default()).unwrap();
        process.memory = AddressSpace::new(personality, 0x10000);
        process.header = Some(match personality {
            Personality::Pdp11 => crate::aout::Header::Pdp11(crate::aout::Pdp11Header {
                magic: 0o407,
                text: 0x100,
                data: 0,
                bss: 0,
                syms: 0,
                entry: 0,
                unused: 0,
                flags: 0,
            }),
            Personality::M68k => crate::aout::Header::M68k(crate::aout::M68kHeader {
                magic: 0x0103_0000,
                hdrlen: 0x2000_0000,
                text: 0x100,
                data: 0,
                bss: 0,
                entry: 0,
                total: 0,
                syms: 0,
            }),
        });
        let text_start = match personality {
            Personality::Pdp11 => 0,
            Personality::M68k => 0x400,
        };
        process.segments = crate::loader::Segments {
            text_start,
            text_end: text_start + 0x100,
            data_start: text_start + 0x100,
            data_end: text_start + 0x100,
            bss_start: text_start + 0x100,
            bss_end: text_start + 0x100,
            brk: text_start + 0x100,
        };
        process.cur_dir = process.root_dir.clone();
        process
    }

    #[test]
    fn pids_are_fifteen_bits() {
        assert_eq!(guest_pid(0x1_8001), 1);
        assert_eq!(guest_pid(-11), -11);
    }

    #[test]
    fn syscall_before_load_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            root: dir.path().to_path_buf(),
            ..Config::default()
        }
        .validate()
        .unwrap();
        let mut process = GuestProcess::new(config, ArgBuffer::default()).unwrap();
        let mut cpu = crate::cpu::testing::ScriptedCpu::default();
        assert!(process.syscall(&mut cpu, 1).is_err());
    }
}
