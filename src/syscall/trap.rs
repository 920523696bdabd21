//! PDP-11 system calls: `sys n` with the arguments in r0 and in the words
//! that follow the trap instruction. Results come back in r0 (and r1), with
//! the carry flag set and r0 holding the errno on failure.

use anyhow::{Result, bail};
use log::{debug, warn};

use super::{Flow, guest_pid};
use crate::args::ArgBuffer;
use crate::cpu::{Cpu, Register};
use crate::process::GuestProcess;

const SYS: u16 = 0o104400;

const INDIR: u16 = 0;
const EXIT: u16 = 1;
const FORK: u16 = 2;
const READ: u16 = 3;
const WRITE: u16 = 4;
const OPEN: u16 = 5;
const CLOSE: u16 = 6;
const WAIT: u16 = 7;
const CREAT: u16 = 8;
const LINK: u16 = 9;
const UNLINK: u16 = 10;
const EXEC: u16 = 11;
const CHDIR: u16 = 12;
const TIME: u16 = 13;
const CHMOD: u16 = 15;
const BREAK: u16 = 17;
const STAT: u16 = 18;
const SEEK: u16 = 19;
const GETPID: u16 = 20;
const SETUID: u16 = 23;
const GETUID: u16 = 24;
const FSTAT: u16 = 28;
const GTTY: u16 = 32;
const ACCESS: u16 = 33;
const KILL: u16 = 37;
const DUP: u16 = 41;
const PIPE: u16 = 42;
const TIMES: u16 = 43;
const SETGID: u16 = 46;
const GETGID: u16 = 47;
const SIGNAL: u16 = 48;
const UMASK: u16 = 60;

/// Encode a kernel-convention result into r0 and the carry flag.
fn reply(cpu: &mut dyn Cpu, result: i64) {
    if result < 0 {
        cpu.set_reg(Register::R0, (-result) as u32 & 0xffff);
        cpu.set_carry(true);
    } else {
        cpu.set_reg(Register::R0, result as u32 & 0xffff);
        cpu.set_carry(false);
    }
}

/// Effective id in the high byte, real id in the low byte.
fn packed_ids((real, effective): (u32, u32)) -> u32 {
    ((effective & 0xff) << 8) | (real & 0xff)
}

impl GuestProcess {
    pub(crate) fn trap_syscall(&mut self, cpu: &mut dyn Cpu, trap: u16) -> Result<Flow> {
        let mut call = trap & 0o77;
        let mut resume = None;

        // sys indir; addr: run the sys instruction stored at addr, then
        // continue after the indirect call's own operand.
        while call == INDIR {
            let target = cpu.fetch(&self.memory)?;
            resume.get_or_insert(cpu.pc());
            cpu.set_pc(target as u32);
            let word = cpu.fetch(&self.memory)?;
            if word & !0o77 != SYS {
                bail!("indirect system call at {target:06o} is not a sys instruction ({word:06o})");
            }
            call = word & 0o77;
        }

        let Some(resume) = resume else {
            return self.trap_dispatch(cpu, call);
        };
        if call == FORK {
            bail!("fork through an indirect system call is not supported");
        }
        let flow = self.trap_dispatch(cpu, call)?;
        let exec_succeeded = call == EXEC && cpu.pc() == self.memory.end_of_memory();
        if !exec_succeeded {
            cpu.set_pc(resume);
        }
        Ok(flow)
    }

    fn trap_dispatch(&mut self, cpu: &mut dyn Cpu, call: u16) -> Result<Flow> {
        let r0 = cpu.reg(Register::R0);
        let fd = r0 as u16 as i16 as i32;
        match call {
            EXIT => {
                let status = r0 as u16 as i16 as i32;
                debug!("exit({status})");
                return Ok(Flow::Exit(status));
            }
            FORK => {
                let result = self.sys_fork();
                // The parent resumes one word further on than the child.
                if result > 0 {
                    cpu.set_pc(cpu.pc().wrapping_add(2));
                }
                reply(cpu, guest_pid(result));
            }
            READ => {
                let buf = cpu.fetch(&self.memory)? as u32;
                let count = cpu.fetch(&self.memory)? as usize;
                let result = self.sys_read(fd, buf, count)?;
                reply(cpu, result);
            }
            WRITE => {
                let buf = cpu.fetch(&self.memory)? as u32;
                let count = cpu.fetch(&self.memory)? as usize;
                let result = self.sys_write(fd, buf, count)?;
                reply(cpu, result);
            }
            OPEN => {
                let name = self.guest_bytes(cpu.fetch(&self.memory)? as u32)?;
                let mode = cpu.fetch(&self.memory)?;
                let result = self.sys_open(&name, mode as i32, 0)?;
                reply(cpu, result);
            }
            CLOSE => {
                let result = self.sys_close(fd);
                reply(cpu, result);
            }
            WAIT => {
                let (result, status) = self.sys_wait();
                reply(cpu, guest_pid(result));
                if result >= 0 {
                    cpu.set_reg(Register::R1, status as u32 & 0xffff);
                }
            }
            CREAT => {
                let name = self.guest_bytes(cpu.fetch(&self.memory)? as u32)?;
                let mode = cpu.fetch(&self.memory)?;
                let result = self.sys_creat(&name, mode as u32)?;
                reply(cpu, result);
            }
            LINK => {
                let existing = self.guest_bytes(cpu.fetch(&self.memory)? as u32)?;
                let new = self.guest_bytes(cpu.fetch(&self.memory)? as u32)?;
                let result = self.sys_link(&existing, &new)?;
                reply(cpu, result);
            }
            UNLINK => {
                let name = self.guest_bytes(cpu.fetch(&self.memory)? as u32)?;
                let result = self.sys_unlink(&name)?;
                reply(cpu, result);
            }
            EXEC => {
                let name_addr = cpu.fetch(&self.memory)? as u32;
                let argv = cpu.fetch(&self.memory)? as u32;
                let name = self.guest_bytes(name_addr)?;
                let result = match ArgBuffer::from_guest_vector(&self.memory, argv) {
                    Ok(args) => self.sys_exec(cpu, &name, args)?,
                    Err(err) => Self::marshal_failure(err)?,
                };
                reply(cpu, result);
            }
            CHDIR => {
                let name = self.guest_bytes(cpu.fetch(&self.memory)? as u32)?;
                let result = self.sys_chdir(&name)?;
                reply(cpu, result);
            }
            TIME => {
                let result = self.sys_time();
                if result < 0 {
                    reply(cpu, result);
                } else {
                    cpu.set_reg(Register::R0, (result as u32 >> 16) & 0xffff);
                    cpu.set_reg(Register::R1, result as u32 & 0xffff);
                    cpu.set_carry(false);
                }
            }
            CHMOD => {
                let name = self.guest_bytes(cpu.fetch(&self.memory)? as u32)?;
                let mode = cpu.fetch(&self.memory)?;
                let result = self.sys_chmod(&name, mode as u32)?;
                reply(cpu, result);
            }
            BREAK => {
                let requested = cpu.fetch(&self.memory)? as u32;
                match self.sys_brk(requested, cpu.sp()) {
                    Ok(previous) => reply(cpu, previous as i64),
                    Err(errno) => reply(cpu, errno),
                }
            }
            STAT => {
                let name = self.guest_bytes(cpu.fetch(&self.memory)? as u32)?;
                let buf = cpu.fetch(&self.memory)? as u32;
                let result = self.sys_stat(&name, buf)?;
                reply(cpu, result);
            }
            SEEK => {
                let offset = cpu.fetch(&self.memory)?;
                let whence = cpu.fetch(&self.memory)?;
                let (offset, whence) = seek_arguments(offset, whence);
                let result = self.sys_lseek(fd, offset, whence)?;
                reply(cpu, result);
            }
            GETPID => {
                let result = self.sys_getpid();
                reply(cpu, guest_pid(result));
            }
            SETUID | SETGID => {
                warn!("set{}id({r0}) ignored", if call == SETUID { "u" } else { "g" });
                reply(cpu, 0);
            }
            GETUID => {
                let ids = self.sys_getuid();
                reply(cpu, packed_ids(ids) as i64);
            }
            GETGID => {
                let ids = self.sys_getgid();
                reply(cpu, packed_ids(ids) as i64);
            }
            FSTAT => {
                let buf = cpu.fetch(&self.memory)? as u32;
                let result = self.sys_fstat(fd, buf)?;
                reply(cpu, result);
            }
            GTTY => {
                let buf = cpu.fetch(&self.memory)? as u32;
                let result = self.sys_gtty(fd, buf)?;
                reply(cpu, result);
            }
            ACCESS => {
                let name = self.guest_bytes(cpu.fetch(&self.memory)? as u32)?;
                let mode = cpu.fetch(&self.memory)?;
                let result = self.sys_access(&name, mode as i32)?;
                reply(cpu, result);
            }
            KILL => {
                let sig = cpu.fetch(&self.memory)?;
                let result = self.sys_kill(fd, sig as i32);
                reply(cpu, result);
            }
            DUP => {
                let fd2 = cpu.reg(Register::R1) as u16 as i16 as i32;
                let result = self.sys_dup(fd, fd2);
                reply(cpu, result);
            }
            PIPE => {
                let (result, [read_end, write_end]) = self.sys_pipe();
                reply(cpu, if result < 0 { result } else { read_end as i64 });
                if result >= 0 {
                    cpu.set_reg(Register::R1, write_end as u32 & 0xffff);
                }
            }
            TIMES => {
                let buf = cpu.fetch(&self.memory)? as u32;
                let (result, [user, system, child_user, child_system]) = self.sys_times();
                if result == 0 {
                    self.memory.write_word(buf, user as u16)?;
                    self.memory.write_word(buf + 2, system as u16)?;
                    self.memory.write_long(buf + 4, child_user)?;
                    self.memory.write_long(buf + 8, child_system)?;
                }
                reply(cpu, result);
            }
            SIGNAL => {
                let sig = cpu.fetch(&self.memory)?;
                let handler = cpu.fetch(&self.memory)?;
                warn!("signal({sig}, {handler:#o}) ignored");
                reply(cpu, 0);
            }
            UMASK => {
                let mask = cpu.fetch(&self.memory)?;
                let result = self.sys_umask(mask as u32);
                reply(cpu, result);
            }
            _ => bail!(
                "unsupported PDP-11 system call {call} at pc {:06o}",
                cpu.pc()
            ),
        }
        Ok(Flow::Continue)
    }
}

/// V6 seek: whence 0 and 3 take the offset as unsigned, the others as
/// signed; 3 to 5 count in 512-byte blocks.
fn seek_arguments(offset: u16, whence: u16) -> (i64, i32) {
    let mut offset = match whence {
        0 | 3 => offset as i64,
        _ => offset as i16 as i64,
    };
    let mut whence = whence as i32;
    if (3..=5).contains(&whence) {
        offset *= 512;
        whence -= 3;
    }
    (offset, whence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aout::Personality;
    use crate::cpu::testing::ScriptedCpu;
    use crate::syscall::tests::bare_process;

    /// Place `sys call` followed by its operand words at 0x100 and leave the
    /// core just past the trap instruction.
    fn trap_at(process: &mut GuestProcess, call: u16, operands: &[u16]) -> ScriptedCpu {
        process.memory.write_word(0x100, SYS | call).unwrap();
        for (i, word) in operands.iter().enumerate() {
            process.memory.write_word(0x102 + 2 * i as u32, *word).unwrap();
        }
        ScriptedCpu {
            pc: 0x102,
            sp: 0xff00,
            ..ScriptedCpu::default()
        }
    }

    #[test]
    fn seek_blocks_and_signs() {
        assert_eq!(seek_arguments(0xffff, 0), (0xffff, 0));
        assert_eq!(seek_arguments(0xffff, 1), (-1, 1));
        assert_eq!(seek_arguments(2, 3), (1024, 0));
        assert_eq!(seek_arguments(0xfffe, 4), (-1024, 1));
    }

    #[test]
    fn ids_pack_effective_over_real() {
        assert_eq!(packed_ids((0x1f5, 0x102)), 0x02f5);
    }

    #[test]
    fn write_consumes_operands_and_replies() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = bare_process(dir.path(), Personality::Pdp11);
        let out = dir.path().join("out");
        let fd = std::fs::File::create(&out).unwrap();
        process.memory.write_data(0x200, b"hello").unwrap();

        let mut cpu = trap_at(&mut process, WRITE, &[0x200, 5]);
        cpu.r0 = std::os::fd::AsRawFd::as_raw_fd(&fd) as u32;
        assert_eq!(process.syscall(&mut cpu, WRITE).unwrap(), Flow::Continue);
        assert_eq!((cpu.r0, cpu.carry, cpu.pc), (5, false, 0x106));
        assert_eq!(std::fs::read(&out).unwrap(), b"hello");
    }

    #[test]
    fn failure_sets_carry_and_errno() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = bare_process(dir.path(), Personality::Pdp11);
        process.memory.write_data(0x200, b"/missing\0").unwrap();
        let mut cpu = trap_at(&mut process, OPEN, &[0x200, 0]);
        process.syscall(&mut cpu, OPEN).unwrap();
        assert!(cpu.carry);
        assert_eq!(cpu.r0, libc::ENOENT as u32);
    }

    #[test]
    fn exit_reports_signed_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = bare_process(dir.path(), Personality::Pdp11);
        let mut cpu = trap_at(&mut process, EXIT, &[]);
        cpu.r0 = 0xffff;
        assert_eq!(process.syscall(&mut cpu, EXIT).unwrap(), Flow::Exit(-1));
    }

    #[test]
    fn indirect_call_resumes_after_its_operand() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = bare_process(dir.path(), Personality::Pdp11);
        // 0x300: sys break; 0x1000
        process.memory.write_word(0x300, SYS | BREAK).unwrap();
        process.memory.write_word(0x302, 0x1000).unwrap();
        let mut cpu = trap_at(&mut process, INDIR, &[0x300]);
        process.syscall(&mut cpu, INDIR).unwrap();
        assert_eq!(cpu.pc, 0x104);
        assert!(!cpu.carry);
        assert_eq!(cpu.r0, 0x100);
        assert_eq!(process.segments.brk, 0x1000);
    }

    #[test]
    fn indirect_target_must_be_a_sys_instruction() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = bare_process(dir.path(), Personality::Pdp11);
        process.memory.write_word(0x300, 0o012700).unwrap();
        let mut cpu = trap_at(&mut process, INDIR, &[0x300]);
        assert!(process.syscall(&mut cpu, INDIR).is_err());
    }

    #[test]
    fn unsupported_call_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = bare_process(dir.path(), Personality::Pdp11);
        let mut cpu = trap_at(&mut process, 63, &[]);
        assert!(process.syscall(&mut cpu, 63).is_err());
    }

    fn write_pdp11_image(path: &std::path::Path, text: &[u16]) {
        let mut file = Vec::new();
        for word in [0o407, (text.len() * 2) as u16, 0, 0, 0, 0, 0, 0] {
            file.extend_from_slice(&word.to_le_bytes());
        }
        for word in text {
            file.extend_from_slice(&word.to_le_bytes());
        }
        std::fs::write(path, file).unwrap();
    }

    #[test]
    fn exec_success_redirects_to_end_of_memory() {
        let dir = tempfile::tempdir().unwrap();
        write_pdp11_image(&dir.path().join("next"), &[0o240, 0o240, 0o240]);
        let mut process = bare_process(dir.path(), Personality::Pdp11);
        process.memory.write_data(0x200, b"/next\0arg\0").unwrap();
        process.memory.write_word(0x210, 0x206).unwrap();
        process.memory.write_word(0x212, 0).unwrap();

        let mut cpu = trap_at(&mut process, EXEC, &[0x200, 0x210]);
        process.syscall(&mut cpu, EXEC).unwrap();
        assert_eq!(cpu.pc, 0xffff);
        assert_eq!((cpu.r0, cpu.carry), (0, false));
        assert!(process.exec_pending);
        assert_eq!(process.args.program(), Some(b"arg" as &[u8]));
        assert_eq!(process.segments.text_end, 6);
    }

    #[test]
    fn exec_failure_keeps_the_running_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = bare_process(dir.path(), Personality::Pdp11);
        process.args = ArgBuffer::from_host(&["old"], &[] as &[&str]).unwrap();
        process.memory.write_data(0x200, b"/missing\0").unwrap();
        process.memory.write_word(0x210, 0).unwrap();
        let segments = process.segments;

        let mut cpu = trap_at(&mut process, EXEC, &[0x200, 0x210]);
        process.syscall(&mut cpu, EXEC).unwrap();
        assert_eq!((cpu.r0, cpu.carry, cpu.pc), (libc::ENOENT as u32, true, 0x106));
        assert!(!process.exec_pending);
        assert_eq!(process.segments, segments);
        assert_eq!(process.args.program(), Some(b"old" as &[u8]));
    }

    #[test]
    fn indirect_exec_failure_resumes_after_the_operand() {
        let dir = tempfile::tempdir().unwrap();
        let mut process = bare_process(dir.path(), Personality::Pdp11);
        process.memory.write_data(0x200, b"/missing\0").unwrap();
        process.memory.write_word(0x210, 0).unwrap();
        // 0x300: sys exec; 0x200; 0x210
        process.memory.write_word(0x300, SYS | EXEC).unwrap();
        process.memory.write_word(0x302, 0x200).unwrap();
        process.memory.write_word(0x304, 0x210).unwrap();

        let mut cpu = trap_at(&mut process, INDIR, &[0x300]);
        process.syscall(&mut cpu, INDIR).unwrap();
        assert_eq!(cpu.pc, 0x104);
        assert!(cpu.carry);
    }
}
