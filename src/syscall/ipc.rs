//! Minix system calls: `trap #0` with D0 = BOTH, D1 = the server and A0 the
//! address of a message that carries the call and receives the reply.

use anyhow::{Result, bail};
use log::debug;

use super::message::{BOTH, Message, Server};
use super::{Flow, guest_pid};
use crate::args::ArgBuffer;
use crate::cpu::{Cpu, Register};
use crate::process::GuestProcess;

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
const CHDIR: u16 = 12;
const TIME: u16 = 13;
const CHMOD: u16 = 15;
const BRK: u16 = 17;
const STAT: u16 = 18;
const LSEEK: u16 = 19;
const GETPID: u16 = 20;
const GETUID: u16 = 24;
const FSTAT: u16 = 28;
const ACCESS: u16 = 33;
const KILL: u16 = 37;
const MKDIR: u16 = 39;
const DUP: u16 = 41;
const PIPE: u16 = 42;
const TIMES: u16 = 43;
const GETGID: u16 = 47;
const SIGNAL: u16 = 48;
const IOCTL: u16 = 54;
const EXEC: u16 = 59;
const UMASK: u16 = 60;

const GUEST_O_CREAT: u16 = 0o100;
/// The only terminal request honoured.
const TIOCGETP: u16 = 0x7408;
const BRK_FAILED: u32 = 0xffff_ffff;

/// Which server a call must be addressed to.
fn server_for(call: u16) -> Option<Server> {
    match call {
        EXIT | FORK | WAIT | BRK | GETPID | GETUID | KILL | GETGID | SIGNAL | EXEC => {
            Some(Server::Mm)
        }
        READ | WRITE | OPEN | CLOSE | CREAT | LINK | UNLINK | CHDIR | TIME | CHMOD | STAT
        | LSEEK | FSTAT | ACCESS | MKDIR | DUP | PIPE | TIMES | IOCTL | UMASK => Some(Server::Fs),
        _ => None,
    }
}

impl GuestProcess {
    pub(crate) fn ipc_syscall(&mut self, cpu: &mut dyn Cpu, trap: u16) -> Result<Flow> {
        if trap != 0 {
            bail!("unsupported m68k trap #{trap} at {:#x}", cpu.pc());
        }
        let function = cpu.reg(Register::D0) & 0xffff;
        if function != BOTH {
            bail!("unsupported message function {function} (only sendrec is emulated)");
        }
        cpu.set_reg(Register::D0, 0);

        let raw_server = cpu.reg(Register::D1) & 0xffff;
        let Some(server) = Server::from_raw(raw_server) else {
            bail!("message sent to unknown server {raw_server}");
        };
        let base = cpu.reg(Register::A0);
        if base & 1 != 0 {
            bail!("message at odd address {base:#x}");
        }
        let msg = Message::at(base);
        let call = msg.call(&self.memory)?;
        match server_for(call) {
            Some(expected) if expected == server => {}
            Some(expected) => bail!("call {call} sent to {server:?}, expected {expected:?}"),
            None => bail!("unsupported Minix system call {call} at {:#x}", cpu.pc()),
        }
        self.ipc_dispatch(cpu, msg, call)
    }

    fn ipc_dispatch(&mut self, cpu: &mut dyn Cpu, msg: Message, call: u16) -> Result<Flow> {
        let result = match call {
            EXIT => {
                let status = msg.m1(&self.memory)?.i1 as i16 as i32;
                debug!("exit({status})");
                return Ok(Flow::Exit(status));
            }
            FORK => guest_pid(self.sys_fork()),
            READ => {
                let m = msg.m1(&self.memory)?;
                self.sys_read(m.i1 as i16 as i32, m.p1, m.i2 as usize)?
            }
            WRITE => {
                let m = msg.m1(&self.memory)?;
                self.sys_write(m.i1 as i16 as i32, m.p1, m.i2 as usize)?
            }
            OPEN => {
                let m = msg.m1(&self.memory)?;
                if m.i2 & GUEST_O_CREAT != 0 {
                    let name = self.guest_bytes(m.p1)?;
                    self.sys_open(&name, m.i2 as i32, m.i3 as u32)?
                } else {
                    let name = self.guest_bytes(msg.m3(&self.memory)?.p1)?;
                    self.sys_open(&name, m.i2 as i32, 0)?
                }
            }
            CLOSE => self.sys_close(msg.m1(&self.memory)?.i1 as i16 as i32),
            WAIT => {
                let (result, status) = self.sys_wait();
                if result >= 0 {
                    msg.reply_i1(&mut self.memory, status as u16)?;
                }
                guest_pid(result)
            }
            CREAT => {
                let m = msg.m3(&self.memory)?;
                let name = self.guest_bytes(m.p1)?;
                self.sys_creat(&name, m.i2 as u32)?
            }
            LINK => {
                let m = msg.m1(&self.memory)?;
                let existing = self.guest_bytes(m.p1)?;
                let new = self.guest_bytes(m.p2)?;
                self.sys_link(&existing, &new)?
            }
            UNLINK => {
                let name = self.guest_bytes(msg.m3(&self.memory)?.p1)?;
                self.sys_unlink(&name)?
            }
            CHDIR => {
                let name = self.guest_bytes(msg.m3(&self.memory)?.p1)?;
                self.sys_chdir(&name)?
            }
            TIME => {
                let result = self.sys_time();
                if result >= 0 {
                    msg.reply_l1(&mut self.memory, result as u32)?;
                    0
                } else {
                    result
                }
            }
            CHMOD => {
                let m = msg.m3(&self.memory)?;
                let name = self.guest_bytes(m.p1)?;
                self.sys_chmod(&name, m.i2 as u32)?
            }
            BRK => {
                let requested = msg.m1(&self.memory)?.p1;
                match self.sys_brk(requested, cpu.sp()) {
                    Ok(_) => {
                        msg.reply_p1(&mut self.memory, requested)?;
                        0
                    }
                    Err(errno) => {
                        msg.reply_p1(&mut self.memory, BRK_FAILED)?;
                        errno
                    }
                }
            }
            STAT => {
                let m = msg.m1(&self.memory)?;
                let name = self.guest_bytes(m.p1)?;
                self.sys_stat(&name, m.p2)?
            }
            LSEEK => {
                let m = msg.m2(&self.memory)?;
                let result =
                    self.sys_lseek(m.i1 as i16 as i32, m.l1 as i32 as i64, m.i2 as i16 as i32)?;
                if result >= 0 {
                    msg.reply_l1(&mut self.memory, result as u32)?;
                    0
                } else {
                    result
                }
            }
            GETPID => guest_pid(self.sys_getpid()),
            GETUID | GETGID => {
                let (real, effective) = if call == GETUID {
                    self.sys_getuid()
                } else {
                    self.sys_getgid()
                };
                msg.reply_i1(&mut self.memory, effective as u16)?;
                (real & 0xffff) as i64
            }
            FSTAT => {
                let m = msg.m1(&self.memory)?;
                self.sys_fstat(m.i1 as i16 as i32, m.p1)?
            }
            ACCESS => {
                let m = msg.m3(&self.memory)?;
                let name = self.guest_bytes(m.p1)?;
                self.sys_access(&name, m.i2 as i32)?
            }
            KILL => {
                let m = msg.m1(&self.memory)?;
                self.sys_kill(m.i1 as i16 as i32, m.i2 as i32)
            }
            MKDIR => {
                let m = msg.m1(&self.memory)?;
                let name = self.guest_bytes(m.p1)?;
                self.sys_mkdir(&name, m.i2 as u32)?
            }
            DUP => {
                let m = msg.m1(&self.memory)?;
                self.sys_dup(m.i1 as i16 as i32, m.i2 as i16 as i32)
            }
            PIPE => {
                let (result, [read_end, write_end]) = self.sys_pipe();
                if result >= 0 {
                    msg.reply_i1(&mut self.memory, read_end as u16)?;
                    msg.reply_i2(&mut self.memory, write_end as u16)?;
                }
                result
            }
            TIMES => {
                let (result, times) = self.sys_times();
                if result >= 0 {
                    msg.reply_m4(&mut self.memory, times)?;
                }
                result
            }
            SIGNAL => {
                let m = msg.m6(&self.memory)?;
                self.sys_signal(m.i1 as i16 as i32, m.f1)
            }
            IOCTL => {
                let m = msg.m2(&self.memory)?;
                if m.i3 == TIOCGETP {
                    let result = self.sys_isatty(m.i1 as i16 as i32);
                    if result < 0 { result } else { 0 }
                } else {
                    debug!("ioctl({}, {:#x}) refused", m.i1, m.i3);
                    -(libc::EBADF as i64)
                }
            }
            EXEC => {
                let m = msg.m1(&self.memory)?;
                let name = self.guest_bytes(m.p1)?;
                let result = match ArgBuffer::from_guest_frame(&self.memory, m.p2, m.i2 as usize) {
                    Ok(args) => self.sys_exec(cpu, &name, args)?,
                    Err(err) => Self::marshal_failure(err)?,
                };
                // A successful exec has no caller left to reply to.
                if result == 0 {
                    return Ok(Flow::Continue);
                }
                result
            }
            UMASK => self.sys_umask(msg.m1(&self.memory)?.i1 as u32),
            _ => bail!("unsupported Minix system call {call}"),
        };
        msg.reply(&mut self.memory, result)?;
        Ok(Flow::Continue)
    }
}
