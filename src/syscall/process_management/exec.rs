use anyhow::Result;
use log::debug;

use crate::args::{ArgBuffer, MarshalError};
use crate::cpu::Cpu;
use crate::process::GuestProcess;

impl GuestProcess {
    /// Replace the running image with the executable at `path`, to be
    /// started with `args`.
    ///
    /// On success the pending trap returns to the end-of-memory sentinel and
    /// the run loop restarts on the new image. A load failure the guest can
    /// survive returns `-errno` with the old image, header, segments and
    /// arguments untouched.
    pub(crate) fn sys_exec(
        &mut self,
        cpu: &mut dyn Cpu,
        path: &[u8],
        args: ArgBuffer,
    ) -> Result<i64> {
        let name = String::from_utf8_lossy(path).into_owned();
        match self.load(path) {
            Ok(()) => {
                debug!("exec({name:?}, argc {}) = 0", args.argc());
                self.args = args;
                self.exec_pending = true;
                let eom = self.memory.end_of_memory();
                cpu.redirect_trap_return(&mut self.memory, eom)?;
                Ok(0)
            }
            Err(err) if err.is_fatal() => Err(err.into()),
            Err(err) => {
                debug!("exec({name:?}) failed: {err}");
                Ok(-(err.errno() as i64))
            }
        }
    }

    /// Guest-visible result of an argument vector that could not be read.
    pub(crate) fn marshal_failure(err: MarshalError) -> Result<i64> {
        match err.errno() {
            Some(errno) => {
                debug!("exec arguments rejected: {err}");
                Ok(-(errno as i64))
            }
            None => Err(err.into()),
        }
    }
}
