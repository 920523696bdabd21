use log::{debug, warn};

use crate::process::GuestProcess;

const GUEST_SIG_DFL: u32 = 0;
const GUEST_SIG_IGN: u32 = 1;

impl GuestProcess {
    /// signal(sig, handler). Default and ignore dispositions reach the host;
    /// guest handler addresses cannot be called back and are refused.
    pub(crate) fn sys_signal(&mut self, sig: i32, handler: u32) -> i64 {
        let disposition = match handler {
            GUEST_SIG_DFL => libc::SIG_DFL,
            GUEST_SIG_IGN => libc::SIG_IGN,
            _ => {
                warn!("signal({sig}, {handler:#x}): guest signal handlers are not supported");
                return -(libc::EINVAL as i64);
            }
        };
        let previous = unsafe { libc::signal(sig, disposition) };
        let result = if previous == libc::SIG_ERR {
            Self::libc_to_kernel(-1)
        } else {
            previous as i64
        };
        debug!("signal({sig}, {handler}) = {result}");
        result
    }
}
