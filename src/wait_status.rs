use crate::kernel_metadata::signal_name;
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use std::fmt;

/// Why a tracee stopped. This is the abstract form of the raw OS wait
/// status word; it is what `wait`/`poll` hand back to the caller.
///
/// `Stopped(SIGTRAP)` is the normal outcome of a step: the tracee ran the
/// submitted code and hit the trap opcode appended after it. Other
/// `Stopped` signals carry tracee-caused events (SIGSEGV, SIGILL, SIGFPE,
/// SIGSYS from the syscall filter, ...); they are reported, not raised as
/// errors, so the caller can inspect state before deciding what to do.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopStatus {
    /// The tracee exited with the given status code. Terminal.
    Exited(i32),
    /// The tracee was terminated by a signal. Terminal.
    Signaled(Signal),
    /// The tracee is stopped at signal delivery and remains controllable.
    Stopped(Signal),
    /// The tracee was resumed by SIGCONT.
    Continued,
}

impl StopStatus {
    /// Maps a `waitpid` result onto a stop-status. `None` means nothing
    /// happened (WNOHANG polling).
    pub(crate) fn from_wait_status(status: WaitStatus) -> Option<StopStatus> {
        match status {
            WaitStatus::Exited(_, code) => Some(StopStatus::Exited(code)),
            WaitStatus::Signaled(_, sig, _) => Some(StopStatus::Signaled(sig)),
            WaitStatus::Stopped(_, sig) => Some(StopStatus::Stopped(sig)),
            // We never enable ptrace events or syscall tracing, but a
            // kernel that reports them anyway is still delivering a trap.
            WaitStatus::PtraceEvent(_, sig, _) => Some(StopStatus::Stopped(sig)),
            WaitStatus::PtraceSyscall(_) => Some(StopStatus::Stopped(Signal::SIGTRAP)),
            WaitStatus::Continued(_) => Some(StopStatus::Continued),
            WaitStatus::StillAlive => None,
        }
    }

    /// True if the tracee is gone for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StopStatus::Exited(_) | StopStatus::Signaled(_))
    }

    /// True for the normal end-of-step trap.
    pub fn is_trap(&self) -> bool {
        *self == StopStatus::Stopped(Signal::SIGTRAP)
    }
}

impl fmt::Display for StopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopStatus::Exited(code) => write!(f, "exited with status {}", code),
            StopStatus::Signaled(sig) => {
                write!(f, "terminated by {}", signal_name(*sig as i32))
            }
            StopStatus::Stopped(sig) => {
                write!(f, "stopped by {}", signal_name(*sig as i32))
            }
            StopStatus::Continued => write!(f, "continued"),
        }
    }
}
