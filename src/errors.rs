use nix::errno::Errno;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced at the crate boundary. User-caused tracee events
/// (segfaults, illegal instructions, filtered syscalls) are not errors;
/// they are reported as [`crate::StopStatus`] values.
#[derive(Debug, Error)]
pub enum Error {
    /// The sandbox flag mask contained bits this crate does not know.
    #[error("invalid sandbox flags")]
    InvalidFlags,

    /// The operation referred to an instance that has been destroyed.
    #[error("instance was destroyed")]
    InstanceDestroyed,

    /// Code plus the trap opcode does not fit in the code buffer.
    #[error("code does not fit in the code buffer")]
    CodeTooLarge,

    /// The instance is not in the `Ready` state.
    #[error("instance is not ready")]
    NotReady,

    /// The tracee exited or was killed before it finished bootstrapping.
    #[error("tracee died during bootstrap")]
    BootstrapFailed,

    /// The tracee kept a mapping other than the shared code page.
    #[error("unexpected mapping left in the tracee address space")]
    AddressUnavailable,

    /// The shared code page ended up somewhere other than its fixed address.
    #[error("shared code page was mapped at the wrong address")]
    AddressNotAvailable,

    /// The requested sandbox is not in effect in the tracee.
    #[error("sandbox violation: {0}")]
    SandboxViolation(&'static str),

    /// Raw OS error, propagated verbatim.
    #[error(transparent)]
    Os(#[from] Errno),
}

impl Error {
    /// The errno equivalent of this error, for embedding layers that speak
    /// errno.
    pub fn as_errno(&self) -> Errno {
        match self {
            Error::InvalidFlags => Errno::EINVAL,
            Error::InstanceDestroyed => Errno::ESRCH,
            Error::CodeTooLarge => Errno::E2BIG,
            Error::NotReady => Errno::EINVAL,
            Error::BootstrapFailed => Errno::ECHILD,
            Error::AddressUnavailable => Errno::EADDRINUSE,
            Error::AddressNotAvailable => Errno::EADDRNOTAVAIL,
            Error::SandboxViolation(_) => Errno::EPERM,
            Error::Os(errno) => *errno,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Os(Errno::from_raw(err.raw_os_error().unwrap_or(libc::EIO)))
    }
}
