//! The child half of instance creation. Everything here runs in the
//! freshly forked tracee, between `fork()` and the hand-off to the
//! architecture bootstrap stub; there is no one to report errors to, so
//! every failure is `_exit(1)` and the tracer observes a bootstrap
//! failure instead of a trap.

use crate::arch;
use crate::flags::SandboxFlags;
use crate::shared_mem::SCP_SIZE;
use nix::dir::Dir;
use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, mmap_anonymous, MapFlags, ProtFlags};
use nix::sys::prctl;
use nix::sys::ptrace;
use nix::sys::signal::{
    sigaction, sigprocmask, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal,
};
use nix::sys::stat::Mode;
use std::ffi::CStr;
use std::num::NonZeroUsize;
use std::os::unix::io::{AsRawFd, BorrowedFd, RawFd};

const TRACEE_NAME: &[u8] = b"asmlab_tracee\0";

const SCP_LEN: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(SCP_SIZE) };
const STAGING_LEN: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(2 * SCP_SIZE) };

fn die() -> ! {
    // No unwinding, no atexit handlers; this is a forked child.
    unsafe { libc::_exit(1) }
}

/// Runs in the forked child and never returns.
pub(crate) fn bootstrap(memfd: RawFd, flags: SandboxFlags) -> ! {
    if ptrace::traceme().is_err() {
        die();
    }

    reset_signals();

    let name = unsafe { CStr::from_bytes_with_nul_unchecked(TRACEE_NAME) };
    if prctl::set_name(name).is_err() {
        die();
    }

    if flags.contains(SandboxFlags::FDS) {
        close_fds(memfd);
    }

    enter_stub(memfd, flags.contains(SandboxFlags::SYSCALLS));
}

/// Puts every signal back to its default disposition and blocks exactly
/// SIGWINCH, so terminal resizes cannot interrupt single-step cycles.
fn reset_signals() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::SA_RESTART, SigSet::empty());
    for sig in Signal::iterator() {
        if sig == Signal::SIGKILL || sig == Signal::SIGSTOP {
            continue;
        }
        // EINVAL here is expected for the handful that cannot be reset.
        let _ = unsafe { sigaction(sig, &default) };
    }

    let mut mask = SigSet::empty();
    mask.add(Signal::SIGWINCH);
    if sigprocmask(SigmaskHow::SIG_SETMASK, Some(&mask), None).is_err() {
        die();
    }
}

/// Closes every descriptor except the memfd (the stub closes that one
/// itself once the fixed mapping exists) and the directory being walked.
fn close_fds(memfd: RawFd) {
    let mut dir = match Dir::open(
        "/proc/self/fd",
        OFlag::O_RDONLY | OFlag::O_DIRECTORY,
        Mode::empty(),
    ) {
        Ok(dir) => dir,
        Err(_) => die(),
    };
    let dir_fd = dir.as_raw_fd();

    for entry in dir.iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => die(),
        };
        let name = match entry.file_name().to_str() {
            Ok(name) => name,
            Err(_) => die(),
        };
        if name == "." || name == ".." {
            continue;
        }
        let fd: RawFd = match name.parse() {
            Ok(fd) => fd,
            Err(_) => die(),
        };
        if fd != memfd && fd != dir_fd {
            unsafe { libc::close(fd) };
        }
    }
}

/// Maps the memfd at a staging address aligned to the page-group size, so
/// that the staging mapping either coincides with the final fixed mapping
/// or does not overlap it at all. Then copies the bootstrap stub into the
/// page and calls it; the stub finishes the job from inside the memfd.
fn enter_stub(memfd: RawFd, enable_seccomp: bool) -> ! {
    let reservation = match unsafe {
        mmap_anonymous(None, STAGING_LEN, ProtFlags::PROT_NONE, MapFlags::MAP_PRIVATE)
    } {
        Ok(addr) => addr.as_ptr() as usize,
        Err(_) => die(),
    };
    let staged = (reservation + SCP_SIZE - 1) & !(SCP_SIZE - 1);

    let fd = unsafe { BorrowedFd::borrow_raw(memfd) };
    let mapping = match unsafe {
        mmap(
            NonZeroUsize::new(staged),
            SCP_LEN,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE | ProtFlags::PROT_EXEC,
            MapFlags::MAP_SHARED | MapFlags::MAP_FIXED,
            fd,
            0,
        )
    } {
        Ok(addr) => addr.as_ptr(),
        Err(_) => die(),
    };

    let stub = arch::bootstrap_stub();
    unsafe {
        std::ptr::copy_nonoverlapping(stub.as_ptr(), mapping.cast::<u8>(), stub.len());
        let entry: extern "C" fn(libc::c_int, libc::c_int) -> ! = std::mem::transmute(mapping);
        entry(memfd, enable_seccomp as libc::c_int)
    }
}
