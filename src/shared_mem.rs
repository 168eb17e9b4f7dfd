//! The shared code page: a memfd-backed, fixed-size region mapped into
//! both the tracer and the tracee. The tracer writes machine code into it
//! through its own mapping; the tracee maps the same pages
//! read/write/execute at a fixed address and runs them.

use crate::errors::Result;
use nix::sys::memfd::{memfd_create, MemFdCreateFlag};
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use nix::unistd::ftruncate;
use static_assertions::const_assert;
use std::ffi::CStr;
use std::num::NonZeroUsize;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::ptr::NonNull;

const PAGE_SIZE: usize = 4096;

/// Total size of the page group. The first page holds user code; the rest
/// is the tracee's stack, which grows down from the top.
pub const SCP_SIZE: usize = 16 * PAGE_SIZE;

/// Upper bound on one step's code, including the trap opcode.
pub const CODE_MAX_SIZE: usize = PAGE_SIZE;

const_assert!(SCP_SIZE % PAGE_SIZE == 0);
const_assert!(SCP_SIZE.is_power_of_two());
const_assert!(CODE_MAX_SIZE <= SCP_SIZE);

const MEMFD_NAME: &[u8] = b"asmlab\0";

/// What the mapping is called in /proc/<pid>/maps.
pub(crate) const MAPS_PREFIX: &str = "/memfd:asmlab";

const SCP_LEN: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(SCP_SIZE) };

/// The tracer-side handle: the memfd itself plus a shared read/write
/// mapping of it. Writes through the mapping are immediately visible in
/// the tracee, which is why they are only permitted while it is stopped.
pub struct SharedCodePage {
    memfd: OwnedFd,
    mapping: NonNull<libc::c_void>,
}

impl SharedCodePage {
    /// Allocates the anonymous memory file and maps it into the calling
    /// process. Fails if the kernel has no memfd support or resources are
    /// exhausted.
    pub fn create() -> Result<SharedCodePage> {
        let name = unsafe { CStr::from_bytes_with_nul_unchecked(MEMFD_NAME) };
        let memfd = memfd_create(name, MemFdCreateFlag::empty())?;
        ftruncate(&memfd, SCP_SIZE as libc::off_t)?;
        let mapping = unsafe {
            mmap(
                None,
                SCP_LEN,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &memfd,
                0,
            )?
        };
        Ok(SharedCodePage { memfd, mapping })
    }

    pub fn raw_fd(&self) -> RawFd {
        self.memfd.as_raw_fd()
    }

    /// Copies bytes into the page. The caller guarantees the tracee is
    /// stopped; there is no synchronization.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        assert!(offset <= SCP_SIZE && SCP_SIZE - offset >= bytes.len());
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.mapping.as_ptr().cast::<u8>().add(offset),
                bytes.len(),
            );
        }
    }

    /// Zeroes the whole page group.
    pub fn clear(&mut self) {
        unsafe {
            std::ptr::write_bytes(self.mapping.as_ptr().cast::<u8>(), 0, SCP_SIZE);
        }
    }

    /// The first machine word of the page. The tracee stores the address
    /// it mapped the page at here, right before its bootstrap trap.
    pub fn first_word(&self) -> usize {
        unsafe { self.mapping.as_ptr().cast::<usize>().read_volatile() }
    }
}

impl Drop for SharedCodePage {
    fn drop(&mut self) {
        // The memfd closes itself; the mapping we take down by hand.
        let _ = unsafe { munmap(self.mapping, SCP_SIZE) };
    }
}
