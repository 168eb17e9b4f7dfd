use crate::errors::{Error, Result};

bitflags! {
    /// Sandboxing applied in the tracee during bootstrap. The sandbox is
    /// chosen at creation time and never changes for the life of an
    /// instance; the tracer verifies it took effect before the instance
    /// becomes ready.
    pub struct SandboxFlags: u32 {
        /// Close every open file descriptor.
        const FDS = 1 << 0;
        /// Install a syscall filter that traps on everything except munmap.
        const SYSCALLS = 1 << 1;
        /// Enable all sandboxing.
        const ALL = Self::FDS.bits | Self::SYSCALLS.bits;
    }
}

impl SandboxFlags {
    /// Validates a raw bitmask coming in from an embedding layer. Unknown
    /// bits are rejected rather than ignored.
    pub fn from_raw(bits: u32) -> Result<SandboxFlags> {
        SandboxFlags::from_bits(bits).ok_or(Error::InvalidFlags)
    }
}
