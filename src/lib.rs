//! asmlab core: an interactive assembly-language laboratory engine.
//!
//! Callers hand in machine-code bytes; the engine executes them on the
//! real CPU inside an isolated, ptrace'd child process (the tracee) and
//! exposes the resulting machine state. The tracee maps a shared,
//! memfd-backed code page at a fixed address, runs each submitted step
//! until it hits an embedded trap opcode, and parks; registers and
//! memory are then freely readable until the next step.
//!
//! The pieces, leaves first:
//!
//! - the shared code page: a fixed-size memfd mapping shared by tracer
//!   and tracee (code in the first page, tracee stack in the rest);
//! - the tracee bootstrap (a Rust stage plus an architecture stub),
//!   which empties the child's address space down to that one mapping
//!   and optionally sandboxes descriptors and syscalls;
//! - [`arch`]: register descriptor tables, status-bit decoding, and the
//!   ptrace regset plumbing;
//! - [`Instance`]: the per-tracee state machine (`New` → `Ready` ⇄
//!   `Running` → `Exited`);
//! - [`Multiplexer`]: the process-wide SIGCHLD dispatcher that resolves
//!   pending asynchronous creations and executions and reaps destroyed
//!   tracees in the background.
//!
//! Assembling text into machine code, REPLs, and pretty-printing are the
//! embedder's business; this crate neither reads nor writes disk and
//! keeps no state across runs.

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate memoffset;

pub mod arch;
mod errors;
mod flags;
mod instance;
mod kernel_metadata;
mod multiplexer;
mod shared_mem;
mod tracee;
mod wait_status;

pub use crate::arch::{
    lookup_register, registers, RegisterClass, RegisterDescriptor, RegisterSnapshot, RegisterType,
    RegisterValue, StatusBits, SCP_ADDR, TRAP_INSTRUCTION,
};
pub use crate::errors::{Error, Result};
pub use crate::flags::SandboxFlags;
pub use crate::instance::{Instance, InstanceState};
pub use crate::kernel_metadata::signal_name;
pub use crate::multiplexer::{InstanceId, Multiplexer};
pub use crate::shared_mem::{CODE_MAX_SIZE, SCP_SIZE};
pub use crate::wait_status::StopStatus;

// Re-exported so embedders can call readv_memory without naming nix.
pub use nix::sys::uio::RemoteIoVec;
