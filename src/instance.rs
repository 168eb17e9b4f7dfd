//! The Instance Controller: owns one tracee's lifecycle and exposes the
//! core API. The tracee is either running freely (and unreadable) or
//! stopped at a trap (and fully observable); all transitions are driven
//! from here.

use crate::arch::{self, RegisterDescriptor, RegisterValue};
use crate::errors::{Error, Result};
use crate::flags::SandboxFlags;
use crate::shared_mem::{SharedCodePage, CODE_MAX_SIZE, MAPS_PREFIX, SCP_SIZE};
use crate::tracee;
use crate::wait_status::StopStatus;
use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::{kill, Signal};
use nix::sys::uio::{process_vm_readv, RemoteIoVec};
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::{fork, ForkResult, Pid};
use std::fs;
use std::io::IoSliceMut;

/// Lifecycle of one instance. `Exited` is terminal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InstanceState {
    /// Forked but not yet seen to finish bootstrapping.
    New,
    /// Stopped at a trap; registers and memory are observable and code
    /// can be submitted.
    Ready,
    /// Executing submitted code; hands off the CPU until the next stop.
    Running,
    /// The tracee is gone.
    Exited,
}

/// One sandboxed tracee under this process's control. Creation is
/// asynchronous: the instance starts out `New` and must be waited or
/// polled until the bootstrap trap has been observed and validated.
pub struct Instance {
    pid: Pid,
    scp: SharedCodePage,
    flags: SandboxFlags,
    state: InstanceState,
    reaped: bool,
}

impl Instance {
    /// Creates the shared code page, forks the tracee, and returns
    /// immediately. The caller must `wait`/`poll` to see the instance
    /// reach `Ready`.
    pub fn create(flags: SandboxFlags) -> Result<Instance> {
        let scp = SharedCodePage::create()?;
        let pid = match unsafe { fork() }? {
            ForkResult::Child => tracee::bootstrap(scp.raw_fd(), flags),
            ForkResult::Parent { child } => child,
        };
        debug!("forked tracee {} (flags {:?})", pid, flags);
        Ok(Instance {
            pid,
            scp,
            flags,
            state: InstanceState::New,
            reaped: false,
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Base address and length of the shared code page in the tracee.
    pub fn memory_range(&self) -> (usize, usize) {
        (arch::SCP_ADDR, SCP_SIZE)
    }

    /// Submits machine code for execution. The code plus the trap opcode
    /// is written at the start of the shared code page, the program
    /// counter is pointed back at it, and the tracee is set running.
    /// Completion is observed through `wait` or `poll`.
    pub fn execute(&mut self, code: &[u8]) -> Result<()> {
        if self.state != InstanceState::Ready {
            return Err(Error::NotReady);
        }
        let total = code
            .len()
            .checked_add(arch::TRAP_INSTRUCTION.len())
            .ok_or(Error::CodeTooLarge)?;
        if total > CODE_MAX_SIZE {
            return Err(Error::CodeTooLarge);
        }

        self.scp.write(0, code);
        self.scp.write(code.len(), &arch::TRAP_INSTRUCTION);

        // ESRCH means the tracee died under us; not an error here, the
        // next wait picks up its exit status.
        match arch::reset_program_counter(self.pid) {
            Err(Errno::ESRCH) => return Ok(()),
            Err(err) => return Err(err.into()),
            Ok(()) => {}
        }
        match ptrace::cont(self.pid, None) {
            Err(Errno::ESRCH) => return Ok(()),
            Err(err) => return Err(err.into()),
            Ok(()) => {}
        }
        self.state = InstanceState::Running;
        Ok(())
    }

    /// `execute` followed by a blocking `wait`.
    pub fn execute_and_wait(&mut self, code: &[u8]) -> Result<StopStatus> {
        self.execute(code)?;
        self.wait()
    }

    /// Blocks until the tracee next changes state.
    pub fn wait(&mut self) -> Result<StopStatus> {
        loop {
            if let Some(status) = self.wait_step(WaitPidFlag::empty())? {
                return Ok(status);
            }
        }
    }

    /// Non-blocking variant of `wait`.
    pub fn poll(&mut self) -> Result<Option<StopStatus>> {
        self.wait_step(WaitPidFlag::WNOHANG)
    }

    /// One round of waitpid bookkeeping. Returns `None` when nothing
    /// happened (polling) or when a spurious stop was absorbed.
    fn wait_step(&mut self, flags: WaitPidFlag) -> Result<Option<StopStatus>> {
        let status = match StopStatus::from_wait_status(waitpid(self.pid, Some(flags))?) {
            Some(status) => status,
            None => return Ok(None),
        };

        if self.state == InstanceState::New {
            if status.is_terminal() {
                self.state = InstanceState::Exited;
                self.reaped = true;
                warn!("tracee {} died during bootstrap: {}", self.pid, status);
                return Err(Error::BootstrapFailed);
            }
            if status != StopStatus::Stopped(Signal::SIGTRAP) {
                return Err(self.abort_bootstrap(Error::BootstrapFailed));
            }
            if let Err(err) = self.finish_create() {
                return Err(self.abort_bootstrap(err));
            }
            self.state = InstanceState::Ready;
            return Ok(Some(status));
        }

        // Terminal resizes must not end a step; resume and keep waiting.
        if status == StopStatus::Stopped(Signal::SIGWINCH) {
            debug!("absorbing SIGWINCH stop for {}", self.pid);
            match ptrace::cont(self.pid, None) {
                Err(Errno::ESRCH) | Ok(()) => {}
                Err(err) => return Err(err.into()),
            }
            return Ok(None);
        }

        if status.is_terminal() {
            debug!("tracee {} {}", self.pid, status);
            self.state = InstanceState::Exited;
            self.reaped = true;
        } else {
            self.state = InstanceState::Ready;
        }
        Ok(Some(status))
    }

    /// First-stop handling: configure tracing, cross-check the bootstrap,
    /// and validate the sandbox before declaring the instance ready.
    fn finish_create(&mut self) -> Result<()> {
        ptrace::setoptions(self.pid, ptrace::Options::PTRACE_O_EXITKILL)?;

        // The stub stores its mapping address in the first word right
        // before trapping; anything else means it never got that far or
        // landed in the wrong place.
        if self.scp.first_word() != arch::SCP_ADDR {
            return Err(Error::AddressNotAvailable);
        }
        self.scp.clear();

        self.check_maps()?;
        if self.flags.contains(SandboxFlags::FDS) {
            self.check_fds()?;
        }
        if self.flags.contains(SandboxFlags::SYSCALLS) {
            self.check_seccomp()?;
        }
        Ok(())
    }

    fn abort_bootstrap(&mut self, err: Error) -> Error {
        warn!("tracee {} failed bootstrap validation: {}", self.pid, err);
        let _ = kill(self.pid, Signal::SIGKILL);
        let _ = waitpid(self.pid, None);
        self.reaped = true;
        self.state = InstanceState::Exited;
        err
    }

    /// The tracee's address space must hold nothing but the shared code
    /// page and the kernel's vsyscall page.
    fn check_maps(&self) -> Result<()> {
        let maps = fs::read_to_string(format!("/proc/{}/maps", self.pid))?;
        for line in maps.lines() {
            let mut columns = line.splitn(6, ' ');
            let range = columns.next().ok_or(Error::Os(Errno::EINVAL))?;
            let path = columns.nth(4).map(str::trim_start).unwrap_or("");

            if path.starts_with(MAPS_PREFIX) {
                let mut bounds = range.splitn(2, '-');
                let start = parse_hex(bounds.next().unwrap_or(""))?;
                let end = parse_hex(bounds.next().unwrap_or(""))?;
                if start != arch::SCP_ADDR || end - start != SCP_SIZE {
                    return Err(Error::AddressNotAvailable);
                }
            } else if path != "[vsyscall]" {
                return Err(Error::AddressUnavailable);
            }
        }
        Ok(())
    }

    /// With the fd sandbox, the tracee's descriptor table must be empty.
    fn check_fds(&self) -> Result<()> {
        let mut entries = fs::read_dir(format!("/proc/{}/fd", self.pid))?;
        if entries.next().is_some() {
            return Err(Error::SandboxViolation("open file descriptors remain"));
        }
        Ok(())
    }

    /// With the syscall sandbox, the tracee must be running under a
    /// seccomp filter with no-new-privs set.
    fn check_seccomp(&self) -> Result<()> {
        let status = fs::read_to_string(format!("/proc/{}/status", self.pid))?;
        let mut no_new_privs = false;
        let mut filter_mode = false;
        for line in status.lines() {
            if let Some(value) = line.strip_prefix("NoNewPrivs:") {
                no_new_privs = value.trim() == "1";
            } else if let Some(value) = line.strip_prefix("Seccomp:") {
                filter_mode = value.trim() == "2";
            }
        }
        if !no_new_privs || !filter_mode {
            return Err(Error::SandboxViolation("syscall filter not engaged"));
        }
        Ok(())
    }

    /// Reads one register and decodes its status bits. Succeeds whenever
    /// the tracee is stopped.
    pub fn get_register(
        &self,
        desc: &RegisterDescriptor,
    ) -> Result<(RegisterValue, Vec<String>)> {
        let snap = arch::read_registers(self.pid)?;
        let value = desc.extract(&snap);
        let bits = desc.decode_status(&value);
        Ok((value, bits))
    }

    /// Writes one register. Registers whose logical value is
    /// reconstructed rather than stored (the x87 stack, the rebuilt tag
    /// word) are read-only.
    pub fn set_register(&mut self, desc: &RegisterDescriptor, value: &RegisterValue) -> Result<()> {
        let mut snap = arch::read_registers(self.pid)?;
        desc.store(&mut snap, value)?;
        arch::write_registers(self.pid, &snap)?;
        Ok(())
    }

    /// Reads tracee memory. Fails if the range is unmapped there.
    pub fn read_memory(&self, addr: usize, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let nread = {
            let mut local = [IoSliceMut::new(&mut buf)];
            let remote = [RemoteIoVec { base: addr, len }];
            process_vm_readv(self.pid, &mut local, &remote)?
        };
        buf.truncate(nread);
        Ok(buf)
    }

    /// Scatter/gather read of tracee memory; returns bytes read.
    pub fn readv_memory(
        &self,
        local: &mut [IoSliceMut<'_>],
        remote: &[RemoteIoVec],
    ) -> Result<usize> {
        Ok(process_vm_readv(self.pid, local, remote)?)
    }

    /// Hands the kill-and-reap responsibility to a background reaper.
    /// Returns the pid to reap, or `None` if there is nothing left to do.
    pub(crate) fn into_background(mut self) -> Option<Pid> {
        if self.reaped {
            return None;
        }
        if kill(self.pid, Signal::SIGKILL).is_err() {
            return None;
        }
        self.reaped = true; // reaping is the caller's job now
        Some(self.pid)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if !self.reaped {
            debug!("killing tracee {}", self.pid);
            if kill(self.pid, Signal::SIGKILL).is_ok() {
                // Best effort; if the zombie outlives this, the OS reaps
                // it when the tracer exits.
                let _ = waitpid(self.pid, Some(WaitPidFlag::WNOHANG));
            }
        }
    }
}

fn parse_hex(digits: &str) -> Result<usize> {
    usize::from_str_radix(digits, 16).map_err(|_| Error::Os(Errno::EINVAL))
}
