//! The Signal Multiplexer: one process-wide dispatcher that owns every
//! live instance, drives pending asynchronous operations whenever a
//! child-state-change notification arrives, and reaps tracees that were
//! killed by `destroy_instance`.
//!
//! Instances are keyed by stable integer handles; pending waiters refer
//! to their instance only through its handle, so destroying an instance
//! simply removes it from the table and the next drain rejects the
//! waiter without touching freed state.

use crate::errors::{Error, Result};
use crate::flags::SandboxFlags;
use crate::instance::Instance;
use crate::wait_status::StopStatus;
use log::debug;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{sigprocmask, SigSet, SigmaskHow, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::collections::{HashMap, VecDeque};
use std::os::fd::AsFd;

/// Stable handle for an instance owned by the multiplexer.
pub type InstanceId = u32;

type Completion = Box<dyn FnOnce(Result<StopStatus>)>;

#[derive(Copy, Clone, Debug)]
enum PendingKind {
    Create,
    Execute,
}

struct PendingOp {
    id: InstanceId,
    kind: PendingKind,
    complete: Completion,
}

/// How long one dispatch round waits for SIGCHLD readiness. A short
/// timeout keeps the queue moving even if the notification was consumed
/// by a thread that has SIGCHLD unblocked.
const DISPATCH_TICK_MS: u16 = 50;

pub struct Multiplexer {
    sigchld: SignalFd,
    instances: HashMap<InstanceId, Instance>,
    pending: VecDeque<PendingOp>,
    defunct: Vec<Pid>,
    next_id: InstanceId,
}

impl Multiplexer {
    /// Installs the child-state-change listener. SIGCHLD is blocked in
    /// the calling thread from here on and delivered through a signalfd
    /// instead; intended to be done once, at initialization.
    pub fn new() -> Result<Multiplexer> {
        let mut mask = SigSet::empty();
        mask.add(Signal::SIGCHLD);
        sigprocmask(SigmaskHow::SIG_BLOCK, Some(&mask), None)?;
        let sigchld = SignalFd::with_flags(&mask, SfdFlags::SFD_NONBLOCK | SfdFlags::SFD_CLOEXEC)?;
        Ok(Multiplexer {
            sigchld,
            instances: HashMap::new(),
            pending: VecDeque::new(),
            defunct: Vec::new(),
            next_id: 0,
        })
    }

    /// Creates an instance and registers it. As with `Instance::create`,
    /// the tracee is not ready until its first stop has been observed.
    pub fn create_instance(&mut self, flags: SandboxFlags) -> Result<InstanceId> {
        let instance = Instance::create(flags)?;
        let id = self.next_id;
        self.next_id += 1;
        self.instances.insert(id, instance);
        Ok(id)
    }

    /// Asynchronous creation: `complete` fires with the bootstrap trap
    /// status once the instance is ready, or with the error that killed
    /// it.
    pub fn create_instance_async(
        &mut self,
        flags: SandboxFlags,
        complete: impl FnOnce(Result<StopStatus>) + 'static,
    ) -> Result<InstanceId> {
        let id = self.create_instance(flags)?;
        self.pending.push_back(PendingOp {
            id,
            kind: PendingKind::Create,
            complete: Box::new(complete),
        });
        self.drain();
        Ok(id)
    }

    /// Synchronous-error part of execution; completion is observed via
    /// `wait`/`poll`.
    pub fn execute(&mut self, id: InstanceId, code: &[u8]) -> Result<()> {
        self.instance_mut(id)?.execute(code)
    }

    /// Asynchronous execution: `complete` fires with the stop-status of
    /// this step. Waiters resolve in the order their tracees' trap
    /// notifications arrive, not submission order.
    pub fn execute_async(
        &mut self,
        id: InstanceId,
        code: &[u8],
        complete: impl FnOnce(Result<StopStatus>) + 'static,
    ) -> Result<()> {
        self.instance_mut(id)?.execute(code)?;
        self.pending.push_back(PendingOp {
            id,
            kind: PendingKind::Execute,
            complete: Box::new(complete),
        });
        self.drain();
        Ok(())
    }

    pub fn wait(&mut self, id: InstanceId) -> Result<StopStatus> {
        self.instance_mut(id)?.wait()
    }

    pub fn poll(&mut self, id: InstanceId) -> Result<Option<StopStatus>> {
        self.instance_mut(id)?.poll()
    }

    /// Kills the tracee and forgets the instance. Never blocks: the dead
    /// tracee is reaped by later dispatch rounds, and any pending waiter
    /// on this instance is rejected with `InstanceDestroyed` on the next
    /// drain.
    pub fn destroy_instance(&mut self, id: InstanceId) {
        if let Some(instance) = self.instances.remove(&id) {
            debug!("destroying instance {}", id);
            if let Some(pid) = instance.into_background() {
                self.defunct.push(pid);
            }
            self.reap_defunct();
        }
    }

    pub fn instance(&self, id: InstanceId) -> Result<&Instance> {
        self.instances.get(&id).ok_or(Error::InstanceDestroyed)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Result<&mut Instance> {
        self.instances.get_mut(&id).ok_or(Error::InstanceDestroyed)
    }

    /// One dispatch round: drain the signalfd, poll every pending
    /// operation, reap the background-destroy list.
    pub fn dispatch(&mut self) {
        while let Ok(Some(_)) = self.sigchld.read_signal() {}
        self.drain();
        self.reap_defunct();
    }

    /// Blocks until every pending operation has completed.
    pub fn run(&mut self) -> Result<()> {
        while !self.pending.is_empty() {
            {
                let mut fds = [PollFd::new(self.sigchld.as_fd(), PollFlags::POLLIN)];
                match poll(&mut fds, PollTimeout::from(DISPATCH_TICK_MS)) {
                    Ok(_) | Err(Errno::EINTR) => {}
                    Err(err) => return Err(err.into()),
                }
            }
            self.dispatch();
        }
        Ok(())
    }

    fn drain(&mut self) {
        let mut unresolved = VecDeque::with_capacity(self.pending.len());
        while let Some(op) = self.pending.pop_front() {
            match self.instances.get_mut(&op.id) {
                None => {
                    debug!("rejecting {:?} waiter for destroyed instance {}", op.kind, op.id);
                    (op.complete)(Err(Error::InstanceDestroyed));
                }
                Some(instance) => match instance.poll() {
                    Ok(Some(status)) => {
                        debug!("instance {} {:?} completed: {}", op.id, op.kind, status);
                        (op.complete)(Ok(status));
                    }
                    Ok(None) => unresolved.push_back(op),
                    Err(err) => (op.complete)(Err(err)),
                },
            }
        }
        self.pending = unresolved;
    }

    /// Non-blocking reap of tracees killed by `destroy_instance`.
    /// Failure is tolerated: the OS cleans up when the tracer exits.
    fn reap_defunct(&mut self) {
        self.defunct
            .retain(|pid| match waitpid(*pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => true,
                Ok(_) | Err(_) => false,
            });
    }
}
