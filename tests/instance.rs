//! End-to-end tests against live tracees: every step here assembles to a
//! handful of machine-code bytes, runs them on the real CPU inside the
//! sandboxed child, and checks the reported machine state.

#![cfg(all(target_os = "linux", target_arch = "x86_64"))]

use asmlab::{
    lookup_register, Error, Instance, InstanceState, RegisterValue, RemoteIoVec, SandboxFlags,
    StopStatus, CODE_MAX_SIZE, SCP_ADDR, SCP_SIZE, TRAP_INSTRUCTION,
};
use nix::sys::signal::Signal;
use std::io::IoSliceMut;

fn ready_instance(flags: SandboxFlags) -> Instance {
    let mut instance = Instance::create(flags).expect("create");
    let status = instance.wait().expect("bootstrap");
    assert_eq!(status, StopStatus::Stopped(Signal::SIGTRAP));
    assert_eq!(instance.state(), InstanceState::Ready);
    instance
}

fn get_u64(instance: &Instance, name: &str) -> u64 {
    let desc = lookup_register(name).expect(name);
    match instance.get_register(desc).expect(name).0 {
        RegisterValue::U64(v) => v,
        other => panic!("{} is {:?}", name, other),
    }
}

#[test]
fn nop_step_advances_the_program_counter() {
    let mut instance = ready_instance(SandboxFlags::empty());
    let status = instance.execute_and_wait(&[0x90]).unwrap(); // nop
    assert_eq!(status, StopStatus::Stopped(Signal::SIGTRAP));
    let expected = (SCP_ADDR + 1 + TRAP_INSTRUCTION.len()) as u64;
    assert_eq!(get_u64(&instance, "rip"), expected);
}

#[test]
fn immediate_lands_in_the_register() {
    let mut instance = ready_instance(SandboxFlags::empty());
    // mov eax, 5
    let status = instance.execute_and_wait(&[0xb8, 0x05, 0x00, 0x00, 0x00]).unwrap();
    assert_eq!(status, StopStatus::Stopped(Signal::SIGTRAP));
    assert_eq!(get_u64(&instance, "rax"), 5);

    let desc = lookup_register("rax").unwrap();
    let (value, bits) = instance.get_register(desc).unwrap();
    assert_eq!(value.to_string(), "0x0000000000000005");
    assert!(bits.is_empty());
}

#[test]
fn carry_and_zero_flags_decode() {
    let mut instance = ready_instance(SandboxFlags::empty());
    // mov eax, -1; add eax, 1
    let code = [0xb8, 0xff, 0xff, 0xff, 0xff, 0x83, 0xc0, 0x01];
    let status = instance.execute_and_wait(&code).unwrap();
    assert_eq!(status, StopStatus::Stopped(Signal::SIGTRAP));
    assert_eq!(get_u64(&instance, "rax"), 0);

    let eflags = lookup_register("eflags").unwrap();
    let (_, bits) = instance.get_register(eflags).unwrap();
    assert!(bits.iter().any(|b| b == "CF"), "flags: {:?}", bits);
    assert!(bits.iter().any(|b| b == "ZF"), "flags: {:?}", bits);
}

#[test]
fn segfault_is_reported_not_fatal() {
    let mut instance = ready_instance(SandboxFlags::empty());
    // xor rax, rax; mov rax, [rax]
    let code = [0x48, 0x31, 0xc0, 0x48, 0x8b, 0x00];
    let status = instance.execute_and_wait(&code).unwrap();
    assert_eq!(status, StopStatus::Stopped(Signal::SIGSEGV));
    assert_eq!(instance.state(), InstanceState::Ready);

    // The tracee is still there and its memory is still readable.
    let bytes = instance.read_memory(SCP_ADDR, 16).unwrap();
    assert_eq!(bytes.len(), 16);
    assert_eq!(&bytes[..3], &code[..3]);
}

#[test]
fn memory_store_round_trips() {
    let mut instance = ready_instance(SandboxFlags::empty());
    let target = SCP_ADDR + 0x800;
    // mov rax, target; mov dword [rax], 0x12345678
    let mut code = vec![0x48, 0xb8];
    code.extend_from_slice(&(target as u64).to_le_bytes());
    code.extend_from_slice(&[0xc7, 0x00, 0x78, 0x56, 0x34, 0x12]);
    let status = instance.execute_and_wait(&code).unwrap();
    assert_eq!(status, StopStatus::Stopped(Signal::SIGTRAP));

    let bytes = instance.read_memory(target, 4).unwrap();
    assert_eq!(bytes, [0x78, 0x56, 0x34, 0x12]);
}

#[test]
fn scatter_gather_read() {
    let mut instance = ready_instance(SandboxFlags::empty());
    let target = SCP_ADDR + 0x400;
    // mov rax, target; mov dword [rax], 0xaabbccdd
    let mut code = vec![0x48, 0xb8];
    code.extend_from_slice(&(target as u64).to_le_bytes());
    code.extend_from_slice(&[0xc7, 0x00, 0xdd, 0xcc, 0xbb, 0xaa]);
    instance.execute_and_wait(&code).unwrap();

    let mut first = [0u8; 2];
    let mut second = [0u8; 2];
    let nread = {
        let mut local = [IoSliceMut::new(&mut first), IoSliceMut::new(&mut second)];
        let remote = [RemoteIoVec {
            base: target,
            len: 4,
        }];
        instance.readv_memory(&mut local, &remote).unwrap()
    };
    assert_eq!(nread, 4);
    assert_eq!(first, [0xdd, 0xcc]);
    assert_eq!(second, [0xbb, 0xaa]);
}

#[test]
fn set_register_round_trips() {
    let mut instance = ready_instance(SandboxFlags::empty());
    let rbx = lookup_register("rbx").unwrap();
    assert!(rbx.is_writable());
    instance
        .set_register(rbx, &RegisterValue::U64(0x1122_3344_5566_7788))
        .unwrap();
    let (value, _) = instance.get_register(rbx).unwrap();
    assert_eq!(value, RegisterValue::U64(0x1122_3344_5566_7788));

    let xmm5 = lookup_register("xmm5").unwrap();
    instance
        .set_register(xmm5, &RegisterValue::U128(0xdead_beef_0000_0001))
        .unwrap();
    let (value, _) = instance.get_register(xmm5).unwrap();
    assert_eq!(value, RegisterValue::U128(0xdead_beef_0000_0001));
}

#[test]
fn reconstructed_registers_are_read_only() {
    let mut instance = ready_instance(SandboxFlags::empty());
    let r0 = lookup_register("R0").unwrap();
    assert!(!r0.is_writable());
    let err = instance
        .set_register(r0, &RegisterValue::Float80([0u8; 10]))
        .unwrap_err();
    assert!(matches!(err, Error::Os(nix::errno::Errno::EINVAL)));
}

#[test]
fn x87_stack_becomes_observable() {
    let mut instance = ready_instance(SandboxFlags::empty());
    // fld1: push 1.0 onto the x87 stack
    let status = instance.execute_and_wait(&[0xd9, 0xe8]).unwrap();
    assert_eq!(status, StopStatus::Stopped(Signal::SIGTRAP));

    // TOP moved to 7, so st(0) lives in physical R7 and tags valid.
    let ftw = lookup_register("ftw").unwrap();
    let (value, bits) = instance.get_register(ftw).unwrap();
    match value {
        RegisterValue::U16(word) => assert_eq!(word >> 14, 0, "tag word 0x{:04x}", word),
        other => panic!("ftw is {:?}", other),
    }
    assert!(bits.iter().any(|b| b == "TAG(7)=Valid"), "bits: {:?}", bits);

    let r7 = lookup_register("R7").unwrap();
    match instance.get_register(r7).unwrap().0 {
        RegisterValue::Float80(raw) => {
            assert_eq!(format!("{}", RegisterValue::Float80(raw))[..3].to_string(), "1.0");
        }
        other => panic!("R7 is {:?}", other),
    }
}

#[test]
fn code_size_boundary() {
    let mut instance = ready_instance(SandboxFlags::empty());

    // Exactly at the limit: CODE_MAX_SIZE - trap length executes.
    let sled = vec![0x90u8; CODE_MAX_SIZE - TRAP_INSTRUCTION.len()];
    let status = instance.execute_and_wait(&sled).unwrap();
    assert_eq!(status, StopStatus::Stopped(Signal::SIGTRAP));

    // One byte longer is rejected with no state change.
    let too_big = vec![0x90u8; CODE_MAX_SIZE];
    let err = instance.execute(&too_big).unwrap_err();
    assert!(matches!(err, Error::CodeTooLarge));
    assert_eq!(instance.state(), InstanceState::Ready);

    // The instance still works.
    let status = instance.execute_and_wait(&[0x90]).unwrap();
    assert_eq!(status, StopStatus::Stopped(Signal::SIGTRAP));
}

#[test]
fn invalid_flags_are_rejected() {
    assert!(matches!(
        SandboxFlags::from_raw(SandboxFlags::ALL.bits() | (1 << 2)),
        Err(Error::InvalidFlags)
    ));
}

#[test]
fn execute_requires_ready() {
    // Still `New`: nothing has been waited on yet.
    let mut instance = Instance::create(SandboxFlags::empty()).unwrap();
    assert!(matches!(instance.execute(&[0x90]), Err(Error::NotReady)));
    instance.wait().unwrap();
    instance.execute(&[0x90]).unwrap();
    instance.wait().unwrap();
}

#[test]
fn exited_instance_rejects_execute() {
    let mut instance = ready_instance(SandboxFlags::empty());
    // mov eax, 60; xor edi, edi; syscall -- exit(0)
    let code = [0xb8, 0x3c, 0x00, 0x00, 0x00, 0x31, 0xff, 0x0f, 0x05];
    let status = instance.execute_and_wait(&code).unwrap();
    assert_eq!(status, StopStatus::Exited(0));
    assert_eq!(instance.state(), InstanceState::Exited);
    assert!(matches!(instance.execute(&[0x90]), Err(Error::NotReady)));
}

#[test]
fn syscall_sandbox_traps_syscalls() {
    let mut instance = ready_instance(SandboxFlags::SYSCALLS);
    // syscall
    let status = instance.execute_and_wait(&[0x0f, 0x05]).unwrap();
    assert_eq!(status, StopStatus::Stopped(Signal::SIGSYS));
    assert_eq!(instance.state(), InstanceState::Ready);

    // The tracee survived; it can keep stepping.
    let status = instance.execute_and_wait(&[0x90]).unwrap();
    assert_eq!(status, StopStatus::Stopped(Signal::SIGTRAP));
}

#[test]
fn fd_sandbox_leaves_no_descriptors() {
    let instance = ready_instance(SandboxFlags::FDS);
    let entries: Vec<_> = std::fs::read_dir(format!("/proc/{}/fd", instance.pid()))
        .unwrap()
        .collect();
    assert!(entries.is_empty(), "leftover fds: {:?}", entries);
}

#[test]
fn full_sandbox_bootstraps() {
    let mut instance = ready_instance(SandboxFlags::ALL);
    let status = instance.execute_and_wait(&[0x90]).unwrap();
    assert_eq!(status, StopStatus::Stopped(Signal::SIGTRAP));
}

#[test]
fn memory_range_is_the_fixed_mapping() {
    let instance = ready_instance(SandboxFlags::empty());
    assert_eq!(instance.memory_range(), (SCP_ADDR, SCP_SIZE));

    let maps = std::fs::read_to_string(format!("/proc/{}/maps", instance.pid())).unwrap();
    let line = maps
        .lines()
        .find(|l| l.contains("/memfd:asmlab"))
        .expect("memfd mapping");
    assert!(line.starts_with(&format!("{:x}-{:x}", SCP_ADDR, SCP_ADDR + SCP_SIZE)));
}

#[test]
fn stack_pointer_starts_at_the_top() {
    let mut instance = ready_instance(SandboxFlags::empty());
    // push rax; the stack lives in the upper pages of the shared mapping
    let status = instance.execute_and_wait(&[0x50]).unwrap();
    assert_eq!(status, StopStatus::Stopped(Signal::SIGTRAP));
    let rsp = get_u64(&instance, "rsp") as usize;
    assert_eq!(rsp, SCP_ADDR + SCP_SIZE - 8);
}

#[test]
fn empty_code_runs_just_the_trap() {
    let mut instance = ready_instance(SandboxFlags::empty());
    let status = instance.execute_and_wait(&[]).unwrap();
    assert_eq!(status, StopStatus::Stopped(Signal::SIGTRAP));
    assert_eq!(get_u64(&instance, "rip"), (SCP_ADDR + 1) as u64);
}
