//! x86-64 support: the fixed code-page address, the trap opcode, the
//! position-independent bootstrap stub, regset plumbing, and the register
//! descriptor table.

use super::{RegisterClass, RegisterDescriptor, RegisterType, RegisterValue, StatusBits};
use crate::shared_mem::SCP_SIZE;
use core::arch::global_asm;
use nix::errno::Errno;
use nix::unistd::Pid;
use static_assertions::const_assert;
use std::mem;

/// Where the tracee maps the shared code page. This has to be a slot that
/// is free in a freshly forked process: it sits in the hole between the
/// heap and the library mapping area on every supported kernel layout.
pub const SCP_ADDR: usize = 0x7fff_0000_0000;

/// `int3`. Raises SIGTRAP when executed.
pub const TRAP_INSTRUCTION: [u8; 1] = [0xcc];

// The offset-preserving jump in the bootstrap stub relies on both of these.
const_assert!(SCP_ADDR % SCP_SIZE == 0);
const_assert!(SCP_SIZE.is_power_of_two());

// From <elf.h>.
const NT_PRSTATUS: libc::c_long = 1;
const NT_PRFPREG: libc::c_long = 2;

// Final bootstrap stage. This runs first from a staging mapping of the
// memfd (aligned to the page-group size, so it is either identical to the
// final mapping or disjoint from it), then re-enters itself inside the
// fixed mapping and tears the rest of the address space down:
//
//   1. map the memfd at the fixed address,
//   2. jump to the fixed mapping, keeping the offset within the group,
//   3. move the stack to the top of the group and close the memfd,
//   4. unmap everything below and above the group,
//   5. optionally set no-new-privs and load the trap-all-but-munmap
//      seccomp filter embedded below,
//   6. zero the register file, store the mapping address in the first
//      word of the page, and trap.
//
// Called as fn(memfd: edi, enable_seccomp: esi) -> !. Any syscall failure
// ends in exit_group(1); the tracer then observes a bootstrap failure.
global_asm!(
    r#"
    .text
    .balign 16
    .globl asmlab_bootstrap_begin
    .globl asmlab_bootstrap_end
asmlab_bootstrap_begin:
    mov r12d, edi
    mov r13d, esi

    mov eax, 9                  // mmap
    mov rdi, {scp_addr}
    mov rsi, {scp_size}
    mov edx, 7                  // PROT_READ|PROT_WRITE|PROT_EXEC
    mov r10d, 0x11              // MAP_SHARED|MAP_FIXED
    mov r8d, r12d
    xor r9d, r9d
    syscall
    cmp rax, rdi
    jne .Lasmlab_fail

    lea rax, [rip + .Lasmlab_fixed]
    and rax, {off_mask}
    mov rbx, {scp_addr}
    add rbx, rax
    jmp rbx
.Lasmlab_fixed:
    mov rsp, {scp_top}

    mov eax, 3                  // close
    mov edi, r12d
    syscall

    mov eax, 11                 // munmap everything below the group
    xor edi, edi
    mov rsi, {scp_addr}
    syscall
    test rax, rax
    jnz .Lasmlab_fail

    mov eax, 11                 // munmap everything above it, up to the task limit
    mov rdi, {scp_top}
    mov rsi, {above_len}
    syscall
    test rax, rax
    jnz .Lasmlab_fail

    test r13d, r13d
    jz .Lasmlab_sandboxed
    mov eax, 157                // prctl(PR_SET_NO_NEW_PRIVS, 1)
    mov edi, 38
    mov esi, 1
    xor edx, edx
    xor r10d, r10d
    xor r8d, r8d
    syscall
    test rax, rax
    jnz .Lasmlab_fail
    lea rax, [rip + .Lasmlab_filter]
    lea rdx, [rip + .Lasmlab_fprog]
    mov [rdx + 8], rax
    mov eax, 157                // prctl(PR_SET_SECCOMP, SECCOMP_MODE_FILTER, &prog)
    mov edi, 22
    mov esi, 2
    syscall
    test rax, rax
    jnz .Lasmlab_fail
.Lasmlab_sandboxed:
    xor ebx, ebx
    xor ecx, ecx
    xor edx, edx
    xor esi, esi
    xor edi, edi
    xor ebp, ebp
    xor r8d, r8d
    xor r9d, r9d
    xor r10d, r10d
    xor r11d, r11d
    xor r12d, r12d
    xor r13d, r13d
    xor r14d, r14d
    xor r15d, r15d

    mov rax, {scp_addr}         // tell the tracer where we are and stop
    mov [rax], rax
    int3
.Lasmlab_fail:
    mov eax, 231                // exit_group(1)
    mov edi, 1
    syscall

    // Classic BPF: allow munmap, trap everything else.
    .balign 8
.Lasmlab_filter:
    .short 0x20                 // BPF_LD|BPF_W|BPF_ABS
    .byte 0, 0
    .int 0                      // offsetof(seccomp_data, nr)
    .short 0x15                 // BPF_JMP|BPF_JEQ|BPF_K
    .byte 0, 1
    .int 11                     // __NR_munmap
    .short 0x06                 // BPF_RET|BPF_K
    .byte 0, 0
    .int 0x7fff0000             // SECCOMP_RET_ALLOW
    .short 0x06                 // BPF_RET|BPF_K
    .byte 0, 0
    .int 0x00030000             // SECCOMP_RET_TRAP
.Lasmlab_fprog:
    .short 4                    // sock_fprog.len
    .short 0
    .int 0
    .quad 0                     // filter pointer, patched at run time
asmlab_bootstrap_end:
"#,
    scp_addr = const SCP_ADDR,
    scp_size = const SCP_SIZE,
    scp_top = const SCP_ADDR + SCP_SIZE,
    off_mask = const SCP_SIZE - 1,
    // The unmap must stop at the 47-bit task limit or the kernel rejects it.
    above_len = const 0x7fff_ffff_f000usize - (SCP_ADDR + SCP_SIZE),
);

extern "C" {
    static asmlab_bootstrap_begin: u8;
    static asmlab_bootstrap_end: u8;
}

/// The bootstrap stub as bytes, for copying into the staging mapping.
pub(crate) fn bootstrap_stub() -> &'static [u8] {
    unsafe {
        let begin = &asmlab_bootstrap_begin as *const u8;
        let end = &asmlab_bootstrap_end as *const u8;
        std::slice::from_raw_parts(begin, end as usize - begin as usize)
    }
}

/// One snapshot of the tracee's register file: the two regsets we read,
/// laid out back to back. Descriptor offsets index into this.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct RegisterSnapshot {
    pub(crate) regs: libc::user_regs_struct,
    pub(crate) fpregs: libc::user_fpregs_struct,
}

impl RegisterSnapshot {
    pub(crate) fn zeroed() -> RegisterSnapshot {
        unsafe { mem::zeroed() }
    }

    pub fn program_counter(&self) -> u64 {
        self.regs.rip
    }
}

fn regset_io<T>(
    request: libc::c_uint,
    pid: Pid,
    kind: libc::c_long,
    buf: *mut T,
) -> Result<(), Errno> {
    let mut iov = libc::iovec {
        iov_base: buf as *mut libc::c_void,
        iov_len: mem::size_of::<T>(),
    };
    let res = unsafe { libc::ptrace(request, pid.as_raw(), kind, &mut iov as *mut libc::iovec) };
    Errno::result(res).map(drop)
}

/// Reads both regsets in one go.
pub(crate) fn read_registers(pid: Pid) -> Result<RegisterSnapshot, Errno> {
    let mut snap = RegisterSnapshot::zeroed();
    regset_io(libc::PTRACE_GETREGSET, pid, NT_PRSTATUS, &mut snap.regs)?;
    regset_io(libc::PTRACE_GETREGSET, pid, NT_PRFPREG, &mut snap.fpregs)?;
    Ok(snap)
}

pub(crate) fn write_registers(pid: Pid, snap: &RegisterSnapshot) -> Result<(), Errno> {
    let mut copy = *snap;
    regset_io(libc::PTRACE_SETREGSET, pid, NT_PRSTATUS, &mut copy.regs)?;
    regset_io(libc::PTRACE_SETREGSET, pid, NT_PRFPREG, &mut copy.fpregs)?;
    Ok(())
}

/// Points the tracee back at the start of the shared code page. The rip
/// slot in the user area coincides with its offset in user_regs_struct.
pub(crate) fn reset_program_counter(pid: Pid) -> Result<(), Errno> {
    let offset = offset_of!(libc::user_regs_struct, rip);
    let res = unsafe {
        libc::ptrace(
            libc::PTRACE_POKEUSER,
            pid.as_raw(),
            offset,
            SCP_ADDR as libc::c_long,
        )
    };
    Errno::result(res).map(drop)
}

const fn flag(name: &'static str, shift: u8) -> StatusBits {
    StatusBits {
        name,
        values: None,
        shift,
        mask: 0x1,
    }
}

const fn field(name: &'static str, shift: u8, mask: u8) -> StatusBits {
    StatusBits {
        name,
        values: None,
        shift,
        mask,
    }
}

const fn symbolic(
    name: &'static str,
    shift: u8,
    mask: u8,
    values: &'static [&'static str],
) -> StatusBits {
    StatusBits {
        name,
        values: Some(values),
        shift,
        mask,
    }
}

static EFLAGS_BITS: [StatusBits; 17] = [
    flag("CF", 0),
    flag("PF", 2),
    flag("AF", 4),
    flag("ZF", 6),
    flag("SF", 7),
    flag("TF", 8),
    flag("IF", 9),
    flag("DF", 10),
    flag("OF", 11),
    field("IOPL", 12, 0x3),
    flag("NT", 14),
    flag("RF", 16),
    flag("VM", 17),
    flag("AC", 18),
    flag("VIF", 19),
    flag("VIP", 20),
    flag("ID", 21),
];

static FCW_BITS: [StatusBits; 8] = [
    // Exception enables
    flag("EM=IM", 0),
    flag("EM=DM", 1),
    flag("EM=ZM", 2),
    flag("EM=OM", 3),
    flag("EM=UM", 4),
    flag("EM=PM", 5),
    // Rounding precision: single, (reserved), double, or extended
    symbolic("PC", 8, 0x3, &["SGL", "", "DBL", "EXT"]),
    // Rounding mode: to nearest, toward -inf, toward +inf, toward zero
    symbolic("RC", 10, 0x3, &["RN", "R-", "R+", "RZ"]),
];

static FSW_BITS: [StatusBits; 14] = [
    // Exceptions
    flag("EF=IE", 0),
    flag("EF=DE", 1),
    flag("EF=ZE", 2),
    flag("EF=OE", 3),
    flag("EF=UE", 4),
    flag("EF=PE", 5),
    flag("SF", 6),
    flag("ES", 7),
    // Condition bits
    flag("C0", 8),
    flag("C1", 9),
    flag("C2", 10),
    flag("C3", 14),
    // Top of the floating point stack
    field("TOP", 11, 0x7),
    flag("B", 15),
];

static TAG_VALUES: [&str; 4] = ["Valid", "Zero", "Special", "Empty"];

static FTW_BITS: [StatusBits; 8] = [
    symbolic("TAG(0)", 0, 0x3, &TAG_VALUES),
    symbolic("TAG(1)", 2, 0x3, &TAG_VALUES),
    symbolic("TAG(2)", 4, 0x3, &TAG_VALUES),
    symbolic("TAG(3)", 6, 0x3, &TAG_VALUES),
    symbolic("TAG(4)", 8, 0x3, &TAG_VALUES),
    symbolic("TAG(5)", 10, 0x3, &TAG_VALUES),
    symbolic("TAG(6)", 12, 0x3, &TAG_VALUES),
    symbolic("TAG(7)", 14, 0x3, &TAG_VALUES),
];

static MXCSR_BITS: [StatusBits; 15] = [
    // Exceptions
    flag("EF=IE", 0),
    flag("EF=DE", 1),
    flag("EF=ZE", 2),
    flag("EF=OE", 3),
    flag("EF=UE", 4),
    flag("EF=PE", 5),
    flag("DAZ", 6),
    // Exception enables
    flag("EM=IM", 7),
    flag("EM=DM", 8),
    flag("EM=ZM", 9),
    flag("EM=OM", 10),
    flag("EM=UM", 11),
    flag("EM=PM", 12),
    symbolic("RC", 13, 0x3, &["RN", "R-", "R+", "RZ"]),
    flag("FZ", 15),
];

/// Top physical register in the x87 register stack.
fn x87_stack_top(fsw: u16) -> u16 {
    (fsw & 0x3800) >> 11
}

/// Converts a physical x87 register number (Ri) to a logical (%st(i))
/// register number.
fn x87_phys_to_log(index: u16, top: u16) -> u16 {
    (index + 8 - top) % 8
}

/// The raw 80-bit image of one 16-byte stack slot.
fn x87_st_bytes(fpregs: &libc::user_fpregs_struct, slot: usize) -> [u8; 10] {
    let mut raw = [0u8; 10];
    unsafe {
        let base = fpregs.st_space.as_ptr().add(4 * slot) as *const u8;
        std::ptr::copy_nonoverlapping(base, raw.as_mut_ptr(), raw.len());
    }
    raw
}

/// The physical register file stores the eight floats in fixed slots, but
/// the architecturally visible stack rotates with the TOP field of the
/// status word.
fn x87_copy_register(desc: &RegisterDescriptor, snap: &RegisterSnapshot) -> RegisterValue {
    let top = x87_stack_top(snap.fpregs.swd);
    let logical = x87_phys_to_log(desc.offset as u16, top);
    RegisterValue::Float80(x87_st_bytes(&snap.fpregs, logical as usize))
}

/// Tag of one stack entry, per "Recreating FSAVE format" in the Intel
/// instruction set reference: 0 = valid, 1 = zero, 2 = special.
fn x87_tag(st: &[u8; 10]) -> u16 {
    let mut low = [0u8; 8];
    low.copy_from_slice(&st[..8]);
    let low = u64::from_le_bytes(low);
    let exponent = u16::from_le_bytes([st[8], st[9]]) & 0x7fff;
    let fraction = low & !(1 << 63);
    let integer = low >> 63;
    if exponent == 0x7fff {
        2
    } else if exponent == 0 {
        if fraction == 0 && integer == 0 {
            1
        } else {
            2
        }
    } else if integer != 0 {
        0
    } else {
        2
    }
}

/// ptrace exposes only the abridged one-bit-per-register tag word. The
/// full two-bit-per-register form is rebuilt from the stack contents;
/// entries the abridged word marks invalid are tagged empty.
fn ftw_copy_register(_desc: &RegisterDescriptor, snap: &RegisterSnapshot) -> RegisterValue {
    let top = x87_stack_top(snap.fpregs.swd);
    let abridged = snap.fpregs.ftw;
    let mut ftw: u16 = 0;
    for physical in 0..8u16 {
        let tag = if abridged & (1 << physical) != 0 {
            let logical = x87_phys_to_log(physical, top);
            x87_tag(&x87_st_bytes(&snap.fpregs, logical as usize))
        } else {
            0x3
        };
        ftw |= tag << (2 * physical);
    }
    RegisterValue::U16(ftw)
}

macro_rules! user_reg {
    ($field:ident, $class:ident, $ty:ident) => {
        user_reg!($field, $class, $ty, &[])
    };
    ($field:ident, $class:ident, $ty:ident, $bits:expr) => {
        RegisterDescriptor {
            name: stringify!($field),
            class: RegisterClass::$class,
            ty: RegisterType::$ty,
            status_bits: $bits,
            offset: offset_of!(RegisterSnapshot, regs)
                + offset_of!(libc::user_regs_struct, $field),
            copy_fn: None,
        }
    };
}

macro_rules! fp_reg {
    ($name:expr, $field:ident, $class:ident, $ty:ident) => {
        fp_reg!($name, $field, $class, $ty, &[])
    };
    ($name:expr, $field:ident, $class:ident, $ty:ident, $bits:expr) => {
        RegisterDescriptor {
            name: $name,
            class: RegisterClass::$class,
            ty: RegisterType::$ty,
            status_bits: $bits,
            offset: offset_of!(RegisterSnapshot, fpregs)
                + offset_of!(libc::user_fpregs_struct, $field),
            copy_fn: None,
        }
    };
}

static X87_NAMES: [&str; 8] = ["R0", "R1", "R2", "R3", "R4", "R5", "R6", "R7"];
static MM_NAMES: [&str; 8] = ["mm0", "mm1", "mm2", "mm3", "mm4", "mm5", "mm6", "mm7"];
static XMM_NAMES: [&str; 16] = [
    "xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7", "xmm8", "xmm9", "xmm10",
    "xmm11", "xmm12", "xmm13", "xmm14", "xmm15",
];

fn build_registers() -> Vec<RegisterDescriptor> {
    let fpregs_base = offset_of!(RegisterSnapshot, fpregs);
    let st_space = fpregs_base + offset_of!(libc::user_fpregs_struct, st_space);
    let xmm_space = fpregs_base + offset_of!(libc::user_fpregs_struct, xmm_space);

    let mut table = Vec::with_capacity(65);

    table.push(user_reg!(rip, ProgramCounter, U64));

    table.push(user_reg!(cs, Segment, U16));
    table.push(user_reg!(ss, Segment, U16));
    table.push(user_reg!(ds, Segment, U16));
    table.push(user_reg!(es, Segment, U16));
    table.push(user_reg!(fs, Segment, U16));
    table.push(user_reg!(gs, Segment, U16));
    table.push(user_reg!(fs_base, Segment, U64));
    table.push(user_reg!(gs_base, Segment, U64));

    table.push(user_reg!(rax, GeneralPurpose, U64));
    table.push(user_reg!(rcx, GeneralPurpose, U64));
    table.push(user_reg!(rdx, GeneralPurpose, U64));
    table.push(user_reg!(rbx, GeneralPurpose, U64));
    table.push(user_reg!(rsp, GeneralPurpose, U64));
    table.push(user_reg!(rbp, GeneralPurpose, U64));
    table.push(user_reg!(rsi, GeneralPurpose, U64));
    table.push(user_reg!(rdi, GeneralPurpose, U64));
    table.push(user_reg!(r8, GeneralPurpose, U64));
    table.push(user_reg!(r9, GeneralPurpose, U64));
    table.push(user_reg!(r10, GeneralPurpose, U64));
    table.push(user_reg!(r11, GeneralPurpose, U64));
    table.push(user_reg!(r12, GeneralPurpose, U64));
    table.push(user_reg!(r13, GeneralPurpose, U64));
    table.push(user_reg!(r14, GeneralPurpose, U64));
    table.push(user_reg!(r15, GeneralPurpose, U64));

    table.push(user_reg!(eflags, Status, U64, &EFLAGS_BITS));

    // Physical stack slots, highest first, matching the hardware manuals.
    for physical in (0..8usize).rev() {
        table.push(RegisterDescriptor {
            name: X87_NAMES[physical],
            class: RegisterClass::FloatingPoint,
            ty: RegisterType::Float80,
            status_bits: &[],
            offset: physical,
            copy_fn: Some(x87_copy_register),
        });
    }

    table.push(fp_reg!("fcw", cwd, FloatingPointStatus, U16, &FCW_BITS));
    table.push(fp_reg!("fsw", swd, FloatingPointStatus, U16, &FSW_BITS));
    table.push(RegisterDescriptor {
        name: "ftw",
        class: RegisterClass::FloatingPointStatus,
        ty: RegisterType::U16,
        status_bits: &FTW_BITS,
        offset: fpregs_base + offset_of!(libc::user_fpregs_struct, ftw),
        copy_fn: Some(ftw_copy_register),
    });
    table.push(fp_reg!("fip", rip, FloatingPointStatus, U64));
    table.push(fp_reg!("fdp", rdp, FloatingPointStatus, U64));
    table.push(fp_reg!("fop", fop, FloatingPointStatus, U16));

    // The MMX registers alias the low halves of the x87 slots.
    for (i, &name) in MM_NAMES.iter().enumerate() {
        table.push(RegisterDescriptor {
            name,
            class: RegisterClass::Vector,
            ty: RegisterType::U64,
            status_bits: &[],
            offset: st_space + 16 * i,
            copy_fn: None,
        });
    }
    for (i, &name) in XMM_NAMES.iter().enumerate() {
        table.push(RegisterDescriptor {
            name,
            class: RegisterClass::Vector,
            ty: RegisterType::U128,
            status_bits: &[],
            offset: xmm_space + 16 * i,
            copy_fn: None,
        });
    }

    table.push(fp_reg!("mxcsr", mxcsr, VectorStatus, U32, &MXCSR_BITS));

    table
}

lazy_static! {
    static ref REGISTERS: Vec<RegisterDescriptor> = build_registers();
}

/// The immutable, process-global register table for this architecture.
pub fn registers() -> &'static [RegisterDescriptor] {
    &REGISTERS
}

/// Finds a register descriptor by name.
pub fn lookup_register(name: &str) -> Option<&'static RegisterDescriptor> {
    REGISTERS.iter().find(|reg| reg.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn one() -> [u8; 10] {
        let mut raw = [0u8; 10];
        raw[7] = 0x80;
        raw[8] = 0xff;
        raw[9] = 0x3f;
        raw
    }

    #[test]
    fn table_shape() {
        let table = registers();
        assert_eq!(table.len(), 65);
        let names: HashSet<_> = table.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), table.len());
        assert_eq!(
            lookup_register("rax").unwrap().class,
            RegisterClass::GeneralPurpose
        );
        assert_eq!(lookup_register("xmm15").unwrap().ty, RegisterType::U128);
        assert!(lookup_register("st0").is_none());
    }

    #[test]
    fn program_counter_slot() {
        // offsetof(struct user, regs.rip), which PTRACE_POKEUSER needs
        assert_eq!(offset_of!(libc::user_regs_struct, rip), 128);
        assert_eq!(lookup_register("rip").unwrap().offset, 128);
    }

    #[test]
    fn x87_rotation() {
        assert_eq!(x87_phys_to_log(0, 0), 0);
        assert_eq!(x87_phys_to_log(7, 6), 1);
        assert_eq!(x87_phys_to_log(0, 6), 2);
        assert_eq!(x87_phys_to_log(5, 5), 0);

        let mut snap = RegisterSnapshot::zeroed();
        snap.fpregs.swd = 2 << 11; // TOP = 2
        let pattern = one();
        // Physical R0 with TOP=2 lives in slot 6.
        unsafe {
            let base = snap.fpregs.st_space.as_mut_ptr().add(4 * 6) as *mut u8;
            std::ptr::copy_nonoverlapping(pattern.as_ptr(), base, pattern.len());
        }
        let r0 = lookup_register("R0").unwrap();
        assert_eq!(r0.extract(&snap), RegisterValue::Float80(pattern));
        assert!(!r0.is_writable());
    }

    #[test]
    fn tag_classification() {
        assert_eq!(x87_tag(&one()), 0); // valid
        assert_eq!(x87_tag(&[0u8; 10]), 1); // zero

        let mut denormal = [0u8; 10];
        denormal[0] = 1;
        assert_eq!(x87_tag(&denormal), 2); // special

        let mut infinity = one();
        infinity[9] = 0x7f;
        assert_eq!(x87_tag(&infinity), 2); // special

        let mut unnormal = one();
        unnormal[7] = 0; // integer bit clear, exponent nonzero
        assert_eq!(x87_tag(&unnormal), 2);
    }

    #[test]
    fn tag_word_reconstruction() {
        let ftw = lookup_register("ftw").unwrap();

        // Nothing valid: every entry tags empty.
        let snap = RegisterSnapshot::zeroed();
        assert_eq!(ftw.extract(&snap), RegisterValue::U16(0xffff));

        // R0 holds 1.0 with TOP=0: tag 0 in the low two bits.
        let mut snap = RegisterSnapshot::zeroed();
        snap.fpregs.ftw = 1;
        let pattern = one();
        unsafe {
            let base = snap.fpregs.st_space.as_mut_ptr() as *mut u8;
            std::ptr::copy_nonoverlapping(pattern.as_ptr(), base, pattern.len());
        }
        assert_eq!(ftw.extract(&snap), RegisterValue::U16(0xfffc));
        assert!(!ftw.is_writable());
    }

    #[test]
    fn eflags_decoding() {
        let eflags = lookup_register("eflags").unwrap();
        let decoded = eflags.decode_status(&RegisterValue::U64(0x41)); // CF | ZF
        assert_eq!(decoded, vec!["CF", "ZF", "IOPL=0x0"]);
    }

    #[test]
    fn stub_is_sane() {
        let stub = bootstrap_stub();
        assert!(!stub.is_empty());
        assert!(stub.len() <= SCP_SIZE);
        assert_eq!(TRAP_INSTRUCTION, [0xcc]);
    }
}
