//! Uniform view of the tracee's register file. The per-architecture
//! submodule supplies the fixed code-page address, the trap opcode, the
//! bootstrap stub, the ptrace regset plumbing, and the register
//! descriptor table; everything here is the architecture-independent
//! surface built on top of those.

use nix::errno::Errno;
use std::fmt;

#[cfg(target_arch = "x86_64")]
mod x86_64;

#[cfg(target_arch = "x86_64")]
pub use self::x86_64::{lookup_register, registers, RegisterSnapshot, SCP_ADDR, TRAP_INSTRUCTION};

#[cfg(target_arch = "x86_64")]
pub(crate) use self::x86_64::{
    bootstrap_stub, read_registers, reset_program_counter, write_registers,
};

#[cfg(not(target_arch = "x86_64"))]
compile_error!("asmlab only supports x86-64 Linux hosts; see DESIGN.md for the porting seam");

/// The classes a register can belong to. Callers use these to ask for a
/// coherent subset of the register file.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RegisterClass {
    ProgramCounter,
    Segment,
    GeneralPurpose,
    Status,
    FloatingPoint,
    FloatingPointStatus,
    Vector,
    VectorStatus,
}

/// Width and interpretation of a register value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegisterType {
    U8,
    U16,
    U32,
    U64,
    U128,
    /// 80-bit x87 extended float, stored as its raw 10-byte image.
    Float80,
}

/// A logical register value, extracted from a snapshot.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RegisterValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    Float80([u8; 10]),
}

impl RegisterValue {
    pub fn ty(&self) -> RegisterType {
        match self {
            RegisterValue::U8(_) => RegisterType::U8,
            RegisterValue::U16(_) => RegisterType::U16,
            RegisterValue::U32(_) => RegisterType::U32,
            RegisterValue::U64(_) => RegisterType::U64,
            RegisterValue::U128(_) => RegisterType::U128,
            RegisterValue::Float80(_) => RegisterType::Float80,
        }
    }

    /// The low 64 bits, which is what status-bit decoders operate on.
    fn as_bits(&self) -> u64 {
        match self {
            RegisterValue::U8(v) => u64::from(*v),
            RegisterValue::U16(v) => u64::from(*v),
            RegisterValue::U32(v) => u64::from(*v),
            RegisterValue::U64(v) => *v,
            RegisterValue::U128(v) => *v as u64,
            RegisterValue::Float80(_) => 0,
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterValue::U8(v) => write!(f, "0x{:02x}", v),
            RegisterValue::U16(v) => write!(f, "0x{:04x}", v),
            RegisterValue::U32(v) => write!(f, "0x{:08x}", v),
            RegisterValue::U64(v) => write!(f, "0x{:016x}", v),
            RegisterValue::U128(v) => write!(f, "0x{:032x}", v),
            RegisterValue::Float80(raw) => write!(f, "{:.18}", extended_to_f64(raw)),
        }
    }
}

/// Decodes the raw 80-bit extended format: 64-bit significand with an
/// explicit integer bit, 15-bit biased exponent, sign. Precision is lost
/// in the conversion, which is fine for display.
pub(crate) fn extended_to_f64(raw: &[u8; 10]) -> f64 {
    let mut significand = [0u8; 8];
    significand.copy_from_slice(&raw[..8]);
    let significand = u64::from_le_bytes(significand);
    let sign_exp = u16::from_le_bytes([raw[8], raw[9]]);
    let sign = if sign_exp & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = i32::from(sign_exp & 0x7fff);
    if exponent == 0x7fff {
        return if significand << 1 == 0 {
            sign * f64::INFINITY
        } else {
            f64::NAN
        };
    }
    // Zeros and denormals share the minimum exponent.
    let exponent = if exponent == 0 { -16382 } else { exponent - 16383 };
    sign * (significand as f64) * 2f64.powi(exponent - 63)
}

/// One named field of a status register and how to render it. For
/// single-bit fields the decode is the flag name when set and nothing
/// otherwise; multi-bit fields render as `name=symbol` when symbolic
/// values are known and `name=0xHEX` when they are not.
#[derive(Copy, Clone, Debug)]
pub struct StatusBits {
    pub name: &'static str,
    pub values: Option<&'static [&'static str]>,
    pub shift: u8,
    pub mask: u8,
}

impl StatusBits {
    pub fn field(&self, value: u64) -> u8 {
        ((value >> self.shift) as u8) & self.mask
    }

    pub fn format(&self, value: u64) -> String {
        let field = self.field(value);
        if self.mask == 0x1 {
            return if field != 0 {
                self.name.to_string()
            } else {
                String::new()
            };
        }
        match self.values {
            Some(values) => format!("{}={}", self.name, values[field as usize]),
            None => format!("{}=0x{:x}", self.name, field),
        }
    }
}

type CopyRegisterFn = fn(&RegisterDescriptor, &RegisterSnapshot) -> RegisterValue;

/// Table-driven description of one register: where it lives in the regset
/// snapshot and how to turn the raw bytes into a logical value. For most
/// registers the raw bytes are the value; registers whose in-memory
/// layout differs from their logical form (the rotating x87 stack, the
/// reconstructed tag word) carry a custom extractor and are read-only.
pub struct RegisterDescriptor {
    pub name: &'static str,
    pub class: RegisterClass,
    pub ty: RegisterType,
    pub status_bits: &'static [StatusBits],
    pub(crate) offset: usize,
    pub(crate) copy_fn: Option<CopyRegisterFn>,
}

impl RegisterDescriptor {
    /// Extracts the logical value from a snapshot.
    pub fn extract(&self, snap: &RegisterSnapshot) -> RegisterValue {
        if let Some(copy_fn) = self.copy_fn {
            return copy_fn(self, snap);
        }
        let base = snap as *const RegisterSnapshot as *const u8;
        unsafe {
            let at = base.add(self.offset);
            match self.ty {
                RegisterType::U8 => RegisterValue::U8(at.read_unaligned()),
                RegisterType::U16 => RegisterValue::U16(at.cast::<u16>().read_unaligned()),
                RegisterType::U32 => RegisterValue::U32(at.cast::<u32>().read_unaligned()),
                RegisterType::U64 => RegisterValue::U64(at.cast::<u64>().read_unaligned()),
                RegisterType::U128 => RegisterValue::U128(at.cast::<u128>().read_unaligned()),
                RegisterType::Float80 => {
                    let mut raw = [0u8; 10];
                    std::ptr::copy_nonoverlapping(at, raw.as_mut_ptr(), raw.len());
                    RegisterValue::Float80(raw)
                }
            }
        }
    }

    /// Whether `store` can write this register back. Registers with a
    /// custom extractor have no in-memory slot to write.
    pub fn is_writable(&self) -> bool {
        self.copy_fn.is_none()
    }

    /// Writes a value into a snapshot. The value's type must match the
    /// descriptor's.
    pub(crate) fn store(
        &self,
        snap: &mut RegisterSnapshot,
        value: &RegisterValue,
    ) -> Result<(), Errno> {
        if !self.is_writable() || value.ty() != self.ty {
            return Err(Errno::EINVAL);
        }
        let base = snap as *mut RegisterSnapshot as *mut u8;
        unsafe {
            let at = base.add(self.offset);
            match value {
                RegisterValue::U8(v) => at.write_unaligned(*v),
                RegisterValue::U16(v) => at.cast::<u16>().write_unaligned(*v),
                RegisterValue::U32(v) => at.cast::<u32>().write_unaligned(*v),
                RegisterValue::U64(v) => at.cast::<u64>().write_unaligned(*v),
                RegisterValue::U128(v) => at.cast::<u128>().write_unaligned(*v),
                RegisterValue::Float80(raw) => {
                    std::ptr::copy_nonoverlapping(raw.as_ptr(), at, raw.len())
                }
            }
        }
        Ok(())
    }

    /// Applies every status-bit decoder to a value, dropping empty
    /// decodes. Deterministic: the same value always yields the same
    /// ordered list.
    pub fn decode_status(&self, value: &RegisterValue) -> Vec<String> {
        let word = value.as_bits();
        self.status_bits
            .iter()
            .map(|bits| bits.format(word))
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl fmt::Debug for RegisterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterDescriptor")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("ty", &self.ty)
            .finish()
    }
}
