//! The CPU core: register file, program counter, exception-return register
//! and the decode/execute loop. Generic over any backing [`Storage`] so the
//! same core drives a flat [`Memory`] or a [`CompositeMemory`] with a
//! mounted peripheral.
//!
//! [`Storage`]: ../memory/trait.Storage.html
//! [`Memory`]: ../memory/struct.Memory.html
//! [`CompositeMemory`]: ../memory/composite/struct.CompositeMemory.html

use super::isa::{self, Op, Shape};
use super::memory::{AccessError, AlignedAccess, Storage};
use super::register::RegisterFile;
use super::{constants, Address, Word};
use std::error;
use std::fmt;

/// The reason the CPU stopped making progress on its own, short of a plain `HALT`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cause {
    MisalignedFetch,
    MisalignedAccess,
    DivideByZero,
    UndefinedOpcode,
    OutOfRange,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            Cause::MisalignedFetch => "misaligned instruction fetch",
            Cause::MisalignedAccess => "misaligned memory access",
            Cause::DivideByZero => "division by zero",
            Cause::UndefinedOpcode => "undefined opcode",
            Cause::OutOfRange => "access outside mapped memory",
        };
        f.write_str(text)
    }
}

impl error::Error for Cause {}

impl From<AccessError> for Cause {
    fn from(e: AccessError) -> Cause {
        match e {
            AccessError::Misaligned => Cause::MisalignedAccess,
            AccessError::OutOfRange => Cause::OutOfRange,
        }
    }
}

/// Outcome of a single [`Cpu::tick`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TickResult {
    /// The instruction ran and the CPU may continue.
    Continue,
    /// `HALT` executed, or an exception was taken with no handler installed.
    Halted,
    /// An exception was taken and control transferred to the handler.
    Trapped(Cause),
}

/// A Luz CPU core bound to a backing store `M`.
///
/// # Examples
/// ```
/// use luz::{Cpu, Memory};
///
/// let mut cpu = Cpu::new(Memory::new(0x1000), 0);
/// assert_eq!(cpu.pc(), 0);
/// assert!(!cpu.halted());
/// ```
pub struct Cpu<M: Storage> {
    registers: RegisterFile,
    pc: u32,
    /// Address ERET restores PC to; also the scratch slot an exception saves into.
    exception_return: u32,
    /// Fixed handler address installed before `run`/`step`. `None` means any
    /// exception halts the CPU.
    exception_vector: Option<u32>,
    halted: bool,
    memory: M,
}

impl<M: Storage> Cpu<M> {
    pub fn new(memory: M, entry: u32) -> Cpu<M> {
        Cpu {
            registers: RegisterFile::new(),
            pc: entry,
            exception_return: 0,
            exception_vector: None,
            halted: false,
            memory,
        }
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn set_exception_vector(&mut self, address: Option<u32>) {
        self.exception_vector = address;
    }

    /// Takes an exception: saves `pc` into the exception-return register and
    /// either transfers to the installed handler or halts.
    fn trap(&mut self, cause: Cause) -> TickResult {
        self.exception_return = self.pc;
        match self.exception_vector {
            Some(handler) => {
                self.pc = handler;
                TickResult::Trapped(cause)
            }
            None => {
                self.halted = true;
                TickResult::Halted
            }
        }
    }

    /// Executes a single instruction. A no-op once [`halted`] is true.
    ///
    /// [`halted`]: #method.halted
    pub fn tick(&mut self) -> TickResult {
        if self.halted {
            return TickResult::Halted;
        }

        if self.pc % constants::WORD_BYTES != 0 {
            return self.trap(Cause::MisalignedFetch);
        }

        let instruction = match self.memory.read_word(self.pc) {
            Ok(word) => word,
            Err(()) => return self.trap(Cause::OutOfRange),
        };

        let op = match isa::decode_op(instruction) {
            Some(op) => op,
            None => return self.trap(Cause::UndefinedOpcode),
        };

        self.execute(op, instruction)
    }

    /// Runs up to `count` instructions, stopping early if the CPU halts.
    /// Returns the number of instructions actually executed.
    pub fn step(&mut self, count: u32) -> u32 {
        let mut executed = 0;
        for _ in 0..count {
            if self.halted {
                break;
            }
            self.tick();
            executed += 1;
        }
        executed
    }

    /// Runs until `HALT` (or an unhandled exception).
    pub fn run(&mut self) {
        while !self.halted {
            self.tick();
        }
    }

    fn execute(&mut self, op: Op, instruction: Word) -> TickResult {
        let fields = isa::raw_fields(instruction);
        let rd = fields.field_a as u8;
        let rs = fields.field_b as u8;
        let rt = fields.field_c as u8;
        let next_pc = self.pc.wrapping_add(constants::WORD_BYTES);

        macro_rules! trapping {
            ($expr:expr) => {
                match $expr {
                    Ok(value) => value,
                    Err(cause) => return self.trap(cause),
                }
            };
        }

        match op.shape() {
            Shape::RRR => {
                let a = self.registers.get(rs);
                let b = self.registers.get(rt);
                match op {
                    Op::Add => self.registers.set(rd, a.wrapping_add(b)),
                    Op::Sub => self.registers.set(rd, a.wrapping_sub(b)),
                    Op::And => self.registers.set(rd, a & b),
                    Op::Or => self.registers.set(rd, a | b),
                    Op::Xor => self.registers.set(rd, a ^ b),
                    Op::Sll => self.registers.set(rd, a << (b & 0x1F)),
                    Op::Srl => self.registers.set(rd, a >> (b & 0x1F)),
                    Op::Mul => {
                        let product = i64::from(a as i32) * i64::from(b as i32);
                        self.registers.set_pair(rd, product as u32, (product >> 32) as u32);
                    }
                    Op::Mulu => {
                        let product = u64::from(a) * u64::from(b);
                        self.registers.set_pair(rd, product as u32, (product >> 32) as u32);
                    }
                    Op::Div => {
                        if b == 0 {
                            return self.trap(Cause::DivideByZero);
                        }
                        let (a, b) = (a as i32, b as i32);
                        self.registers.set_pair(rd, (a / b) as u32, (a % b) as u32);
                    }
                    Op::Divu => {
                        if b == 0 {
                            return self.trap(Cause::DivideByZero);
                        }
                        self.registers.set_pair(rd, a / b, a % b);
                    }
                    _ => unreachable!("non-RRR opcode under Shape::RRR"),
                }
                self.pc = next_pc;
                TickResult::Continue
            }
            Shape::RRISigned | Shape::RRIZeroExt => {
                let a = self.registers.get(rs);
                let imm = fields.imm16;
                let value = match op.shape() {
                    Shape::RRISigned => imm as i32 as u32,
                    _ => imm as u16 as u32,
                };
                match op {
                    Op::Addi => self.registers.set(rd, a.wrapping_add(value)),
                    Op::Subi => self.registers.set(rd, a.wrapping_sub(value)),
                    Op::Xori => self.registers.set(rd, a ^ value),
                    Op::Andi => self.registers.set(rd, a & value),
                    Op::Ori => self.registers.set(rd, a | value),
                    _ => unreachable!("non-immediate-arithmetic opcode"),
                }
                self.pc = next_pc;
                TickResult::Continue
            }
            Shape::RRIShift => {
                let a = self.registers.get(rs);
                let shift = (fields.imm16 as u16 as u32) & 0x1F;
                match op {
                    Op::Slli => self.registers.set(rd, a << shift),
                    Op::Srli => self.registers.set(rd, a >> shift),
                    _ => unreachable!("non-shift opcode under Shape::RRIShift"),
                }
                self.pc = next_pc;
                TickResult::Continue
            }
            Shape::RI => {
                debug_assert_eq!(op, Op::Lui);
                let imm = fields.imm16 as u16 as u32;
                self.registers.set(rd, imm << 16);
                self.pc = next_pc;
                TickResult::Continue
            }
            Shape::Load => {
                let address = self.registers.get(rs).wrapping_add(fields.imm16 as i32 as u32);
                let value = match op {
                    Op::Lb => trapping!(self.memory.load8(address).map(|b| b as i8 as i32 as u32).map_err(Cause::from)),
                    Op::Lbu => trapping!(self.memory.load8(address).map(u32::from).map_err(Cause::from)),
                    Op::Lh => trapping!(self.memory.load16(address).map(|h| h as i16 as i32 as u32).map_err(Cause::from)),
                    Op::Lhu => trapping!(self.memory.load16(address).map(u32::from).map_err(Cause::from)),
                    Op::Lw => trapping!(self.memory.load32(address).map_err(Cause::from)),
                    _ => unreachable!("non-load opcode under Shape::Load"),
                };
                self.registers.set(rd, value);
                self.pc = next_pc;
                TickResult::Continue
            }
            Shape::Store => {
                // field_a (rd) carries the base register; field_b (rs) carries the value.
                let base = rd;
                let value_reg = rs;
                let address = self.registers.get(base).wrapping_add(fields.imm16 as i32 as u32);
                let value = self.registers.get(value_reg);
                trapping!(match op {
                    Op::Sb => self.memory.store8(address, value as u8).map_err(Cause::from),
                    Op::Sh => self.memory.store16(address, value as u16).map_err(Cause::from),
                    Op::Sw => self.memory.store32(address, value).map_err(Cause::from),
                    _ => unreachable!("non-store opcode under Shape::Store"),
                });
                self.pc = next_pc;
                TickResult::Continue
            }
            Shape::Branch => {
                let a = self.registers.get(rs);
                let b = self.registers.get(rt);
                let taken = match op {
                    Op::Beq => a == b,
                    Op::Bne => a != b,
                    Op::Blt => (a as i32) < (b as i32),
                    Op::Ble => (a as i32) <= (b as i32),
                    Op::Bgt => (a as i32) > (b as i32),
                    Op::Bge => (a as i32) >= (b as i32),
                    Op::Bltu => a < b,
                    Op::Bleu => a <= b,
                    Op::Bgtu => a > b,
                    Op::Bgeu => a >= b,
                    _ => unreachable!("non-branch opcode under Shape::Branch"),
                };
                if taken {
                    let offset = (fields.imm16 as i32).wrapping_mul(constants::WORD_BYTES as i32);
                    self.pc = (self.pc as i32).wrapping_add(offset) as u32;
                } else {
                    self.pc = next_pc;
                }
                TickResult::Continue
            }
            Shape::JumpSigned => {
                debug_assert_eq!(op, Op::B);
                let offset = fields.address_signed.wrapping_mul(constants::WORD_BYTES as Address);
                self.pc = (self.pc as Address).wrapping_add(offset) as u32;
                TickResult::Continue
            }
            Shape::JumpUnsigned => {
                debug_assert_eq!(op, Op::Call);
                self.registers.set(31, next_pc);
                self.pc = fields.address_unsigned.wrapping_mul(constants::WORD_BYTES);
                TickResult::Continue
            }
            Shape::Reg => {
                debug_assert_eq!(op, Op::Jr);
                self.pc = self.registers.get(rd);
                TickResult::Continue
            }
            Shape::Bare => match op {
                Op::Eret => {
                    self.pc = self.exception_return;
                    TickResult::Continue
                }
                Op::Halt => {
                    self.halted = true;
                    TickResult::Halted
                }
                _ => unreachable!("non-bare opcode under Shape::Bare"),
            },
        }
    }
}

#[cfg(test)]
mod tests;
