//! Core library for the Luz 32-bit RISC simulator: the shared ISA table,
//! the register file, the memory model, the CPU interpreter, the
//! disassembler and the debug surface. The assembler (`lasm`), object
//! format (`luzobj`), linker (`luzld`) and CLI (`luz-cli`) are separate
//! crates built on top of this one.

#[macro_use]
extern crate num_derive;

/// A raw 32-bit instruction word, and the natural width of a register.
pub type Word = u32;
/// A sign-extended 16-bit immediate, as carried in I-format/branch words.
pub type Immediate = i16;
/// A sign-extended address/offset computed from a 26-bit field.
pub type Address = i32;

pub mod constants;
pub mod cpu;
pub mod debug;
pub mod disasm;
pub mod isa;
pub mod memory;
pub mod register;

pub use cpu::{Cause, Cpu, TickResult};
pub use debug::Debugger;
pub use disasm::disassemble;
pub use isa::Op;
pub use memory::{AccessError, AlignedAccess, Memory, Storage};
pub use register::RegisterFile;

#[cfg(test)]
mod test {
    use super::*;
    use crate::isa::Op;

    /// End-to-end: unsigned multiply per the concrete scenario of
    /// `LI r2, 0x10000; LI r3, 0x10000; MULU r4, r2, r3` — expressed directly
    /// in encoded words since this crate has no assembler of its own.
    #[test]
    fn unsigned_multiply_scenario() {
        let mut memory = Memory::new(0x1000);
        // LI r2, 0x10000 -> LUI r2, 1 ; ORI r2, r2, 0
        memory.write_word(0x00, isa::encode_rri(Op::Lui, 2, 0, 1)).unwrap();
        memory.write_word(0x04, isa::encode_rri(Op::Ori, 2, 2, 0)).unwrap();
        // LI r3, 0x10000
        memory.write_word(0x08, isa::encode_rri(Op::Lui, 3, 0, 1)).unwrap();
        memory.write_word(0x0C, isa::encode_rri(Op::Ori, 3, 3, 0)).unwrap();
        memory.write_word(0x10, isa::encode_rrr(Op::Mulu, 4, 2, 3)).unwrap();
        memory.write_word(0x14, isa::encode_bare(Op::Halt)).unwrap();

        let mut cpu = Cpu::new(memory, 0);
        cpu.run();

        assert_eq!(cpu.registers().get(4), 0);
        assert_eq!(cpu.registers().get(5), 1);
    }

    /// Sum 0..9 via a peripheral-mapped store queue, matching the scenario
    /// of looping `sw r5,0(k0); addi r5,r5,1; bltu r5,r9,loop; halt`.
    #[test]
    fn sum_loop_drains_into_the_peripheral_queue() {
        use crate::memory::composite::CompositeMemory;
        use crate::memory::peripheral::SharedQueue;

        let queue = SharedQueue::new(4);
        let mut composite = CompositeMemory::new();
        composite.mount("code", 0, Box::new(Memory::new(0x100))).unwrap();
        composite
            .mount("peripheral", constants::DEFAULT_PERIPHERAL_ADDRESS, Box::new(queue.clone()))
            .unwrap();

        // r9 = 10 (limit), r5 = 0 (counter), k0 (r26) = peripheral address.
        composite.write_word(0x00, isa::encode_rri(Op::Addi, 9, 0, 10)).unwrap();
        composite.write_word(0x04, isa::encode_rri(Op::Addi, 5, 0, 0)).unwrap();
        composite
            .write_word(
                0x08,
                isa::encode_rri(Op::Lui, 26, 0, (constants::DEFAULT_PERIPHERAL_ADDRESS >> 16) as i16),
            )
            .unwrap();
        composite
            .write_word(0x0C, isa::encode_rri(Op::Ori, 26, 26, (constants::DEFAULT_PERIPHERAL_ADDRESS & 0xFFFF) as i16))
            .unwrap();
        // loop:
        composite.write_word(0x10, isa::encode_store_op(Op::Sw, 26, 5, 0)).unwrap();
        composite.write_word(0x14, isa::encode_rri(Op::Addi, 5, 5, 1)).unwrap();
        // bltu r5, r9, loop (loop is at 0x10, this branch is at 0x18)
        composite.write_word(0x18, isa::encode_branch(Op::Bltu, 5, 9, -2)).unwrap();
        composite.write_word(0x1C, isa::encode_bare(Op::Halt)).unwrap();

        let mut cpu = Cpu::new(composite, 0);
        cpu.run();

        assert_eq!(cpu.registers().get(5), 10);
        assert_eq!(queue.drain(), vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }
}
