use crate::cpu::Cpu;
use crate::isa::{self, Op};
use crate::memory::Memory;

fn cpu_with_branch(op: Op, rs_value: u32, rt_value: u32, word_offset: i16) -> Cpu<Memory> {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_branch(op, 1, 2, word_offset)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.registers_mut().set(1, rs_value);
    cpu.registers_mut().set(2, rt_value);
    cpu
}

#[test]
fn beq_taken_jumps_relative_to_its_own_address() {
    let mut cpu = cpu_with_branch(Op::Beq, 5, 5, 3);
    cpu.tick();
    assert_eq!(cpu.pc(), 12);
}

#[test]
fn beq_not_taken_falls_through() {
    let mut cpu = cpu_with_branch(Op::Beq, 5, 6, 3);
    cpu.tick();
    assert_eq!(cpu.pc(), 4);
}

#[test]
fn blt_is_signed() {
    // rs = -1 (0xFFFFFFFF), rt = 1: signed, -1 < 1, branch taken.
    let mut cpu = cpu_with_branch(Op::Blt, 0xFFFF_FFFF, 1, 2);
    cpu.tick();
    assert_eq!(cpu.pc(), 8);
}

#[test]
fn bltu_is_unsigned() {
    // Same bit patterns, unsigned comparison: 0xFFFFFFFF is not < 1.
    let mut cpu = cpu_with_branch(Op::Bltu, 0xFFFF_FFFF, 1, 2);
    cpu.tick();
    assert_eq!(cpu.pc(), 4);
}

#[test]
fn bge_taken_on_equal() {
    let mut cpu = cpu_with_branch(Op::Bge, 5, 5, 1);
    cpu.tick();
    assert_eq!(cpu.pc(), 4);
}

#[test]
fn negative_branch_offset_jumps_backward() {
    let mut memory = Memory::new(0x100);
    memory.write_word(8, isa::encode_branch(Op::Bne, 1, 2, -2)).unwrap();
    let mut cpu = Cpu::new(memory, 8);
    cpu.registers_mut().set(1, 1);
    cpu.registers_mut().set(2, 0);
    cpu.tick();
    assert_eq!(cpu.pc(), 0);
}
