use crate::cpu::{Cpu, TickResult};
use crate::isa::{self, Op};
use crate::memory::Memory;

#[test]
fn b_jumps_relative_to_its_own_address() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_jump(Op::B, 2)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.tick();
    assert_eq!(cpu.pc(), 8);
}

#[test]
fn call_sets_return_address_and_jumps_to_absolute_word_index() {
    let mut memory = Memory::new(0x200);
    memory.write_word(0, isa::encode_jump(Op::Call, 0x10)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.tick();
    assert_eq!(cpu.pc(), 0x40);
    assert_eq!(cpu.registers().get(31), 4);
}

#[test]
fn jr_jumps_to_register_value() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_reg(Op::Jr, 1)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.registers_mut().set(1, 0x20);
    cpu.tick();
    assert_eq!(cpu.pc(), 0x20);
}

#[test]
fn call_then_jr_returns_to_the_instruction_after_call() {
    let mut memory = Memory::new(0x200);
    // word index 4 -> address 0x10
    memory.write_word(0, isa::encode_jump(Op::Call, 4)).unwrap();
    memory.write_word(4, isa::encode_bare(Op::Halt)).unwrap();
    memory.write_word(0x10, isa::encode_reg(Op::Jr, 31)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.tick(); // CALL
    assert_eq!(cpu.pc(), 0x10);
    cpu.tick(); // JR $ra
    assert_eq!(cpu.pc(), 4);
}

#[test]
fn eret_restores_saved_pc() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rrr(Op::Div, 0, 1, 2)).unwrap();
    memory.write_word(0x40, isa::encode_bare(Op::Eret)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.set_exception_vector(Some(0x40));
    cpu.registers_mut().set(1, 1);
    cpu.registers_mut().set(2, 0);
    cpu.tick(); // traps, saves pc=0, jumps to 0x40
    assert_eq!(cpu.pc(), 0x40);
    cpu.tick(); // ERET
    assert_eq!(cpu.pc(), 0);
}

#[test]
fn halt_sets_halted_flag_and_does_not_advance_pc() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_bare(Op::Halt)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    assert_eq!(cpu.tick(), TickResult::Halted);
    assert_eq!(cpu.pc(), 0);
}
