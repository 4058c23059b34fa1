use crate::cpu::{Cause, Cpu, TickResult};
use crate::isa::{self, Op};
use crate::memory::{AlignedAccess, Memory};

#[test]
fn lb_sign_extends_a_negative_byte() {
    let mut memory = Memory::new(0x100);
    memory.store8(0x20, 0xFF).unwrap();
    memory.write_word(0, isa::encode_rri(Op::Lb, 1, 0, 0x20)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.tick();
    assert_eq!(cpu.registers().get(1), 0xFFFF_FFFF);
}

#[test]
fn lbu_zero_extends_the_same_byte() {
    let mut memory = Memory::new(0x100);
    memory.store8(0x20, 0xFF).unwrap();
    memory.write_word(0, isa::encode_rri(Op::Lbu, 1, 0, 0x20)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.tick();
    assert_eq!(cpu.registers().get(1), 0x0000_00FF);
}

#[test]
fn lh_sign_extends_and_lhu_zero_extends() {
    let mut memory = Memory::new(0x100);
    memory.store16(0x20, 0xFFFE).unwrap();
    memory.write_word(0, isa::encode_rri(Op::Lh, 1, 0, 0x20)).unwrap();
    memory.write_word(4, isa::encode_rri(Op::Lhu, 2, 0, 0x20)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.tick();
    cpu.tick();
    assert_eq!(cpu.registers().get(1), 0xFFFF_FFFE);
    assert_eq!(cpu.registers().get(2), 0x0000_FFFE);
}

#[test]
fn lw_reads_a_full_word() {
    let mut memory = Memory::new(0x100);
    memory.store32(0x20, 0x1234_5678).unwrap();
    memory.write_word(0, isa::encode_rri(Op::Lw, 1, 0, 0x20)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.tick();
    assert_eq!(cpu.registers().get(1), 0x1234_5678);
}

#[test]
fn store_uses_field_a_as_base_and_field_b_as_value() {
    // encode_store_op(op, base_rd, value_rs, imm16)
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_store_op(Op::Sw, 1, 2, 0x10)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.registers_mut().set(1, 0x20); // base
    cpu.registers_mut().set(2, 0xCAFE_BABE); // value
    cpu.tick();
    assert_eq!(cpu.memory().load32(0x30).unwrap(), 0xCAFE_BABE);
}

#[test]
fn misaligned_word_load_traps_and_leaves_destination_untouched() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rri(Op::Lw, 1, 0, 1)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    assert_eq!(cpu.tick(), TickResult::Halted);
    assert!(cpu.halted());
    assert_eq!(cpu.registers().get(1), 0);
}

#[test]
fn misaligned_access_cause_is_reported_when_a_handler_is_installed() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rri(Op::Lw, 1, 0, 1)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.set_exception_vector(Some(0x40));
    assert_eq!(cpu.tick(), TickResult::Trapped(Cause::MisalignedAccess));
}
