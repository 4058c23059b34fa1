use crate::cpu::Cpu;
use crate::isa::{self, Op};
use crate::memory::Memory;

fn run_one(word: u32) -> Cpu<Memory> {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, word).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.tick();
    cpu
}

#[test]
fn add_wraps_on_overflow() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rrr(Op::Add, 3, 1, 2)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.registers_mut().set(1, u32::MAX);
    cpu.registers_mut().set(2, 1);
    cpu.tick();
    assert_eq!(cpu.registers().get(3), 0);
}

#[test]
fn sub_wraps_below_zero() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rrr(Op::Sub, 3, 1, 2)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.registers_mut().set(1, 0);
    cpu.registers_mut().set(2, 1);
    cpu.tick();
    assert_eq!(cpu.registers().get(3), u32::MAX);
}

#[test]
fn addi_sign_extends_negative_immediate() {
    let cpu = run_one(isa::encode_rri(Op::Addi, 1, 0, -4));
    assert_eq!(cpu.registers().get(1), 0xFFFF_FFFC);
}

#[test]
fn andi_zero_extends_immediate() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rri(Op::Andi, 2, 1, -1)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.registers_mut().set(1, 0xFFFF_0000);
    cpu.tick();
    // -1 as i16 zero-extended is 0x0000FFFF, not sign-extended 0xFFFFFFFF.
    assert_eq!(cpu.registers().get(2), 0x0000_0000);
}

#[test]
fn ori_zero_extends_immediate() {
    let cpu = run_one(isa::encode_rri(Op::Ori, 1, 0, -1));
    assert_eq!(cpu.registers().get(1), 0x0000_FFFF);
}

#[test]
fn lui_loads_upper_half_and_zeros_lower() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rri(Op::Lui, 1, 0, 0x1234)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.tick();
    assert_eq!(cpu.registers().get(1), 0x1234_0000);
}

#[test]
fn sll_and_srl_use_low_five_bits_of_shift_amount() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rrr(Op::Sll, 3, 1, 2)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.registers_mut().set(1, 1);
    cpu.registers_mut().set(2, 0x21); // 33 -> shift of 1
    cpu.tick();
    assert_eq!(cpu.registers().get(3), 2);
}

#[test]
fn mulu_splits_64_bit_product_across_rd_and_rd_plus_one() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rrr(Op::Mulu, 2, 0, 1)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.registers_mut().set(0, 0x1_0000);
    cpu.registers_mut().set(1, 0x1_0000);
    cpu.tick();
    assert_eq!(cpu.registers().get(2), 0);
    assert_eq!(cpu.registers().get(3), 1);
}

#[test]
fn mul_is_signed_and_high_half_is_discarded_at_r31() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rrr(Op::Mul, 31, 0, 1)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.registers_mut().set(0, (-2i32) as u32);
    cpu.registers_mut().set(1, 3);
    cpu.tick();
    assert_eq!(cpu.registers().get(31), (-6i32) as u32);
}

#[test]
fn div_by_zero_traps_to_installed_handler() {
    use crate::cpu::{Cause, TickResult};
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rrr(Op::Div, 0, 1, 2)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.set_exception_vector(Some(0x40));
    cpu.registers_mut().set(1, 10);
    cpu.registers_mut().set(2, 0);
    assert_eq!(cpu.tick(), TickResult::Trapped(Cause::DivideByZero));
    assert_eq!(cpu.pc(), 0x40);
}

#[test]
fn div_by_zero_halts_with_no_handler_installed() {
    use crate::cpu::TickResult;
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rrr(Op::Div, 0, 1, 2)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.registers_mut().set(1, 10);
    cpu.registers_mut().set(2, 0);
    assert_eq!(cpu.tick(), TickResult::Halted);
    assert!(cpu.halted());
}

#[test]
fn divu_computes_quotient_and_remainder() {
    let mut memory = Memory::new(0x100);
    memory.write_word(0, isa::encode_rrr(Op::Divu, 2, 0, 1)).unwrap();
    let mut cpu = Cpu::new(memory, 0);
    cpu.registers_mut().set(0, 7);
    cpu.registers_mut().set(1, 2);
    cpu.tick();
    assert_eq!(cpu.registers().get(2), 3);
    assert_eq!(cpu.registers().get(3), 1);
}
