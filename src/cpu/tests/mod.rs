use super::*;
use crate::memory::Memory;
use crate::isa;

mod instructions;

fn cpu_with(words: &[Word]) -> Cpu<Memory> {
    let mut memory = Memory::new(0x1000);
    for (i, &word) in words.iter().enumerate() {
        memory.write_word((i * 4) as u32, word).unwrap();
    }
    Cpu::new(memory, 0)
}

#[test]
fn pc_advances_by_four_on_non_control_flow() {
    let mut cpu = cpu_with(&[isa::encode_rri(isa::Op::Addi, 1, 0, 5)]);
    cpu.tick();
    assert_eq!(cpu.pc(), 4);
}

#[test]
fn halt_stops_pc_and_further_ticks_are_no_ops() {
    let mut cpu = cpu_with(&[isa::encode_bare(isa::Op::Halt)]);
    cpu.tick();
    assert!(cpu.halted());
    let pc_after_halt = cpu.pc();
    cpu.tick();
    assert_eq!(cpu.pc(), pc_after_halt);
}

#[test]
fn r0_is_never_observably_written() {
    let mut cpu = cpu_with(&[isa::encode_rri(isa::Op::Addi, 0, 0, 123)]);
    cpu.tick();
    assert_eq!(cpu.registers().get(0), 0);
}

#[test]
fn misaligned_fetch_traps_with_no_handler_installed() {
    // JR to an odd address, then the next tick must fetch from it and trap.
    let mut cpu = cpu_with(&[isa::encode_reg(isa::Op::Jr, 1)]);
    cpu.registers_mut().set(1, 1);
    cpu.tick();
    assert_eq!(cpu.tick(), TickResult::Halted);
    assert!(cpu.halted());
}
