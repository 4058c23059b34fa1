//! End-to-end coverage: real LASM source taken through assemble, link and
//! run, asserting on final register/queue state. One test per scenario,
//! mirroring the teacher assembler's whole-program test convention.

use luz::memory::composite::CompositeMemory;
use luz::memory::peripheral::SharedQueue;
use luz::{constants, Cause, Cpu, Memory, Storage, TickResult};
use luzobj::Executable;

const STACK_SLACK: u32 = 0x1_0000;

/// Same three-mount layout `luz-cli`'s own loader builds: zeroed scratch
/// below the peripheral window, the peripheral hook, then one region
/// covering every linked segment plus slack.
fn load(executable: &Executable) -> (CompositeMemory, SharedQueue) {
    let mut memory = CompositeMemory::new();

    let peripheral_base = constants::DEFAULT_PERIPHERAL_ADDRESS;
    let peripheral_end = peripheral_base + constants::WORD_BYTES;

    memory.mount("scratch", 0, Box::new(Memory::new(peripheral_base))).unwrap();

    let queue = SharedQueue::new(constants::WORD_BYTES);
    memory.mount("peripheral", peripheral_base, Box::new(queue.clone())).unwrap();

    let program_end = executable
        .segments
        .iter()
        .map(|segment| segment.base + segment.bytes.len() as u32)
        .max()
        .unwrap_or(peripheral_end)
        .max(peripheral_end)
        + STACK_SLACK;
    let mut program = vec![0u8; (program_end - peripheral_end) as usize];
    for segment in &executable.segments {
        let start = (segment.base - peripheral_end) as usize;
        program[start..start + segment.bytes.len()].copy_from_slice(&segment.bytes);
    }
    memory.mount("program", peripheral_end, Box::new(Memory::from(&program[..]))).unwrap();

    (memory, queue)
}

fn assemble_and_link(source: &str) -> Executable {
    let object = lasm::assemble(source).expect("assemble");
    luzld::link(&[object]).expect("link")
}

fn run_to_halt(source: &str) -> (Cpu<CompositeMemory>, SharedQueue) {
    let executable = assemble_and_link(source);
    let entry = executable.entry;
    let (memory, queue) = load(&executable);
    let mut cpu = Cpu::new(memory, entry);
    cpu.run();
    (cpu, queue)
}

#[test]
fn sum_0_through_9_drains_into_the_peripheral_queue() {
    // `LI` splits a symbolic operand into a relocation, so the peripheral
    // address (a plain constant, not a linker symbol) is spelled out as a
    // literal here rather than routed through `.define`.
    let source = format!(
        r#"
        .segment code
        .global asm_main
        asm_main:
            addi $r9, $zero, 10
            addi $r5, $zero, 0
            li   $k0, {peripheral:#x}
        loop:
            sw   $r5, 0($k0)
            addi $r5, $r5, 1
            bltu $r5, $r9, loop
            halt
    "#,
        peripheral = constants::DEFAULT_PERIPHERAL_ADDRESS
    );
    let (cpu, queue) = run_to_halt(&source);
    assert!(cpu.halted());
    assert_eq!(cpu.registers().get(5), 10);
    assert_eq!(queue.drain(), vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
}

#[test]
fn array_sum_over_a_word_data_segment() {
    let source = r#"
        .segment data
        numbers:
            .word 1, 2, 3, 4, 5

        .segment code
        .global asm_main
        asm_main:
            li      $t1, numbers
            addi    $t2, $zero, 5
            addi    $t0, $zero, 0
        loop:
            lw      $t3, 0($t1)
            add     $t0, $t0, $t3
            addi    $t1, $t1, 4
            subi    $t2, $t2, 1
            bnez    $t2, loop
            halt
    "#;
    let (cpu, _queue) = run_to_halt(source);
    assert!(cpu.halted());
    assert_eq!(cpu.registers().get(8), 15);
}

#[test]
fn unsigned_multiply_of_two_halves_carries_into_the_high_register() {
    let source = r#"
        .segment code
        .global asm_main
        asm_main:
            li   $v0, 0x10000
            li   $v1, 0x10000
            mulu $a0, $v0, $v1
            halt
    "#;
    let (cpu, _queue) = run_to_halt(source);
    assert!(cpu.halted());
    assert_eq!(cpu.registers().get(4), 0);
    assert_eq!(cpu.registers().get(5), 1);
}

#[test]
fn signed_and_unsigned_branches_disagree_on_a_negative_looking_value() {
    // r1 = 0xFFFFFFFF (-1 signed, huge unsigned), r2 = 1.
    // BLT takes the branch (signed: -1 < 1); BLTU does not (unsigned: huge > 1).
    let source = r#"
        .segment code
        .global asm_main
        asm_main:
            addi $r1, $zero, -1
            addi $r2, $zero, 1
            blt  $r1, $r2, signed_taken
            addi $r10, $zero, 0
            b    after_signed
        signed_taken:
            addi $r10, $zero, 1
        after_signed:
            bltu $r1, $r2, unsigned_taken
            addi $r11, $zero, 0
            b    after_unsigned
        unsigned_taken:
            addi $r11, $zero, 1
        after_unsigned:
            halt
    "#;
    let (cpu, _queue) = run_to_halt(source);
    assert!(cpu.halted());
    assert_eq!(cpu.registers().get(10), 1, "BLT should have taken the branch");
    assert_eq!(cpu.registers().get(11), 0, "BLTU should not have taken the branch");
}

#[test]
fn call_and_ret_round_trip_through_the_link_register() {
    let source = r#"
        .segment code
        .global asm_main
        asm_main:
            addi $a0, $zero, 7
            call double
            addi $r20, $zero, 1
            halt
        double:
            add  $v0, $a0, $a0
            ret
    "#;
    let (cpu, _queue) = run_to_halt(source);
    assert!(cpu.halted());
    assert_eq!(cpu.registers().get(2), 14, "double's result should land in v0");
    assert_eq!(cpu.registers().get(20), 1, "caller should resume right after the call");
}

#[test]
fn misaligned_load_traps_without_touching_the_destination_register() {
    let source = r#"
        .segment code
        .global asm_main
        asm_main:
            lw $r1, 1($zero)
            halt
    "#;
    let executable = assemble_and_link(source);
    let entry = executable.entry;
    let (memory, _queue) = load(&executable);
    let mut cpu = Cpu::new(memory, entry);
    let result = cpu.tick();

    assert!(matches!(result, TickResult::Trapped(Cause::MisalignedAccess) | TickResult::Halted));
    assert!(cpu.halted());
    assert_eq!(cpu.registers().get(1), 0);
}
