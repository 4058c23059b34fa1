//! The single authoritative description of the Luz instruction set.
//!
//! Every opcode is represented as one variant of [`Op`], tagged with the
//! [`Shape`] that determines how its operands are packed into a 32-bit word.
//! The encoder, decoder, disassembler and simulator all match on these two
//! types exhaustively, so adding an opcode forces every consumer to account
//! for it.

use super::{constants, Address, Immediate, Word};
use num::FromPrimitive;
use num::ToPrimitive;
use std::fmt;

/// The operand/encoding shape of an instruction. Distinct shapes that happen
/// to share a bit layout (e.g. arithmetic-immediate and load) are kept apart
/// because the assembler's operand syntax differs between them.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Shape {
    /// `op rd, rs, rt`
    RRR,
    /// `op rd, rs, imm` — sign-extended immediate.
    RRISigned,
    /// `op rd, rs, imm` — zero-extended immediate.
    RRIZeroExt,
    /// `op rd, rs, imm` — only the low 5 bits of `imm` are used.
    RRIShift,
    /// `op rd, imm` — no source register.
    RI,
    /// `op rd, offset(rs)` — `rd` receives the loaded value, `rs` is the base.
    Load,
    /// `op rs, offset(rd)` — `rs` is the stored value, `rd` is the base.
    Store,
    /// `op rs, rt, target` — PC-relative, scaled by 4.
    Branch,
    /// `op target` — signed word offset from the jump's own address, scaled by 4.
    JumpSigned,
    /// `op target` — unsigned absolute word index, scaled by 4.
    JumpUnsigned,
    /// `op rd` — a single register operand.
    Reg,
    /// No operands.
    Bare,
}

macro_rules! opcodes {
    ($($variant:ident => $shape:expr, $mnemonic:expr;)+) => {
        #[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive)]
        pub enum Op {
            $($variant,)+
        }

        impl Op {
            pub fn shape(self) -> Shape {
                match self {
                    $(Op::$variant => $shape,)+
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Op::$variant => $mnemonic,)+
                }
            }

            pub fn from_mnemonic(name: &str) -> Option<Op> {
                let upper = name.to_ascii_uppercase();
                match upper.as_str() {
                    $($mnemonic => Some(Op::$variant),)+
                    _ => None,
                }
            }

            pub const ALL: &'static [Op] = &[$(Op::$variant,)+];
        }
    };
}

opcodes! {
    // Arithmetic / logic, register-register                    | Shape | Mnemonic
    Add    => Shape::RRR, "ADD";
    Sub    => Shape::RRR, "SUB";
    Mul    => Shape::RRR, "MUL";
    Mulu   => Shape::RRR, "MULU";
    Div    => Shape::RRR, "DIV";
    Divu   => Shape::RRR, "DIVU";
    And    => Shape::RRR, "AND";
    Or     => Shape::RRR, "OR";
    Xor    => Shape::RRR, "XOR";
    Sll    => Shape::RRR, "SLL";
    Srl    => Shape::RRR, "SRL";

    // Arithmetic / logic, register-immediate
    Addi   => Shape::RRISigned, "ADDI";
    Subi   => Shape::RRISigned, "SUBI";
    Xori   => Shape::RRISigned, "XORI";
    Andi   => Shape::RRIZeroExt, "ANDI";
    Ori    => Shape::RRIZeroExt, "ORI";
    Slli   => Shape::RRIShift, "SLLI";
    Srli   => Shape::RRIShift, "SRLI";
    Lui    => Shape::RI, "LUI";

    // Loads / stores
    Lb     => Shape::Load, "LB";
    Lbu    => Shape::Load, "LBU";
    Lh     => Shape::Load, "LH";
    Lhu    => Shape::Load, "LHU";
    Lw     => Shape::Load, "LW";
    Sb     => Shape::Store, "SB";
    Sh     => Shape::Store, "SH";
    Sw     => Shape::Store, "SW";

    // Conditional branches
    Beq    => Shape::Branch, "BEQ";
    Bne    => Shape::Branch, "BNE";
    Blt    => Shape::Branch, "BLT";
    Ble    => Shape::Branch, "BLE";
    Bgt    => Shape::Branch, "BGT";
    Bge    => Shape::Branch, "BGE";
    Bltu   => Shape::Branch, "BLTU";
    Bleu   => Shape::Branch, "BLEU";
    Bgtu   => Shape::Branch, "BGTU";
    Bgeu   => Shape::Branch, "BGEU";

    // Unconditional control flow
    B      => Shape::JumpSigned, "B";
    Call   => Shape::JumpUnsigned, "CALL";
    Jr     => Shape::Reg, "JR";
    Eret   => Shape::Bare, "ERET";
    Halt   => Shape::Bare, "HALT";
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Decoded fields of an instruction word, before shape-specific interpretation.
#[derive(Clone, Copy, Debug)]
pub struct RawFields {
    pub field_a: usize,
    pub field_b: usize,
    pub field_c: usize,
    pub imm16: Immediate,
    /// The 26-bit address/index field, sign-extended — meaningful for `B`.
    pub address_signed: Address,
    /// The same 26-bit field, zero-extended — meaningful for `CALL`.
    pub address_unsigned: u32,
}

pub fn raw_fields(instruction: Word) -> RawFields {
    let field_a = ((instruction & constants::FIELD_A_MASK) >> constants::FIELD_A_OFFSET) as usize;
    let field_b = ((instruction & constants::FIELD_B_MASK) >> constants::FIELD_B_OFFSET) as usize;
    let field_c = ((instruction & constants::FIELD_C_MASK) >> constants::FIELD_C_OFFSET) as usize;
    let imm16 = ((instruction & constants::IMMEDIATE_MASK) >> constants::IMMEDIATE_OFFSET) as i16;

    let address_unsigned = (instruction & constants::ADDRESS_MASK) >> constants::ADDRESS_OFFSET;
    let mut address_signed = address_unsigned;
    if (address_signed & constants::ADDRESS_SIGN_MASK) != 0 {
        address_signed |= constants::ADDRESS_EXTENSION;
    }

    RawFields {
        field_a,
        field_b,
        field_c,
        imm16,
        address_signed: address_signed as Address,
        address_unsigned,
    }
}

fn opcode_bits(op: Op) -> u32 {
    op.to_u32().expect("Op always fits in u32")
}

/// Decodes the opcode bits of `instruction`, returning `None` for an unassigned opcode.
pub fn decode_op(instruction: Word) -> Option<Op> {
    let bits = (instruction & constants::OPCODE_MASK) >> constants::OPCODE_OFFSET;
    FromPrimitive::from_u32(bits)
}

fn pack(op: Op, field_a: u32, field_b: u32, field_c: u32, imm_or_addr: u32) -> Word {
    let mut word = (opcode_bits(op) << constants::OPCODE_OFFSET) & constants::OPCODE_MASK;

    match op.shape() {
        Shape::JumpSigned | Shape::JumpUnsigned => {
            word |= (imm_or_addr << constants::ADDRESS_OFFSET) & constants::ADDRESS_MASK;
        }
        Shape::Branch => {
            word |= (field_a << constants::FIELD_A_OFFSET) & constants::FIELD_A_MASK;
            word |= (field_b << constants::FIELD_B_OFFSET) & constants::FIELD_B_MASK;
            word |= (imm_or_addr << constants::IMMEDIATE_OFFSET) & constants::IMMEDIATE_MASK;
        }
        Shape::RRR => {
            word |= (field_a << constants::FIELD_A_OFFSET) & constants::FIELD_A_MASK;
            word |= (field_b << constants::FIELD_B_OFFSET) & constants::FIELD_B_MASK;
            word |= (field_c << constants::FIELD_C_OFFSET) & constants::FIELD_C_MASK;
        }
        Shape::Reg => {
            word |= (field_a << constants::FIELD_A_OFFSET) & constants::FIELD_A_MASK;
        }
        Shape::Bare => {}
        Shape::RRISigned | Shape::RRIZeroExt | Shape::RRIShift | Shape::RI | Shape::Load
        | Shape::Store => {
            word |= (field_a << constants::FIELD_A_OFFSET) & constants::FIELD_A_MASK;
            word |= (field_b << constants::FIELD_B_OFFSET) & constants::FIELD_B_MASK;
            word |= (imm_or_addr << constants::IMMEDIATE_OFFSET) & constants::IMMEDIATE_MASK;
        }
    }

    word
}

/// Encodes an `rd, rs, rt` instruction.
pub fn encode_rrr(op: Op, rd: u8, rs: u8, rt: u8) -> Word {
    debug_assert_eq!(op.shape(), Shape::RRR);
    pack(op, rd as u32, rs as u32, rt as u32, 0)
}

/// Encodes `rd, rs, imm16` (also used by `Load`/`RI`, with the unused register field set to 0).
pub fn encode_rri(op: Op, rd: u8, rs: u8, imm16: Immediate) -> Word {
    pack(op, rd as u32, rs as u32, 0, imm16 as u16 as u32)
}

/// Encodes a branch: `rs`, `rt`, and a 16-bit word offset (already divided by 4).
pub fn encode_branch(op: Op, rs: u8, rt: u8, word_offset16: Immediate) -> Word {
    debug_assert_eq!(op.shape(), Shape::Branch);
    pack(op, rs as u32, rt as u32, 0, word_offset16 as u16 as u32)
}

/// Encodes an unconditional jump/call: a 26-bit word offset or word index.
pub fn encode_jump(op: Op, word_value26: u32) -> Word {
    debug_assert!(matches!(op.shape(), Shape::JumpSigned | Shape::JumpUnsigned));
    pack(op, 0, 0, 0, word_value26 & constants::ADDRESS_MASK)
}

/// Encodes a single-register instruction (`JR`).
pub fn encode_reg(op: Op, rd: u8) -> Word {
    debug_assert_eq!(op.shape(), Shape::Reg);
    pack(op, rd as u32, 0, 0, 0)
}

/// Encodes a no-operand instruction (`ERET`, `HALT`).
pub fn encode_bare(op: Op) -> Word {
    debug_assert_eq!(op.shape(), Shape::Bare);
    pack(op, 0, 0, 0, 0)
}

/// Encodes a store instruction proper (`SB`/`SH`/`SW`): `base_rd` holds the
/// base address register, `value_rs` holds the register being stored.
pub fn encode_store_op(op: Op, base_rd: u8, value_rs: u8, imm16: Immediate) -> Word {
    debug_assert_eq!(op.shape(), Shape::Store);
    pack(op, base_rd as u32, value_rs as u32, 0, imm16 as u16 as u32)
}

/// Resolves a register alias (e.g. `sp`, `ra`, `zero`) or a raw `r<N>` name
/// to its numeric register id, case-insensitively.
pub fn register_from_name(name: &str) -> Option<u8> {
    let lower = name.to_ascii_lowercase();
    for (id, names) in REGISTER_NAMES.iter().enumerate() {
        if names.iter().any(|n| *n == lower) {
            return Some(id as u8);
        }
    }
    if let Some(rest) = lower.strip_prefix('r') {
        if let Ok(id) = rest.parse::<u8>() {
            if (id as usize) < constants::REGISTER_COUNT {
                return Some(id);
            }
        }
    }
    None
}

/// Canonical display name for a register: the primary alias if `use_alias`
/// is set, otherwise `$rN`.
pub fn register_display_name(id: u8, use_alias: bool) -> String {
    if use_alias {
        if let Some(name) = REGISTER_NAMES[id as usize].first() {
            return format!("${}", name);
        }
    }
    format!("$r{}", id)
}

/// Every register's accepted alias names, lowercase, indexed by register id.
/// The first entry of each row is the canonical display alias.
pub static REGISTER_NAMES: [&[&str]; constants::REGISTER_COUNT] = [
    &["zero"],
    &["at"],
    &["v0"],
    &["v1"],
    &["a0"],
    &["a1"],
    &["a2"],
    &["a3"],
    &["t0"],
    &["t1"],
    &["t2"],
    &["t3"],
    &["t4"],
    &["t5"],
    &["t6"],
    &["t7"],
    &["s0"],
    &["s1"],
    &["s2"],
    &["s3"],
    &["s4"],
    &["s5"],
    &["s6"],
    &["s7"],
    &["t8"],
    &["t9"],
    &["k0"],
    &["k1"],
    &["gp"],
    &["sp"],
    &[],
    &["ra"],
];
