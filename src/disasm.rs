//! Reverses the encoder: given a word and the address it was fetched from,
//! produces the canonical textual form of the instruction.

use super::isa::{self, Op, Shape};
use super::Word;

/// Renders `instruction` (fetched from `address`) as text. Register names
/// use aliases when `use_alias` is set, otherwise `$rN`.
///
/// Unrecognized opcodes render as a raw hex word rather than panicking —
/// the debug shell must be able to show garbage memory without crashing.
pub fn disassemble(instruction: Word, address: u32, use_alias: bool) -> String {
    let op = match isa::decode_op(instruction) {
        Some(op) => op,
        None => return format!(".word 0x{:08x}", instruction),
    };

    let fields = isa::raw_fields(instruction);
    let reg = |id: usize| isa::register_display_name(id as u8, use_alias);

    match op.shape() {
        Shape::RRR => format!(
            "{} {}, {}, {}",
            op,
            reg(fields.field_a),
            reg(fields.field_b),
            reg(fields.field_c)
        ),
        Shape::RRISigned | Shape::RRIZeroExt | Shape::RRIShift => format!(
            "{} {}, {}, {}",
            op,
            reg(fields.field_a),
            reg(fields.field_b),
            fields.imm16
        ),
        Shape::RI => format!("{} {}, {}", op, reg(fields.field_a), fields.imm16),
        Shape::Load => format!(
            "{} {}, {}({})",
            op,
            reg(fields.field_a),
            fields.imm16,
            reg(fields.field_b)
        ),
        Shape::Store => format!(
            "{} {}, {}({})",
            op,
            reg(fields.field_b),
            fields.imm16,
            reg(fields.field_a)
        ),
        Shape::Branch => {
            let target = (address as i32).wrapping_add(fields.imm16 as i32 * 4);
            format!(
                "{} {}, {}, 0x{:08x}",
                op,
                reg(fields.field_a),
                reg(fields.field_b),
                target as u32
            )
        }
        Shape::JumpSigned => {
            let target = (address as i32).wrapping_add(fields.address_signed * 4);
            format!("{} 0x{:08x}", op, target as u32)
        }
        Shape::JumpUnsigned => format!("{} 0x{:08x}", op, fields.address_unsigned * 4),
        Shape::Reg => format!("{} {}", op, reg(fields.field_a)),
        Shape::Bare => format!("{}", op),
    }
}
