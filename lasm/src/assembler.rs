//! Two-pass assembler core.
//!
//! Pseudo-instructions are expanded first, so both passes only ever see real
//! opcodes. Pass 1 walks the expanded statements tracking each segment's
//! write cursor, recording every label's `(segment, offset)` and every
//! `.define` constant. Pass 2 re-walks the same statements, this time
//! emitting bytes: a `.define` name resolves to its literal value directly,
//! but any other symbol reference becomes a [`Relocation`] — this object's
//! own placement within a segment, and the segment's own final base address,
//! are only known once the linker has merged every input object.

use std::collections::{HashMap, HashSet};

use luz::isa::{self, Op, Shape};
use luzobj::{FieldShape, ObjectImage, Relocation, RelocationTarget, Segment, Symbol};

use super::error::{AssembleError, SourceLocation};
use super::parser::{Directive, ImmediateOperand, Located, Operand, Statement};

const DEFAULT_SEGMENT: &str = "code";

pub fn assemble(source: &str) -> Result<ObjectImage, AssembleError> {
    let tokens = super::lexer::tokenize(source)?;
    let statements = super::parser::parse(tokens)?;
    let expanded = expand_pseudo(statements)?;
    let symtab = first_pass(&expanded)?;
    second_pass(&expanded, &symtab)
}

fn expand_pseudo(statements: Vec<Located<Statement>>) -> Result<Vec<Located<Statement>>, AssembleError> {
    let mut expanded = Vec::with_capacity(statements.len());
    for located in statements {
        let location = located.location;
        match located.value {
            Statement::Instruction { mnemonic, operands } => {
                expand_instruction(&mnemonic, operands, location, &mut expanded)?;
            }
            other => expanded.push(Located { value: other, location }),
        }
    }
    Ok(expanded)
}

fn push_real(out: &mut Vec<Located<Statement>>, location: SourceLocation, mnemonic: &str, operands: Vec<Operand>) {
    out.push(Located {
        value: Statement::Instruction {
            mnemonic: mnemonic.to_string(),
            operands,
        },
        location,
    });
}

fn expand_instruction(
    mnemonic: &str,
    operands: Vec<Operand>,
    location: SourceLocation,
    out: &mut Vec<Located<Statement>>,
) -> Result<(), AssembleError> {
    let zero = Operand::Register(0);
    match mnemonic.to_ascii_uppercase().as_str() {
        "NOP" => {
            expect_count(mnemonic, &operands, 0, location)?;
            push_real(
                out,
                location,
                "ADDI",
                vec![zero.clone(), zero, Operand::Immediate(ImmediateOperand::Integer(0))],
            );
        }
        "NOT" => {
            expect_count(mnemonic, &operands, 2, location)?;
            push_real(
                out,
                location,
                "XORI",
                vec![operands[0].clone(), operands[1].clone(), Operand::Immediate(ImmediateOperand::Integer(-1))],
            );
        }
        "MOVE" => {
            expect_count(mnemonic, &operands, 2, location)?;
            push_real(
                out,
                location,
                "ADDI",
                vec![operands[0].clone(), operands[1].clone(), Operand::Immediate(ImmediateOperand::Integer(0))],
            );
        }
        "NEG" => {
            expect_count(mnemonic, &operands, 2, location)?;
            push_real(out, location, "SUB", vec![operands[0].clone(), zero, operands[1].clone()]);
        }
        "BEQZ" => {
            expect_count(mnemonic, &operands, 2, location)?;
            push_real(out, location, "BEQ", vec![operands[0].clone(), zero, operands[1].clone()]);
        }
        "BNEZ" => {
            expect_count(mnemonic, &operands, 2, location)?;
            push_real(out, location, "BNE", vec![operands[0].clone(), zero, operands[1].clone()]);
        }
        "LLI" => {
            expect_count(mnemonic, &operands, 2, location)?;
            push_real(
                out,
                location,
                "ORI",
                vec![operands[0].clone(), operands[0].clone(), operands[1].clone()],
            );
        }
        "LI" => {
            expect_count(mnemonic, &operands, 2, location)?;
            let rd = operands[0].clone();
            let (high, low) = split_li_immediate(&operands[1], location)?;
            push_real(out, location, "LUI", vec![rd.clone(), Operand::Immediate(high)]);
            push_real(out, location, "ORI", vec![rd.clone(), rd, Operand::Immediate(low)]);
        }
        "RET" => {
            expect_count(mnemonic, &operands, 0, location)?;
            push_real(out, location, "JR", vec![Operand::Register(31)]);
        }
        _ => push_real(out, location, mnemonic, operands),
    }
    Ok(())
}

fn expect_count(mnemonic: &str, operands: &[Operand], count: usize, location: SourceLocation) -> Result<(), AssembleError> {
    if operands.len() != count {
        Err(AssembleError::WrongOperandCount {
            mnemonic: mnemonic.to_string(),
            expected: count,
            found: operands.len(),
            location,
        })
    } else {
        Ok(())
    }
}

fn split_li_immediate(
    operand: &Operand,
    location: SourceLocation,
) -> Result<(ImmediateOperand, ImmediateOperand), AssembleError> {
    match operand {
        Operand::Immediate(ImmediateOperand::Integer(value)) => {
            if *value < i64::from(i32::MIN) || *value > i64::from(u32::MAX) {
                return Err(AssembleError::ImmediateOutOfRange { value: *value, location });
            }
            let bits = *value as i64 as u32;
            let high = (bits >> 16) & 0xFFFF;
            let low = bits & 0xFFFF;
            Ok((ImmediateOperand::Integer(high as i64), ImmediateOperand::Integer(low as i64)))
        }
        Operand::Immediate(ImmediateOperand::Symbol(name)) => {
            Ok((ImmediateOperand::SymbolHigh(name.clone()), ImmediateOperand::SymbolLow(name.clone())))
        }
        _ => Err(AssembleError::BadOperandKind {
            mnemonic: "LI".to_string(),
            location,
        }),
    }
}

/// What pass 1 learns about the program as a whole.
struct SymbolTable {
    labels: HashMap<String, (String, u32)>,
    globals: HashSet<String>,
    defines: HashMap<String, i64>,
    segment_order: Vec<String>,
}

fn resolve_define(op: &ImmediateOperand, defines: &HashMap<String, i64>, location: SourceLocation) -> Result<i64, AssembleError> {
    match op {
        ImmediateOperand::Integer(v) => Ok(*v),
        ImmediateOperand::Symbol(name) => defines
            .get(name)
            .copied()
            .ok_or_else(|| AssembleError::UndefinedConstant(name.clone(), location)),
        ImmediateOperand::SymbolHigh(_) | ImmediateOperand::SymbolLow(_) => {
            unreachable!("LI expansion operands never appear in a .define value")
        }
    }
}

fn first_pass(statements: &[Located<Statement>]) -> Result<SymbolTable, AssembleError> {
    let mut labels = HashMap::new();
    let mut globals = HashSet::new();
    let mut defines = HashMap::new();
    let mut segment_order = vec![DEFAULT_SEGMENT.to_string()];
    let mut cursor: HashMap<String, u32> = HashMap::new();
    cursor.insert(DEFAULT_SEGMENT.to_string(), 0);
    let mut current = DEFAULT_SEGMENT.to_string();

    for located in statements {
        let location = located.location;
        match &located.value {
            Statement::Label(name) => {
                if labels.contains_key(name) {
                    return Err(AssembleError::DuplicateLabel(name.clone(), location));
                }
                let offset = cursor[&current];
                labels.insert(name.clone(), (current.clone(), offset));
            }
            Statement::Directive(Directive::Segment(name)) => {
                current = name.clone();
                cursor.entry(current.clone()).or_insert(0);
                if !segment_order.contains(&current) {
                    segment_order.push(current.clone());
                }
            }
            Statement::Directive(Directive::Global(name)) => {
                if !globals.insert(name.clone()) {
                    return Err(AssembleError::DuplicateGlobal(name.clone(), location));
                }
            }
            Statement::Directive(Directive::Define(name, value)) => {
                if defines.contains_key(name) {
                    return Err(AssembleError::DuplicateDefine(name.clone(), location));
                }
                let resolved = resolve_define(value, &defines, location)?;
                defines.insert(name.clone(), resolved);
            }
            Statement::Directive(Directive::Alloc(n)) => {
                *cursor.get_mut(&current).unwrap() += n;
            }
            Statement::Directive(Directive::Byte(bytes)) => {
                *cursor.get_mut(&current).unwrap() += bytes.len() as u32;
            }
            Statement::Directive(Directive::Word(words)) => {
                *cursor.get_mut(&current).unwrap() += words.len() as u32 * 4;
            }
            Statement::Directive(Directive::String(s)) => {
                *cursor.get_mut(&current).unwrap() += s.len() as u32 + 1;
            }
            Statement::Instruction { .. } => {
                *cursor.get_mut(&current).unwrap() += 4;
            }
        }
    }

    Ok(SymbolTable {
        labels,
        globals,
        defines,
        segment_order,
    })
}

enum ResolvedField {
    Literal(i64),
    Relocated,
}

/// Resolves an operand's numeric value for pass 2: a `.define` name or a
/// literal integer resolves directly, anything else (a label, or a name
/// this object never defines) is deferred to a relocation at `(segment,
/// offset)` and returns a zero placeholder.
fn resolve_immediate_field(
    op: &ImmediateOperand,
    defines: &HashMap<String, i64>,
    default_shape: FieldShape,
    segment: &str,
    offset: u32,
    relocations: &mut Vec<Relocation>,
) -> ResolvedField {
    let mut emit = |shape: FieldShape, name: &str| {
        relocations.push(Relocation {
            segment: segment.to_string(),
            offset,
            shape,
            target: RelocationTarget::Symbol(name.to_string()),
        });
        ResolvedField::Relocated
    };
    match op {
        ImmediateOperand::Integer(v) => ResolvedField::Literal(*v),
        ImmediateOperand::Symbol(name) => match defines.get(name) {
            Some(v) => ResolvedField::Literal(*v),
            None => emit(default_shape, name),
        },
        ImmediateOperand::SymbolHigh(name) => emit(FieldShape::Imm16High, name),
        ImmediateOperand::SymbolLow(name) => emit(FieldShape::Imm16Low, name),
    }
}

fn check_range(value: i64, min: i64, max: i64, location: SourceLocation) -> Result<(), AssembleError> {
    if value < min || value > max {
        Err(AssembleError::ImmediateOutOfRange { value, location })
    } else {
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_and_check(
    op: &ImmediateOperand,
    defines: &HashMap<String, i64>,
    shape: FieldShape,
    segment: &str,
    offset: u32,
    relocations: &mut Vec<Relocation>,
    min: i64,
    max: i64,
    location: SourceLocation,
) -> Result<i16, AssembleError> {
    match resolve_immediate_field(op, defines, shape, segment, offset, relocations) {
        ResolvedField::Literal(v) => {
            check_range(v, min, max, location)?;
            Ok(v as i16)
        }
        ResolvedField::Relocated => Ok(0),
    }
}

fn encode_instruction(
    mnemonic: &str,
    operands: &[Operand],
    segment: &str,
    offset: u32,
    defines: &HashMap<String, i64>,
    relocations: &mut Vec<Relocation>,
    location: SourceLocation,
) -> Result<u32, AssembleError> {
    let op = Op::from_mnemonic(mnemonic).ok_or_else(|| AssembleError::UnknownMnemonic(mnemonic.to_string(), location))?;
    let shape = op.shape();

    let reg_at = |i: usize| -> Result<u8, AssembleError> {
        match operands.get(i) {
            Some(Operand::Register(id)) => Ok(*id),
            _ => Err(AssembleError::BadOperandKind {
                mnemonic: mnemonic.to_string(),
                location,
            }),
        }
    };
    let imm_at = |i: usize| -> Result<&ImmediateOperand, AssembleError> {
        match operands.get(i) {
            Some(Operand::Immediate(imm)) => Ok(imm),
            _ => Err(AssembleError::BadOperandKind {
                mnemonic: mnemonic.to_string(),
                location,
            }),
        }
    };
    let mem_at = |i: usize| -> Result<(&ImmediateOperand, u8), AssembleError> {
        match operands.get(i) {
            Some(Operand::Memory { offset, base }) => Ok((offset, *base)),
            _ => Err(AssembleError::BadOperandKind {
                mnemonic: mnemonic.to_string(),
                location,
            }),
        }
    };

    match shape {
        Shape::RRR => {
            expect_count(mnemonic, operands, 3, location)?;
            Ok(isa::encode_rrr(op, reg_at(0)?, reg_at(1)?, reg_at(2)?))
        }
        Shape::RRISigned => {
            expect_count(mnemonic, operands, 3, location)?;
            let (rd, rs) = (reg_at(0)?, reg_at(1)?);
            let imm = resolve_and_check(imm_at(2)?, defines, FieldShape::Imm16, segment, offset, relocations, -32768, 32767, location)?;
            Ok(isa::encode_rri(op, rd, rs, imm))
        }
        Shape::RRIZeroExt => {
            expect_count(mnemonic, operands, 3, location)?;
            let (rd, rs) = (reg_at(0)?, reg_at(1)?);
            let imm = resolve_and_check(imm_at(2)?, defines, FieldShape::Imm16, segment, offset, relocations, 0, 65535, location)?;
            Ok(isa::encode_rri(op, rd, rs, imm))
        }
        Shape::RRIShift => {
            expect_count(mnemonic, operands, 3, location)?;
            let (rd, rs) = (reg_at(0)?, reg_at(1)?);
            let imm = resolve_and_check(imm_at(2)?, defines, FieldShape::Imm16, segment, offset, relocations, 0, 31, location)?;
            Ok(isa::encode_rri(op, rd, rs, imm))
        }
        Shape::RI => {
            expect_count(mnemonic, operands, 2, location)?;
            let rd = reg_at(0)?;
            let imm = resolve_and_check(imm_at(1)?, defines, FieldShape::Imm16, segment, offset, relocations, 0, 65535, location)?;
            Ok(isa::encode_rri(op, rd, 0, imm))
        }
        Shape::Load => {
            expect_count(mnemonic, operands, 2, location)?;
            let rd = reg_at(0)?;
            let (mem_off, base) = mem_at(1)?;
            let imm = resolve_and_check(mem_off, defines, FieldShape::Imm16, segment, offset, relocations, -32768, 32767, location)?;
            Ok(isa::encode_rri(op, rd, base, imm))
        }
        Shape::Store => {
            expect_count(mnemonic, operands, 2, location)?;
            let value_reg = reg_at(0)?;
            let (mem_off, base) = mem_at(1)?;
            let imm = resolve_and_check(mem_off, defines, FieldShape::Imm16, segment, offset, relocations, -32768, 32767, location)?;
            Ok(isa::encode_store_op(op, base, value_reg, imm))
        }
        Shape::Branch => {
            expect_count(mnemonic, operands, 3, location)?;
            let (rs, rt) = (reg_at(0)?, reg_at(1)?);
            let imm = resolve_and_check(imm_at(2)?, defines, FieldShape::BranchOffset16, segment, offset, relocations, -32768, 32767, location)?;
            Ok(isa::encode_branch(op, rs, rt, imm))
        }
        Shape::JumpSigned => {
            expect_count(mnemonic, operands, 1, location)?;
            let imm = resolve_and_check(
                imm_at(0)?,
                defines,
                FieldShape::JumpSigned26,
                segment,
                offset,
                relocations,
                -(1 << 25),
                (1 << 25) - 1,
                location,
            )?;
            Ok(isa::encode_jump(op, imm as u32))
        }
        Shape::JumpUnsigned => {
            expect_count(mnemonic, operands, 1, location)?;
            let imm = match resolve_immediate_field(imm_at(0)?, defines, FieldShape::JumpUnsigned26, segment, offset, relocations) {
                ResolvedField::Literal(v) => {
                    check_range(v, 0, (1 << 26) - 1, location)?;
                    v as u32
                }
                ResolvedField::Relocated => 0,
            };
            Ok(isa::encode_jump(op, imm))
        }
        Shape::Reg => {
            expect_count(mnemonic, operands, 1, location)?;
            Ok(isa::encode_reg(op, reg_at(0)?))
        }
        Shape::Bare => {
            expect_count(mnemonic, operands, 0, location)?;
            Ok(isa::encode_bare(op))
        }
    }
}

fn second_pass(statements: &[Located<Statement>], symtab: &SymbolTable) -> Result<ObjectImage, AssembleError> {
    let mut bytes: HashMap<String, Vec<u8>> = symtab
        .segment_order
        .iter()
        .map(|name| (name.clone(), Vec::new()))
        .collect();
    let mut relocations = Vec::new();
    let mut current = DEFAULT_SEGMENT.to_string();

    for located in statements {
        let location = located.location;
        match &located.value {
            Statement::Label(_) | Statement::Directive(Directive::Global(_)) | Statement::Directive(Directive::Define(_, _)) => {}
            Statement::Directive(Directive::Segment(name)) => current = name.clone(),
            Statement::Directive(Directive::Alloc(n)) => {
                let buf = bytes.get_mut(&current).unwrap();
                buf.extend(std::iter::repeat(0u8).take(*n as usize));
            }
            Statement::Directive(Directive::Byte(data)) => {
                bytes.get_mut(&current).unwrap().extend_from_slice(data);
            }
            Statement::Directive(Directive::Word(words)) => {
                for word in words {
                    let offset = bytes[&current].len() as u32;
                    let value = match resolve_immediate_field(word, &symtab.defines, FieldShape::Word32, &current, offset, &mut relocations) {
                        ResolvedField::Literal(v) => v as u32,
                        ResolvedField::Relocated => 0,
                    };
                    bytes.get_mut(&current).unwrap().extend_from_slice(&value.to_le_bytes());
                }
            }
            Statement::Directive(Directive::String(s)) => {
                let buf = bytes.get_mut(&current).unwrap();
                buf.extend_from_slice(s.as_bytes());
                buf.push(0);
            }
            Statement::Instruction { mnemonic, operands } => {
                let offset = bytes[&current].len() as u32;
                let word = encode_instruction(mnemonic, operands, &current, offset, &symtab.defines, &mut relocations, location)?;
                bytes.get_mut(&current).unwrap().extend_from_slice(&word.to_le_bytes());
            }
        }
    }

    let segments = symtab
        .segment_order
        .iter()
        .map(|name| Segment {
            name: name.clone(),
            bytes: bytes.remove(name).unwrap_or_default(),
        })
        .collect();

    let symbols = symtab
        .labels
        .iter()
        .map(|(name, (segment, offset))| Symbol {
            name: name.clone(),
            segment: segment.clone(),
            offset: *offset,
            global: symtab.globals.contains(name),
        })
        .collect();

    Ok(ObjectImage {
        segments,
        symbols,
        relocations,
    })
}
