//! Merges one or more `luzobj::ObjectImage`s into a single linked
//! `luzobj::Executable`: same-named segments concatenate in input order,
//! symbols resolve against the union of exported globals, and each
//! relocation patches the field its [`luzobj::FieldShape`] describes.

use std::collections::HashMap;
use std::error;
use std::fmt;

use luz::constants;
use luzobj::{Executable, ExecutableSegment, FieldShape, ObjectImage, Relocation, RelocationTarget};

#[derive(Debug)]
pub enum LinkError {
    UnresolvedExternal(String),
    DuplicateGlobal(String),
    MisalignedTarget { symbol: String },
    FieldOverflow { symbol: String, value: i64 },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinkError::UnresolvedExternal(name) => write!(f, "unresolved external symbol \"{}\"", name),
            LinkError::DuplicateGlobal(name) => write!(f, "duplicate global symbol \"{}\"", name),
            LinkError::MisalignedTarget { symbol } => write!(f, "relocation target for \"{}\" is not word-aligned", symbol),
            LinkError::FieldOverflow { symbol, value } => {
                write!(f, "relocated value {} for \"{}\" does not fit its field", value, symbol)
            }
        }
    }
}

impl error::Error for LinkError {}

type Result<T> = std::result::Result<T, LinkError>;

const DATA_SEGMENT: &str = "data";

/// Links `objects` in input order into a single executable image.
pub fn link(objects: &[ObjectImage]) -> Result<Executable> {
    let segment_order = segment_placement_order(objects);

    // Concatenate same-named segments across objects, recording each
    // object's byte offset within the merged segment.
    let mut merged: HashMap<String, Vec<u8>> = segment_order.iter().map(|n| (n.clone(), Vec::new())).collect();
    let mut placement: Vec<HashMap<String, u32>> = Vec::with_capacity(objects.len());
    for object in objects {
        let mut object_placement = HashMap::new();
        for segment in &object.segments {
            let buf = merged.get_mut(&segment.name).expect("segment registered in segment_order");
            object_placement.insert(segment.name.clone(), buf.len() as u32);
            buf.extend_from_slice(&segment.bytes);
        }
        placement.push(object_placement);
    }

    // `code` starts at the fixed convention address; every later segment
    // follows immediately, 4-byte aligned.
    let mut base: HashMap<String, u32> = HashMap::new();
    let mut cursor = constants::CODE_BASE;
    for name in &segment_order {
        base.insert(name.clone(), cursor);
        cursor = align4(cursor + merged[name].len() as u32);
    }

    // Every object's own symbols resolve locally; symbols also marked
    // `.global` additionally populate the table externs resolve against.
    let mut globals: HashMap<String, u32> = HashMap::new();
    let mut locals: Vec<HashMap<String, u32>> = Vec::with_capacity(objects.len());
    for (index, object) in objects.iter().enumerate() {
        let mut object_locals = HashMap::new();
        for symbol in &object.symbols {
            let absolute = base[&symbol.segment] + placement[index][&symbol.segment] + symbol.offset;
            object_locals.insert(symbol.name.clone(), absolute);
            if symbol.global && globals.insert(symbol.name.clone(), absolute).is_some() {
                return Err(LinkError::DuplicateGlobal(symbol.name.clone()));
            }
        }
        locals.push(object_locals);
    }

    for (index, object) in objects.iter().enumerate() {
        for relocation in &object.relocations {
            let resolved = match &relocation.target {
                RelocationTarget::Constant(value) => *value as u32,
                RelocationTarget::Symbol(name) => locals[index]
                    .get(name)
                    .or_else(|| globals.get(name))
                    .copied()
                    .ok_or_else(|| LinkError::UnresolvedExternal(name.clone()))?,
            };
            apply_relocation(&mut merged, &base, &placement[index], relocation, resolved)?;
        }
    }

    let entry = globals
        .get(constants::ENTRY_SYMBOL)
        .copied()
        .ok_or_else(|| LinkError::UnresolvedExternal(constants::ENTRY_SYMBOL.to_string()))?;

    let segments = segment_order
        .into_iter()
        .map(|name| {
            let segment_base = base[&name];
            let bytes = merged.remove(&name).unwrap_or_default();
            ExecutableSegment { name, base: segment_base, bytes }
        })
        .collect();

    Ok(Executable { entry, segments })
}

/// `code` first, then `data`, then every other segment name in the order it
/// first appears across the input objects.
fn segment_placement_order(objects: &[ObjectImage]) -> Vec<String> {
    let mut order = vec!["code".to_string(), DATA_SEGMENT.to_string()];
    for object in objects {
        for segment in &object.segments {
            if !order.contains(&segment.name) {
                order.push(segment.name.clone());
            }
        }
    }
    order
}

fn align4(n: u32) -> u32 {
    (n + 3) & !3
}

fn relocation_symbol_label(relocation: &Relocation) -> String {
    match &relocation.target {
        RelocationTarget::Symbol(name) => name.clone(),
        RelocationTarget::Constant(value) => value.to_string(),
    }
}

fn apply_relocation(
    merged: &mut HashMap<String, Vec<u8>>,
    base: &HashMap<String, u32>,
    placement: &HashMap<String, u32>,
    relocation: &Relocation,
    resolved_address: u32,
) -> Result<()> {
    let site_absolute = base[&relocation.segment] + placement[&relocation.segment] + relocation.offset;
    let at = relocation.offset as usize;
    let buf = merged.get_mut(&relocation.segment).expect("relocation targets a known segment");
    let label = || relocation_symbol_label(relocation);

    match relocation.shape {
        FieldShape::Word32 => {
            buf[at..at + 4].copy_from_slice(&resolved_address.to_le_bytes());
        }
        FieldShape::Imm16 => {
            if resolved_address > 0xFFFF {
                return Err(LinkError::FieldOverflow { symbol: label(), value: i64::from(resolved_address) });
            }
            patch_field(buf, at, resolved_address & 0xFFFF, constants::IMMEDIATE_MASK, constants::IMMEDIATE_OFFSET);
        }
        FieldShape::Imm16High => {
            let value = (resolved_address >> 16) & 0xFFFF;
            if value > 0xFFFF {
                return Err(LinkError::FieldOverflow { symbol: label(), value: i64::from(value) });
            }
            patch_field(buf, at, value, constants::IMMEDIATE_MASK, constants::IMMEDIATE_OFFSET);
        }
        FieldShape::Imm16Low => {
            let value = resolved_address & 0xFFFF;
            if value > 0xFFFF {
                return Err(LinkError::FieldOverflow { symbol: label(), value: i64::from(value) });
            }
            patch_field(buf, at, value, constants::IMMEDIATE_MASK, constants::IMMEDIATE_OFFSET);
        }
        FieldShape::BranchOffset16 => {
            let word_offset = word_delta(resolved_address, site_absolute, label())?;
            if word_offset < i64::from(i16::MIN) || word_offset > i64::from(i16::MAX) {
                return Err(LinkError::FieldOverflow { symbol: label(), value: word_offset });
            }
            patch_field(buf, at, (word_offset as i16) as u16 as u32, constants::IMMEDIATE_MASK, constants::IMMEDIATE_OFFSET);
        }
        FieldShape::JumpSigned26 => {
            let word_offset = word_delta(resolved_address, site_absolute, label())?;
            if word_offset < -(1 << 25) || word_offset > (1 << 25) - 1 {
                return Err(LinkError::FieldOverflow { symbol: label(), value: word_offset });
            }
            patch_field(buf, at, word_offset as u32, constants::ADDRESS_MASK, constants::ADDRESS_OFFSET);
        }
        FieldShape::JumpUnsigned26 => {
            if resolved_address % 4 != 0 {
                return Err(LinkError::MisalignedTarget { symbol: label() });
            }
            let word_index = resolved_address / 4;
            if word_index > constants::ADDRESS_MASK {
                return Err(LinkError::FieldOverflow { symbol: label(), value: i64::from(word_index) });
            }
            patch_field(buf, at, word_index, constants::ADDRESS_MASK, constants::ADDRESS_OFFSET);
        }
    }
    Ok(())
}

fn word_delta(resolved_address: u32, site_absolute: u32, symbol: String) -> Result<i64> {
    let delta = i64::from(resolved_address) - i64::from(site_absolute);
    if delta % 4 != 0 {
        return Err(LinkError::MisalignedTarget { symbol });
    }
    Ok(delta / 4)
}

fn patch_field(buf: &mut [u8], at: usize, field_value: u32, mask: u32, offset: u32) {
    let mut word = u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
    word &= !mask;
    word |= (field_value << offset) & mask;
    buf[at..at + 4].copy_from_slice(&word.to_le_bytes());
}
