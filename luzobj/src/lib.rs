//! Relocatable object images (the assembler's output) and linked executable
//! images (the linker's output), serialized as small length-prefixed binary
//! record streams so `lasm assemble -o` produces a real artifact that
//! `luzld`/`luz-cli link` can read back.

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::error;
use std::fmt;
use std::io::{self, Read, Write};

type Endian = util::Endian;

const OBJECT_MAGIC: u32 = 0x4C5A_4F42; // "LZOB"
const EXECUTABLE_MAGIC: u32 = 0x4C5A_4558; // "LZEX"

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    BadMagic(u32),
    InvalidFieldShape(u8),
    InvalidRelocationTarget(u8),
    StringNotUtf8,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::BadMagic(found) => write!(f, "bad magic number: 0x{:08x}", found),
            Error::InvalidFieldShape(tag) => write!(f, "invalid relocation field shape tag {}", tag),
            Error::InvalidRelocationTarget(tag) => write!(f, "invalid relocation target tag {}", tag),
            Error::StringNotUtf8 => write!(f, "string field is not valid UTF-8"),
        }
    }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Extension methods layered over `Read` for the primitives the image
/// formats need: fixed-width integers and length-prefixed byte strings.
pub trait ReadLuzExt: Read {
    fn read_u8_field(&mut self) -> Result<u8> {
        Ok(self.read_u8()?)
    }

    fn read_u32_field(&mut self) -> Result<u32> {
        Ok(self.read_u32::<Endian>()?)
    }

    fn read_bytes_field(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_string_field(&mut self) -> Result<String> {
        let len = self.read_u32::<Endian>()? as usize;
        let bytes = self.read_bytes_field(len)?;
        String::from_utf8(bytes).map_err(|_| Error::StringNotUtf8)
    }
}

impl<R: Read + ?Sized> ReadLuzExt for R {}

/// Extension methods layered over `Write`, mirroring [`ReadLuzExt`].
pub trait WriteLuzExt: Write {
    fn write_u8_field(&mut self, value: u8) -> Result<()> {
        Ok(self.write_u8(value)?)
    }

    fn write_u32_field(&mut self, value: u32) -> Result<()> {
        Ok(self.write_u32::<Endian>(value)?)
    }

    fn write_bytes_field(&mut self, bytes: &[u8]) -> Result<()> {
        Ok(self.write_all(bytes)?)
    }

    fn write_string_field(&mut self, value: &str) -> Result<()> {
        self.write_u32_field(value.len() as u32)?;
        self.write_bytes_field(value.as_bytes())
    }
}

impl<W: Write + ?Sized> WriteLuzExt for W {}

/// The bit field a relocation patches, matching the three immediate kinds
/// the ISA encodes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldShape {
    /// 16-bit absolute immediate (`ADDI`/`ANDI`/`ORI`/loads/stores/…).
    Imm16,
    /// 16-bit signed branch offset, scaled by 4.
    BranchOffset16,
    /// 26-bit signed word offset (`B`), scaled by 4.
    JumpSigned26,
    /// 26-bit unsigned absolute word index (`CALL`), scaled by 4.
    JumpUnsigned26,
    /// Upper 16 bits of a 32-bit absolute address (the `LUI` half of `LI`).
    Imm16High,
    /// Lower 16 bits of a 32-bit absolute address (the `ORI` half of `LI`).
    Imm16Low,
    /// A full 32-bit absolute address, written as a raw little-endian word
    /// rather than patched into an instruction (`.word` entries).
    Word32,
}

impl FieldShape {
    fn tag(self) -> u8 {
        match self {
            FieldShape::Imm16 => 0,
            FieldShape::BranchOffset16 => 1,
            FieldShape::JumpSigned26 => 2,
            FieldShape::JumpUnsigned26 => 3,
            FieldShape::Imm16High => 4,
            FieldShape::Imm16Low => 5,
            FieldShape::Word32 => 6,
        }
    }

    fn from_tag(tag: u8) -> Result<FieldShape> {
        match tag {
            0 => Ok(FieldShape::Imm16),
            1 => Ok(FieldShape::BranchOffset16),
            2 => Ok(FieldShape::JumpSigned26),
            3 => Ok(FieldShape::JumpUnsigned26),
            4 => Ok(FieldShape::Imm16High),
            5 => Ok(FieldShape::Imm16Low),
            6 => Ok(FieldShape::Word32),
            _ => Err(Error::InvalidFieldShape(tag)),
        }
    }
}

/// What a relocation resolves against.
#[derive(Clone, Debug)]
pub enum RelocationTarget {
    Symbol(String),
    Constant(i64),
}

/// A deferred patch: once `target` is known, the field described by `shape`
/// at `offset` bytes into `segment` is overwritten.
#[derive(Clone, Debug)]
pub struct Relocation {
    pub segment: String,
    pub offset: u32,
    pub shape: FieldShape,
    pub target: RelocationTarget,
}

impl Relocation {
    fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_string_field(&self.segment)?;
        w.write_u32_field(self.offset)?;
        w.write_u8_field(self.shape.tag())?;
        match &self.target {
            RelocationTarget::Symbol(name) => {
                w.write_u8_field(0)?;
                w.write_string_field(name)?;
            }
            RelocationTarget::Constant(value) => {
                w.write_u8_field(1)?;
                w.write_u32_field(*value as u32)?;
            }
        }
        Ok(())
    }

    fn read_from<R: Read + ?Sized>(r: &mut R) -> Result<Relocation> {
        let segment = r.read_string_field()?;
        let offset = r.read_u32_field()?;
        let shape = FieldShape::from_tag(r.read_u8_field()?)?;
        let target_tag = r.read_u8_field()?;
        let target = match target_tag {
            0 => RelocationTarget::Symbol(r.read_string_field()?),
            1 => RelocationTarget::Constant(r.read_u32_field()? as i32 as i64),
            _ => return Err(Error::InvalidRelocationTarget(target_tag)),
        };
        Ok(Relocation {
            segment,
            offset,
            shape,
            target,
        })
    }
}

/// A named address exported or referenced across object images.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub segment: String,
    pub offset: u32,
    pub global: bool,
}

impl Symbol {
    fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_string_field(&self.name)?;
        w.write_string_field(&self.segment)?;
        w.write_u32_field(self.offset)?;
        w.write_u8_field(self.global as u8)
    }

    fn read_from<R: Read + ?Sized>(r: &mut R) -> Result<Symbol> {
        Ok(Symbol {
            name: r.read_string_field()?,
            segment: r.read_string_field()?,
            offset: r.read_u32_field()?,
            global: r.read_u8_field()? != 0,
        })
    }
}

/// A named, ordered byte sequence (`code`, `data`, or a user-defined name).
#[derive(Clone, Debug)]
pub struct Segment {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Segment {
    fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_string_field(&self.name)?;
        w.write_u32_field(self.bytes.len() as u32)?;
        w.write_bytes_field(&self.bytes)
    }

    fn read_from<R: Read + ?Sized>(r: &mut R) -> Result<Segment> {
        let name = r.read_string_field()?;
        let len = r.read_u32_field()? as usize;
        let bytes = r.read_bytes_field(len)?;
        Ok(Segment { name, bytes })
    }
}

/// The assembler's output: segments plus the symbols and relocations needed
/// to link one or more of these together into an [`Executable`].
#[derive(Clone, Debug, Default)]
pub struct ObjectImage {
    pub segments: Vec<Segment>,
    pub symbols: Vec<Symbol>,
    pub relocations: Vec<Relocation>,
}

impl ObjectImage {
    pub fn new() -> ObjectImage {
        ObjectImage::default()
    }

    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name == name)
    }

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_u32_field(OBJECT_MAGIC)?;
        w.write_u32_field(self.segments.len() as u32)?;
        for segment in &self.segments {
            segment.write_to(w)?;
        }
        w.write_u32_field(self.symbols.len() as u32)?;
        for symbol in &self.symbols {
            symbol.write_to(w)?;
        }
        w.write_u32_field(self.relocations.len() as u32)?;
        for relocation in &self.relocations {
            relocation.write_to(w)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> Result<ObjectImage> {
        let magic = r.read_u32_field()?;
        if magic != OBJECT_MAGIC {
            return Err(Error::BadMagic(magic));
        }
        let segment_count = r.read_u32_field()?;
        let segments = (0..segment_count)
            .map(|_| Segment::read_from(r))
            .collect::<Result<Vec<_>>>()?;
        let symbol_count = r.read_u32_field()?;
        let symbols = (0..symbol_count)
            .map(|_| Symbol::read_from(r))
            .collect::<Result<Vec<_>>>()?;
        let relocation_count = r.read_u32_field()?;
        let relocations = (0..relocation_count)
            .map(|_| Relocation::read_from(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(ObjectImage {
            segments,
            symbols,
            relocations,
        })
    }
}

/// One segment placed at its final absolute address in a linked executable.
#[derive(Clone, Debug)]
pub struct ExecutableSegment {
    pub name: String,
    pub base: u32,
    pub bytes: Vec<u8>,
}

/// The linker's output: concatenated, placed segments plus an entry point.
#[derive(Clone, Debug)]
pub struct Executable {
    pub entry: u32,
    pub segments: Vec<ExecutableSegment>,
}

impl Executable {
    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_u32_field(EXECUTABLE_MAGIC)?;
        w.write_u32_field(self.entry)?;
        w.write_u32_field(self.segments.len() as u32)?;
        for segment in &self.segments {
            w.write_string_field(&segment.name)?;
            w.write_u32_field(segment.base)?;
            w.write_u32_field(segment.bytes.len() as u32)?;
            w.write_bytes_field(&segment.bytes)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> Result<Executable> {
        let magic = r.read_u32_field()?;
        if magic != EXECUTABLE_MAGIC {
            return Err(Error::BadMagic(magic));
        }
        let entry = r.read_u32_field()?;
        let segment_count = r.read_u32_field()?;
        let mut segments = Vec::with_capacity(segment_count as usize);
        for _ in 0..segment_count {
            let name = r.read_string_field()?;
            let base = r.read_u32_field()?;
            let len = r.read_u32_field()? as usize;
            let bytes = r.read_bytes_field(len)?;
            segments.push(ExecutableSegment { name, base, bytes });
        }
        Ok(Executable { entry, segments })
    }
}
