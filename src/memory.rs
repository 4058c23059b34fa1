use super::constants;
use byteorder::ByteOrder;

type Endian = byteorder::LittleEndian;

/// Represents a memory storage unit with basic byte-range read and write
/// operations. All multi-byte conversions use [`Endian`] (little-endian),
/// matching the flat, byte-addressable memory model.
///
/// [`Endian`]: ./type.Endian.html
pub trait Storage {
    /// Returns the total length of the storage in bytes.
    fn length(&self) -> u32;

    /// Checks whether the range `[address..address+length]` is addressable.
    fn check_range(&self, address: u32, length: u32) -> bool;

    /// Immutably borrows a slice from `[address..address+length]`.
    ///
    /// # Errors
    /// Returns an error if the range is not addressable.
    fn borrow_slice(&self, address: u32, length: u32) -> Result<&[u8], ()>;

    /// Mutably borrows a slice from `[address..address+length]`.
    ///
    /// # Errors
    /// Returns an error if the range is not addressable.
    fn borrow_slice_mut(&mut self, address: u32, length: u32) -> Result<&mut [u8], ()>;

    /// Reads `size` bytes starting at `address` as an unsigned integer.
    ///
    /// # Panics
    /// Panics if `size < 1` or `size > 4`.
    fn read(&self, address: u32, size: u32) -> Result<u32, ()> {
        assert!((1..=4).contains(&size));
        Ok(Endian::read_uint(self.borrow_slice(address, size)?, size as usize) as u32)
    }

    fn read_byte(&self, address: u32) -> Result<u8, ()> {
        Ok(self.borrow_slice(address, constants::BYTE_BYTES)?[0])
    }

    fn read_half(&self, address: u32) -> Result<u16, ()> {
        Ok(Endian::read_u16(self.borrow_slice(address, constants::HALF_BYTES)?))
    }

    fn read_word(&self, address: u32) -> Result<u32, ()> {
        Ok(Endian::read_u32(self.borrow_slice(address, constants::WORD_BYTES)?))
    }

    /// Writes the low `size` bytes of `value` to `address`.
    ///
    /// # Panics
    /// Panics if `size < 1` or `size > 4`.
    fn write(&mut self, address: u32, size: u32, value: u32) -> Result<(), ()> {
        assert!((1..=4).contains(&size));
        Endian::write_uint(self.borrow_slice_mut(address, size)?, u64::from(value), size as usize);
        Ok(())
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), ()> {
        self.borrow_slice_mut(address, constants::BYTE_BYTES)?[0] = value;
        Ok(())
    }

    fn write_half(&mut self, address: u32, value: u16) -> Result<(), ()> {
        Endian::write_u16(self.borrow_slice_mut(address, constants::HALF_BYTES)?, value);
        Ok(())
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<(), ()> {
        Endian::write_u32(self.borrow_slice_mut(address, constants::WORD_BYTES)?, value);
        Ok(())
    }
}

/// The reason an aligned-access wrapper rejected a request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccessError {
    /// The address was not a multiple of the access size (2 for half, 4 for word).
    Misaligned,
    /// The address range fell outside the backing storage.
    OutOfRange,
}

fn from_storage_err(_: ()) -> AccessError {
    AccessError::OutOfRange
}

/// Aligned, spec-named accessors layered over [`Storage`]: `load8`/`load16`/
/// `load32`/`store8`/`store16`/`store32`. Halfword accesses must land on an
/// even address and word accesses on an address divisible by 4; anything
/// else is a fatal [`AccessError::Misaligned`].
pub trait AlignedAccess: Storage {
    fn load8(&self, address: u32) -> Result<u8, AccessError> {
        self.read_byte(address).map_err(from_storage_err)
    }

    fn load16(&self, address: u32) -> Result<u16, AccessError> {
        if address % 2 != 0 {
            return Err(AccessError::Misaligned);
        }
        self.read_half(address).map_err(from_storage_err)
    }

    fn load32(&self, address: u32) -> Result<u32, AccessError> {
        if address % 4 != 0 {
            return Err(AccessError::Misaligned);
        }
        self.read_word(address).map_err(from_storage_err)
    }

    fn store8(&mut self, address: u32, value: u8) -> Result<(), AccessError> {
        self.write_byte(address, value).map_err(from_storage_err)
    }

    fn store16(&mut self, address: u32, value: u16) -> Result<(), AccessError> {
        if address % 2 != 0 {
            return Err(AccessError::Misaligned);
        }
        self.write_half(address, value).map_err(from_storage_err)
    }

    fn store32(&mut self, address: u32, value: u32) -> Result<(), AccessError> {
        if address % 4 != 0 {
            return Err(AccessError::Misaligned);
        }
        self.write_word(address, value).map_err(from_storage_err)
    }
}

impl<T: Storage + ?Sized> AlignedAccess for T {}

/// A contiguous block of flat, byte-addressable memory. Bytes outside any
/// loaded segment but inside the allocated length read as 0 and are
/// writable, giving the "flat model" the simulator relies on.
///
/// # Examples
/// ```
/// use luz::{Storage, Memory};
///
/// let memory = Memory::new(16);
/// assert_eq!(memory.length(), 16);
/// ```
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new(length: u32) -> Memory {
        Memory {
            data: vec![0; length as usize],
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }
}

impl Storage for Memory {
    fn length(&self) -> u32 {
        self.data.len() as u32
    }

    fn check_range(&self, address: u32, length: u32) -> bool {
        let len = self.data.len() as u32;
        address <= len && address.saturating_add(length) <= len
    }

    fn borrow_slice(&self, address: u32, length: u32) -> Result<&[u8], ()> {
        if self.check_range(address, length) {
            Ok(&self.data[address as usize..(address + length) as usize])
        } else {
            Err(())
        }
    }

    fn borrow_slice_mut(&mut self, address: u32, length: u32) -> Result<&mut [u8], ()> {
        if self.check_range(address, length) {
            Ok(&mut self.data[address as usize..(address + length) as usize])
        } else {
            Err(())
        }
    }
}

impl<'a> From<&'a [u8]> for Memory {
    fn from(s: &'a [u8]) -> Memory {
        Memory { data: Vec::from(s) }
    }
}

pub mod composite;
pub mod peripheral;
