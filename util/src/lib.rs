/// Byte order shared by every on-disk and in-memory word format in the
/// workspace (object images, executables, flat memory).
pub type Endian = byteorder::LittleEndian;
