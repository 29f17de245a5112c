//! Decoding of the fixed-layout Mach-O headers needed to identify the CPU
//! architecture of a binary.
//!
//! Only two layouts are understood: the 64-bit single-architecture header
//! and the fat (universal) container header. The fat header stores its slice
//! count big-endian while the slice records and thin headers are read
//! little-endian, so each layout has its own decode function.
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use goblin::mach::cputype::{CpuSubType, CpuType};
use goblin::mach::fat::{FAT_MAGIC, SIZEOF_FAT_ARCH, SIZEOF_FAT_HEADER};
use goblin::mach::header::MH_MAGIC_64;

use crate::error::{Error, Result};
use crate::policy;

/// Magic of a 64-bit thin header when read little-endian.
pub const MACHO_64_MAGIC_LE: u32 = MH_MAGIC_64;
/// Magic of a fat header when read little-endian (`ca fe ba be` on disk).
pub const MACHO_UNIVERSAL_MAGIC_LE: u32 = FAT_MAGIC.swap_bytes();
/// Bytes needed to tell the two layouts apart.
pub const PREFIX_LEN: usize = SIZEOF_FAT_HEADER;
/// Size of one slice record following the fat header.
pub const FAT_ENTRY_STRIDE: usize = SIZEOF_FAT_ARCH;
/// The only slice count the policy knows how to reason about.
pub const SUPPORTED_SLICE_COUNT: u32 = 2;

/// One architecture slice listed in a fat header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatArchEntry {
    pub cpu_type: CpuType,
    pub cpu_subtype: CpuSubType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedHeader {
    SingleArch {
        magic: u32,
        cpu_type: CpuType,
    },
    Fat {
        magic: u32,
        slices: Vec<FatArchEntry>,
    },
    /// The file matched the Mach-O signature but its header could not be
    /// decoded (short file, 32-bit or big-endian thin header, truncated
    /// slice table).
    Unrecognized,
}

impl std::fmt::Display for ParsedHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsedHeader::SingleArch { cpu_type, .. } => {
                write!(f, "thin {}", policy::describe_cpu_type(*cpu_type))
            }
            ParsedHeader::Fat { slices, .. } => {
                let names: Vec<String> = slices
                    .iter()
                    .map(|slice| policy::describe_cpu_type(slice.cpu_type))
                    .collect();
                write!(f, "universal [{}]", names.join(", "))
            }
            ParsedHeader::Unrecognized => write!(f, "unrecognized header"),
        }
    }
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn read_u32_be(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_be_bytes(word)
}

/// Decodes a 64-bit thin header from the first eight bytes of a file.
pub fn decode_single_arch(prefix: &[u8; PREFIX_LEN]) -> Option<ParsedHeader> {
    let magic = read_u32_le(prefix, 0);
    if magic != MACHO_64_MAGIC_LE {
        return None;
    }
    Some(ParsedHeader::SingleArch {
        magic,
        cpu_type: read_u32_le(prefix, 4),
    })
}

/// Returns the big-endian slice count if `prefix` starts a fat header.
pub fn decode_fat_slice_count(prefix: &[u8; PREFIX_LEN]) -> Option<u32> {
    if read_u32_le(prefix, 0) != MACHO_UNIVERSAL_MAGIC_LE {
        return None;
    }
    Some(read_u32_be(prefix, 4))
}

/// Decodes the slice records that follow a fat header.
pub fn decode_fat_entries(table: &[u8]) -> Vec<FatArchEntry> {
    table
        .chunks_exact(FAT_ENTRY_STRIDE)
        .map(|record| FatArchEntry {
            cpu_type: read_u32_le(record, 0),
            cpu_subtype: read_u32_le(record, 4),
        })
        .collect()
}

fn check_slice_count(path: &Path, count: u32) -> Result<usize> {
    if count != SUPPORTED_SLICE_COUNT {
        return Err(Error::UnsupportedSliceCount {
            path: path.to_path_buf(),
            count,
        });
    }
    Ok(count as usize * FAT_ENTRY_STRIDE)
}

/// Decodes a header held in memory. `path` is only used for error reporting.
pub fn parse_header(path: &Path, bytes: &[u8]) -> Result<ParsedHeader> {
    let prefix = match bytes
        .get(..PREFIX_LEN)
        .and_then(|p| <&[u8; PREFIX_LEN]>::try_from(p).ok())
    {
        Some(prefix) => prefix,
        None => return Ok(ParsedHeader::Unrecognized),
    };
    if let Some(header) = decode_single_arch(prefix) {
        return Ok(header);
    }
    if let Some(count) = decode_fat_slice_count(prefix) {
        let table_len = check_slice_count(path, count)?;
        return Ok(match bytes.get(PREFIX_LEN..PREFIX_LEN + table_len) {
            Some(table) => ParsedHeader::Fat {
                magic: MACHO_UNIVERSAL_MAGIC_LE,
                slices: decode_fat_entries(table),
            },
            None => ParsedHeader::Unrecognized,
        });
    }
    Ok(ParsedHeader::Unrecognized)
}

/// Fills `buf` from `file`, returning `false` if the file ends first.
fn read_fully(file: &mut File, buf: &mut [u8]) -> std::io::Result<bool> {
    match file.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Reads and decodes the header of the file at `path`.
///
/// Only the first eight bytes are read unless they carry the fat magic, in
/// which case the slice table directly after them is read as well. The file
/// is closed before returning, on success or failure.
pub fn read_header(path: &Path) -> Result<ParsedHeader> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut prefix = [0u8; PREFIX_LEN];
    if !read_fully(&mut file, &mut prefix).map_err(|e| Error::io(path, e))? {
        return Ok(ParsedHeader::Unrecognized);
    }
    if let Some(header) = decode_single_arch(&prefix) {
        return Ok(header);
    }
    let count = match decode_fat_slice_count(&prefix) {
        Some(count) => count,
        None => return Ok(ParsedHeader::Unrecognized),
    };
    let mut table = vec![0u8; check_slice_count(path, count)?];
    if !read_fully(&mut file, &mut table).map_err(|e| Error::io(path, e))? {
        return Ok(ParsedHeader::Unrecognized);
    }
    Ok(ParsedHeader::Fat {
        magic: MACHO_UNIVERSAL_MAGIC_LE,
        slices: decode_fat_entries(&table),
    })
}
