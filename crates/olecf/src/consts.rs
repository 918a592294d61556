//! Fixed constants from [MS-CFB] 2.1–2.2: sector identifiers, header magic,
//! and the version-3 geometry this crate writes.

/// Free (unallocated) sector.
pub const FREESECT: i32 = -1;
/// Terminates a FAT or MiniFAT chain.
pub const ENDOFCHAIN: i32 = -2;
/// Marks a sector that holds FAT entries.
pub const FATSECT: i32 = -3;
/// Marks a sector that holds DIFAT entries.
pub const DIFSECT: i32 = -4;
/// Largest regular sector number (0xFFFFFFFA); everything above is reserved.
pub const MAXREGSECT: i32 = -6;
/// Absent directory tree link.
pub const NOSTREAM: i32 = -1;

pub(crate) const HEADER_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
pub(crate) const ZIP_MAGIC: [u8; 2] = [0x50, 0x4B];

/// Sector size for major version 3.
pub(crate) const SECTOR_SIZE_V3: usize = 512;
/// Sector size for major version 4.
pub(crate) const SECTOR_SIZE_V4: usize = 4096;
/// Mini-sector size (both versions).
pub(crate) const MINI_SECTOR_SIZE: usize = 64;
/// Streams strictly below this many bytes live in the mini-stream.
pub(crate) const MINI_CUTOFF: usize = 0x1000;
/// On-disk size of one directory entry.
pub(crate) const DIR_ENTRY_SIZE: usize = 128;
/// Number of DIFAT entries embedded in the header.
pub(crate) const HEADER_DIFAT_ENTRIES: usize = 109;
