//! Directory entries: the in-memory record behind every slot of the
//! directory stream.

use crate::codec::filetime_to_unix;
use crate::consts::NOSTREAM;

/// Directory entry object type ([MS-CFB] 2.6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// Free or unrecognized slot.
    Unknown,
    /// A storage (directory).
    Storage,
    /// A stream (file).
    Stream,
    /// The root storage.
    Root,
}

impl EntryType {
    /// Decode the on-disk type byte. Lock (3) and property (4) objects are
    /// not modeled and decode as `Unknown`.
    pub(crate) fn from_wire(b: u8) -> Self {
        match b {
            1 => EntryType::Storage,
            2 => EntryType::Stream,
            5 => EntryType::Root,
            _ => EntryType::Unknown,
        }
    }

    pub(crate) fn to_wire(self) -> u8 {
        match self {
            EntryType::Unknown => 0,
            EntryType::Storage => 1,
            EntryType::Stream => 2,
            EntryType::Root => 5,
        }
    }
}

/// Where a parsed stream's payload was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Regular sectors chained through the FAT.
    Fat,
    /// 64-byte mini-sectors chained through the MiniFAT.
    Mini,
}

/// FILETIME ticks for 1987-01-19 UTC, stamped on synthetic storages injected
/// for missing ancestors.
pub(crate) const SYNTHETIC_STORAGE_FILETIME: u64 = 121_824_864_000_000_000;

/// One directory entry. All fields are always present; absent tree links use
/// the `NOSTREAM` sentinel and absent timestamps are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Entry base name (UTF-8 here, UTF-16LE on the wire).
    pub name: String,
    pub entry_type: EntryType,
    /// Red-black color bit: 0 red, 1 black.
    pub color: u8,
    /// Left sibling in the directory tree, or `NOSTREAM`.
    pub left: i32,
    /// Right sibling in the directory tree, or `NOSTREAM`.
    pub right: i32,
    /// First child (storages only), or `NOSTREAM`.
    pub child: i32,
    pub clsid: [u8; 16],
    /// User-defined state bits.
    pub state: u32,
    /// Creation FILETIME (100ns ticks since 1601-01-01 UTC); 0 = unset.
    pub ct: u64,
    /// Modification FILETIME; 0 = unset.
    pub mt: u64,
    /// Starting sector: FAT sector index for large streams, mini-sector
    /// index for small ones, mini-stream start for the root.
    pub start: i32,
    /// Stream length in bytes.
    pub size: u64,
    /// Stream payload; `None` for storages.
    pub content: Option<Vec<u8>>,
    /// Set by the parser to record which allocation table backed the stream.
    pub storage: Option<StorageKind>,
}

impl Entry {
    pub(crate) fn new_root() -> Self {
        Entry {
            name: "Root Entry".to_string(),
            entry_type: EntryType::Root,
            ..Entry::blank()
        }
    }

    pub(crate) fn new_stream(name: String, content: Option<Vec<u8>>) -> Self {
        let size = content.as_ref().map_or(0, |c| c.len() as u64);
        Entry {
            name,
            entry_type: EntryType::Stream,
            size,
            content,
            ..Entry::blank()
        }
    }

    pub(crate) fn new_storage(name: String) -> Self {
        Entry {
            name,
            entry_type: EntryType::Storage,
            ct: SYNTHETIC_STORAGE_FILETIME,
            mt: SYNTHETIC_STORAGE_FILETIME,
            ..Entry::blank()
        }
    }

    pub(crate) fn blank() -> Self {
        Entry {
            name: String::new(),
            entry_type: EntryType::Unknown,
            color: 1,
            left: NOSTREAM,
            right: NOSTREAM,
            child: NOSTREAM,
            clsid: [0u8; 16],
            state: 0,
            ct: 0,
            mt: 0,
            start: 0,
            size: 0,
            content: None,
            storage: None,
        }
    }

    /// Creation time as UTC seconds since the Unix epoch, if recorded.
    pub fn created_unix(&self) -> Option<f64> {
        filetime_to_unix(self.ct as u32, (self.ct >> 32) as u32)
    }

    /// Modification time as UTC seconds since the Unix epoch, if recorded.
    pub fn modified_unix(&self) -> Option<f64> {
        filetime_to_unix(self.mt as u32, (self.mt >> 32) as u32)
    }
}
