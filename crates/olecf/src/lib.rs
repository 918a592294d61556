//! Reading and writing Compound File Binary (OLE/CFB) containers.
//!
//! The compound file format ([MS-CFB]) is the FAT-style multi-stream
//! envelope behind legacy Office documents, MSI packages, and the OLE
//! wrapper around encrypted OOXML workbooks (`EncryptionInfo` +
//! `EncryptedPackage`). This crate implements the container itself:
//!
//! - [`CompoundFile::parse`] decodes an in-memory image into named streams,
//!   walking the DIFAT/FAT/MiniFAT chains and rebuilding full paths from the
//!   directory tree links.
//! - [`CompoundFile::add`] + [`CompoundFile::write`] build a version-3 image
//!   from scratch: the directory is normalized and sorted, the sector layout
//!   is planned up front, and the header, allocation tables, directory, and
//!   payloads are emitted bit-exactly.
//!
//! Both paths materialize the whole file in memory; the format requires it
//! (no stream's position is known until the entire layout is). The writer
//! always emits major version 3 (512-byte sectors); the parser accepts
//! version 3 or 4.
//!
//! ```
//! use olecf::CompoundFile;
//!
//! let mut cfb = CompoundFile::new();
//! cfb.add("EncryptionInfo", &b"\x04\x00\x04\x00\x40\x00\x00\x00"[..])?;
//! cfb.add("EncryptedPackage", &b"ciphertext"[..])?;
//! let image = cfb.write()?;
//!
//! let parsed = CompoundFile::parse(&image)?;
//! assert!(parsed.stream("EncryptionInfo").is_some());
//! # Ok::<(), olecf::CfbError>(())
//! ```

mod codec;
pub mod consts;
mod entry;
mod error;
mod layout;
mod parse;
pub mod path;
mod rebuild;
mod write;

#[cfg(test)]
mod fuzz_tests;

use std::io::Read;

pub use crate::entry::{Entry, EntryType, StorageKind};
pub use crate::error::CfbError;

use crate::codec::hex_bytes;
use crate::path::filename;
use crate::rebuild::rebuild;

/// Default bound on the materialized sector array: 1Mi sectors, i.e.
/// 512 MiB of payload at the version-3 sector size.
///
/// Parsing materializes every sector chain, so an attacker-supplied header
/// claiming a huge body would otherwise commit the process to allocating it
/// all. Raise or disable the limit for trusted inputs.
pub const DEFAULT_MAX_SECTORS: usize = 1 << 20;

/// Limits applied while parsing to prevent resource exhaustion.
#[derive(Debug, Clone)]
pub struct ParseLimits {
    /// Maximum number of sectors the input may contain.
    ///
    /// `None` disables the limit.
    pub max_sectors: Option<usize>,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_sectors: Some(DEFAULT_MAX_SECTORS),
        }
    }
}

/// Options controlling parse behavior.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub limits: ParseLimits,
}

/// Optional attributes for [`CompoundFile::add_with_options`].
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// CLSID as a hex string; punctuation (GUID dashes, braces) is ignored.
    pub clsid: Option<String>,
    /// Creation FILETIME ticks; zero leaves the timestamp unset.
    pub ct: u64,
    /// Modification FILETIME ticks; zero leaves the timestamp unset.
    pub mt: u64,
}

/// An in-memory compound file: a directory of entries plus the parallel
/// array of their full slash-joined paths (index 0 is always the root).
#[derive(Debug, Clone)]
pub struct CompoundFile {
    file_index: Vec<Entry>,
    full_paths: Vec<String>,
}

impl Default for CompoundFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream name of the placeholder entry injected on first mutation.
///
/// Containers produced by SheetJS's CFB writer carry this entry; emitting it
/// with the same fixed content keeps images byte-compatible with that
/// toolchain.
const SEED_NAME: &str = "\u{1}Sh33tJ5";
const SEED_CONTENT: [u8; 4] = [55, 50, 54, 50];

impl CompoundFile {
    /// An empty container holding only the root storage.
    pub fn new() -> Self {
        CompoundFile {
            file_index: vec![Entry::new_root()],
            full_paths: vec!["Root Entry/".to_string()],
        }
    }

    /// Decode a complete image.
    pub fn parse(data: &[u8]) -> Result<Self, CfbError> {
        Self::parse_with_options(data, &ParseOptions::default())
    }

    /// Decode a complete image with explicit resource limits.
    pub fn parse_with_options(data: &[u8], options: &ParseOptions) -> Result<Self, CfbError> {
        let model = parse::parse_image(data, options.limits.max_sectors)?;
        Ok(CompoundFile {
            file_index: model.file_index,
            full_paths: model.full_paths,
        })
    }

    /// Consume a reader to EOF and decode the collected bytes.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, CfbError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::parse(&data)
    }

    /// Directory entries, root first.
    pub fn file_index(&self) -> &[Entry] {
        &self.file_index
    }

    /// Full paths, parallel to [`file_index`](Self::file_index). Stream
    /// entries hold their slash-joined path; storage paths end with `/`.
    pub fn full_paths(&self) -> &[String] {
        &self.full_paths
    }

    /// Add (or replace) a stream at the root level.
    pub fn add(
        &mut self,
        name: &str,
        content: impl Into<Vec<u8>>,
    ) -> Result<&Entry, CfbError> {
        self.add_with_options(name, content, &AddOptions::default())
    }

    /// Add (or replace) a stream, optionally attaching a CLSID and
    /// timestamps.
    pub fn add_with_options(
        &mut self,
        name: &str,
        content: impl Into<Vec<u8>>,
        options: &AddOptions,
    ) -> Result<&Entry, CfbError> {
        self.init()?;
        if self.position(name).is_none() {
            let full_path = self.rooted_path(name);
            let entry = Entry::new_stream(filename(name).replace('/', ""), None);
            self.file_index.push(entry);
            self.full_paths.push(full_path);
            rebuild(&mut self.full_paths, &mut self.file_index, true);
        }
        let i = self.position(name).ok_or(CfbError::InconsistentModel {
            full_paths: self.full_paths.len(),
            file_index: self.file_index.len(),
        })?;
        let entry = &mut self.file_index[i];
        let content = content.into();
        entry.size = content.len() as u64;
        entry.content = Some(content);
        if let Some(clsid) = &options.clsid {
            entry.clsid.copy_from_slice(&hex_bytes(clsid, 16));
        }
        if options.ct != 0 {
            entry.ct = options.ct;
        }
        if options.mt != 0 {
            entry.mt = options.mt;
        }
        Ok(&self.file_index[i])
    }

    /// Emit the complete image. The model stays valid; `write` may be called
    /// repeatedly and yields identical bytes for an unchanged model.
    pub fn write(&mut self) -> Result<Vec<u8>, CfbError> {
        self.init()?;
        rebuild(&mut self.full_paths, &mut self.file_index, false);
        Ok(write::write_image(
            &mut self.file_index,
            self.full_paths.len(),
        ))
    }

    /// Look up an entry. A leading `/` or an embedded `/` matches full paths
    /// (rooted under the root entry's name); a bare name matches entry base
    /// names. Comparison is case-insensitive.
    pub fn find(&self, path: &str) -> Option<&Entry> {
        self.position(path).map(|i| &self.file_index[i])
    }

    /// Content of the named stream, if present.
    pub fn stream(&self, path: &str) -> Option<&[u8]> {
        self.find(path)?.content.as_deref()
    }

    /// Delete the named entry. Returns whether anything was removed.
    pub fn remove(&mut self, path: &str) -> bool {
        match self.position(path) {
            Some(i) if i > 0 => {
                self.file_index.remove(i);
                self.full_paths.remove(i);
                // Surviving links may still be in range but stale; force the
                // full pass.
                rebuild(&mut self.full_paths, &mut self.file_index, true);
                true
            }
            _ => false,
        }
    }

    /// Move the named entry to a new path (or just rename it in place).
    /// Returns whether anything was moved.
    pub fn rename(&mut self, path: &str, new_path: &str) -> bool {
        match self.position(path) {
            Some(i) if i > 0 => {
                self.file_index[i].name = filename(new_path).replace('/', "");
                self.full_paths[i] = self.rooted_path(new_path);
                rebuild(&mut self.full_paths, &mut self.file_index, true);
                true
            }
            _ => false,
        }
    }

    /// Force a normalization pass: drops unknown entries, injects missing
    /// parent storages, re-sorts, and regenerates tree links.
    pub fn gc(&mut self) -> Result<(), CfbError> {
        self.check_consistent()?;
        rebuild(&mut self.full_paths, &mut self.file_index, true);
        Ok(())
    }

    fn check_consistent(&self) -> Result<(), CfbError> {
        if self.full_paths.len() != self.file_index.len() {
            return Err(CfbError::InconsistentModel {
                full_paths: self.full_paths.len(),
                file_index: self.file_index.len(),
            });
        }
        Ok(())
    }

    fn init(&mut self) -> Result<(), CfbError> {
        self.check_consistent()?;
        if self.full_paths.is_empty() {
            self.full_paths.push("Root Entry/".to_string());
            self.file_index.push(Entry::new_root());
        }
        self.seed();
        Ok(())
    }

    /// Inject the placeholder stream if it is not present yet. Its links are
    /// deliberately out of range so the rebuild scan renormalizes the tree.
    fn seed(&mut self) {
        if self.position(&format!("/{SEED_NAME}")).is_some() {
            return;
        }
        let mut entry = Entry::new_stream(SEED_NAME.to_string(), Some(SEED_CONTENT.to_vec()));
        entry.left = 69;
        entry.right = 69;
        entry.child = 69;
        self.full_paths
            .push(format!("{}{}", self.full_paths[0], SEED_NAME));
        self.file_index.push(entry);
        rebuild(&mut self.full_paths, &mut self.file_index, false);
    }

    /// Join `name` under the root unless it already carries the root prefix.
    fn rooted_path(&self, name: &str) -> String {
        let root = &self.full_paths[0];
        if name.starts_with(root.as_str()) {
            name.to_string()
        } else {
            let mut path = root.clone();
            if !path.ends_with('/') {
                path.push('/');
            }
            path.push_str(name);
            path.replace("//", "/")
        }
    }

    fn position(&self, path: &str) -> Option<usize> {
        if self.full_paths.is_empty() {
            return None;
        }
        let target_full = if let Some(rest) = path.strip_prefix('/') {
            Some(format!(
                "{}/{}",
                self.full_paths[0].trim_end_matches('/'),
                rest
            ))
        } else if path.contains('/') {
            Some(self.rooted_path(path))
        } else {
            None
        };
        match target_full {
            Some(full) => {
                let full = full.to_uppercase();
                self.full_paths
                    .iter()
                    .position(|p| p.to_uppercase() == full)
            }
            None => {
                let name = path.to_uppercase();
                self.full_paths
                    .iter()
                    .position(|p| filename(p).to_uppercase() == name)
            }
        }
    }
}
