//! Emission of a version-3 image: header, DIFAT, FAT, MiniFAT, directory,
//! then stream payloads, in that order.

use crate::codec::ByteWriter;
use crate::consts::{
    DIFSECT, DIR_ENTRY_SIZE, ENDOFCHAIN, FATSECT, HEADER_DIFAT_ENTRIES, HEADER_SIGNATURE,
    MINI_CUTOFF, MINI_SECTOR_SIZE, SECTOR_SIZE_V3,
};
use crate::entry::Entry;
use crate::layout::Layout;

/// Running position inside the FAT (or MiniFAT) entry array while chain runs
/// are appended. `slot` is the next entry index to write; `total` is where
/// the current run ends.
struct ChainCursor {
    slot: usize,
    total: usize,
}

impl ChainCursor {
    fn new() -> Self {
        ChainCursor { slot: 0, total: 0 }
    }

    /// Reserve `len` slots without emitting chain pointers (marker regions).
    fn reserve(&mut self, len: usize) {
        self.slot += len;
        self.total += len;
    }

    /// Emit one chain of `len` sectors: `len - 1` forward pointers followed
    /// by an end-of-chain terminator.
    fn chain(&mut self, w: &mut ByteWriter, len: usize) {
        self.total += len;
        while self.slot + 1 < self.total {
            w.write_i32_le((self.slot + 1) as i32);
            self.slot += 1;
        }
        if len > 0 {
            w.write_i32_le(ENDOFCHAIN);
            self.slot += 1;
        }
    }
}

/// Emit the complete image. Stream start sectors (and the root's mini-stream
/// position) are reassigned in place; the model stays writable afterwards.
pub(crate) fn write_image(file_index: &mut [Entry], path_count: usize) -> Vec<u8> {
    let layout = Layout::plan(file_index, path_count);
    let mut w = ByteWriter::with_len(layout.total_sectors() << 9);

    write_header(&mut w, &layout);
    write_difat_overflow(&mut w, &layout);
    write_fat(&mut w, &layout, file_index);
    write_minifat(&mut w, file_index);
    write_directory(&mut w, &layout, file_index);
    write_payloads(&mut w, file_index);

    w.into_inner()
}

fn write_header(w: &mut ByteWriter, layout: &Layout) {
    w.write_bytes(&HEADER_SIGNATURE);
    w.write_hex(16, ""); // header CLSID, always zero
    w.write_u16_le(0x003E); // minor version
    w.write_u16_le(0x0003); // major version
    w.write_u16_le(0xFFFE); // byte-order mark
    w.write_u16_le(0x0009); // sector shift (512)
    w.write_u16_le(0x0006); // mini sector shift (64)
    w.write_u16_le(0);
    w.write_u32_le(0);
    w.write_u32_le(0); // directory sector count, always 0 for version 3
    w.write_u32_le(layout.fat as u32);
    w.write_u32_le(layout.first_dir_sector() as u32);
    w.write_u32_le(0); // transaction signature
    w.write_u32_le(MINI_CUTOFF as u32);
    if layout.minifat > 0 {
        w.write_i32_le((layout.difat + layout.fat) as i32);
    } else {
        w.write_i32_le(ENDOFCHAIN);
    }
    w.write_u32_le(layout.minifat as u32);
    if layout.difat > 0 {
        w.write_i32_le(0); // DIFAT overflow starts in the very first sector
    } else {
        w.write_i32_le(ENDOFCHAIN);
    }
    w.write_u32_le(layout.difat as u32);

    // Header DIFAT: the i-th FAT sector sits right after the DIFAT region.
    for i in 0..HEADER_DIFAT_ENTRIES {
        w.write_i32_le(fat_sector_or_free(layout, i));
    }
}

fn fat_sector_or_free(layout: &Layout, i: usize) -> i32 {
    if i < layout.fat {
        (layout.difat + i) as i32
    } else {
        -1
    }
}

fn write_difat_overflow(w: &mut ByteWriter, layout: &Layout) {
    let mut i = HEADER_DIFAT_ENTRIES;
    for t in 0..layout.difat {
        // 127 FAT addresses, then the pointer to the next DIFAT sector.
        while i < HEADER_DIFAT_ENTRIES + (t + 1) * 127 {
            w.write_i32_le(fat_sector_or_free(layout, i));
            i += 1;
        }
        if t == layout.difat - 1 {
            w.write_i32_le(ENDOFCHAIN);
        } else {
            w.write_i32_le((t + 1) as i32);
        }
    }
}

/// FAT entries describe every sector after the header: DIFAT and FAT marker
/// slots first, then the chains for the MiniFAT, the directory, each
/// FAT-resident stream (whose start sector is assigned here), and finally
/// the mini-stream.
fn write_fat(w: &mut ByteWriter, layout: &Layout, file_index: &mut [Entry]) {
    let mut cursor = ChainCursor::new();
    for _ in 0..layout.difat {
        w.write_i32_le(DIFSECT);
    }
    cursor.reserve(layout.difat);
    for _ in 0..layout.fat {
        w.write_i32_le(FATSECT);
    }
    cursor.reserve(layout.fat);

    cursor.chain(w, layout.minifat);
    cursor.chain(w, layout.dir);

    for entry in file_index.iter_mut() {
        let Some(content) = &entry.content else {
            continue;
        };
        let len = content.len();
        if len < MINI_CUTOFF {
            continue;
        }
        entry.start = cursor.total as i32;
        cursor.chain(w, (len + SECTOR_SIZE_V3 - 1) / SECTOR_SIZE_V3);
    }

    cursor.chain(w, layout.mini_payload);

    while w.position() % SECTOR_SIZE_V3 != 0 {
        w.write_i32_le(ENDOFCHAIN);
    }
}

/// MiniFAT entries chain the 64-byte mini-sectors of every small stream, in
/// directory order; mini-stream start indices are assigned here.
fn write_minifat(w: &mut ByteWriter, file_index: &mut [Entry]) {
    let mut cursor = ChainCursor::new();
    for entry in file_index.iter_mut() {
        let Some(content) = &entry.content else {
            continue;
        };
        let len = content.len();
        if len == 0 || len >= MINI_CUTOFF {
            continue;
        }
        entry.start = cursor.total as i32;
        cursor.chain(w, (len + MINI_SECTOR_SIZE - 1) / MINI_SECTOR_SIZE);
    }
    while w.position() % SECTOR_SIZE_V3 != 0 {
        w.write_i32_le(ENDOFCHAIN);
    }
}

fn write_directory(w: &mut ByteWriter, layout: &Layout, file_index: &mut [Entry]) {
    for (i, entry) in file_index.iter_mut().enumerate() {
        if i == 0 {
            // The root's planned start counts the header block; on the wire
            // it is the absolute index of the first mini-stream sector.
            entry.start = if entry.size > 0 {
                entry.start - 1
            } else {
                ENDOFCHAIN
            };
        }
        w.write_utf16le(64, &entry.name);
        w.write_u16_le((2 * (entry.name.encode_utf16().count() + 1)) as u16);
        w.write_u8(entry.entry_type.to_wire());
        w.write_u8(entry.color);
        w.write_i32_le(entry.left);
        w.write_i32_le(entry.right);
        w.write_i32_le(entry.child);
        w.write_bytes(&entry.clsid);
        w.write_u32_le(entry.state);
        w.write_u32_le(0); // timestamps are not recorded on the wire
        w.write_u32_le(0);
        w.write_u32_le(0);
        w.write_u32_le(0);
        w.write_i32_le(entry.start);
        w.write_u32_le(entry.size as u32);
        w.write_u32_le(0);
    }

    // Pad the directory out to whole sectors with free slots.
    for _ in file_index.len()..layout.dir * (SECTOR_SIZE_V3 / DIR_ENTRY_SIZE) {
        w.skip(64 + 2 + 1 + 1);
        w.write_i32_le(-1);
        w.write_i32_le(-1);
        w.write_i32_le(-1);
        w.skip(DIR_ENTRY_SIZE - 0x50);
    }
}

fn write_payloads(w: &mut ByteWriter, file_index: &mut [Entry]) {
    for entry in file_index.iter().skip(1) {
        if entry.size < MINI_CUTOFF as u64 {
            continue;
        }
        w.seek(((entry.start + 1) as usize) << 9);
        if let Some(content) = &entry.content {
            w.write_bytes(content);
        }
        w.align(SECTOR_SIZE_V3);
    }
    for entry in file_index.iter().skip(1) {
        if entry.size == 0 || entry.size >= MINI_CUTOFF as u64 {
            continue;
        }
        if let Some(content) = &entry.content {
            w.write_bytes(content);
        }
        w.align(MINI_SECTOR_SIZE);
    }
}
