//! Parsing an existing image: header validation, DIFAT walk, sector-chain
//! materialization, directory decode, and stream extraction.

use std::collections::HashSet;

use crate::codec::{read_i32_at, utf16le_string, ByteReader};
use crate::consts::{
    DIR_ENTRY_SIZE, ENDOFCHAIN, FREESECT, HEADER_DIFAT_ENTRIES, HEADER_SIGNATURE, MINI_CUTOFF,
    MINI_SECTOR_SIZE, SECTOR_SIZE_V3, SECTOR_SIZE_V4, ZIP_MAGIC,
};
use crate::entry::{Entry, EntryType, StorageKind};
use crate::error::CfbError;
use crate::path::build_full_paths;

pub(crate) struct ParsedModel {
    pub file_index: Vec<Entry>,
    pub full_paths: Vec<String>,
}

struct HeaderInfo {
    ssz: usize,
    dir_start: i32,
    minifat_start: i32,
    minifat_count: i32,
    difat_start: i32,
    difat_count: i32,
    fat_addrs: Vec<i32>,
}

/// One materialized FAT chain: the sector numbers visited and their
/// concatenated payload.
struct SectorChain {
    nodes: Vec<i32>,
    data: Vec<u8>,
}

pub(crate) fn parse_image(
    data: &[u8],
    max_sectors: Option<usize>,
) -> Result<ParsedModel, CfbError> {
    if data.len() < SECTOR_SIZE_V3 {
        return Err(CfbError::TooSmall {
            context: "compound file header",
            needed: SECTOR_SIZE_V3,
            have: data.len(),
        });
    }
    if data[..2] == ZIP_MAGIC {
        return Err(CfbError::UnsupportedFormat(
            "Zip contents are not supported".to_string(),
        ));
    }

    let header = parse_header(data)?;
    let sectors = sectorify(data, header.ssz);
    if let Some(max) = max_sectors {
        if sectors.len() > max {
            return Err(CfbError::ChainMalformed(format!(
                "sector array of {} sectors exceeds the configured limit of {max}",
                sectors.len()
            )));
        }
    }

    let mut fat_addrs = header.fat_addrs.clone();
    sleuth_fat(
        header.difat_start,
        header.difat_count,
        &sectors,
        header.ssz,
        &mut fat_addrs,
    )?;

    if sectors.is_empty() || header.dir_start < 0 || (header.dir_start as usize) >= sectors.len() {
        return Err(CfbError::ChainMalformed(format!(
            "first directory sector {} out of range ({} sectors)",
            header.dir_start,
            sectors.len()
        )));
    }

    let mut chains = make_sector_list(&sectors, header.dir_start as usize, &fat_addrs, header.ssz)?;

    let (file_index, names) = read_directory(&header, &sectors, &fat_addrs, &mut chains)?;
    let full_paths = build_full_paths(&file_index, &names);

    Ok(ParsedModel {
        file_index,
        full_paths,
    })
}

fn parse_header(data: &[u8]) -> Result<HeaderInfo, CfbError> {
    let mut r = ByteReader::new(data);
    r.expect("header signature", &HEADER_SIGNATURE)?;
    r.skip(16); // header CLSID is not validated

    let _minor = r.read_u16_le("minor version")?;
    let major = r.read_u16_le("major version")?;
    let ssz = match major {
        3 => SECTOR_SIZE_V3,
        4 => SECTOR_SIZE_V4,
        other => {
            return Err(CfbError::UnsupportedFormat(format!(
                "major version: expected 3 or 4, saw {other}"
            )))
        }
    };

    r.skip(2); // byte-order mark
    let shift = r.read_u16_le("sector shift")?;
    let want_shift = if major == 3 { 9 } else { 12 };
    if shift != want_shift {
        return Err(CfbError::HeaderMismatch {
            field: "sector shift",
            expected: want_shift.to_string(),
            actual: shift.to_string(),
        });
    }
    r.expect("mini sector shift", &[0x06, 0x00])?;
    r.expect("reserved", &[0u8; 6])?;

    let dir_sector_count = r.read_i32_le("directory sector count")?;
    if major == 3 && dir_sector_count != 0 {
        return Err(CfbError::HeaderMismatch {
            field: "directory sector count",
            expected: "0".to_string(),
            actual: dir_sector_count.to_string(),
        });
    }
    r.skip(4); // FAT sector count; the DIFAT is authoritative
    let dir_start = r.read_i32_le("first directory sector")?;
    r.skip(4); // transaction signature
    r.expect("mini stream cutoff", &[0x00, 0x10, 0x00, 0x00])?;
    let minifat_start = r.read_i32_le("first MiniFAT sector")?;
    let minifat_count = r.read_i32_le("MiniFAT sector count")?;
    let difat_start = r.read_i32_le("first DIFAT sector")?;
    let difat_count = r.read_i32_le("DIFAT sector count")?;

    let mut fat_addrs = Vec::new();
    for _ in 0..HEADER_DIFAT_ENTRIES {
        let q = r.read_i32_le("header DIFAT entry")?;
        if q < 0 {
            break;
        }
        fat_addrs.push(q);
    }

    Ok(HeaderInfo {
        ssz,
        dir_start,
        minifat_start,
        minifat_count,
        difat_start,
        difat_count,
        fat_addrs,
    })
}

/// Slice the post-header region into sectors. The tail sector may be short
/// when the input is not sector-aligned.
fn sectorify(data: &[u8], ssz: usize) -> Vec<&[u8]> {
    if data.len() <= ssz {
        return Vec::new();
    }
    let count = (data.len() - ssz).div_ceil(ssz);
    (1..=count)
        .map(|i| {
            let start = i * ssz;
            let end = ((i + 1) * ssz).min(data.len());
            &data[start..end]
        })
        .collect()
}

/// Follow the DIFAT overflow chain, appending FAT sector addresses. Each
/// overflow sector holds `ssz/4 - 1` addresses and ends with the next DIFAT
/// sector number.
fn sleuth_fat(
    first: i32,
    count: i32,
    sectors: &[&[u8]],
    ssz: usize,
    fat_addrs: &mut Vec<i32>,
) -> Result<(), CfbError> {
    let mut idx = first;
    let mut remaining = count;
    loop {
        if idx == ENDOFCHAIN {
            if remaining != 0 {
                return Err(CfbError::ChainMalformed(format!(
                    "DIFAT chain shorter than expected ({remaining} sectors unaccounted)"
                )));
            }
            return Ok(());
        }
        if idx == FREESECT {
            return Ok(());
        }
        let Some(&sector) = usize::try_from(idx).ok().and_then(|i| sectors.get(i)) else {
            return Ok(());
        };
        if remaining <= 0 {
            return Err(CfbError::ChainMalformed(
                "DIFAT chain longer than expected".to_string(),
            ));
        }
        for i in 0..(ssz / 4 - 1) {
            let Some(q) = read_i32_at(sector, i * 4) else {
                return Err(CfbError::ChainMalformed(
                    "DIFAT sector truncated".to_string(),
                ));
            };
            if q == ENDOFCHAIN {
                break;
            }
            fat_addrs.push(q);
        }
        let Some(next) = read_i32_at(sector, ssz - 4) else {
            return Err(CfbError::ChainMalformed(
                "DIFAT sector truncated".to_string(),
            ));
        };
        remaining -= 1;
        idx = next;
    }
}

/// Walk one FAT chain from `start`, recording visited sectors and their
/// concatenated payload. Stops on a negative successor or a repeated sector;
/// a chain node outside the sector array is an error, while a FAT lookup
/// that runs off a truncated allocation table ends the chain quietly.
fn get_sector_list(
    sectors: &[&[u8]],
    start: i32,
    fat_addrs: &[i32],
    ssz: usize,
    chkd: &mut [bool],
) -> Result<SectorChain, CfbError> {
    let mut nodes = Vec::new();
    let mut data = Vec::new();
    let mut seen = HashSet::new();

    let mut j = start;
    while j >= 0 {
        let ju = j as usize;
        if ju >= sectors.len() {
            return Err(CfbError::ChainMalformed(format!(
                "sector index {j} out of range ({} sectors)",
                sectors.len()
            )));
        }
        if !seen.insert(ju) {
            break;
        }
        chkd[ju] = true;
        nodes.push(j);
        data.extend_from_slice(sectors[ju]);

        let fat_slot = ju * 4 / ssz;
        let offset = (ju * 4) & (ssz - 1);
        if ssz < 4 + offset {
            return Err(CfbError::ChainMalformed(format!(
                "FAT boundary crossed at sector {j} (sector size {ssz})"
            )));
        }
        let Some(&addr) = fat_addrs.get(fat_slot) else {
            break;
        };
        let Some(&fat_sector) = usize::try_from(addr).ok().and_then(|a| sectors.get(a)) else {
            break;
        };
        let Some(next) = read_i32_at(fat_sector, offset) else {
            break;
        };
        j = next;
    }
    Ok(SectorChain { nodes, data })
}

/// Materialize a chain for every unvisited sector, starting the traversal at
/// the directory so its chain is always rooted at `dir_start`.
fn make_sector_list(
    sectors: &[&[u8]],
    dir_start: usize,
    fat_addrs: &[i32],
    ssz: usize,
) -> Result<Vec<Option<SectorChain>>, CfbError> {
    let sl = sectors.len();
    let mut chains: Vec<Option<SectorChain>> = std::iter::repeat_with(|| None).take(sl).collect();
    let mut chkd = vec![false; sl];
    for i in 0..sl {
        let j = (i + dir_start) % sl;
        if chkd[j] {
            continue;
        }
        chains[j] = Some(get_sector_list(sectors, j as i32, fat_addrs, ssz, &mut chkd)?);
    }
    Ok(chains)
}

fn read_directory(
    header: &HeaderInfo,
    sectors: &[&[u8]],
    fat_addrs: &[i32],
    chains: &mut [Option<SectorChain>],
) -> Result<(Vec<Entry>, Vec<String>), CfbError> {
    let dir_chain = chains[header.dir_start as usize]
        .as_ref()
        .filter(|c| !c.nodes.is_empty())
        .ok_or_else(|| CfbError::ChainMalformed("directory chain is empty".to_string()))?;
    let dir_data = dir_chain.data.clone();

    let minifat_data: Option<Vec<u8>> = if header.minifat_count > 0 {
        usize::try_from(header.minifat_start)
            .ok()
            .and_then(|i| chains.get(i))
            .and_then(|c| c.as_ref())
            .map(|c| c.data.clone())
    } else {
        None
    };

    let mut file_index = Vec::new();
    let mut names = Vec::new();
    let mut minifat_store: i32 = 0;
    let mut mini_stream_data: Option<Vec<u8>> = None;

    for block in dir_data.chunks_exact(DIR_ENTRY_SIZE) {
        let mut r = ByteReader::new(block);
        r.seek(64);
        let name_len = r.read_u16_le("directory entry name length")? as usize;
        let name = utf16le_string(&block[..name_len.min(64)]);
        names.push(name.clone());

        let mut entry = Entry::blank();
        entry.name = name;
        entry.entry_type = EntryType::from_wire(r.read_u8("directory entry type")?);
        entry.color = r.read_u8("directory entry color")?;
        entry.left = r.read_i32_le("left sibling")?;
        entry.right = r.read_i32_le("right sibling")?;
        entry.child = r.read_i32_le("child")?;
        entry.clsid.copy_from_slice(r.take(16, "directory entry CLSID")?);
        entry.state = r.read_u32_le("state bits")?;
        entry.ct = r.read_u64_le("creation time")?;
        entry.mt = r.read_u64_le("modification time")?;
        entry.start = r.read_i32_le("starting sector")?;
        let mut size = r.read_i32_le("stream size")? as i64;

        if size < 0 && entry.start < 0 {
            // Free slot (or scrubbed entry): normalize to an empty unknown.
            size = 0;
            entry.entry_type = EntryType::Unknown;
            entry.start = ENDOFCHAIN;
            entry.name.clear();
        }

        match entry.entry_type {
            EntryType::Root => {
                minifat_store = entry.start;
                entry.size = size.max(0) as u64;
                mini_stream_data = usize::try_from(minifat_store)
                    .ok()
                    .and_then(|i| chains.get(i))
                    .and_then(|c| c.as_ref())
                    .map(|c| c.data.clone());
            }
            EntryType::Stream if size >= MINI_CUTOFF as i64 => {
                entry.size = size as u64;
                entry.storage = Some(StorageKind::Fat);
                let mut content = fat_stream_data(
                    entry.start,
                    sectors,
                    fat_addrs,
                    header.ssz,
                    chains,
                )?;
                content.truncate(entry.size as usize);
                entry.content = Some(content);
            }
            EntryType::Stream => {
                entry.storage = Some(StorageKind::Mini);
                entry.size = size.max(0) as u64;
                if size >= 0
                    && minifat_store != ENDOFCHAIN
                    && entry.start != ENDOFCHAIN
                    && mini_stream_data.is_some()
                {
                    entry.content = Some(mini_stream_content(
                        entry.start,
                        entry.size,
                        mini_stream_data.as_deref().unwrap_or(&[]),
                        minifat_data.as_deref(),
                    ));
                }
            }
            EntryType::Storage | EntryType::Unknown => {
                entry.size = size.max(0) as u64;
            }
        }

        file_index.push(entry);
    }

    Ok((file_index, names))
}

/// Payload of a FAT-resident stream, materializing its chain on demand if
/// the initial sweep attached it to another chain's tail.
fn fat_stream_data(
    start: i32,
    sectors: &[&[u8]],
    fat_addrs: &[i32],
    ssz: usize,
    chains: &mut [Option<SectorChain>],
) -> Result<Vec<u8>, CfbError> {
    if start < 0 {
        return Ok(Vec::new());
    }
    let su = start as usize;
    if su >= chains.len() {
        return Err(CfbError::ChainMalformed(format!(
            "sector index {start} out of range ({} sectors)",
            chains.len()
        )));
    }
    if chains[su].is_none() {
        let mut fresh = vec![false; sectors.len()];
        chains[su] = Some(get_sector_list(sectors, start, fat_addrs, ssz, &mut fresh)?);
    }
    Ok(chains[su].as_ref().map(|c| c.data.clone()).unwrap_or_default())
}

/// Extract a mini-stream-resident payload by walking the MiniFAT from
/// `start`, 64 bytes per mini-sector, then truncating to the stored size.
fn mini_stream_content(
    start: i32,
    size: u64,
    mini_stream: &[u8],
    minifat: Option<&[u8]>,
) -> Vec<u8> {
    let mut out = Vec::new();
    let Some(minifat) = minifat else {
        return out;
    };
    let mut idx = start;
    let mut remaining = size as i64;
    while remaining > 0 && idx >= 0 {
        let off = idx as usize * MINI_SECTOR_SIZE;
        if off < mini_stream.len() {
            let end = (off + MINI_SECTOR_SIZE).min(mini_stream.len());
            out.extend_from_slice(&mini_stream[off..end]);
        }
        remaining -= MINI_SECTOR_SIZE as i64;
        idx = read_i32_at(minifat, idx as usize * 4).unwrap_or(ENDOFCHAIN);
    }
    out.truncate(size as usize);
    out
}
