//! Sector layout planning for the writer: how many sectors of each kind the
//! image needs, and where the mini-stream lands.

use crate::consts::{MINI_CUTOFF, MINI_SECTOR_SIZE, SECTOR_SIZE_V3};
use crate::entry::Entry;

/// Sector counts for one emitted image. All counts are in 512-byte sectors
/// except `mini_size`, which counts 64-byte mini-sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    /// DIFAT overflow sectors.
    pub difat: usize,
    /// FAT sectors.
    pub fat: usize,
    /// MiniFAT sectors.
    pub minifat: usize,
    /// Directory sectors.
    pub dir: usize,
    /// Sectors holding FAT-resident stream payloads.
    pub fat_payload: usize,
    /// Mini-sectors carved out of the mini-stream.
    pub mini_size: usize,
    /// Sectors holding the mini-stream itself.
    pub mini_payload: usize,
}

impl Layout {
    /// Plan the image for the rebuilt model and stamp the root entry's size
    /// and mini-stream start.
    pub(crate) fn plan(file_index: &mut [Entry], path_count: usize) -> Layout {
        let mut mini_size = 0usize;
        let mut fat_payload = 0usize;
        for entry in file_index.iter() {
            let Some(content) = &entry.content else {
                continue;
            };
            let len = content.len();
            if len == 0 {
                continue;
            }
            if len < MINI_CUTOFF {
                mini_size += (len + MINI_SECTOR_SIZE - 1) / MINI_SECTOR_SIZE;
            } else {
                fat_payload += (len + SECTOR_SIZE_V3 - 1) / SECTOR_SIZE_V3;
            }
        }

        let layout = Layout::from_counts(mini_size, fat_payload, path_count);

        if let Some(root) = file_index.first_mut() {
            root.size = (layout.mini_size as u64) << 6;
            root.start = (1
                + layout.difat
                + layout.fat
                + layout.minifat
                + layout.dir
                + layout.fat_payload) as i32;
        }
        layout
    }

    /// The pure arithmetic: derive every sector count from the mini-sector
    /// total, the FAT-payload total, and the directory entry count.
    pub(crate) fn from_counts(mini_size: usize, fat_payload: usize, path_count: usize) -> Layout {
        let dir = (path_count + 3) >> 2;
        let mini_payload = (mini_size + 7) >> 3;
        let minifat = (mini_size + 127) >> 7;
        let fat_base = mini_payload + fat_payload + dir + minifat;

        let mut fat = (fat_base + 127) >> 7;
        let mut difat = difat_for(fat);
        // The FAT must also cover its own sectors and the DIFAT's; growing it
        // can in turn require more DIFAT sectors, so iterate to fixpoint.
        while (fat_base + fat + difat + 127) >> 7 > fat {
            fat += 1;
            difat = difat_for(fat);
        }

        Layout {
            difat,
            fat,
            minifat,
            dir,
            fat_payload,
            mini_size,
            mini_payload,
        }
    }

    /// Total sectors in the image, counting the header block.
    pub(crate) fn total_sectors(&self) -> usize {
        1 + self.difat + self.fat + self.minifat + self.dir + self.fat_payload + self.mini_payload
    }

    /// Sector index of the first directory sector.
    pub(crate) fn first_dir_sector(&self) -> usize {
        self.difat + self.fat + self.minifat
    }
}

fn difat_for(fat: usize) -> usize {
    if fat <= 109 {
        0
    } else {
        (fat - 109 + 126) / 127
    }
}
