//! The synthetic file table, resolved once at start-up from the board
//! capabilities.

use crate::config::{BoardConfig, FlashRegion, SegmentTable};
use crate::hal::{read_u32, FlashBank};
use crate::protocol::UF2_PAYLOAD_SIZE;

use super::layout::SECTOR_SIZE;

pub const MAX_FILES: usize = 6;

/// Where a file's bytes come from.
#[derive(Clone, Copy)]
pub enum FileContent {
    /// Fixed in-memory text, at most one sector.
    Text(&'static str),
    /// Text stored in flash (firmware version string), at most one sector.
    FlashText { addr: u32 },
    /// The firmware mirror: the whole flash re-encoded as transfer blocks.
    FirmwareUf2,
    /// A flash region re-encoded as transfer blocks.
    ConfigUf2 { region: FlashRegion },
    /// Concatenation of disjoint flash segments listed in a table.
    Segmented { table: SegmentTable },
}

#[derive(Clone, Copy)]
pub struct FileEntry {
    pub name: [u8; 11],
    pub content: FileContent,
    pub size: u32,
    /// First sector of this file's run, relative to the data region.
    pub first_sector: u32,
}

impl FileEntry {
    /// Sectors reserved in the data region, at least one per file.
    pub fn reserved_sectors(&self) -> u32 {
        self.chain_clusters().max(1)
    }

    /// Clusters chained in the allocation table: ceil(size / sector).
    pub fn chain_clusters(&self) -> u32 {
        (self.size + SECTOR_SIZE as u32 - 1) / SECTOR_SIZE as u32
    }

    pub fn last_sector(&self) -> u32 {
        self.first_sector + self.reserved_sectors() - 1
    }
}

pub struct FileTable {
    files: [Option<FileEntry>; MAX_FILES],
    len: usize,
}

impl FileTable {
    /// Resolve the visible file set. Failsafe mode hides everything beyond
    /// the mandatory info file.
    pub fn build<F: FlashBank>(cfg: &BoardConfig, flash: &F) -> FileTable {
        let mut table = FileTable {
            files: [None; MAX_FILES],
            len: 0,
        };

        table.push(cfg, flash, "INFO_UF2TXT", FileContent::Text(cfg.info_text));

        if !cfg.failsafe {
            if let Some(html) = cfg.index_html {
                table.push(cfg, flash, "INDEX   HTM", FileContent::Text(html));
            }
            if let Some(addr) = cfg.fw_version_text {
                table.push(cfg, flash, "INFO_FW TXT", FileContent::FlashText { addr });
            }
            table.push(cfg, flash, "CURRENT UF2", FileContent::FirmwareUf2);
            if let Some(region) = cfg.config_bin {
                table.push(cfg, flash, "CONFIG  UF2", FileContent::ConfigUf2 { region });
            }
            if let Some(segments) = cfg.config_htm {
                table.push(cfg, flash, "CONFIG  HTM", FileContent::Segmented { table: segments });
            }
        }

        table
    }

    fn push<F: FlashBank>(&mut self, cfg: &BoardConfig, flash: &F, name: &str, content: FileContent) {
        if self.len >= MAX_FILES {
            return;
        }
        let first_sector = match self.len.checked_sub(1).and_then(|i| self.files[i]) {
            Some(prev) => prev.last_sector() + 1,
            None => 0,
        };
        let entry = FileEntry {
            name: super::dir::padded_name(name),
            content,
            size: content_size(cfg, flash, &content),
            first_sector,
        };
        self.files[self.len] = Some(entry);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.files[..self.len].iter().filter_map(|f| f.as_ref())
    }

    pub fn by_name(&self, name: &str) -> Option<&FileEntry> {
        let padded = super::dir::padded_name(name);
        self.iter().find(|f| f.name == padded)
    }

    /// The file whose reserved run covers a data-region sector, plus the
    /// sector's offset within the file.
    pub fn file_at_sector(&self, data_sector: u32) -> Option<(&FileEntry, u32)> {
        self.iter()
            .find(|f| data_sector >= f.first_sector && data_sector <= f.last_sector())
            .map(|f| (f, data_sector - f.first_sector))
    }
}

fn content_size<F: FlashBank>(cfg: &BoardConfig, flash: &F, content: &FileContent) -> u32 {
    match *content {
        FileContent::Text(text) => text_file_length(text.as_bytes()) as u32,
        FileContent::FlashText { addr } => {
            let mut buf = [0u8; SECTOR_SIZE];
            flash.read(addr, &mut buf);
            text_file_length(&buf) as u32
        }
        FileContent::FirmwareUf2 => cfg.flash.total_size() / UF2_PAYLOAD_SIZE as u32 * 512,
        FileContent::ConfigUf2 { region } => region.length / UF2_PAYLOAD_SIZE as u32 * 512,
        FileContent::Segmented { table } => segmented_length(flash, cfg.user_flash, table),
    }
}

/// Length of a text file: terminated by NUL or any control byte >= 0xF8, and
/// capped to a single sector.
pub fn text_file_length(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .take(SECTOR_SIZE)
        .position(|&b| b == 0 || b >= 0xF8)
        .unwrap_or(bytes.len().min(SECTOR_SIZE))
}

fn segment<F: FlashBank>(flash: &F, table: SegmentTable, index: u32) -> FlashRegion {
    let entry_addr = table.table_addr + index * 8;
    FlashRegion {
        start: read_u32(flash, entry_addr),
        length: read_u32(flash, entry_addr + 4),
    }
}

/// A segment must stay inside the user flash window; the walk stops at the
/// first invalid entry.
fn segment_valid(window: FlashRegion, seg: FlashRegion) -> bool {
    seg.start
        .checked_add(seg.length)
        .is_some_and(|end| seg.start >= window.start && end < window.end())
}

/// Total size of a segmented file.
pub fn segmented_length<F: FlashBank>(flash: &F, window: FlashRegion, table: SegmentTable) -> u32 {
    let mut size = 0;
    for i in 0..table.max_segments {
        let seg = segment(flash, table, i);
        if !segment_valid(window, seg) {
            break;
        }
        size += seg.length;
    }
    size
}

/// Fill one sector of a segmented file by walking the segment list and
/// copying the parts that overlap the requested byte window.
pub fn segmented_read_sector<F: FlashBank>(
    flash: &F,
    window: FlashRegion,
    table: SegmentTable,
    sector_index: u32,
    out: &mut [u8; SECTOR_SIZE],
) {
    let begin = sector_index * SECTOR_SIZE as u32;
    let end = begin + SECTOR_SIZE as u32;
    let mut file_pos = 0u32;
    let mut out_pos = 0usize;

    for i in 0..table.max_segments {
        let seg = segment(flash, table, i);
        if !segment_valid(window, seg) {
            break;
        }
        if file_pos < end && file_pos + seg.length > begin {
            let skip = begin.saturating_sub(file_pos);
            let mut len = seg.length - skip;
            if out_pos as u32 + len > SECTOR_SIZE as u32 {
                len = SECTOR_SIZE as u32 - out_pos as u32;
            }
            flash.read(seg.start + skip, &mut out[out_pos..out_pos + len as usize]);
            out_pos += len as usize;
        }
        file_pos += seg.length;
    }
}
