//! Static geometry of the virtual FAT16 volume. Every boundary is computed
//! from the configured sector count; nothing here is stored on "disk".

pub const SECTOR_SIZE: usize = 512;
pub const RESERVED_SECTORS: u32 = 1;
pub const FAT_COPIES: u32 = 2;
pub const ROOT_DIR_SECTORS: u32 = 4;
pub const ROOT_DIR_ENTRIES: u32 = ROOT_DIR_SECTORS * 512 / 32;

/// Data-region sector N backs cluster N + 2 (clusters 0 and 1 are reserved).
pub const CLUSTER_OFFSET: u32 = 2;

/// FAT16 end-of-chain marker.
pub const FAT_EOC: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Boot,
    Fat,
    RootDir,
    Data,
}

/// Volume layout: contiguous, non-overlapping regions in a fixed order,
/// resolved by a single ordered-table lookup.
#[derive(Clone, Copy)]
pub struct Layout {
    pub num_sectors: u32,
    pub sectors_per_fat: u32,
}

impl Layout {
    pub fn new(num_sectors: u32) -> Self {
        Layout {
            num_sectors,
            sectors_per_fat: (num_sectors * 2 + 511) / 512,
        }
    }

    pub fn start_fat0(&self) -> u32 {
        RESERVED_SECTORS
    }

    pub fn start_fat1(&self) -> u32 {
        self.start_fat0() + self.sectors_per_fat
    }

    pub fn start_rootdir(&self) -> u32 {
        self.start_fat1() + self.sectors_per_fat
    }

    pub fn start_clusters(&self) -> u32 {
        self.start_rootdir() + ROOT_DIR_SECTORS
    }

    /// The ordered region table: disjoint, inclusive sector ranges.
    fn regions(&self) -> [(u32, u32, Region); 4] {
        [
            (0, 0, Region::Boot),
            (self.start_fat0(), self.start_rootdir() - 1, Region::Fat),
            (self.start_rootdir(), self.start_clusters() - 1, Region::RootDir),
            (self.start_clusters(), self.num_sectors - 1, Region::Data),
        ]
    }

    /// Classify a sector index into its region and the offset within it.
    pub fn classify(&self, lba: u32) -> Option<(Region, u32)> {
        for (first, last, region) in self.regions() {
            if lba >= first && lba <= last {
                return Some((region, lba - first));
            }
        }
        None
    }
}
