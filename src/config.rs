//! Board configuration constants and the runtime capability struct.

/// Base address of the internal flash bank.
pub const FLASH_BASE: u32 = 0x0800_0000;

/// Physical erase-sector sizes, in address order starting at `FLASH_BASE`.
/// Sector 0 holds the bootloader itself and is never a valid write target.
pub const FLASH_SECTOR_SIZES: [u32; 16] = [128 * 1024; 16];

/// Total flash capacity in bytes.
pub const BOARD_FLASH_SIZE: u32 = 2 * 1024 * 1024;

/// UF2 family identifier (generic STM32H7).
pub const UF2_FAMILY_ID: u32 = 0x6db6_6082;

/// Sector count of the virtual FAT16 volume.
pub const NUM_FAT_SECTORS: u32 = 8_000_000 / 512;

/// Application image load address (vector table location).
pub const APP_LOAD_ADDRESS: u32 = 0x0804_1000;

/// First address UF2 transfer blocks are allowed to program.
pub const USER_FLASH_START: u32 = 0x0802_0000;

/// One past the last writable flash address.
pub const USER_FLASH_END: u32 = FLASH_BASE + BOARD_FLASH_SIZE;

/// Flash address of the NUL-terminated firmware version string.
pub const FW_VERSION_ADDRESS: u32 = 0x0804_0000;

/// Flash address of the segmented CONFIG.HTM segment table.
pub const CONFIG_HTM_TABLE: u32 = 0x0804_0200;

/// Maximum segment count of the CONFIG.HTM table.
pub const CONFIG_HTM_SEGMENTS: u32 = 8;

/// Start of the device-specific protected sub-region. Blocks targeting it
/// must carry the device UID in their first three payload words.
pub const DEVSPEC_FLASH_START: u32 = 0x081E_0000;

/// Flash region mirrored by the auxiliary CONFIG.UF2 file.
pub const CONFIG_BIN_START: u32 = 0x0802_0000;
pub const CONFIG_BIN_LENGTH: u32 = 128 * 1024;

/// A valid initial stack pointer must satisfy
/// `word & STACK_POINTER_MASK == STACK_POINTER_BASE`.
pub const STACK_POINTER_MASK: u32 = 0xFF00_0003;
pub const STACK_POINTER_BASE: u32 = 0x2000_0000;

/// Samples taken when debouncing the bootloader-entry and failsafe lines.
pub const DEBOUNCE_SAMPLES: u32 = 200;

/// Percentage of agreeing samples required for a line to count as held.
pub const DEBOUNCE_AGREEMENT_PCT: u32 = 90;

/// Reset delay armed when a transfer completes.
pub const RESET_DELAY_COMPLETE_MS: u32 = 30;

/// Inactivity timeout re-armed by every accepted write of a stalled transfer.
pub const RESET_DELAY_STALLED_MS: u32 = 500;

pub const INFO_TEXT: &str = "UF2 Bootloader 0.9\r\n\
                             Model: Striso board v2.0\r\n\
                             Board-ID: STM32H743-Striso-v2\r\n";

pub const INDEX_HTML: &str = "<!doctype html>\n<html><body><script>\n\
                              location.replace(\"http://www.striso.org\");\n\
                              </script></body></html>\n";

/// Physical flash geometry: base address plus the erase-sector size table.
#[derive(Clone, Copy)]
pub struct FlashGeometry {
    pub base: u32,
    pub sector_sizes: &'static [u32],
}

/// One physical erase-sector resolved from an address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectorSpan {
    pub index: usize,
    pub start: u32,
    pub size: u32,
}

impl FlashGeometry {
    pub fn total_size(&self) -> u32 {
        self.sector_sizes.iter().sum()
    }

    pub fn end(&self) -> u32 {
        self.base + self.total_size()
    }

    pub fn sector_count(&self) -> usize {
        self.sector_sizes.len()
    }

    /// Resolve an address to its erase-sector by linear scan over the size
    /// table. Out-of-range addresses resolve to `None`.
    pub fn sector_containing(&self, addr: u32) -> Option<SectorSpan> {
        let mut start = self.base;
        for (index, &size) in self.sector_sizes.iter().enumerate() {
            if addr >= start && addr < start + size {
                return Some(SectorSpan { index, start, size });
            }
            start += size;
        }
        None
    }
}

/// A contiguous flash window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashRegion {
    pub start: u32,
    pub length: u32,
}

impl FlashRegion {
    pub fn end(&self) -> u32 {
        self.start + self.length
    }

    pub fn contains(&self, addr: u32, len: u32) -> bool {
        self.start <= addr && addr + len <= self.end()
    }
}

/// Location of a segmented file's (addr, length) table in flash.
#[derive(Clone, Copy)]
pub struct SegmentTable {
    pub table_addr: u32,
    pub max_segments: u32,
}

/// Capabilities of the running board, resolved once at start-up and consulted
/// uniformly by the synthesizer instead of compile-time feature branches.
/// Optional fields switch the corresponding virtual file or policy off.
#[derive(Clone, Copy)]
pub struct BoardConfig {
    pub family_id: u32,
    pub flash: FlashGeometry,
    pub num_fat_sectors: u32,
    pub volume_label: &'static str,
    pub info_text: &'static str,
    pub index_html: Option<&'static str>,
    /// Flash address of a version text exposed as INFO_FW.TXT.
    pub fw_version_text: Option<u32>,
    /// Flash region exposed as the read/write CONFIG.UF2 file.
    pub config_bin: Option<FlashRegion>,
    /// Segment table of the composite CONFIG.HTM file.
    pub config_htm: Option<SegmentTable>,
    /// Window UF2 blocks may program.
    pub user_flash: FlashRegion,
    pub app_load_address: u32,
    /// Start of the UID-guarded sub-region, if the board reserves one.
    pub devspec_start: Option<u32>,
    /// Hardware-unique identifier words, read from the UID registers at boot.
    pub device_uid: [u32; 3],
    /// Reduced presentation mode, sampled from a dedicated line at boot.
    pub failsafe: bool,
}

impl BoardConfig {
    /// Full configuration of the Striso v2 board.
    pub fn striso_v2(device_uid: [u32; 3], failsafe: bool) -> Self {
        BoardConfig {
            family_id: UF2_FAMILY_ID,
            flash: FlashGeometry {
                base: FLASH_BASE,
                sector_sizes: &FLASH_SECTOR_SIZES,
            },
            num_fat_sectors: NUM_FAT_SECTORS,
            volume_label: "StrisoFW",
            info_text: INFO_TEXT,
            index_html: Some(INDEX_HTML),
            fw_version_text: Some(FW_VERSION_ADDRESS),
            config_bin: Some(FlashRegion {
                start: CONFIG_BIN_START,
                length: CONFIG_BIN_LENGTH,
            }),
            config_htm: Some(SegmentTable {
                table_addr: CONFIG_HTM_TABLE,
                max_segments: CONFIG_HTM_SEGMENTS,
            }),
            user_flash: FlashRegion {
                start: USER_FLASH_START,
                length: USER_FLASH_END - USER_FLASH_START,
            },
            app_load_address: APP_LOAD_ADDRESS,
            devspec_start: Some(DEVSPEC_FLASH_START),
            device_uid,
            failsafe,
        }
    }
}
