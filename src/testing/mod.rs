//! In-memory hardware doubles. Public so integration tests and downstream
//! board crates can exercise the core without real flash registers.

use crate::config::{BoardConfig, FlashGeometry, FlashRegion, UF2_FAMILY_ID};
use crate::hal::{BackupRegister, FlashBank, FlashError};

/// Four small uniform sectors: enough to cover the sector-0 protection, the
/// user window and the UID-guarded tail without multi-megabyte test images.
pub static TEST_FLASH_SECTORS: [u32; 4] = [4096; 4];

const TEST_FLASH_BASE: u32 = 0x0800_0000;
const TEST_FLASH_SIZE: usize = 16 * 1024;

/// A small board resembling the real one at 1/128 scale.
pub fn test_config() -> BoardConfig {
    BoardConfig {
        family_id: UF2_FAMILY_ID,
        flash: FlashGeometry {
            base: TEST_FLASH_BASE,
            sector_sizes: &TEST_FLASH_SECTORS,
        },
        num_fat_sectors: 4096,
        volume_label: "TESTBOOT",
        info_text: "UF2 Bootloader test\r\n",
        index_html: None,
        fw_version_text: None,
        config_bin: None,
        config_htm: None,
        user_flash: FlashRegion {
            start: TEST_FLASH_BASE + 0x1000,
            length: 0x3000,
        },
        app_load_address: TEST_FLASH_BASE + 0x1000,
        devspec_start: Some(TEST_FLASH_BASE + 0x3000),
        device_uid: [0x1111_1111, 0x2222_2222, 0x3333_3333],
        failsafe: false,
    }
}

/// RAM-backed flash with NOR semantics: erase fills a sector with `0xFF`,
/// programming can only clear bits, and both fail while the bank is locked.
pub struct MemFlash {
    mem: [u8; TEST_FLASH_SIZE],
    locked: bool,
    pub erase_calls: usize,
    pub program_calls: usize,
}

impl MemFlash {
    pub fn new() -> Self {
        MemFlash {
            mem: [0xFF; TEST_FLASH_SIZE],
            locked: true,
            erase_calls: 0,
            program_calls: 0,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Place bytes directly, bypassing lock and NOR semantics.
    pub fn preload(&mut self, addr: u32, data: &[u8]) {
        let at = (addr - TEST_FLASH_BASE) as usize;
        self.mem[at..at + data.len()].copy_from_slice(data);
    }

    pub fn bytes(&self, addr: u32, len: usize) -> &[u8] {
        let at = (addr - TEST_FLASH_BASE) as usize;
        &self.mem[at..at + len]
    }
}

impl Default for MemFlash {
    fn default() -> Self {
        MemFlash::new()
    }
}

impl FlashBank for MemFlash {
    fn read(&self, addr: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            let at = addr as usize + i;
            *byte = if (TEST_FLASH_BASE as usize..TEST_FLASH_BASE as usize + TEST_FLASH_SIZE)
                .contains(&at)
            {
                self.mem[at - TEST_FLASH_BASE as usize]
            } else {
                0xFF
            };
        }
    }

    fn unlock(&mut self) {
        self.locked = false;
    }

    fn lock(&mut self) {
        self.locked = true;
    }

    fn erase_sector(&mut self, index: usize) -> Result<(), FlashError> {
        if self.locked {
            return Err(FlashError::Locked);
        }
        if index >= TEST_FLASH_SECTORS.len() {
            return Err(FlashError::EraseFailed);
        }
        let start = index * TEST_FLASH_SECTORS[index] as usize;
        let end = start + TEST_FLASH_SECTORS[index] as usize;
        self.mem[start..end].fill(0xFF);
        self.erase_calls += 1;
        Ok(())
    }

    fn program_word(&mut self, addr: u32, word: u32) -> Result<(), FlashError> {
        if self.locked {
            return Err(FlashError::Locked);
        }
        if addr % 4 != 0 {
            return Err(FlashError::ProgramFailed);
        }
        let at = match addr.checked_sub(TEST_FLASH_BASE) {
            Some(offset) if (offset as usize) + 4 <= TEST_FLASH_SIZE => offset as usize,
            _ => return Err(FlashError::ProgramFailed),
        };
        for (i, byte) in word.to_le_bytes().iter().enumerate() {
            self.mem[at + i] &= byte;
        }
        self.program_calls += 1;
        Ok(())
    }
}

/// A fake reset-surviving register.
pub struct FakeBackup(pub u32);

impl BackupRegister for FakeBackup {
    fn read(&self) -> u32 {
        self.0
    }

    fn write(&mut self, value: u32) {
        self.0 = value;
    }
}
