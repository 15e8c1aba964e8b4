//! FAT16 boot sector record.

use byteorder::LittleEndian;
use zerocopy::{AsBytes, FromBytes, Unaligned, U16, U32};

use super::layout::{Layout, FAT_COPIES, RESERVED_SECTORS, ROOT_DIR_ENTRIES};

#[derive(Clone, AsBytes, FromBytes, Unaligned)]
#[repr(C)]
pub struct FatBootBlock {
    pub jump_instruction: [u8; 3],
    pub oem_info: [u8; 8],
    pub sector_size: U16<LittleEndian>,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: U16<LittleEndian>,
    pub fat_copies: u8,
    pub root_directory_entries: U16<LittleEndian>,
    pub total_sectors16: U16<LittleEndian>,
    pub media_descriptor: u8,
    pub sectors_per_fat: U16<LittleEndian>,
    pub sectors_per_track: U16<LittleEndian>,
    pub heads: U16<LittleEndian>,
    pub hidden_sectors: U32<LittleEndian>,
    pub total_sectors32: U32<LittleEndian>,
    pub physical_drive_num: u8,
    pub reserved: u8,
    pub extended_boot_sig: u8,
    pub volume_serial_number: U32<LittleEndian>,
    pub volume_label: [u8; 11],
    pub filesystem_identifier: [u8; 8],
}

impl FatBootBlock {
    pub fn new(layout: &Layout, volume_label: &str) -> FatBootBlock {
        let mut label = [b' '; 11];
        let len = volume_label.len().min(11);
        label[..len].copy_from_slice(&volume_label.as_bytes()[..len]);

        FatBootBlock {
            jump_instruction: [0xEB, 0x3C, 0x90],
            oem_info: *b"UF2 UF2 ",
            sector_size: U16::new(512),
            sectors_per_cluster: 1,
            reserved_sectors: U16::new(RESERVED_SECTORS as u16),
            fat_copies: FAT_COPIES as u8,
            root_directory_entries: U16::new(ROOT_DIR_ENTRIES as u16),
            total_sectors16: U16::new((layout.num_sectors - 2) as u16),
            media_descriptor: 0xF8,
            sectors_per_fat: U16::new(layout.sectors_per_fat as u16),
            sectors_per_track: U16::new(1),
            heads: U16::new(1),
            hidden_sectors: U32::new(0),
            total_sectors32: U32::new(0),
            physical_drive_num: 0,
            reserved: 0,
            extended_boot_sig: 0x29,
            volume_serial_number: U32::new(0x0042_0042),
            volume_label: label,
            filesystem_identifier: *b"FAT16   ",
        }
    }
}
