//! Root directory records.

use byteorder::LittleEndian;
use zerocopy::{AsBytes, FromBytes, Unaligned, U16, U32};

pub const DIR_ENTRY_SIZE: usize = 32;

/// Volume label attribute (archive + volume-id).
pub const ATTR_VOLUME_LABEL: u8 = 0x28;

#[derive(Clone, AsBytes, FromBytes, Unaligned)]
#[repr(C)]
pub struct DirEntry {
    /// 8.3 name, space padded, extension folded in.
    pub name: [u8; 11],
    pub attrs: u8,
    pub reserved: u8,
    pub create_time_fine: u8,
    pub create_time: U16<LittleEndian>,
    pub create_date: U16<LittleEndian>,
    pub last_access_date: U16<LittleEndian>,
    pub high_start_cluster: U16<LittleEndian>,
    pub update_time: U16<LittleEndian>,
    pub update_date: U16<LittleEndian>,
    pub start_cluster: U16<LittleEndian>,
    pub size: U32<LittleEndian>,
}

impl DirEntry {
    pub fn file(name: [u8; 11], start_cluster: u16, size: u32) -> DirEntry {
        let mut entry = DirEntry::new_zeroed();
        entry.name = name;
        entry.start_cluster = U16::new(start_cluster);
        entry.size = U32::new(size);
        entry
    }

    pub fn volume_label(label: [u8; 11]) -> DirEntry {
        let mut entry = DirEntry::new_zeroed();
        entry.name = label;
        entry.attrs = ATTR_VOLUME_LABEL;
        entry
    }
}

/// Pad a short name to the 11-character 8.3 form, space filled.
pub fn padded_name(name: &str) -> [u8; 11] {
    let mut out = [b' '; 11];
    let len = name.len().min(11);
    out[..len].copy_from_slice(&name.as_bytes()[..len]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_32_bytes() {
        assert_eq!(core::mem::size_of::<DirEntry>(), DIR_ENTRY_SIZE);
    }

    #[test]
    fn file_entry_fields_land_at_fat_offsets() {
        let entry = DirEntry::file(padded_name("CURRENT UF2"), 5, 0x12345);
        let bytes = entry.as_bytes();
        assert_eq!(&bytes[0..11], b"CURRENT UF2");
        assert_eq!(bytes[11], 0);
        assert_eq!(&bytes[26..28], &[5, 0]);
        assert_eq!(&bytes[28..32], &[0x45, 0x23, 0x01, 0x00]);
    }
}
