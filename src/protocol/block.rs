//! The 512-byte self-describing transfer block, packed little-endian with
//! zerocopy so no host alignment or layout assumptions leak into the wire
//! format.

use byteorder::LittleEndian;
use zerocopy::{AsBytes, FromBytes, Unaligned, U32};

use super::{
    UF2_DATA_SIZE, UF2_FLAG_FAMILY_ID_PRESENT, UF2_MAGIC_END, UF2_MAGIC_START0, UF2_MAGIC_START1,
};

pub const UF2_BLOCK_SIZE: usize = 512;

#[derive(Clone, AsBytes, FromBytes, Unaligned)]
#[repr(C)]
pub struct Uf2Block {
    pub magic_start0: U32<LittleEndian>,
    pub magic_start1: U32<LittleEndian>,
    pub flags: U32<LittleEndian>,
    pub target_addr: U32<LittleEndian>,
    pub payload_size: U32<LittleEndian>,
    pub block_no: U32<LittleEndian>,
    pub num_blocks: U32<LittleEndian>,
    pub family_id: U32<LittleEndian>,
    pub data: [u8; UF2_DATA_SIZE],
    pub magic_end: U32<LittleEndian>,
}

impl Uf2Block {
    /// Decode a sector as a transfer block. Returns `None` when the sector is
    /// not 512 bytes or any of the three magic values is wrong.
    pub fn parse(sector: &[u8]) -> Option<Uf2Block> {
        let block = Uf2Block::read_from(sector)?;
        if block.magic_start0.get() != UF2_MAGIC_START0
            || block.magic_start1.get() != UF2_MAGIC_START1
            || block.magic_end.get() != UF2_MAGIC_END
        {
            return None;
        }
        Some(block)
    }

    /// Family policy: when the family-id-present flag is set the tag must
    /// equal ours; blocks without the flag are accepted.
    pub fn family_accepted(&self, family_id: u32) -> bool {
        self.flags.get() & UF2_FLAG_FAMILY_ID_PRESENT == 0 || self.family_id.get() == family_id
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags.get() & flag != 0
    }

    /// The valid portion of the data area, clamped to its capacity.
    pub fn payload(&self) -> &[u8] {
        let len = (self.payload_size.get() as usize).min(UF2_DATA_SIZE);
        &self.data[..len]
    }

    /// First three payload words, compared against the device UID for writes
    /// into the protected sub-region.
    pub fn uid_words(&self) -> [u32; 3] {
        let mut words = [0u32; 3];
        for (i, word) in words.iter_mut().enumerate() {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&self.data[i * 4..i * 4 + 4]);
            *word = u32::from_le_bytes(bytes);
        }
        words
    }

    /// An outbound block initialized for a transfer of `num_blocks` blocks of
    /// our family. The caller fills `target_addr`, `payload_size`, `block_no`
    /// and `data`.
    pub fn prototype(num_blocks: u32, family_id: u32) -> Uf2Block {
        Uf2Block {
            magic_start0: U32::new(UF2_MAGIC_START0),
            magic_start1: U32::new(UF2_MAGIC_START1),
            flags: U32::new(UF2_FLAG_FAMILY_ID_PRESENT),
            target_addr: U32::new(0),
            payload_size: U32::new(0),
            block_no: U32::new(0),
            num_blocks: U32::new(num_blocks),
            family_id: U32::new(family_id),
            data: [0; UF2_DATA_SIZE],
            magic_end: U32::new(UF2_MAGIC_END),
        }
    }
}
