//! UF2 transfer-block wire format and per-session progress tracking.

pub mod block;
pub mod session;

pub use block::Uf2Block;
pub use session::{BlockDisposition, TransferTracker};

pub const UF2_MAGIC_START0: u32 = 0x0A32_4655;
pub const UF2_MAGIC_START1: u32 = 0x9E5D_5157;
pub const UF2_MAGIC_END: u32 = 0x0AB1_6F30;

/// Block is not meant to be written to flash (host-side verification reads).
pub const UF2_FLAG_NOFLASH: u32 = 0x0000_0001;
/// Block belongs to a file container rather than a flat firmware image.
pub const UF2_FLAG_FILE_CONTAINER: u32 = 0x0000_1000;
/// The familyID field carries a compatibility tag.
pub const UF2_FLAG_FAMILY_ID_PRESENT: u32 = 0x0000_2000;

/// Payload bytes carried per block by this device.
pub const UF2_PAYLOAD_SIZE: usize = 256;

/// Capacity of the data area of one block.
pub const UF2_DATA_SIZE: usize = 476;

/// Upper bound on the declared block count of a transfer: one block per
/// 256-byte flash unit plus some slack for container overhead. Sizes the
/// received bitmask.
pub const MAX_TRANSFER_BLOCKS: u32 = crate::config::BOARD_FLASH_SIZE / 256 + 100;
