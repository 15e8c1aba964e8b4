//! Flash write coordinator: erase-before-program with a per-boot-session
//! erased-sector bitmap.

use crate::config::FlashGeometry;
use crate::hal::{read_u32, FlashBank, FlashError};

/// Generous upper bound on the erase-sector table length.
pub const MAX_FLASH_SECTORS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFault {
    /// Destination still non-blank after the erase decision. The sole
    /// unrecoverable condition.
    NotBlank,
    Program(FlashError),
}

pub struct Flasher {
    /// One flag per physical erase-sector, cleared at boot. A marked sector
    /// is never erased again this session.
    erased: [bool; MAX_FLASH_SECTORS],
}

impl Flasher {
    pub const fn new() -> Self {
        Flasher {
            erased: [false; MAX_FLASH_SECTORS],
        }
    }

    pub fn sector_erased(&self, index: usize) -> bool {
        self.erased.get(index).copied().unwrap_or(false)
    }

    /// Program `data` at `dst`, erasing the containing sector first when this
    /// session has not erased it yet. Lazy mode erases without a prior blank
    /// check (read-back can fault under H7 ECC errors). Requests into sector
    /// 0 or outside the geometry table are dropped.
    pub fn write<F: FlashBank>(
        &mut self,
        flash: &mut F,
        geometry: &FlashGeometry,
        dst: u32,
        data: &[u8],
        lazy: bool,
    ) -> Result<(), WriteFault> {
        let span = match geometry.sector_containing(dst) {
            Some(span) => span,
            None => return Ok(()),
        };
        if span.index == 0 || span.index >= MAX_FLASH_SECTORS {
            debug!("drop write into reserved sector at {=u32:x}", dst);
            return Ok(());
        }

        flash.unlock();

        if !self.erased[span.index] {
            if lazy || !is_blank(flash, span.start, span.size) {
                // A failed erase is caught by the blank re-check below.
                let _ = flash.erase_sector(span.index);
            }
            self.erased[span.index] = true;
        }

        if !is_blank(flash, dst, data.len() as u32) {
            flash.lock();
            return Err(WriteFault::NotBlank);
        }

        let result = program(flash, dst, data);
        flash.lock();
        result
    }
}

impl Default for Flasher {
    fn default() -> Self {
        Flasher::new()
    }
}

fn program<F: FlashBank>(flash: &mut F, dst: u32, data: &[u8]) -> Result<(), WriteFault> {
    for (i, chunk) in data.chunks(4).enumerate() {
        let mut word = [0xFFu8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        flash
            .program_word(dst + (i * 4) as u32, u32::from_le_bytes(word))
            .map_err(WriteFault::Program)?;
    }
    Ok(())
}

fn is_blank<F: FlashBank>(flash: &F, addr: u32, len: u32) -> bool {
    let mut offset = 0;
    while offset < len {
        if read_u32(flash, addr + offset) != 0xFFFF_FFFF {
            return false;
        }
        offset += 4;
    }
    true
}
