//! GhostFAT: a FAT16 block device with no backing storage. Sectors are
//! synthesized on read; writes that decode as transfer blocks are committed
//! through the flash write coordinator.

pub mod boot_sector;
pub mod dir;
pub mod files;
pub mod layout;

use zerocopy::{AsBytes, U32};

use crate::config::{BoardConfig, RESET_DELAY_COMPLETE_MS, RESET_DELAY_STALLED_MS};
use crate::flasher::{Flasher, WriteFault};
use crate::hal::FlashBank;
use crate::protocol::{
    BlockDisposition, TransferTracker, Uf2Block, UF2_FLAG_NOFLASH, UF2_PAYLOAD_SIZE,
};

use boot_sector::FatBootBlock;
use dir::{padded_name, DirEntry, DIR_ENTRY_SIZE};
use files::{FileContent, FileTable};
use layout::{Layout, Region, CLUSTER_OFFSET, FAT_EOC, SECTOR_SIZE};

pub struct GhostFat<F: FlashBank> {
    flash: F,
    cfg: BoardConfig,
    layout: Layout,
    files: FileTable,
    flasher: Flasher,
    tracker: TransferTracker,
    /// Milliseconds since boot. On a preemptive scheduler this and the
    /// deadline must be lock-protected or atomic.
    clock_ms: u32,
    reset_deadline: Option<u32>,
    fault: Option<WriteFault>,
}

impl<F: FlashBank> GhostFat<F> {
    pub fn new(cfg: BoardConfig, flash: F) -> Self {
        let files = FileTable::build(&cfg, &flash);
        GhostFat {
            layout: Layout::new(cfg.num_fat_sectors),
            files,
            flash,
            cfg,
            flasher: Flasher::new(),
            tracker: TransferTracker::new(),
            clock_ms: 0,
            reset_deadline: None,
            fault: None,
        }
    }

    pub fn num_sectors(&self) -> u32 {
        self.layout.num_sectors
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn files(&self) -> &FileTable {
        &self.files
    }

    pub fn transfer(&self) -> &TransferTracker {
        &self.tracker
    }

    /// The unrecoverable flash fault, if one was hit. Drives the failure
    /// indicator; the write path stops committing.
    pub fn fault(&self) -> Option<WriteFault> {
        self.fault
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Milliseconds until the armed deferred reset fires.
    pub fn reset_delay_remaining(&self) -> Option<u32> {
        self.reset_deadline.map(|d| d.saturating_sub(self.clock_ms))
    }

    /// Advance the millisecond clock. Returns true when an armed deferred
    /// reset has expired; the caller must then perform the hard system reset.
    pub fn tick_1ms(&mut self) -> bool {
        self.clock_ms = self.clock_ms.wrapping_add(1);
        matches!(self.reset_deadline, Some(deadline) if self.clock_ms >= deadline)
    }

    fn arm_reset(&mut self, delay_ms: u32) {
        self.reset_deadline = Some(self.clock_ms.wrapping_add(delay_ms));
    }

    /// Synthesize one sector. Deterministic and side-effect-free.
    pub fn read_sector(&self, lba: u32, out: &mut [u8; SECTOR_SIZE]) {
        out.fill(0);
        match self.layout.classify(lba) {
            Some((Region::Boot, _)) => self.boot_sector(out),
            Some((Region::Fat, offset)) => self.fat_sector(offset, out),
            Some((Region::RootDir, offset)) => {
                if offset == 0 {
                    self.root_dir_sector(out);
                }
            }
            Some((Region::Data, offset)) => self.data_sector(offset, out),
            None => {}
        }
    }

    fn boot_sector(&self, out: &mut [u8; SECTOR_SIZE]) {
        let block = FatBootBlock::new(&self.layout, self.cfg.volume_label);
        let bytes = block.as_bytes();
        out[..bytes.len()].copy_from_slice(bytes);
        out[510] = 0x55;
        out[511] = 0xAA;
    }

    /// One sector of either allocation-table copy, recomputed per read.
    fn fat_sector(&self, offset: u32, out: &mut [u8; SECTOR_SIZE]) {
        let mut index = offset;
        if index >= self.layout.sectors_per_fat {
            index -= self.layout.sectors_per_fat;
        }

        for i in 0..SECTOR_SIZE as u32 / 2 {
            let cluster = index * 256 + i;
            let value = match cluster {
                0 => 0xFFF0,
                1 => FAT_EOC,
                _ => self.fat_entry(cluster - CLUSTER_OFFSET),
            };
            out[2 * i as usize..2 * i as usize + 2].copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Chain value for the cluster backed by a data-region sector.
    fn fat_entry(&self, data_sector: u32) -> u16 {
        for file in self.files.iter() {
            let clusters = file.chain_clusters();
            if clusters == 0 {
                continue;
            }
            let last = file.first_sector + clusters - 1;
            if data_sector >= file.first_sector && data_sector <= last {
                return if data_sector == last {
                    FAT_EOC
                } else {
                    (data_sector + CLUSTER_OFFSET + 1) as u16
                };
            }
        }
        0
    }

    fn root_dir_sector(&self, out: &mut [u8; SECTOR_SIZE]) {
        let label = DirEntry::volume_label(padded_name(self.cfg.volume_label));
        out[..DIR_ENTRY_SIZE].copy_from_slice(label.as_bytes());

        for (i, file) in self.files.iter().enumerate() {
            let start_cluster = if file.size > 0 {
                (file.first_sector + CLUSTER_OFFSET) as u16
            } else {
                0
            };
            let entry = DirEntry::file(file.name, start_cluster, file.size);
            let at = (i + 1) * DIR_ENTRY_SIZE;
            out[at..at + DIR_ENTRY_SIZE].copy_from_slice(entry.as_bytes());
        }
    }

    fn data_sector(&self, offset: u32, out: &mut [u8; SECTOR_SIZE]) {
        let (file, rel) = match self.files.file_at_sector(offset) {
            Some(found) => found,
            None => return,
        };
        match file.content {
            FileContent::Text(text) => {
                let len = files::text_file_length(text.as_bytes());
                out[..len].copy_from_slice(&text.as_bytes()[..len]);
            }
            FileContent::FlashText { addr } => {
                let mut buf = [0u8; SECTOR_SIZE];
                self.flash.read(addr, &mut buf);
                let len = files::text_file_length(&buf);
                out[..len].copy_from_slice(&buf[..len]);
            }
            FileContent::FirmwareUf2 => {
                let base = self.cfg.flash.base;
                let total = self.cfg.flash.total_size() / UF2_PAYLOAD_SIZE as u32;
                self.mirror_block(base, total, rel, out);
            }
            FileContent::ConfigUf2 { region } => {
                let total = region.length / UF2_PAYLOAD_SIZE as u32;
                self.mirror_block(region.start, total, rel, out);
            }
            FileContent::Segmented { table } => {
                files::segmented_read_sector(&self.flash, self.cfg.user_flash, table, rel, out);
            }
        }
    }

    /// Encode one outbound transfer block mirroring 256 bytes of flash.
    fn mirror_block(&self, base: u32, num_blocks: u32, block_no: u32, out: &mut [u8; SECTOR_SIZE]) {
        let addr = base + block_no * UF2_PAYLOAD_SIZE as u32;
        let mut block = Uf2Block::prototype(num_blocks, self.cfg.family_id);
        block.target_addr = U32::new(addr);
        block.payload_size = U32::new(UF2_PAYLOAD_SIZE as u32);
        block.block_no = U32::new(block_no);
        self.flash.read(addr, &mut block.data[..UF2_PAYLOAD_SIZE]);
        out.copy_from_slice(block.as_bytes());
    }

    /// Accept a host write. Only data-region sectors are meaningful; hosts
    /// allocate fresh clusters when copying a file in, so the index carries
    /// no information. Writes elsewhere are silently ignored.
    pub fn write_sector(&mut self, lba: u32, data: &[u8; SECTOR_SIZE]) {
        if self.fault.is_some() {
            return;
        }
        if !matches!(self.layout.classify(lba), Some((Region::Data, _))) {
            self.note_stray_activity();
            return;
        }
        let block = match Uf2Block::parse(data) {
            Some(block) => block,
            None => {
                self.note_stray_activity();
                return;
            }
        };
        if !block.family_accepted(self.cfg.family_id) {
            debug!("foreign family {=u32:x} ignored", block.family_id.get());
            self.note_stray_activity();
            return;
        }

        match self
            .tracker
            .offer(block.block_no.get(), block.num_blocks.get())
        {
            BlockDisposition::Rejected => self.arm_reset(RESET_DELAY_STALLED_MS),
            BlockDisposition::AlreadyComplete => {}
            BlockDisposition::Duplicate => self.arm_reset(RESET_DELAY_STALLED_MS),
            BlockDisposition::Recorded => {
                self.commit(&block);
                self.arm_reset(RESET_DELAY_STALLED_MS);
            }
            BlockDisposition::Completed => {
                self.commit(&block);
                // Wait a little before resetting so the host finishes its
                // transfer teardown cleanly.
                self.arm_reset(RESET_DELAY_COMPLETE_MS);
            }
        }
    }

    /// Program one accepted block. A block the content policy discards still
    /// counted toward progress.
    fn commit(&mut self, block: &Uf2Block) {
        if !self.policy_allows(block) {
            debug!("skip block at {=u32:x}", block.target_addr.get());
            return;
        }
        let result = self.flasher.write(
            &mut self.flash,
            &self.cfg.flash,
            block.target_addr.get(),
            block.payload(),
            self.cfg.failsafe,
        );
        if let Err(fault) = result {
            warning!("flash write fault, halting transfer");
            self.fault = Some(fault);
        }
    }

    fn policy_allows(&self, block: &Uf2Block) -> bool {
        let addr = block.target_addr.get();
        let size = block.payload_size.get();
        if block.has_flag(UF2_FLAG_NOFLASH) {
            return false;
        }
        if size > UF2_PAYLOAD_SIZE as u32 {
            return false;
        }
        if addr & 0xFF != 0 {
            return false;
        }
        if !self.cfg.user_flash.contains(addr, size) {
            return false;
        }
        if let Some(devspec) = self.cfg.devspec_start {
            // Device-unique sub-region: payload must carry our UID.
            if addr >= devspec && block.uid_words() != self.cfg.device_uid {
                return false;
            }
        }
        true
    }

    fn note_stray_activity(&mut self) {
        if self.tracker.in_progress() && !self.tracker.is_complete() {
            self.arm_reset(RESET_DELAY_STALLED_MS);
        }
    }
}
