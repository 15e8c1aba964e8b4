//! End-to-end volume behavior: synthesized sectors on the read side, full
//! transfer sessions on the write side.

use uf2_bootloader::config::BoardConfig;
use uf2_bootloader::ghostfat::layout::SECTOR_SIZE;
use uf2_bootloader::protocol::{Uf2Block, UF2_FLAG_NOFLASH, UF2_PAYLOAD_SIZE};
use uf2_bootloader::testing::{test_config, MemFlash};
use uf2_bootloader::{GhostFat, WriteFault};

use zerocopy::{AsBytes, U32};

fn agent(cfg: BoardConfig) -> GhostFat<MemFlash> {
    GhostFat::new(cfg, MemFlash::new())
}

fn read(gf: &GhostFat<MemFlash>, lba: u32) -> [u8; SECTOR_SIZE] {
    let mut sector = [0u8; SECTOR_SIZE];
    gf.read_sector(lba, &mut sector);
    sector
}

/// An inbound block carrying `payload` for `addr`, one of `total`.
fn inbound(cfg: &BoardConfig, block_no: u32, total: u32, addr: u32, payload: &[u8]) -> [u8; 512] {
    let mut block = Uf2Block::prototype(total, cfg.family_id);
    block.target_addr = U32::new(addr);
    block.payload_size = U32::new(payload.len() as u32);
    block.block_no = U32::new(block_no);
    block.data[..payload.len()].copy_from_slice(payload);
    let mut sector = [0u8; 512];
    sector.copy_from_slice(block.as_bytes());
    sector
}

fn data_lba(gf: &GhostFat<MemFlash>, offset: u32) -> u32 {
    gf.layout().start_clusters() + offset
}

#[test]
fn boot_sector_describes_the_volume() {
    let cfg = test_config();
    let gf = agent(cfg);
    let sector = read(&gf, 0);

    assert_eq!(&sector[510..], &[0x55, 0xAA]);
    assert_eq!(&sector[3..11], b"UF2 UF2 ");
    assert_eq!(&sector[43..54], b"TESTBOOT   ");
    let total = u16::from_le_bytes([sector[19], sector[20]]);
    assert_eq!(total as u32, cfg.num_fat_sectors - 2);
}

#[test]
fn both_fat_copies_are_identical_and_reserve_the_head() {
    let gf = agent(test_config());
    let fat0 = read(&gf, gf.layout().start_fat0());
    let fat1 = read(&gf, gf.layout().start_fat1());
    assert_eq!(fat0, fat1);

    // Clusters 0 and 1 are reserved markers.
    assert_eq!(&fat0[0..2], &0xFFF0u16.to_le_bytes());
    assert_eq!(&fat0[2..4], &0xFFFFu16.to_le_bytes());
}

#[test]
fn root_directory_lists_label_and_files() {
    let gf = agent(test_config());
    let dir = read(&gf, gf.layout().start_rootdir());

    assert_eq!(&dir[0..11], b"TESTBOOT   ");
    assert_eq!(dir[11], 0x28);
    assert_eq!(&dir[32..43], b"INFO_UF2TXT");
    assert_eq!(&dir[64..75], b"CURRENT UF2");

    // Only the first directory sector carries entries.
    let rest = read(&gf, gf.layout().start_rootdir() + 1);
    assert_eq!(rest, [0u8; SECTOR_SIZE]);
}

#[test]
fn info_file_content_is_served() {
    let cfg = test_config();
    let gf = agent(cfg);
    let info = gf.files().by_name("INFO_UF2TXT").unwrap();
    let sector = read(&gf, data_lba(&gf, info.first_sector));
    assert!(sector.starts_with(cfg.info_text.as_bytes()));
}

#[test]
fn firmware_mirror_blocks_reflect_flash() {
    let cfg = test_config();
    let mut flash = MemFlash::new();
    flash.preload(cfg.flash.base + 256, b"mirrored");
    let gf = GhostFat::new(cfg, flash);

    let current = gf.files().by_name("CURRENT UF2").unwrap();
    let sector = read(&gf, data_lba(&gf, current.first_sector + 1));

    let block = Uf2Block::parse(&sector).unwrap();
    assert_eq!(block.target_addr.get(), cfg.flash.base + 256);
    assert_eq!(block.payload_size.get(), UF2_PAYLOAD_SIZE as u32);
    assert_eq!(block.block_no.get(), 1);
    assert_eq!(block.num_blocks.get(), cfg.flash.total_size() / 256);
    assert_eq!(&block.payload()[..8], b"mirrored");
}

#[test]
fn mirror_blocks_replayed_on_a_fresh_device_reproduce_user_flash() {
    let cfg = test_config();
    let mut source = MemFlash::new();
    for offset in (0..0x2000u32).step_by(64) {
        source.preload(
            cfg.user_flash.start + offset,
            &offset.to_le_bytes(),
        );
    }
    let origin = GhostFat::new(cfg, source);
    let current = origin.files().by_name("CURRENT UF2").unwrap();

    let mut target = GhostFat::new(cfg, MemFlash::new());
    for i in 0..current.reserved_sectors() {
        let sector = read(&origin, data_lba(&origin, current.first_sector + i));
        target.write_sector(data_lba(&target, i), &sector);
    }

    assert!(target.transfer().is_complete());
    assert!(target.fault().is_none());
    let window = cfg.user_flash;
    assert_eq!(
        origin.flash().bytes(window.start, window.length as usize),
        target.flash().bytes(window.start, window.length as usize),
    );
}

#[test]
fn reads_past_the_volume_are_blank() {
    let gf = agent(test_config());
    assert_eq!(read(&gf, gf.num_sectors()), [0u8; SECTOR_SIZE]);
}

#[test]
fn writes_to_read_only_regions_are_ignored() {
    let cfg = test_config();
    let mut gf = agent(cfg);
    let garbage = [0xA5u8; 512];

    gf.write_sector(0, &garbage);
    gf.write_sector(gf.layout().start_fat0(), &garbage);
    gf.write_sector(gf.layout().start_rootdir(), &garbage);

    assert_eq!(gf.flash().program_calls, 0);
    assert!(!gf.transfer().in_progress());
    // The volume is unchanged.
    let sector = read(&gf, 0);
    assert_eq!(&sector[510..], &[0x55, 0xAA]);
}

#[test]
fn out_of_order_transfer_completes_and_schedules_reset() {
    let cfg = test_config();
    let mut gf = agent(cfg);
    let base = cfg.user_flash.start;

    let payloads = [[0x11u8; 256], [0x22u8; 256], [0x33u8; 256]];
    for (i, lba_off) in [(2u32, 7u32), (0, 5), (1, 9)] {
        let sector = inbound(&cfg, i, 3, base + i * 256, &payloads[i as usize]);
        gf.write_sector(data_lba(&gf, lba_off), &sector);
    }

    assert!(gf.transfer().is_complete());
    for (i, payload) in payloads.iter().enumerate() {
        assert_eq!(gf.flash().bytes(base + i as u32 * 256, 256), payload);
    }

    // Completion arms the short settle delay, not the stall timeout.
    assert_eq!(gf.reset_delay_remaining(), Some(30));
    for _ in 0..29 {
        assert!(!gf.tick_1ms());
    }
    assert!(gf.tick_1ms());
}

#[test]
fn partial_transfer_times_out_on_the_stall_deadline() {
    let cfg = test_config();
    let mut gf = agent(cfg);
    let sector = inbound(&cfg, 0, 3, cfg.user_flash.start, &[0u8; 256]);
    gf.write_sector(data_lba(&gf, 0), &sector);

    assert!(gf.transfer().in_progress());
    assert!(!gf.transfer().is_complete());
    assert_eq!(gf.reset_delay_remaining(), Some(500));
    for _ in 0..499 {
        assert!(!gf.tick_1ms());
    }
    assert!(gf.tick_1ms());
}

#[test]
fn duplicate_blocks_do_not_reprogram_flash() {
    let cfg = test_config();
    let mut gf = agent(cfg);
    let sector = inbound(&cfg, 0, 3, cfg.user_flash.start, &[0x5Au8; 256]);

    gf.write_sector(data_lba(&gf, 0), &sector);
    let programmed = gf.flash().program_calls;
    assert!(programmed > 0);

    // The host retries the same block into a different cluster.
    gf.write_sector(data_lba(&gf, 4), &sector);
    assert_eq!(gf.flash().program_calls, programmed);
    assert_eq!(gf.transfer().received(), 1);
}

#[test]
fn foreign_family_blocks_are_ignored() {
    let cfg = test_config();
    let mut gf = agent(cfg);
    let mut foreign = cfg;
    foreign.family_id ^= 1;
    let sector = inbound(&foreign, 0, 1, cfg.user_flash.start, &[0u8; 256]);

    gf.write_sector(data_lba(&gf, 0), &sector);
    assert!(!gf.transfer().in_progress());
    assert_eq!(gf.flash().program_calls, 0);
}

#[test]
fn noflash_blocks_count_but_do_not_program() {
    let cfg = test_config();
    let mut gf = agent(cfg);
    let mut block = Uf2Block::prototype(1, cfg.family_id);
    block.flags = U32::new(block.flags.get() | UF2_FLAG_NOFLASH);
    block.target_addr = U32::new(cfg.user_flash.start);
    block.payload_size = U32::new(256);
    let mut sector = [0u8; 512];
    sector.copy_from_slice(block.as_bytes());

    gf.write_sector(data_lba(&gf, 0), &sector);
    assert!(gf.transfer().is_complete());
    assert_eq!(gf.flash().program_calls, 0);
}

#[test]
fn blocks_outside_the_user_window_are_skipped() {
    let cfg = test_config();
    let mut gf = agent(cfg);

    // Below the window (the agent's own sector) and misaligned.
    for (i, addr) in [(0u32, cfg.flash.base), (1, cfg.user_flash.start + 0x80)] {
        let sector = inbound(&cfg, i, 2, addr, &[0u8; 128]);
        gf.write_sector(data_lba(&gf, i), &sector);
    }
    assert!(gf.transfer().is_complete());
    assert_eq!(gf.flash().program_calls, 0);
}

#[test]
fn protected_region_requires_the_device_uid() {
    let cfg = test_config();
    let devspec = cfg.devspec_start.unwrap();

    let mut wrong = [0u8; 256];
    wrong[..4].copy_from_slice(&0xBAD0_BAD0u32.to_le_bytes());
    let mut gf = agent(cfg);
    gf.write_sector(data_lba(&gf, 0), &inbound(&cfg, 0, 1, devspec, &wrong));
    assert_eq!(gf.flash().program_calls, 0);

    let mut right = [0u8; 256];
    for (i, word) in cfg.device_uid.iter().enumerate() {
        right[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    let mut gf = agent(cfg);
    gf.write_sector(data_lba(&gf, 0), &inbound(&cfg, 0, 1, devspec, &right));
    assert!(gf.flash().program_calls > 0);
    assert_eq!(gf.flash().bytes(devspec, 12), &right[..12]);
}

#[test]
fn rewriting_programmed_cells_latches_a_fault() {
    let cfg = test_config();
    let mut gf = agent(cfg);
    let addr = cfg.user_flash.start;

    gf.write_sector(data_lba(&gf, 0), &inbound(&cfg, 0, 3, addr, &[0x01u8; 256]));
    assert!(gf.fault().is_none());

    // A second block aimed at the same cells: the sector is already counted
    // as erased this session, so the overlap is unrecoverable.
    gf.write_sector(data_lba(&gf, 1), &inbound(&cfg, 1, 3, addr, &[0x02u8; 256]));
    assert_eq!(gf.fault(), Some(WriteFault::NotBlank));

    // The write path is halted; further blocks change nothing.
    let before = gf.flash().program_calls;
    gf.write_sector(data_lba(&gf, 2), &inbound(&cfg, 2, 3, addr + 0x200, &[0x03u8; 256]));
    assert_eq!(gf.flash().program_calls, before);
}

#[test]
fn failsafe_mode_erases_lazily() {
    let mut cfg = test_config();
    cfg.failsafe = true;
    let mut gf = agent(cfg);
    let sector = inbound(&cfg, 0, 1, cfg.user_flash.start, &[0u8; 256]);

    gf.write_sector(data_lba(&gf, 0), &sector);
    // Erased even though the sector was already blank.
    assert_eq!(gf.flash().erase_calls, 1);
    assert!(gf.transfer().is_complete());
}
