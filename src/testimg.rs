//! Fabricated filesystem images backing the frontend tests.

use byteorder::ByteOrder;
use byteorder::LittleEndian;
use std::io::Write;
use tempfile::NamedTempFile;

/// Writes `image` to a temporary file and returns its handle.
pub fn write_image(image: &[u8]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(image).unwrap();
    tmp
}

/// Writes an ext4 directory entry at `off` and returns the next offset.
fn put_dentry(buf: &mut [u8], off: usize, ino: u32, rec_len: u16, file_type: u8, name: &[u8]) -> usize {
    LittleEndian::write_u32(&mut buf[off..], ino);
    LittleEndian::write_u16(&mut buf[off + 4..], rec_len);
    buf[off + 6] = name.len() as u8;
    buf[off + 7] = file_type;
    buf[off + 8..off + 8 + name.len()].copy_from_slice(name);
    off + rec_len as usize
}

/// Writes an ext4 inode mapping one extent leaf at block `start`.
fn put_inode(buf: &mut [u8], off: usize, mode: u16, size: u32, start: u32) {
    LittleEndian::write_u16(&mut buf[off..], mode);
    LittleEndian::write_u32(&mut buf[off + 4..], size);
    LittleEndian::write_u16(&mut buf[off + 26..], 2);
    LittleEndian::write_u32(&mut buf[off + 32..], fslib::ext4::inode::EXTENTS_FL);
    let blk = off + 40;
    LittleEndian::write_u16(&mut buf[blk..], fslib::ext4::extent::EXTENT_MAGIC);
    LittleEndian::write_u16(&mut buf[blk + 2..], 1);
    LittleEndian::write_u16(&mut buf[blk + 4..], 4);
    LittleEndian::write_u16(&mut buf[blk + 6..], 0);
    LittleEndian::write_u32(&mut buf[blk + 12..], 0);
    LittleEndian::write_u16(&mut buf[blk + 16..], 1);
    LittleEndian::write_u16(&mut buf[blk + 18..], 0);
    LittleEndian::write_u32(&mut buf[blk + 20..], start);
}

/// Builds an ext4 image with 1024-byte blocks and one block group.
///
/// The root directory holds `boot/` (inode 11) and `hello` (inode 12,
/// 5 bytes). The inode table sits at block 5, the root directory data at
/// block 20, `boot`'s data at block 21 and `hello`'s data at block 22.
pub fn ext4_image() -> NamedTempFile {
    write_image(&ext4_image_bytes())
}

/// Returns the raw bytes of [`ext4_image`], for tests that corrupt them.
pub fn ext4_image_bytes() -> Vec<u8> {
    let mut buf = vec![0; 24 * 1024];

    let sb = 1024;
    LittleEndian::write_u32(&mut buf[sb..], 256);
    LittleEndian::write_u32(&mut buf[sb + 0x4..], 8192);
    LittleEndian::write_u32(&mut buf[sb + 0x14..], 1);
    LittleEndian::write_u32(&mut buf[sb + 0x18..], 0);
    LittleEndian::write_u32(&mut buf[sb + 0x20..], 8192);
    LittleEndian::write_u32(&mut buf[sb + 0x28..], 256);
    LittleEndian::write_u16(&mut buf[sb + 0x38..], fslib::ext4::EXT4_SIGNATURE);
    LittleEndian::write_u32(&mut buf[sb + 0x4c..], 1);
    LittleEndian::write_u16(&mut buf[sb + 0x58..], 128);
    LittleEndian::write_u32(&mut buf[sb + 0x60..], fslib::ext4::INCOMPAT_EXTENTS);
    LittleEndian::write_u32(&mut buf[sb + 0x64..], fslib::ext4::RO_COMPAT_SPARSE_SUPER);
    LittleEndian::write_u16(&mut buf[sb + 0xfe..], 32);

    // Group descriptor table at block 2
    LittleEndian::write_u32(&mut buf[2048 + 0x8..], 5);

    // Inode table at block 5
    let table = 5 * 1024;
    put_inode(&mut buf, table + 128, 0x4000 | 0o755, 1024, 20);
    put_inode(&mut buf, table + 10 * 128, 0x4000 | 0o755, 1024, 21);
    put_inode(&mut buf, table + 11 * 128, 0x8000 | 0o644, 5, 22);

    // Root directory data at block 20
    let mut off = put_dentry(&mut buf, 20 * 1024, 2, 12, 2, b".");
    off = put_dentry(&mut buf, off, 2, 12, 2, b"..");
    off = put_dentry(&mut buf, off, 11, 12, 2, b"boot");
    off = put_dentry(&mut buf, off, 12, 16, 1, b"hello");
    put_dentry(&mut buf, off, 0, 972, 0, b"");

    // boot's data at block 21
    let mut off = put_dentry(&mut buf, 21 * 1024, 11, 12, 2, b".");
    off = put_dentry(&mut buf, off, 2, 12, 2, b"..");
    put_dentry(&mut buf, off, 0, 1000, 0, b"");

    // hello's data at block 22
    buf[22 * 1024..22 * 1024 + 5].copy_from_slice(b"hello");

    buf
}

/// Writes the common part of a FAT boot sector.
fn put_fat_boot(buf: &mut [u8], reserved: u16, fats: u8, dir_entries: u16, fat_length: u16) {
    buf[3..11].copy_from_slice(b"MSDOS5.0");
    LittleEndian::write_u16(&mut buf[11..], 512);
    buf[13] = 1;
    LittleEndian::write_u16(&mut buf[14..], reserved);
    buf[16] = fats;
    LittleEndian::write_u16(&mut buf[17..], dir_entries);
    LittleEndian::write_u16(&mut buf[19..], 64);
    buf[21] = 0xf8;
    LittleEndian::write_u16(&mut buf[22..], fat_length);
}

/// Writes a FAT boot extension at `off`.
fn put_fat_bsx(buf: &mut [u8], off: usize, fs_type: &[u8; 8]) {
    buf[off] = 0x80;
    buf[off + 2] = 0x29;
    buf[off + 3..off + 7].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);
    buf[off + 7..off + 18].copy_from_slice(b"NO NAME    ");
    buf[off + 18..off + 26].copy_from_slice(fs_type);
}

/// Writes a FAT directory entry at `off`.
fn put_fat_dentry(buf: &mut [u8], off: usize, name: &[u8; 11], attr: u8, start: u16, size: u32) {
    buf[off..off + 11].copy_from_slice(name);
    buf[off + 11] = attr;
    LittleEndian::write_u16(&mut buf[off + 26..], start);
    LittleEndian::write_u32(&mut buf[off + 28..], size);
}

/// Builds a FAT16 image: 512-byte sectors, 1 sector per cluster, 1 reserved
/// sector, 2 FATs of 1 sector, 16 root entries.
///
/// The root directory (sector 3) holds `READ.ME` (5 bytes at cluster 2) and
/// the directory `SUB` (cluster 3) whose `..` entry points back at cluster 0.
pub fn fat16_image() -> NamedTempFile {
    let mut buf = vec![0; 8 * 512];
    put_fat_boot(&mut buf, 1, 2, 16, 1);
    put_fat_bsx(&mut buf, 36, b"FAT16   ");

    put_fat_dentry(&mut buf, 3 * 512, b"READ    ME ", 0x20, 2, 5);
    put_fat_dentry(&mut buf, 3 * 512 + 32, b"SUB        ", 0x10, 3, 0);

    buf[4 * 512..4 * 512 + 5].copy_from_slice(b"hello");

    put_fat_dentry(&mut buf, 5 * 512, b".          ", 0x10, 3, 0);
    put_fat_dentry(&mut buf, 5 * 512 + 32, b"..         ", 0x10, 0, 0);

    write_image(&buf)
}

/// Builds a FAT32 image: 512-byte sectors, 2 reserved sectors, fsinfo at
/// sector 1, root directory at cluster 2 holding a single file `A.TXT`.
pub fn fat32_image() -> NamedTempFile {
    let mut buf = vec![0; 8 * 512];
    put_fat_boot(&mut buf, 2, 2, 0, 0);
    LittleEndian::write_u32(&mut buf[32..], 128);
    LittleEndian::write_u32(&mut buf[36..], 128);
    LittleEndian::write_u32(&mut buf[44..], 2);
    LittleEndian::write_u16(&mut buf[48..], 1);
    LittleEndian::write_u16(&mut buf[50..], 6);
    put_fat_bsx(&mut buf, 64, b"FAT32   ");

    LittleEndian::write_u32(&mut buf[512..], fslib::fat::FSINFO_SIG1);
    LittleEndian::write_u32(&mut buf[512 + 0x1e4..], fslib::fat::FSINFO_SIG2);
    LittleEndian::write_u32(&mut buf[512 + 0x1e8..], 100);
    LittleEndian::write_u32(&mut buf[512 + 0x1ec..], 3);

    put_fat_dentry(&mut buf, 2 * 512, b"A       TXT", 0x20, 3, 2);
    buf[3 * 512..3 * 512 + 2].copy_from_slice(b"hi");

    write_image(&buf)
}
