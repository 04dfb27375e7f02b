//! Decoding of the ext4 on-disk layout.

pub mod dir;
pub mod extent;
pub mod inode;

use crate::Error;
use crate::Result;
use crate::io::Image;
use byteorder::ByteOrder;
use byteorder::LittleEndian;
use log::debug;

/// The offset of the superblock from the beginning of the image.
pub const SUPERBLOCK_OFFSET: u64 = 1024;
/// The size of the superblock structure in bytes.
pub const SUPERBLOCK_SIZE: usize = 1024;
/// The filesystem's signature.
pub const EXT4_SIGNATURE: u16 = 0xef53;

/// The unused inode.
pub const UNUSED_INO: u32 = 0;
/// The inode storing bad blocks.
pub const BAD_INO: u32 = 1;
/// The root inode.
pub const ROOT_INO: u32 = 2;

/// The size of a block group descriptor without the 64-bit feature.
pub const MIN_DESC_SIZE: u16 = 32;

/// Readonly-compatible feature: sparse superblock copies.
pub const RO_COMPAT_SPARSE_SUPER: u32 = 0x1;
/// Incompatible feature: files are mapped by extents.
pub const INCOMPAT_EXTENTS: u32 = 0x40;
/// Incompatible feature: the filesystem is sized over 2^32 blocks.
pub const INCOMPAT_64BIT: u32 = 0x80;

/// The ext4 superblock, read once at mount and retained until umount.
///
/// Multi-byte fields are stored decoded; `_lo`/`_hi` pairs keep the on-disk
/// split and are recombined by accessors.
#[derive(Clone, Debug)]
pub struct Superblock {
    /// Total number of inodes.
    pub inodes_count: u32,
    /// Total number of blocks (low 32 bits).
    pub blocks_count_lo: u32,
    /// Number of blocks reserved for the superuser (low 32 bits).
    pub r_blocks_count_lo: u32,
    /// Number of unallocated blocks (low 32 bits).
    pub free_blocks_count_lo: u32,
    /// Number of unallocated inodes.
    pub free_inodes_count: u32,
    /// The first data block.
    pub first_data_block: u32,
    /// log2(block_size) - 10
    pub log_block_size: u32,
    /// The number of blocks per block group.
    pub blocks_per_group: u32,
    /// The number of inodes per block group.
    pub inodes_per_group: u32,
    /// The timestamp of the last mount.
    pub mtime: u32,
    /// The timestamp of the last write.
    pub wtime: u32,
    /// The number of mounts since the last check.
    pub mnt_count: u16,
    /// The number of mounts allowed before a check.
    pub max_mnt_count: u16,
    /// The signature, expected to be [`EXT4_SIGNATURE`].
    pub magic: u16,
    /// The filesystem's state.
    pub state: u16,
    /// The action to take on error.
    pub errors: u16,
    /// The minor revision level.
    pub minor_rev_level: u16,
    /// The timestamp of the last check.
    pub lastcheck: u32,
    /// The interval between mandatory checks.
    pub checkinterval: u32,
    /// The OS the filesystem was created from.
    pub creator_os: u32,
    /// The revision level.
    pub rev_level: u32,
    /// The UID that may use reserved blocks.
    pub def_resuid: u16,
    /// The GID that may use reserved blocks.
    pub def_resgid: u16,
    /// The first non-reserved inode.
    pub first_ino: u32,
    /// The size of an inode structure in bytes.
    pub inode_size: u16,
    /// The block group holding this superblock copy.
    pub block_group_nr: u16,
    /// Compatible feature set.
    pub feature_compat: u32,
    /// Incompatible feature set.
    pub feature_incompat: u32,
    /// Readonly-compatible feature set.
    pub feature_ro_compat: u32,
    /// The filesystem's UUID.
    pub uuid: [u8; 16],
    /// The volume name, NUL-padded.
    pub volume_name: [u8; 16],
    /// The path the filesystem was last mounted to, NUL-padded.
    pub last_mounted: [u8; 64],
    /// The journal inode.
    pub journal_inum: u32,
    /// Seeds for the htree hash.
    pub hash_seed: [u32; 4],
    /// The default htree hash version.
    pub def_hash_version: u8,
    /// The size of a block group descriptor, if the 64-bit feature is set.
    pub desc_size: u16,
    /// Total number of blocks (high 32 bits).
    pub blocks_count_hi: u32,
    /// Number of reserved blocks (high 32 bits).
    pub r_blocks_count_hi: u32,
    /// Number of unallocated blocks (high 32 bits).
    pub free_blocks_count_hi: u32,
}

impl Superblock {
    /// Reads the superblock from the image, checking its signature.
    pub fn read(img: &mut Image) -> Result<Self> {
        let buf = img.read_vec(SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE)?;
        let sb = Self::parse(&buf);
        if sb.magic != EXT4_SIGNATURE {
            return Err(Error::NotExt4);
        }
        debug!(
            "ext4 superblock: {} blocks, {} inodes, block size {}",
            sb.blocks_count(),
            sb.inodes_count,
            sb.block_size()
        );
        Ok(sb)
    }

    /// Decodes the superblock from its on-disk representation.
    ///
    /// `buf` must be at least [`SUPERBLOCK_SIZE`] bytes long.
    pub fn parse(buf: &[u8]) -> Self {
        let mut uuid = [0; 16];
        uuid.copy_from_slice(&buf[0x68..0x78]);
        let mut volume_name = [0; 16];
        volume_name.copy_from_slice(&buf[0x78..0x88]);
        let mut last_mounted = [0; 64];
        last_mounted.copy_from_slice(&buf[0x88..0xc8]);
        let mut hash_seed = [0; 4];
        LittleEndian::read_u32_into(&buf[0xec..0xfc], &mut hash_seed);

        Self {
            inodes_count: LittleEndian::read_u32(&buf[0x0..]),
            blocks_count_lo: LittleEndian::read_u32(&buf[0x4..]),
            r_blocks_count_lo: LittleEndian::read_u32(&buf[0x8..]),
            free_blocks_count_lo: LittleEndian::read_u32(&buf[0xc..]),
            free_inodes_count: LittleEndian::read_u32(&buf[0x10..]),
            first_data_block: LittleEndian::read_u32(&buf[0x14..]),
            log_block_size: LittleEndian::read_u32(&buf[0x18..]),
            blocks_per_group: LittleEndian::read_u32(&buf[0x20..]),
            inodes_per_group: LittleEndian::read_u32(&buf[0x28..]),
            mtime: LittleEndian::read_u32(&buf[0x2c..]),
            wtime: LittleEndian::read_u32(&buf[0x30..]),
            mnt_count: LittleEndian::read_u16(&buf[0x34..]),
            max_mnt_count: LittleEndian::read_u16(&buf[0x36..]),
            magic: LittleEndian::read_u16(&buf[0x38..]),
            state: LittleEndian::read_u16(&buf[0x3a..]),
            errors: LittleEndian::read_u16(&buf[0x3c..]),
            minor_rev_level: LittleEndian::read_u16(&buf[0x3e..]),
            lastcheck: LittleEndian::read_u32(&buf[0x40..]),
            checkinterval: LittleEndian::read_u32(&buf[0x44..]),
            creator_os: LittleEndian::read_u32(&buf[0x48..]),
            rev_level: LittleEndian::read_u32(&buf[0x4c..]),
            def_resuid: LittleEndian::read_u16(&buf[0x50..]),
            def_resgid: LittleEndian::read_u16(&buf[0x52..]),
            first_ino: LittleEndian::read_u32(&buf[0x54..]),
            inode_size: LittleEndian::read_u16(&buf[0x58..]),
            block_group_nr: LittleEndian::read_u16(&buf[0x5a..]),
            feature_compat: LittleEndian::read_u32(&buf[0x5c..]),
            feature_incompat: LittleEndian::read_u32(&buf[0x60..]),
            feature_ro_compat: LittleEndian::read_u32(&buf[0x64..]),
            uuid,
            volume_name,
            last_mounted,
            journal_inum: LittleEndian::read_u32(&buf[0xe0..]),
            hash_seed,
            def_hash_version: buf[0xfc],
            desc_size: LittleEndian::read_u16(&buf[0xfe..]),
            blocks_count_hi: LittleEndian::read_u32(&buf[0x150..]),
            r_blocks_count_hi: LittleEndian::read_u32(&buf[0x154..]),
            free_blocks_count_hi: LittleEndian::read_u32(&buf[0x158..]),
        }
    }

    /// Returns the size of a block in bytes.
    pub fn block_size(&self) -> u64 {
        1024 << self.log_block_size
    }

    /// Returns the total number of blocks.
    pub fn blocks_count(&self) -> u64 {
        ((self.blocks_count_hi as u64) << 32) | self.blocks_count_lo as u64
    }

    /// Returns the number of reserved blocks.
    pub fn r_blocks_count(&self) -> u64 {
        ((self.r_blocks_count_hi as u64) << 32) | self.r_blocks_count_lo as u64
    }

    /// Returns the number of unallocated blocks.
    pub fn free_blocks_count(&self) -> u64 {
        ((self.free_blocks_count_hi as u64) << 32) | self.free_blocks_count_lo as u64
    }

    /// Returns the number of block groups.
    pub fn bg_groups(&self) -> u32 {
        if self.blocks_per_group == 0 {
            return 0;
        }
        let blocks = self.blocks_count().saturating_sub(self.first_data_block as u64);
        blocks.div_ceil(self.blocks_per_group as u64) as u32
    }

    /// Returns the size of an inode structure in bytes.
    pub fn inode_size(&self) -> u64 {
        if self.rev_level >= 1 {
            self.inode_size as u64
        } else {
            inode::GOOD_OLD_INODE_SIZE
        }
    }

    /// Returns the stride between block group descriptor entries.
    pub fn desc_stride(&self) -> u64 {
        // Images without the 64-bit feature may leave the field zero
        if self.desc_size >= MIN_DESC_SIZE {
            self.desc_size as u64
        } else {
            MIN_DESC_SIZE as u64
        }
    }

    /// Tells whether the block group at index `i` carries a superblock copy.
    ///
    /// Without the sparse-super feature, every group does. With it, only
    /// groups 0 and 1 and groups whose index is a power of 3, 5 or 7.
    pub fn bg_has_sb(&self, i: u32) -> bool {
        if self.feature_ro_compat & RO_COMPAT_SPARSE_SUPER == 0 {
            return true;
        }
        if i <= 1 {
            return true;
        }
        is_power_of(i, 3) || is_power_of(i, 5) || is_power_of(i, 7)
    }
}

/// Tells whether `a` is a power of `b`, with `b > 1` and exponent at least 1.
fn is_power_of(mut a: u32, b: u32) -> bool {
    while a > b {
        if a % b != 0 {
            return false;
        }
        a /= b;
    }
    a == b
}

/// A block group descriptor, in its minimal 32-byte form.
#[derive(Clone, Copy, Debug, Default)]
pub struct GroupDesc {
    /// The block of the block usage bitmap (low 32 bits).
    pub block_bitmap_lo: u32,
    /// The block of the inode usage bitmap (low 32 bits).
    pub inode_bitmap_lo: u32,
    /// The first block of the inode table (low 32 bits).
    pub inode_table_lo: u32,
    /// The number of unallocated blocks in the group (low 16 bits).
    pub free_blocks_count_lo: u16,
    /// The number of unallocated inodes in the group (low 16 bits).
    pub free_inodes_count_lo: u16,
    /// The number of directories in the group (low 16 bits).
    pub used_dirs_count_lo: u16,
    /// Group flags.
    pub flags: u16,
}

impl GroupDesc {
    /// Decodes a descriptor from its on-disk representation.
    pub fn parse(buf: &[u8]) -> Self {
        Self {
            block_bitmap_lo: LittleEndian::read_u32(&buf[0x0..]),
            inode_bitmap_lo: LittleEndian::read_u32(&buf[0x4..]),
            inode_table_lo: LittleEndian::read_u32(&buf[0x8..]),
            free_blocks_count_lo: LittleEndian::read_u16(&buf[0xc..]),
            free_inodes_count_lo: LittleEndian::read_u16(&buf[0xe..]),
            used_dirs_count_lo: LittleEndian::read_u16(&buf[0x10..]),
            flags: LittleEndian::read_u16(&buf[0x12..]),
        }
    }
}

/// Reads the block group descriptor table.
///
/// The table lives in the block following the superblock of the first group
/// that carries one; groups are scanned in ascending order.
pub fn read_group_descs(img: &mut Image, sb: &Superblock) -> Result<Vec<GroupDesc>> {
    if sb.feature_incompat & INCOMPAT_64BIT != 0 && sb.desc_size > MIN_DESC_SIZE {
        return Err(Error::Unsupported64Bit);
    }

    let groups = sb.bg_groups();
    let stride = sb.desc_stride();
    // Group 0 always carries a superblock, but an image may declare no group
    let Some(i) = (0..groups).find(|i| sb.bg_has_sb(*i)) else {
        return Ok(Vec::new());
    };

    // One block past the group's superblock
    let start_blk = sb.first_data_block as u64 + i as u64 * sb.blocks_per_group as u64;
    let off = (start_blk + 1) * sb.block_size();

    let buf = img.read_vec(off, (groups as u64 * stride) as usize)?;
    let descs = (0..groups as usize)
        .map(|j| GroupDesc::parse(&buf[j * stride as usize..]))
        .collect();
    debug!("ext4 descriptor table: {groups} groups at offset {off}");
    Ok(descs)
}
