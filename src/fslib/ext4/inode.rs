//! Decoding of ext4 inodes.

use super::GroupDesc;
use super::Superblock;
use crate::Error;
use crate::Result;
use crate::io::Image;
use byteorder::ByteOrder;
use byteorder::LittleEndian;

/// File type: FIFO.
pub const S_IFIFO: u16 = 0x1000;
/// File type: character device.
pub const S_IFCHR: u16 = 0x2000;
/// File type: directory.
pub const S_IFDIR: u16 = 0x4000;
/// File type: block device.
pub const S_IFBLK: u16 = 0x6000;
/// File type: regular file.
pub const S_IFREG: u16 = 0x8000;
/// File type: symbolic link.
pub const S_IFLNK: u16 = 0xa000;
/// File type: socket.
pub const S_IFSOCK: u16 = 0xc000;
/// Mask of the file type bits in an inode's mode.
pub const S_IFMT: u16 = 0xf000;

/// Inode flag: the file's blocks are mapped by extents.
pub const EXTENTS_FL: u32 = 0x80000;
/// Inode flag: the directory uses hashed indexes.
pub const INDEX_FL: u32 = 0x1000;

/// The size of the `i_block` field in bytes.
pub const I_BLOCK_SIZE: usize = 60;

/// The size of the original inode structure, the smallest possible.
pub const GOOD_OLD_INODE_SIZE: u64 = 128;

/// An ext4 inode.
#[derive(Clone, Debug)]
pub struct Inode {
    /// File type and permissions.
    pub mode: u16,
    /// User ID.
    pub uid: u16,
    /// Size in bytes (low 32 bits).
    pub size_lo: u32,
    /// Timestamp of the last access.
    pub atime: u32,
    /// Timestamp of the last metadata change.
    pub ctime: u32,
    /// Timestamp of the last content change.
    pub mtime: u32,
    /// Timestamp of the deletion.
    pub dtime: u32,
    /// Group ID.
    pub gid: u16,
    /// The number of hard links.
    pub links_count: u16,
    /// The number of 512-byte sectors in use (low 32 bits).
    pub blocks_lo: u32,
    /// Inode flags.
    pub flags: u32,
    /// Block map or extent tree.
    pub block: [u8; I_BLOCK_SIZE],
    /// File version.
    pub generation: u32,
    /// Extended attribute block (low 32 bits).
    pub file_acl_lo: u32,
    /// Size in bytes (high 32 bits).
    pub size_hi: u32,
}

impl Inode {
    /// Decodes an inode from its on-disk representation.
    pub fn parse(buf: &[u8]) -> Self {
        let mut block = [0; I_BLOCK_SIZE];
        block.copy_from_slice(&buf[40..40 + I_BLOCK_SIZE]);
        Self {
            mode: LittleEndian::read_u16(&buf[0..]),
            uid: LittleEndian::read_u16(&buf[2..]),
            size_lo: LittleEndian::read_u32(&buf[4..]),
            atime: LittleEndian::read_u32(&buf[8..]),
            ctime: LittleEndian::read_u32(&buf[12..]),
            mtime: LittleEndian::read_u32(&buf[16..]),
            dtime: LittleEndian::read_u32(&buf[20..]),
            gid: LittleEndian::read_u16(&buf[24..]),
            links_count: LittleEndian::read_u16(&buf[26..]),
            blocks_lo: LittleEndian::read_u32(&buf[28..]),
            flags: LittleEndian::read_u32(&buf[32..]),
            block,
            generation: LittleEndian::read_u32(&buf[100..]),
            file_acl_lo: LittleEndian::read_u32(&buf[104..]),
            size_hi: LittleEndian::read_u32(&buf[108..]),
        }
    }

    /// Returns the size of the file in bytes.
    pub fn size(&self) -> u64 {
        ((self.size_hi as u64) << 32) | self.size_lo as u64
    }

    /// Returns the file type bits of the mode.
    pub fn file_type(&self) -> u16 {
        self.mode & S_IFMT
    }

    /// Tells whether the inode is a directory.
    pub fn is_dir(&self) -> bool {
        self.file_type() == S_IFDIR
    }
}

/// Reads the inode with the given 1-based number.
pub fn read_inode(
    img: &mut Image,
    sb: &Superblock,
    descs: &[GroupDesc],
    ino: u32,
) -> Result<Inode> {
    if ino == super::UNUSED_INO || sb.inodes_per_group == 0 {
        return Err(Error::NotFound);
    }

    let bg_idx = ((ino - 1) / sb.inodes_per_group) as usize;
    let desc = descs.get(bg_idx).ok_or(Error::NotFound)?;

    let table = desc.inode_table_lo as u64 * sb.block_size();
    let off = table + (ino - 1) as u64 * sb.inode_size();

    // The fixed part of the structure is always present, whatever size the
    // superblock declares
    let len = sb.inode_size().max(GOOD_OLD_INODE_SIZE);
    let buf = img.read_vec(off, len as usize)?;
    Ok(Inode::parse(&buf))
}
