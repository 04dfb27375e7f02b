//! Decoding of ext4 linear directory entries.

use super::Superblock;
use super::UNUSED_INO;
use super::extent::Extent;
use crate::Result;
use crate::io::Image;
use byteorder::ByteOrder;
use byteorder::LittleEndian;

/// The size of a directory entry's fixed header in bytes.
pub const DIRENT_HEADER_SIZE: usize = 8;
/// The maximum length of a directory entry name.
pub const NAME_LEN_MAX: usize = 255;
/// The maximum size of a directory entry structure in bytes.
pub const DIRENT_SIZE_MAX: usize = DIRENT_HEADER_SIZE + NAME_LEN_MAX;

/// A directory entry, naming one child of a directory.
#[derive(Clone, Debug)]
pub struct DirEntry {
    /// The inode the entry points to.
    pub inode: u32,
    /// The byte step to the next entry.
    pub rec_len: u16,
    /// The declared length of the name.
    pub name_len: u8,
    /// The type of the pointed file.
    pub file_type: u8,
    /// The name, `name_len` raw bytes.
    pub name: Vec<u8>,
}

/// Returns the structural step from an entry to the next one.
///
/// `rec_len` is clamped to the maximum structure size, the way the entry
/// would be captured into a fixed buffer.
fn dentry_step(rec_len: u16) -> u64 {
    (rec_len as usize).min(DIRENT_SIZE_MAX) as u64
}

/// Counts the entries in the directory data mapped by the given extent.
///
/// The scan halts on the terminating unused entry, on a record length too
/// small to step over, or at the end of the extent.
pub fn count_dentries(img: &mut Image, sb: &Superblock, ext: &Extent) -> Result<u32> {
    let start = ext.data_offset(sb);
    let end = start + ext.len as u64 * sb.block_size();
    let mut off = start;
    let mut count = 0;

    let mut header = [0; DIRENT_HEADER_SIZE];
    while off + DIRENT_HEADER_SIZE as u64 <= end {
        img.read_at(off, &mut header)?;
        let inode = LittleEndian::read_u32(&header[0..]);
        let rec_len = LittleEndian::read_u16(&header[4..]);
        if inode == UNUSED_INO {
            break;
        }
        count += 1;
        if (rec_len as usize) < DIRENT_HEADER_SIZE {
            break;
        }
        off += dentry_step(rec_len);
    }

    Ok(count)
}

/// Reads `count` entries from the directory data mapped by the given extent.
///
/// The name is read from the declared `name_len`, not from the structure
/// tail, so names survive large `rec_len` paddings intact.
pub fn read_dentries(
    img: &mut Image,
    sb: &Superblock,
    ext: &Extent,
    count: u32,
) -> Result<Vec<DirEntry>> {
    let mut off = ext.data_offset(sb);
    let mut entries = Vec::with_capacity(count as usize);

    let mut header = [0; DIRENT_HEADER_SIZE];
    for _ in 0..count {
        img.read_at(off, &mut header)?;
        let inode = LittleEndian::read_u32(&header[0..]);
        let rec_len = LittleEndian::read_u16(&header[4..]);
        let name_len = header[6];
        let file_type = header[7];
        let name = img.read_vec(off + DIRENT_HEADER_SIZE as u64, name_len as usize)?;

        entries.push(DirEntry {
            inode,
            rec_len,
            name_len,
            file_type,
            name,
        });

        if (rec_len as usize) < DIRENT_HEADER_SIZE {
            break;
        }
        off += dentry_step(rec_len);
    }

    Ok(entries)
}
