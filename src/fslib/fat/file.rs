//! Reading of FAT file contents.

use super::Superblock;
use crate::Result;
use crate::io::Image;
use log::debug;

/// Reads `size` bytes of file content starting at the given data cluster.
///
/// The FAT chain is not walked: the read is contiguous from the first
/// cluster's sector, so a file fragmented across cluster runs comes back
/// truncated to its first run.
pub fn read_file(img: &mut Image, sb: &Superblock, cluster: u32, size: u32) -> Result<Vec<u8>> {
    let sector = sb.cluster_to_sector(cluster);
    debug!("reading {size} bytes from cluster {cluster} (sector {sector})");
    img.read_vec(sector * sb.sector_size(), size as usize)
}
