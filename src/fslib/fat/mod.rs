//! Decoding of the FAT12/16/32 on-disk layout.

pub mod dir;
pub mod file;

use crate::Error;
use crate::Result;
use crate::io::Image;
use byteorder::ByteOrder;
use byteorder::LittleEndian;
use log::debug;

/// The smallest valid sector size in bytes.
pub const SECTOR_SIZE_MIN: u16 = 512;
/// The largest valid sector size in bytes.
pub const SECTOR_SIZE_MAX: u16 = 4096;

/// The size of the boot sector structure in bytes.
pub const BOOT_SECTOR_SIZE: usize = 512;
/// The offset of the boot extension on FAT12/16.
pub const FAT16_BSX_OFFSET: u64 = 36;
/// The offset of the boot extension on FAT32.
pub const FAT32_BSX_OFFSET: u64 = 64;
/// The size of the boot extension structure in bytes.
pub const BSX_SIZE: usize = 26;

/// The first signature of the FAT32 fsinfo sector.
pub const FSINFO_SIG1: u32 = 0x41615252;
/// The second signature of the FAT32 fsinfo sector.
pub const FSINFO_SIG2: u32 = 0x61417272;
/// The size of the fsinfo structure in bytes.
pub const FSINFO_SIZE: usize = 512;

/// The first data cluster; clusters 0 and 1 are reserved.
pub const START_CLUSTER: u32 = 2;

/// The filesystem type string identifying FAT32 in the boot extension.
const FAT32_TYPE: &[u8] = b"FAT32";

/// The FAT boot sector at the start of the image.
///
/// `sector_size`, `dir_entries` and `sectors` are unaligned on disk and
/// stored decoded. The `fat32_*` fields are meaningful on FAT32 only.
#[derive(Clone, Debug)]
pub struct BootSector {
    /// The system identifier string.
    pub system_id: [u8; 8],
    /// The size of a sector in bytes.
    pub sector_size: u16,
    /// The number of sectors per cluster.
    pub sec_per_clus: u8,
    /// The number of reserved sectors.
    pub reserved: u16,
    /// The number of FATs.
    pub fats: u8,
    /// The number of root directory entries (FAT12/16).
    pub dir_entries: u16,
    /// The number of sectors, when small enough to fit 16 bits.
    pub sectors: u16,
    /// The media descriptor.
    pub media: u8,
    /// The number of sectors per FAT (FAT12/16).
    pub fat_length: u16,
    /// The number of sectors per track.
    pub secs_track: u16,
    /// The number of heads.
    pub heads: u16,
    /// The number of hidden sectors.
    pub hidden: u32,
    /// The total number of sectors.
    pub total_sect: u32,
    /// The number of sectors per FAT (FAT32).
    pub fat32_length: u32,
    /// The cluster of the root directory (FAT32).
    pub root_cluster: u32,
    /// The sector holding the fsinfo structure (FAT32).
    pub info_sector: u16,
    /// The sector holding the backup boot sector (FAT32).
    pub backup_boot: u16,
}

impl BootSector {
    /// Decodes the boot sector from its on-disk representation.
    pub fn parse(buf: &[u8]) -> Self {
        let mut system_id = [0; 8];
        system_id.copy_from_slice(&buf[3..11]);
        Self {
            system_id,
            sector_size: LittleEndian::read_u16(&buf[11..]),
            sec_per_clus: buf[13],
            reserved: LittleEndian::read_u16(&buf[14..]),
            fats: buf[16],
            dir_entries: LittleEndian::read_u16(&buf[17..]),
            sectors: LittleEndian::read_u16(&buf[19..]),
            media: buf[21],
            fat_length: LittleEndian::read_u16(&buf[22..]),
            secs_track: LittleEndian::read_u16(&buf[24..]),
            heads: LittleEndian::read_u16(&buf[26..]),
            hidden: LittleEndian::read_u32(&buf[28..]),
            total_sect: LittleEndian::read_u32(&buf[32..]),
            fat32_length: LittleEndian::read_u32(&buf[36..]),
            root_cluster: LittleEndian::read_u32(&buf[44..]),
            info_sector: LittleEndian::read_u16(&buf[48..]),
            backup_boot: LittleEndian::read_u16(&buf[50..]),
        }
    }

    /// Checks the validity invariants of the boot sector.
    pub fn check(&self) -> Result<()> {
        let sector_size_ok = self.sector_size.is_power_of_two()
            && self.sector_size >= SECTOR_SIZE_MIN
            && self.sector_size <= SECTOR_SIZE_MAX;
        let media_ok = self.media >= 0xf8 || self.media == 0xf0;
        if !sector_size_ok
            || !self.sec_per_clus.is_power_of_two()
            || self.reserved == 0
            || self.fats == 0
            || !media_ok
        {
            return Err(Error::InvalidFatBoot);
        }
        Ok(())
    }
}

/// The boot extension, read at offset 36 (FAT12/16) or 64 (FAT32).
#[derive(Clone, Debug)]
pub struct Bsx {
    /// The BIOS drive number.
    pub drive: u8,
    /// Reserved state byte.
    pub state: u8,
    /// The extended boot signature.
    pub signature: u8,
    /// The volume serial number.
    pub vol_id: [u8; 4],
    /// The volume label, space-padded.
    pub vol_label: [u8; 11],
    /// The filesystem type string, space-padded.
    pub fs_type: [u8; 8],
}

impl Bsx {
    /// Decodes the boot extension from its on-disk representation.
    pub fn parse(buf: &[u8]) -> Self {
        let mut vol_id = [0; 4];
        vol_id.copy_from_slice(&buf[3..7]);
        let mut vol_label = [0; 11];
        vol_label.copy_from_slice(&buf[7..18]);
        let mut fs_type = [0; 8];
        fs_type.copy_from_slice(&buf[18..26]);
        Self {
            drive: buf[0],
            state: buf[1],
            signature: buf[2],
            vol_id,
            vol_label,
            fs_type,
        }
    }

    /// Returns the volume serial number.
    pub fn volume_id(&self) -> u32 {
        LittleEndian::read_u32(&self.vol_id)
    }
}

/// The FAT32 free-cluster hint sector.
#[derive(Clone, Copy, Debug)]
pub struct FsInfo {
    /// The leading signature, expected to be [`FSINFO_SIG1`].
    pub signature1: u32,
    /// The trailing signature, expected to be [`FSINFO_SIG2`].
    pub signature2: u32,
    /// The last known number of free clusters.
    pub free_clusters: u32,
    /// The cluster the allocator should search from.
    pub next_cluster: u32,
}

impl FsInfo {
    /// Decodes the fsinfo structure from its on-disk representation.
    pub fn parse(buf: &[u8]) -> Self {
        Self {
            signature1: LittleEndian::read_u32(&buf[0..]),
            signature2: LittleEndian::read_u32(&buf[0x1e4..]),
            free_clusters: LittleEndian::read_u32(&buf[0x1e8..]),
            next_cluster: LittleEndian::read_u32(&buf[0x1ec..]),
        }
    }
}

/// The FAT superblock: boot sector, boot extension and, on FAT32, fsinfo.
#[derive(Clone, Debug)]
pub struct Superblock {
    /// The boot sector.
    pub bs: BootSector,
    /// The boot extension.
    pub bb: Bsx,
    /// The fsinfo sector, present on FAT32 only.
    pub bf: Option<FsInfo>,
}

impl Superblock {
    /// Reads and validates the FAT superblock from the image.
    pub fn read(img: &mut Image) -> Result<Self> {
        let buf = img.read_vec(0, BOOT_SECTOR_SIZE)?;
        let bs = BootSector::parse(&buf);
        bs.check()?;

        // The boot extension's own offset depends on the FAT32 geometry
        // fields of the boot sector
        let fat32_geometry = bs.fat_length == 0 && bs.fat32_length != 0;
        let bsx_off = if fat32_geometry {
            FAT32_BSX_OFFSET
        } else {
            FAT16_BSX_OFFSET
        };
        let bb = Bsx::parse(&img.read_vec(bsx_off, BSX_SIZE)?);

        let mut sb = Self { bs, bb, bf: None };
        if sb.is_fat32() {
            let info_sector = match sb.bs.info_sector {
                0 => 1,
                n => n as u64,
            };
            let bf = FsInfo::parse(&img.read_vec(info_sector * sb.bs.sector_size as u64, FSINFO_SIZE)?);
            if bf.signature1 != FSINFO_SIG1 || bf.signature2 != FSINFO_SIG2 {
                return Err(Error::InvalidFsInfo);
            }
            sb.bf = Some(bf);
        }
        debug!(
            "FAT superblock: {} bytes/sector, {} sectors/cluster, fat32={}",
            sb.bs.sector_size,
            sb.bs.sec_per_clus,
            sb.is_fat32()
        );
        Ok(sb)
    }

    /// Tells whether the filesystem is FAT32.
    pub fn is_fat32(&self) -> bool {
        self.bb.fs_type.starts_with(FAT32_TYPE)
            && self.bs.fat_length == 0
            && self.bs.fat32_length != 0
    }

    /// Returns the size of a sector in bytes.
    pub fn sector_size(&self) -> u64 {
        self.bs.sector_size as u64
    }

    /// Returns the first sector of the fixed root directory region.
    pub fn root_dir_sector(&self) -> u64 {
        self.bs.reserved as u64 + self.bs.fats as u64 * self.bs.fat_length as u64
    }

    /// Returns the first sector of the given data cluster.
    ///
    /// The fixed root directory region only exists on FAT12/16 and shifts
    /// the data area accordingly. `cluster` must be a data cluster.
    pub fn cluster_to_sector(&self, cluster: u32) -> u64 {
        let mut sector = self.root_dir_sector();
        if !self.is_fat32() {
            let root_bytes = self.bs.dir_entries as u64 * dir::DIR_ENTRY_SIZE as u64;
            sector += root_bytes.div_ceil(self.sector_size());
        }
        sector + (cluster - START_CLUSTER) as u64 * self.bs.sec_per_clus as u64
    }
}
