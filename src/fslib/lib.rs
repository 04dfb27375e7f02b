//! Read-only decoding engine for on-disk filesystem images.
//!
//! The library knows how to open a raw image file, derive the geometry of the
//! filesystem it contains and walk its metadata: superblocks, block group
//! descriptors, inodes, extents and directory entries for ext4; boot sector,
//! fsinfo, cluster chains and 8.3 directory entries for FAT12/16/32.
//! Nothing in here ever writes to the image.

use std::io::Error as IoError;
use std::{fmt, result};

pub mod ext4;
pub mod fat;
pub mod io;

#[cfg(test)]
pub(crate) mod testimg;

/// Errors surfaced by the decoding engine.
#[derive(Debug)]
pub enum Error {
    /// Wrong argument count or a malformed argument.
    BadArgs,
    /// The backing image could not be opened.
    IoOpen(IoError),
    /// Seeking in the backing image failed.
    IoSeek(IoError),
    /// Reading from the backing image failed or came up short.
    IoRead(IoError),
    /// Writing to a host file failed.
    IoWrite(IoError),
    /// The superblock magic is not ext4's.
    NotExt4,
    /// The FAT boot sector fails its validity invariants.
    InvalidFatBoot,
    /// The FAT32 fsinfo sector carries wrong signatures.
    InvalidFsInfo,
    /// The image uses 64-bit block group descriptors.
    Unsupported64Bit,
    /// The operation requires a directory.
    NotADirectory,
    /// Name resolution failed in the current directory.
    NotFound,
    /// A filesystem is already mounted.
    AlreadyMounted,
    /// The operation is not implemented.
    Unsupported,
}

pub type Result<T> = result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadArgs => write!(fmt, "invalid arguments"),
            Self::IoOpen(e) => write!(fmt, "cannot open image: {e}"),
            Self::IoSeek(e) => write!(fmt, "cannot seek image: {e}"),
            Self::IoRead(e) => write!(fmt, "cannot read image: {e}"),
            Self::IoWrite(e) => write!(fmt, "cannot write file: {e}"),
            Self::NotExt4 => write!(fmt, "not an ext4 filesystem"),
            Self::InvalidFatBoot => write!(fmt, "invalid FAT boot sector"),
            Self::InvalidFsInfo => write!(fmt, "invalid FAT32 fsinfo sector"),
            Self::Unsupported64Bit => {
                write!(fmt, "64-bit block group descriptors are not supported")
            }
            Self::NotADirectory => write!(fmt, "not a directory"),
            Self::NotFound => write!(fmt, "no such file or directory"),
            Self::AlreadyMounted => write!(fmt, "a filesystem is already mounted"),
            Self::Unsupported => write!(fmt, "operation not supported"),
        }
    }
}
