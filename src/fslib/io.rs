//! Positioned reads from a backing image file.

use crate::Error;
use crate::Result;
use std::fs::File;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

/// A raw filesystem image opened for reading.
///
/// Every read seeks to an absolute byte offset first; a read shorter than
/// requested is an error, never a partially filled buffer.
pub struct Image {
    file: File,
}

impl Image {
    /// Opens the image at the given path, read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(Error::IoOpen)?;
        Ok(Self { file })
    }

    /// Fills `buf` with the bytes at absolute offset `off`.
    pub fn read_at(&mut self, off: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(off)).map_err(Error::IoSeek)?;
        self.file.read_exact(buf).map_err(Error::IoRead)
    }

    /// Reads `len` bytes at absolute offset `off` into a fresh buffer.
    pub fn read_vec(&mut self, off: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; len];
        self.read_at(off, &mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_at() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"0123456789").unwrap();

        let mut img = Image::open(tmp.path()).unwrap();
        let mut buf = [0; 4];
        img.read_at(2, &mut buf).unwrap();
        assert_eq!(&buf, b"2345");

        // Short reads are errors
        assert!(matches!(img.read_at(8, &mut buf), Err(Error::IoRead(_))));
    }

    #[test]
    fn open_missing() {
        let res = Image::open(Path::new("/nonexistent/image"));
        assert!(matches!(res, Err(Error::IoOpen(_))));
    }
}
