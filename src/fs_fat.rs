//! The FAT side of the inspector: command handlers over the FAT decoder.

use crate::session::Filesystem;
use fslib::Error;
use fslib::Result;
use fslib::fat;
use fslib::fat::Superblock;
use fslib::fat::dir;
use fslib::fat::dir::DirEntry;
use fslib::fat::file;
use fslib::io::Image;
use log::debug;
use std::fs::OpenOptions;
use std::io::Write;
use std::io;
use std::path::Path;

/// The maximum length of the cwd path string in bytes.
const PATH_LEN_MAX: usize = 255;

/// The redirection token of `cat SRC > DST`.
const REDIRECT: &str = ">";

/// The verbs understood by the FAT façade.
const COMMANDS: &[&str] = &[
    "mount", "umount", "stats", "stat", "pwd", "cd", "ls", "mkdir", "rm", "cat", "echo",
];

/// Where a directory's entries live on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DirLoc {
    /// The fixed root directory region of FAT12/16.
    Root,
    /// A data cluster.
    Cluster(u32),
}

/// The current working directory of a mount.
struct Cwd {
    /// The location of the directory.
    loc: DirLoc,
    /// The path string; empty at the root.
    path: String,
    /// The cached entries of the directory.
    entries: Vec<DirEntry>,
}

/// State held while an image is mounted.
struct Mounted {
    img: Image,
    sb: Superblock,
    cwd: Cwd,
}

/// The FAT filesystem façade.
#[derive(Default)]
pub struct FatFs {
    mount: Option<Mounted>,
}

/// Resolves a name in the given entries, matching 8.3 names.
fn find_entry<'e>(entries: &'e [DirEntry], name: &str) -> Option<&'e DirEntry> {
    entries.iter().find(|e| e.matches(name))
}

impl Mounted {
    /// Returns the location of the root directory.
    fn root_loc(&self) -> DirLoc {
        if self.sb.is_fat32() {
            DirLoc::Cluster(self.sb.bs.root_cluster)
        } else {
            DirLoc::Root
        }
    }

    /// Returns the first sector of the directory at the given location.
    fn dir_sector(&self, loc: DirLoc) -> Result<u64> {
        match loc {
            DirLoc::Root => Ok(self.sb.root_dir_sector()),
            DirLoc::Cluster(c) if c >= fat::START_CLUSTER => Ok(self.sb.cluster_to_sector(c)),
            DirLoc::Cluster(_) => Err(Error::NotFound),
        }
    }

    /// Loads the entries of the directory at the given location.
    fn load_dir(&mut self, loc: DirLoc) -> Result<Vec<DirEntry>> {
        let sector = self.dir_sector(loc)?;
        let count = dir::count_entries(&mut self.img, &self.sb, sector)?;
        dir::read_entries(&mut self.img, &self.sb, sector, count)
    }

    /// Returns the path string to print for `pwd`.
    fn pwd(&self) -> &str {
        if self.cwd.path.is_empty() {
            "/"
        } else {
            &self.cwd.path
        }
    }

    /// Changes the current directory to `name`, resolved in the cwd cache.
    fn cd(&mut self, name: &str) -> Result<()> {
        // The fixed root region carries no dot entries to resolve
        if self.cwd.path.is_empty() && (name == "." || name == "..") {
            return Ok(());
        }

        let entry = *find_entry(&self.cwd.entries, name).ok_or(Error::NotFound)?;
        if !entry.is_dir() {
            return Err(Error::NotADirectory);
        }

        // A start cluster of zero appears in the `..` entry of a first-level
        // directory and points back at the root
        let cluster = entry.start_cluster(&self.sb);
        let loc = if cluster == 0 {
            self.root_loc()
        } else {
            DirLoc::Cluster(cluster)
        };

        let path = match name {
            "." => self.cwd.path.clone(),
            ".." => match self.cwd.path.rfind('/') {
                Some(i) => self.cwd.path[..i].to_string(),
                None => String::new(),
            },
            _ => {
                if self.cwd.path.len() + 1 + name.len() > PATH_LEN_MAX {
                    return Err(Error::BadArgs);
                }
                format!("{}/{name}", self.cwd.path)
            }
        };

        self.cwd = Cwd {
            loc,
            path,
            entries: self.load_dir(loc)?,
        };
        debug!(
            "FAT cwd: {:?}, {} entries",
            self.cwd.loc,
            self.cwd.entries.len()
        );
        Ok(())
    }

    /// Prints the cached entries of the current directory.
    fn ls(&self) {
        for e in &self.cwd.entries {
            print!("{}  ", filename(e));
        }
        println!();
    }

    /// Prints the metadata of the entry matching `name`.
    fn stat(&self, name: &str) -> Result<()> {
        let entry = find_entry(&self.cwd.entries, name).ok_or(Error::NotFound)?;
        print_entry(entry, &self.sb);
        Ok(())
    }

    /// Reads the file matching `name` and writes it to stdout, or to the
    /// host file at `dst` when a redirection is given.
    fn cat(&mut self, name: &str, dst: Option<&str>) -> Result<()> {
        let entry = *find_entry(&self.cwd.entries, name).ok_or(Error::NotFound)?;
        if entry.is_dir() {
            return Err(Error::NotADirectory);
        }

        let cluster = entry.start_cluster(&self.sb);
        if cluster < fat::START_CLUSTER {
            return Err(Error::NotFound);
        }
        if entry.size == 0 {
            return Ok(());
        }

        let buf = file::read_file(&mut self.img, &self.sb, cluster, entry.size)?;
        match dst {
            Some(dst) => {
                let mut out = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(dst)
                    .map_err(Error::IoWrite)?;
                out.write_all(&buf).map_err(Error::IoWrite)?;
                out.flush().map_err(Error::IoWrite)?;
            }
            None => {
                let mut out = io::stdout();
                out.write_all(&buf).map_err(Error::IoWrite)?;
                println!();
            }
        }
        Ok(())
    }

    /// Prints the superblock metadata.
    fn stats(&self) {
        let bs = &self.sb.bs;
        println!(
            "System ID                : {}",
            String::from_utf8_lossy(&bs.system_id)
        );
        println!("Sector size              : {}", bs.sector_size);
        println!("Sector per cluster       : {}", bs.sec_per_clus);
        println!("Sector reserved          : {}", bs.reserved);
        println!("FAT copies number        : {}", bs.fats);
        println!("Max root dentries        : {}", bs.dir_entries);
        println!("Small sector number      : {}", bs.sectors);
        println!("Media descriptor         : {:#x}", bs.media);
        println!("Sector per FAT           : {}", bs.fat_length);
        println!("Sector per track         : {}", bs.secs_track);
        println!("Head number              : {}", bs.heads);
        println!("Hidden sector number     : {}", bs.hidden);
        println!("Total sector number      : {}", bs.total_sect);
        if self.sb.is_fat32() {
            println!("Sector per FAT32         : {}", bs.fat32_length);
            println!("Root cluster             : {}", bs.root_cluster);
            println!("FS info sector number    : {}", bs.info_sector);
            println!("Backup boot sector       : {}", bs.backup_boot);
        }

        let bb = &self.sb.bb;
        println!();
        println!("Logical drive number : {}", bb.drive);
        println!("Ext signature        : {:#x}", bb.signature);
        println!("Serial number        : {}", bb.volume_id());
        println!(
            "Volume name          : {}",
            String::from_utf8_lossy(&bb.vol_label)
        );
        println!(
            "FAT name             : {}",
            String::from_utf8_lossy(&bb.fs_type)
        );

        if let Some(bf) = &self.sb.bf {
            println!();
            println!("Signature1    : {:#x}", bf.signature1);
            println!("Signature2    : {:#x}", bf.signature2);
            println!("Free clusters : {}", bf.free_clusters);
            println!("Next cluster  : {}", bf.next_cluster);
        }
    }
}

/// Returns the display name of an entry, as `BASE` or `BASE.EXT`.
fn filename(entry: &DirEntry) -> String {
    let base = String::from_utf8_lossy(entry.base()).into_owned();
    let ext = entry.ext();
    if ext.is_empty() {
        base
    } else {
        format!("{base}.{}", String::from_utf8_lossy(ext))
    }
}

/// Prints the metadata of one directory entry.
fn print_entry(entry: &DirEntry, sb: &Superblock) {
    println!("Name                 : {}", filename(entry));

    print!("File attribute       : ");
    let attrs = [
        (dir::ATTR_RO, "read-only"),
        (dir::ATTR_HIDDEN, "hidden"),
        (dir::ATTR_SYS, "system"),
        (dir::ATTR_VOLUME, "volume label"),
        (dir::ATTR_DIR, "directory"),
        (dir::ATTR_ARCH, "archived"),
    ];
    let set: Vec<&str> = attrs
        .iter()
        .filter(|(bit, _)| entry.attr & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if entry.is_long_name() {
        println!("long filename slot");
    } else if set.is_empty() {
        println!("<none>");
    } else {
        println!("{}", set.join(", "));
    }

    println!("Start cluster        : {}", entry.start_cluster(sb));
    println!("File size            : {}", entry.size);
    println!("Modification date    : {:#06x}", entry.date);
    println!("Modification time    : {:#06x}", entry.time);
}

impl Filesystem for FatFs {
    fn name(&self) -> &'static str {
        "fat"
    }

    fn commands(&self) -> &'static [&'static str] {
        COMMANDS
    }

    fn mount(&mut self, path: &Path) -> Result<()> {
        let mut img = Image::open(path)?;
        let sb = Superblock::read(&mut img)?;

        let mut m = Mounted {
            img,
            sb,
            cwd: Cwd {
                loc: DirLoc::Root,
                path: String::new(),
                entries: Vec::new(),
            },
        };
        m.cwd.loc = m.root_loc();
        m.cwd.entries = m.load_dir(m.cwd.loc)?;
        self.mount = Some(m);
        Ok(())
    }

    fn umount(&mut self) {
        self.mount = None;
    }

    fn exec(&mut self, cmd: &str, args: &[&str]) -> Result<()> {
        let m = self.mount.as_mut().ok_or(Error::BadArgs)?;
        match cmd {
            "stats" => {
                if !args.is_empty() {
                    return Err(Error::BadArgs);
                }
                m.stats();
                Ok(())
            }
            "stat" => {
                let &[name] = args else {
                    return Err(Error::BadArgs);
                };
                m.stat(name)
            }
            "pwd" => {
                if !args.is_empty() {
                    return Err(Error::BadArgs);
                }
                println!("{}", m.pwd());
                Ok(())
            }
            "cd" => {
                let &[name] = args else {
                    return Err(Error::BadArgs);
                };
                m.cd(name)
            }
            "ls" => {
                if !args.is_empty() {
                    return Err(Error::BadArgs);
                }
                m.ls();
                Ok(())
            }
            "cat" => match args {
                &[src] => m.cat(src, None),
                &[src, redir, dst] if redir == REDIRECT => m.cat(src, Some(dst)),
                _ => Err(Error::BadArgs),
            },
            "mkdir" | "rm" | "echo" => Err(Error::Unsupported),
            _ => Err(Error::BadArgs),
        }
    }
}
