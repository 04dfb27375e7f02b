//! The ext4 side of the inspector: command handlers over the ext4 decoder.

use crate::session::Filesystem;
use fslib::Error;
use fslib::Result;
use fslib::ext4;
use fslib::ext4::GroupDesc;
use fslib::ext4::Superblock;
use fslib::ext4::dir;
use fslib::ext4::dir::DirEntry;
use fslib::ext4::extent;
use fslib::ext4::extent::Extent;
use fslib::ext4::extent::ExtentHeader;
use fslib::ext4::inode;
use fslib::ext4::inode::Inode;
use fslib::io::Image;
use log::debug;
use std::path::Path;
use uuid::Uuid;

/// The maximum length of the cwd path string in bytes.
const PATH_LEN_MAX: usize = 255;

/// The verbs understood by the ext4 façade.
const COMMANDS: &[&str] = &[
    "mount", "umount", "stats", "stat", "pwd", "cd", "ls", "mkdir", "rm", "read", "write",
];

/// The current working directory of a mount.
struct Cwd {
    /// The inode of the directory.
    ino: u32,
    /// The path string; empty at the root.
    path: String,
    /// The cached entries of the directory.
    entries: Vec<DirEntry>,
}

/// State held while an image is mounted.
///
/// Dropping it releases the cwd cache, the descriptor table, the superblock
/// and the image, in this order, so a failed mount unwinds completely.
struct Mounted {
    img: Image,
    sb: Superblock,
    descs: Vec<GroupDesc>,
    cwd: Cwd,
}

/// The ext4 filesystem façade.
#[derive(Default)]
pub struct Ext4Fs {
    mount: Option<Mounted>,
}

/// Parses a literal inode argument of the form `<N>`.
///
/// Returns `None` when the argument is not delimited, [`Error::BadArgs`]
/// when it is delimited but does not hold a usable inode number.
fn parse_ino(arg: &str) -> Option<Result<u32>> {
    let inner = arg.strip_prefix('<')?.strip_suffix('>')?;
    let res = match inner.parse::<u32>() {
        Ok(ino) if ino >= ext4::ROOT_INO => Ok(ino),
        _ => Err(Error::BadArgs),
    };
    Some(res)
}

/// Resolves a name in the given entries, comparing raw bytes.
fn name_to_ino(entries: &[DirEntry], name: &str) -> Option<u32> {
    entries
        .iter()
        .find(|e| e.name == name.as_bytes())
        .map(|e| e.inode)
}

impl Mounted {
    /// Loads the entries of the directory at the given inode.
    fn load_dir(&mut self, ino: u32) -> Result<Vec<DirEntry>> {
        let inode = inode::read_inode(&mut self.img, &self.sb, &self.descs, ino)?;
        if !inode.is_dir() {
            return Err(Error::NotADirectory);
        }

        let mut entries = Vec::new();
        for n in 0..extent::extent_count(&inode) {
            let ext = Extent::parse(&inode, n);
            let count = dir::count_dentries(&mut self.img, &self.sb, &ext)?;
            entries.append(&mut dir::read_dentries(&mut self.img, &self.sb, &ext, count)?);
        }
        Ok(entries)
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
        let ino = name_to_ino(&self.cwd.entries, name).ok_or(Error::NotFound)?;

        // Build the new path first so any failure leaves the cwd untouched
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
            ino,
            path,
            entries: self.load_dir(ino)?,
        };
        debug!(
            "ext4 cwd: inode {}, {} entries",
            self.cwd.ino,
            self.cwd.entries.len()
        );
        Ok(())
    }

    /// Prints the cached entries of the current directory.
    fn ls(&self) {
        for e in &self.cwd.entries {
            print!("<{}>{}  ", e.inode, String::from_utf8_lossy(&e.name));
        }
        println!();
    }

    /// Prints the metadata of one inode.
    fn stat(&mut self, arg: &str) -> Result<()> {
        let ino = match parse_ino(arg) {
            Some(res) => res?,
            None => name_to_ino(&self.cwd.entries, arg).ok_or(Error::NotFound)?,
        };
        let inode = inode::read_inode(&mut self.img, &self.sb, &self.descs, ino)?;
        print_inode(&inode, ino);
        Ok(())
    }

    /// Prints the superblock and descriptor table metadata.
    fn stats(&self) {
        print_superblock(&self.sb);
        println!();
        for (i, desc) in self.descs.iter().enumerate() {
            println!("Group {i}");
            println!("  Block bitmap block  : {}", desc.block_bitmap_lo);
            println!("  Inode bitmap block  : {}", desc.inode_bitmap_lo);
            println!("  Inode table block   : {}", desc.inode_table_lo);
            println!("  Free block count    : {}", desc.free_blocks_count_lo);
            println!("  Free inode count    : {}", desc.free_inodes_count_lo);
            println!("  Used dirs count     : {}", desc.used_dirs_count_lo);
            println!("  Flags               : {:#x}", desc.flags);
        }
    }
}

/// Returns a human-readable name for the inode's file type bits.
fn file_type_str(inode: &Inode) -> &'static str {
    match inode.file_type() {
        inode::S_IFIFO => "fifo",
        inode::S_IFCHR => "character device",
        inode::S_IFDIR => "directory",
        inode::S_IFBLK => "block device",
        inode::S_IFREG => "regular file",
        inode::S_IFLNK => "symbolic link",
        inode::S_IFSOCK => "socket",
        _ => "<none>",
    }
}

/// Prints the metadata of an inode, extent tree included when present.
fn print_inode(inode: &Inode, ino: u32) {
    println!(
        "Inode {ino}: type: {}  mode: {:04o}  flags: {:#x}",
        file_type_str(inode),
        inode.mode & 0o7777,
        inode.flags
    );
    println!(
        "         user: {}  group: {}  size: {}",
        inode.uid,
        inode.gid,
        inode.size()
    );
    println!(
        "         link count: {}  block count: {}",
        inode.links_count, inode.blocks_lo
    );
    println!("         generation: {}", inode.generation);

    if inode.flags & inode::EXTENTS_FL != 0 {
        let hdr = ExtentHeader::parse(inode);
        println!(
            "         extent tree: magic {:#x}, {} entries, depth {}",
            hdr.magic, hdr.entries, hdr.depth
        );
        for n in 0..extent::extent_count(inode) {
            let ext = Extent::parse(inode, n);
            println!(
                "           extent: logical block {}, length {}, start block {}",
                ext.block,
                ext.len,
                ext.start_block()
            );
        }
    }
}

/// Prints the superblock metadata, in the style of `dumpe2fs`.
fn print_superblock(sb: &Superblock) {
    println!("Total inode count     : {}", sb.inodes_count);
    println!("Total block count     : {}", sb.blocks_count());
    println!("Reserved block count  : {}", sb.r_blocks_count());
    println!("Free block count      : {}", sb.free_blocks_count());
    println!("Free inode count      : {}", sb.free_inodes_count);
    println!("First data block      : {}", sb.first_data_block);
    println!("Block size            : {}", sb.block_size());
    println!("Blocks per group      : {}", sb.blocks_per_group);
    println!("Inodes per group      : {}", sb.inodes_per_group);
    println!("Mount count           : {}", sb.mnt_count);
    println!("Maximum mount count   : {}", sb.max_mnt_count);
    println!("Magic signature       : {:#x}", sb.magic);
    let state = match sb.state {
        1 => "cleanly umounted",
        2 => "errors detected",
        4 => "orphans being recovered",
        _ => "<none>",
    };
    println!("File system state     : {state}");
    let errors = match sb.errors {
        1 => "continue",
        2 => "remount read-only",
        3 => "panic",
        _ => "<none>",
    };
    println!("Errors behaviour      : {errors}");
    println!("Minor revision level  : {}", sb.minor_rev_level);
    println!("Last checked          : {}", sb.lastcheck);
    println!("Check interval        : {}", sb.checkinterval);
    let os = match sb.creator_os {
        0 => "Linux",
        1 => "Hurd",
        2 => "Masix",
        3 => "FreeBSD",
        4 => "Lites",
        _ => "<none>",
    };
    println!("OS type               : {os}");
    println!("Revision level        : {}", sb.rev_level);

    if sb.rev_level >= 1 {
        println!();
        println!("First non-reserved inode    : {}", sb.first_ino);
        println!("Inode size                  : {}", sb.inode_size());
        println!("Block group number          : {}", sb.block_group_nr);
        println!("Compatible features         : {:#x}", sb.feature_compat);
        println!("Incompatible features       : {:#x}", sb.feature_incompat);
        println!("Readonly-compatible features: {:#x}", sb.feature_ro_compat);
        println!("UUID                        : {}", Uuid::from_bytes(sb.uuid));
        let name_len = sb
            .volume_name
            .iter()
            .position(|b| *b == b'\0')
            .unwrap_or(sb.volume_name.len());
        if name_len > 0 {
            println!(
                "Volume name                 : {}",
                String::from_utf8_lossy(&sb.volume_name[..name_len])
            );
        } else {
            println!("Volume name                 : <none>");
        }
        println!("Default hash version        : {}", sb.def_hash_version);
    }
}

impl Filesystem for Ext4Fs {
    fn name(&self) -> &'static str {
        "ext4"
    }

    fn commands(&self) -> &'static [&'static str] {
        COMMANDS
    }

    fn mount(&mut self, path: &Path) -> Result<()> {
        let mut img = Image::open(path)?;
        let sb = Superblock::read(&mut img)?;
        let descs = ext4::read_group_descs(&mut img, &sb)?;

        let mut m = Mounted {
            img,
            sb,
            descs,
            cwd: Cwd {
                ino: ext4::ROOT_INO,
                path: String::new(),
                entries: Vec::new(),
            },
        };
        m.cwd.entries = m.load_dir(ext4::ROOT_INO)?;
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
            "mkdir" | "rm" | "read" | "write" => Err(Error::Unsupported),
            _ => Err(Error::BadArgs),
        }
    }
}
