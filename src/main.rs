//! `fsdbg` is an interactive, read-only inspector for filesystem images.
//!
//! Given a raw ext4 or FAT12/16/32 image, the tool mounts it logically, in
//! user space, and exposes a small shell to walk its metadata: superblocks,
//! block group descriptors, inodes, extents, directory entries and file
//! contents. Nothing is ever written to the image.

mod fs_ext4;
mod fs_fat;
mod logger;
mod readline;
mod session;
mod shell;

#[cfg(test)]
mod testimg;

use fs_ext4::Ext4Fs;
use fs_fat::FatFs;
use session::Session;
use shell::Shell;
use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;
use std::{env, fmt};

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
    /// If true, print command line help.
    help: bool,
    /// If true, print the version number.
    version: bool,
    /// If true, report processing verbosely.
    verbose: bool,
    /// If true, an unknown option was given.
    bad_option: bool,
    /// The image files given on the command line.
    images: Vec<PathBuf>,
}

impl Args {
    /// Tells whether arguments are valid.
    fn is_valid(&self) -> bool {
        !self.bad_option && self.images.len() <= 1
    }
}

fn parse_args(args: ArgsOs) -> Args {
    let mut res: Args = Default::default();
    for arg in args {
        match arg.to_str() {
            Some("-h" | "--help") => res.help = true,
            Some("-V" | "--version") => res.version = true,
            Some("-v" | "--verbose") => res.verbose = true,
            Some(opt) if opt.starts_with('-') => res.bad_option = true,
            _ => res.images.push(arg.into()),
        }
    }
    res
}

/// Prints command usage.
fn print_usage() {
    eprintln!("fsdbg: bad usage");
    eprintln!("Try 'fsdbg --help' for more information.");
}

/// Prints command help.
fn print_help() {
    println!();
    println!("Usage:");
    println!(" fsdbg [options] [image]");
    println!();
    println!("Inspects the filesystem held in a raw disk image, read-only.");
    println!();
    println!("Options:");
    println!(" -h, --help\tPrints help.");
    println!(" -V, --version\tPrints the version number.");
    println!(" -v, --verbose\tReports processing verbosely.");
    println!();
    println!("Example:");
    println!(" fsdbg -v sample.ext4");
}

/// Writes an error to stderr, then exits.
fn error<M: fmt::Display>(msg: M) -> ! {
    eprintln!("fsdbg: error: {msg}");
    exit(1);
}

fn main() {
    let mut args = env::args_os();
    args.next();
    let args = parse_args(args);

    if !args.is_valid() {
        print_usage();
        exit(1);
    }
    if args.help {
        print_help();
        exit(0);
    }
    if args.version {
        println!("fsdbg {}", env!("CARGO_PKG_VERSION"));
        exit(0);
    }
    logger::init(args.verbose);

    let mut session = Session::new();
    session
        .register(Box::new(Ext4Fs::default()))
        .unwrap_or_else(|_| error("failed to register the ext4 filesystem"));
    session
        .register(Box::new(FatFs::default()))
        .unwrap_or_else(|_| error("failed to register the FAT filesystem"));

    println!("welcome to fsdbg!");
    println!("press 'help' for more info.");

    let mut shell = Shell::new("fsdbg", session);
    shell.run(args.images.first().map(|p| p.as_path()));
}
