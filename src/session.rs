//! Filesystem registration and command dispatch.

use fslib::Error;
use fslib::Result;
use log::debug;
use std::path::Path;

/// The maximum number of registered filesystems.
pub const FS_NUM_MAX: usize = 20;
/// The maximum number of tokens a command line may carry.
pub const CMD_ARG_NUM_MAX: usize = 10;

/// The reserved verb mounting an image.
pub const CMD_MOUNT: &str = "mount";
/// The reserved verb unmounting it.
pub const CMD_UMOUNT: &str = "umount";

/// A mountable filesystem exposing a fixed set of command verbs.
pub trait Filesystem {
    /// Returns the name of the filesystem type.
    fn name(&self) -> &'static str;

    /// Returns the verbs the filesystem understands.
    ///
    /// The list is consumed by `help` and tab completion; it includes the
    /// reserved mount verbs even though the dispatcher owns them.
    fn commands(&self) -> &'static [&'static str];

    /// Probes the image at the given path and mounts it on success.
    fn mount(&mut self, path: &Path) -> Result<()>;

    /// Unmounts the filesystem, releasing the image.
    fn umount(&mut self);

    /// Executes a verb with its arguments.
    fn exec(&mut self, cmd: &str, args: &[&str]) -> Result<()>;
}

/// The registry of filesystems and the mount state of the session.
pub struct Session {
    /// Registered filesystems, probed in order at mount.
    filesystems: Vec<Box<dyn Filesystem>>,
    /// The index of the mounted filesystem, if any.
    mounted: Option<usize>,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self {
            filesystems: Vec::new(),
            mounted: None,
        }
    }

    /// Registers a filesystem, failing when the table is full.
    pub fn register(&mut self, fs: Box<dyn Filesystem>) -> Result<()> {
        if self.filesystems.len() >= FS_NUM_MAX {
            return Err(Error::BadArgs);
        }
        self.filesystems.push(fs);
        Ok(())
    }

    /// Tells whether a filesystem is mounted.
    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// Mounts the image at the given path.
    ///
    /// Every registered filesystem is probed in registration order; the
    /// first successful mount wins. When none succeeds, the error of the
    /// last probe is returned.
    pub fn mount(&mut self, path: &Path) -> Result<()> {
        if self.mounted.is_some() {
            return Err(Error::AlreadyMounted);
        }

        let mut last = Error::BadArgs;
        for (i, fs) in self.filesystems.iter_mut().enumerate() {
            match fs.mount(path) {
                Ok(()) => {
                    debug!("mounted {} on {}", fs.name(), path.display());
                    self.mounted = Some(i);
                    return Ok(());
                }
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    /// Unmounts the mounted filesystem, if any.
    pub fn umount(&mut self) {
        if let Some(i) = self.mounted.take() {
            self.filesystems[i].umount();
            debug!("unmounted {}", self.filesystems[i].name());
        }
    }

    /// Returns the verbs available in the current state.
    ///
    /// With a mount, the mounted filesystem's table; without, the reserved
    /// mount verbs.
    pub fn commands(&self) -> &'static [&'static str] {
        match self.mounted {
            Some(i) => self.filesystems[i].commands(),
            None => &[CMD_MOUNT, CMD_UMOUNT],
        }
    }

    /// Routes a tokenized command to its handler.
    pub fn exec(&mut self, argv: &[&str]) -> Result<()> {
        let (&verb, args) = argv.split_first().ok_or(Error::BadArgs)?;
        match verb {
            CMD_MOUNT => {
                let &[path] = args else {
                    return Err(Error::BadArgs);
                };
                self.mount(Path::new(path))
            }
            CMD_UMOUNT => {
                if !args.is_empty() {
                    return Err(Error::BadArgs);
                }
                self.umount();
                Ok(())
            }
            _ => {
                let i = self.mounted.ok_or(Error::BadArgs)?;
                let fs = &mut self.filesystems[i];
                if !fs.commands().iter().any(|c| *c == verb) {
                    return Err(Error::BadArgs);
                }
                fs.exec(verb, args)
            }
        }
    }
}
