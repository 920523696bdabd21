use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use log::{debug, info};

use crate::aout::{Header, Personality};
use crate::args::ArgBuffer;
use crate::config::{Config, PDP11_MEMORY_SIZE};
use crate::directory::DirectoryEmulator;
use crate::loader::{self, Layout, LoadError, Segments};
use crate::memory::AddressSpace;

/// Everything the emulator knows about the one guest process it runs.
#[derive(Debug)]
pub struct GuestProcess {
    pub(crate) memory: AddressSpace,
    pub(crate) header: Option<Header>,
    pub(crate) segments: Segments,
    pub(crate) root_dir: PathBuf,
    /// Resolution base for relative guest paths; the host cwd is never changed.
    pub(crate) cur_dir: PathBuf,
    pub(crate) args: ArgBuffer,
    pub(crate) dirs: DirectoryEmulator,
    /// Host path of the image currently loaded.
    pub(crate) image: PathBuf,
    /// Set by a successful exec; the next restart keeps the freshly loaded
    /// image instead of reading it again.
    pub(crate) exec_pending: bool,
    pub(crate) config: Config,
}

impl GuestProcess {
    pub fn new(config: Config, args: ArgBuffer) -> Result<Self> {
        let cur_dir = std::env::current_dir()?;
        Ok(Self {
            memory: AddressSpace::default(),
            header: None,
            segments: Segments::default(),
            root_dir: config.root.clone(),
            cur_dir,
            args,
            dirs: DirectoryEmulator::default(),
            image: PathBuf::new(),
            exec_pending: false,
            config,
        })
    }

    pub fn memory(&self) -> &AddressSpace {
        &self.memory
    }

    pub fn segments(&self) -> &Segments {
        &self.segments
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    pub fn args(&self) -> &ArgBuffer {
        &self.args
    }

    pub fn personality(&self) -> Option<Personality> {
        self.header.as_ref().map(Header::personality)
    }

    /// Map a guest path into the root jail.
    ///
    /// Absolute paths are taken below the root directory, relative ones below
    /// the current guest directory. `..` is passed through untouched.
    pub fn resolve(&self, guest: &[u8]) -> PathBuf {
        if guest.is_empty() {
            return PathBuf::new();
        }
        match guest.strip_prefix(b"/") {
            Some(rest) => {
                let mut host = self.root_dir.clone().into_os_string();
                host.push("/");
                host.push(OsStr::from_bytes(rest));
                PathBuf::from(host)
            }
            None => self.cur_dir.join(OsStr::from_bytes(guest)),
        }
    }

    pub(crate) fn host_path(&self, guest: &[u8]) -> Result<CString> {
        let host = self.resolve(guest);
        match CString::new(host.as_os_str().as_bytes()) {
            Ok(path) => Ok(path),
            Err(_) => bail!("guest path {:?} contains a NUL byte", host),
        }
    }

    fn layout(&self, personality: Personality) -> Layout {
        Layout {
            memory_size: match personality {
                Personality::Pdp11 => PDP11_MEMORY_SIZE,
                Personality::M68k => self.config.m68k_memory_size,
            },
            vector_table_size: self.config.vector_table_size,
        }
    }

    /// Load the executable named by the guest path `path`.
    ///
    /// On failure nothing observable changes. On success the address space
    /// holds the new text and data with bss zeroed, and the header and
    /// segments describe it. The argument buffer is left to the caller.
    pub fn load(&mut self, path: &[u8]) -> Result<(), LoadError> {
        let host = self.resolve(path);
        self.load_host(&host)
    }

    pub(crate) fn load_host(&mut self, host: &Path) -> Result<(), LoadError> {
        let image = loader::read_image(host, |p| self.layout(p))?;
        let personality = image.header.personality();
        if let Some(running) = self.personality() {
            if running != personality {
                return Err(LoadError::PersonalityMismatch {
                    path: host.to_path_buf(),
                    running,
                    found: personality,
                });
            }
        }
        loader::log_image(host, &image);

        if self.memory.is_empty() {
            let size = self.layout(personality).memory_size;
            info!("allocating {size:#x} bytes of {personality} memory");
            self.memory = AddressSpace::new(personality, size);
        }

        let segments = image.segments;
        let bytes = self.memory.bytes_mut();
        bytes[..image.placed.len()].copy_from_slice(&image.placed);
        bytes[segments.bss_start as usize..segments.bss_end as usize].fill(0);

        self.header = Some(image.header);
        self.segments = segments;
        self.image = host.to_path_buf();
        debug!("loaded {}", host.display());
        Ok(())
    }

    /// Top of the initial stack.
    pub fn stack_top(&self) -> u32 {
        let tail = self.memory.personality().reserved_tail();
        (self.memory.len() as u32).saturating_sub(tail)
    }
}
