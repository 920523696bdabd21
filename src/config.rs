use std::path::PathBuf;

use anyhow::{Result, bail};

/// Reserved in front of an m68k text segment.
pub const DEFAULT_VECTOR_TABLE_SIZE: u32 = 0x400;
pub const DEFAULT_M68K_MEMORY_SIZE: usize = 0x1_0000;
pub const MAX_M68K_MEMORY_SIZE: usize = 0x10_0000;
/// The PDP-11 address space is always the full 16-bit range.
pub const PDP11_MEMORY_SIZE: usize = 0x1_0000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Host directory standing in for the guest's `/`.
    pub root: PathBuf,
    pub vector_table_size: u32,
    pub m68k_memory_size: usize,
    /// Initial environment strings, handed only to m68k guests.
    pub env: Vec<String>,
    /// Raw address-space snapshot written after every load.
    pub dump: Option<PathBuf>,
    /// Log every system call at debug level.
    pub trace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            vector_table_size: DEFAULT_VECTOR_TABLE_SIZE,
            m68k_memory_size: DEFAULT_M68K_MEMORY_SIZE,
            env: Vec::new(),
            dump: None,
            trace: false,
        }
    }
}

impl Config {
    /// Canonicalise the root and check the memory geometry.
    pub fn validate(mut self) -> Result<Self> {
        self.root = match std::fs::canonicalize(&self.root) {
            Ok(root) => root,
            Err(err) => bail!("root directory {}: {err}", self.root.display()),
        };
        if !self.root.is_dir() {
            bail!("root {} is not a directory", self.root.display());
        }
        if self.m68k_memory_size % 2 != 0 || self.m68k_memory_size > MAX_M68K_MEMORY_SIZE {
            bail!(
                "m68k memory size {:#x} must be even and at most {MAX_M68K_MEMORY_SIZE:#x}",
                self.m68k_memory_size
            );
        }
        if self.vector_table_size % 2 != 0
            || self.vector_table_size as usize >= self.m68k_memory_size
        {
            bail!(
                "vector table size {:#x} must be even and inside the address space",
                self.vector_table_size
            );
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_canonicalises_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            root: dir.path().join("."),
            ..Config::default()
        }
        .validate()
        .unwrap();
        assert_eq!(config.root, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn rejects_odd_or_oversized_memory() {
        let dir = tempfile::tempdir().unwrap();
        for size in [0x10001, MAX_M68K_MEMORY_SIZE + 2] {
            let config = Config {
                root: dir.path().to_path_buf(),
                m68k_memory_size: size,
                ..Config::default()
            };
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn rejects_missing_root() {
        let config = Config {
            root: PathBuf::from("/definitely/not/here"),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
