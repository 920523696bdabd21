//! Run PDP-11 V6 and m68k Minix a.out executables as ordinary host
//! processes, translating their system calls to the host's.

pub mod aout;
pub mod args;
pub mod config;
pub mod cpu;
pub mod directory;
pub mod loader;
pub mod memory;
pub mod process;
mod runner;
pub mod syscall;

pub use config::Config;
pub use process::GuestProcess;
