use std::ffi::OsString;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;

use uuinterp::args::ArgBuffer;
use uuinterp::config::{Config, DEFAULT_M68K_MEMORY_SIZE, DEFAULT_VECTOR_TABLE_SIZE};
use uuinterp::{GuestProcess, cpu};

/// Run a PDP-11 V6 or m68k Minix a.out executable on this host.
#[derive(Parser, Debug)]
#[command(name = "uuinterp", version)]
struct Cli {
    /// Log every system call to stderr.
    #[arg(short, long)]
    trace: bool,

    /// Write the guest address space to this file after every load.
    #[arg(long, value_name = "FILE")]
    dump: Option<PathBuf>,

    /// Environment string for m68k guests (repeatable).
    #[arg(short, long = "env", value_name = "NAME=VALUE")]
    env: Vec<String>,

    /// Bytes reserved for the m68k vector table below the text segment.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_VECTOR_TABLE_SIZE, value_parser = parse_size::<u32>)]
    vector_table: u32,

    /// Size of the m68k address space.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_M68K_MEMORY_SIZE, value_parser = parse_size::<usize>)]
    memory: usize,

    /// Host directory that becomes the guest's `/`.
    root: PathBuf,

    /// Guest path of the executable, resolved under the root.
    aout: OsString,

    /// Arguments passed to the guest after its own name.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<OsString>,
}

/// Decimal, or hexadecimal with a `0x` prefix.
fn parse_size<T>(text: &str) -> std::result::Result<T, String>
where
    T: TryFrom<u64>,
{
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    }
    .map_err(|err| format!("{text:?}: {err}"))?;
    T::try_from(value).map_err(|_| format!("{text:?} is out of range"))
}

fn main() {
    match run() {
        Ok(status) => std::process::exit(status),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let config = Config {
        root: cli.root,
        vector_table_size: cli.vector_table,
        m68k_memory_size: cli.memory,
        env: cli.env,
        dump: cli.dump,
        trace: cli.trace,
    };

    let mut logger = env_logger::Builder::new();
    logger.filter_level(LevelFilter::Warn);
    if config.trace {
        logger.filter_module("uuinterp", LevelFilter::Debug);
    }
    logger.parse_default_env().format_timestamp(None).init();

    let config = config.validate()?;

    let program = cli.aout.as_bytes().to_vec();
    let argv: Vec<&[u8]> = std::iter::once(cli.aout.as_bytes())
        .chain(cli.args.iter().map(|arg| arg.as_bytes()))
        .collect();
    let env: Vec<&[u8]> = config.env.iter().map(|var| var.as_bytes()).collect();
    let args = ArgBuffer::from_host(&argv, &env).context("guest arguments")?;

    let mut process = GuestProcess::new(config, args)?;
    process
        .load(&program)
        .with_context(|| format!("loading {}", String::from_utf8_lossy(&program)))?;
    process.run(cpu::builtin)
}
