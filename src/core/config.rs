use std::{path::PathBuf, time::Duration};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Generator, Shell};
use lazy_static::lazy_static;
use log::LevelFilter;

lazy_static! {
    pub static ref CFG: Config = Config::new();
}

pub const DEFAULT_MAP: &str = "Kernel/Kernel.map";

#[cfg(windows)]
pub const DEFAULT_CHANNEL: &str = r"\\.\pipe\nutshell";
#[cfg(not(windows))]
pub const DEFAULT_CHANNEL: &str = "/tmp/nutshell";

#[derive(Subcommand, Clone, Debug, Default, PartialEq, Eq)]
pub enum Commands {
    /// Relay commands to the kernel and resolve the addresses it replies with
    #[default]
    Session,
    /// Resolve addresses typed at the prompt without talking to the kernel
    Which,
    /// Print the loaded symbol table
    Dump,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// linker map of the kernel image
    #[arg(long, short, default_value = DEFAULT_MAP)]
    pub map: String,

    /// named pipe, serial device, unix socket, or the base name of a
    /// `<channel>.in` / `<channel>.out` fifo pair
    #[arg(long, short, default_value = DEFAULT_CHANNEL)]
    pub channel: String,

    /// give up on a silent kernel after this many milliseconds
    #[arg(long, short)]
    pub timeout_ms: Option<u64>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, value_name = "SHELL")]
    pub completions: Option<Shell>,
}

impl Config {
    pub fn new() -> Self {
        Self::parse()
    }

    pub fn subcommand(&self) -> Commands {
        self.command.clone().unwrap_or_default()
    }

    pub fn map_path(&self) -> PathBuf {
        expand_path(&self.map)
    }

    pub fn channel_path(&self) -> PathBuf {
        expand_path(&self.channel)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Expands `~` and environment variables, falling back to the raw path
fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(err) => {
            log::warn!("Unable to expand {}: {}", path, err);
            PathBuf::from(path)
        }
    }
}

pub fn generate_completion<G: Generator>(gen: G) {
    generate(
        gen,
        &mut Config::command(),
        Config::command().get_name(),
        &mut std::io::stdout(),
    );
}
