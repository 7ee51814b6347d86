//! CLI argument definitions using Clap

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::recording::{Codec, ContainerFormat};

/// queue-recorder - record the default input device to an audio file
#[derive(Parser, Debug)]
#[command(name = "queue-recorder")]
#[command(version)]
#[command(about = "Record audio from the default input device to a CAF or Ogg file")]
#[command(long_about = None)]
pub struct Cli {
    /// Output file, replaced if it exists
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<String>,

    /// Container format of the output file
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub container: Option<ContainerArg>,

    /// Audio codec
    #[arg(short = 'c', long)]
    pub codec: Option<CodecArg>,

    /// Number of channels to record
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub channels: Option<u16>,

    /// Number of capture buffers in circulation
    #[arg(short = 'b', long = "buffers", value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub buffer_count: Option<u64>,

    /// Audio held by each buffer (e.g., 250ms, 1s)
    #[arg(long, value_name = "TIME")]
    pub buffer_duration: Option<String>,

    /// Stop automatically after this long (e.g., 30s, 5m, 1m30s)
    #[arg(short = 't', long, value_name = "TIME")]
    pub max_duration: Option<String>,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Config subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Container argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ContainerArg {
    Caf,
    Ogg,
}

impl From<ContainerArg> for ContainerFormat {
    fn from(arg: ContainerArg) -> Self {
        match arg {
            ContainerArg::Caf => ContainerFormat::Caf,
            ContainerArg::Ogg => ContainerFormat::Ogg,
        }
    }
}

/// Codec argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CodecArg {
    Opus,
    Lpcm,
}

impl From<CodecArg> for Codec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Opus => Codec::Opus,
            CodecArg::Lpcm => Codec::LinearPcm,
        }
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "output",
    "container",
    "codec",
    "channels",
    "buffer_count",
    "buffer_duration",
    "max_duration",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

/// Log filter for the `-v` count, used when RUST_LOG is unset
pub fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    }
}
