use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::types::CarveConfig;

/// Dump Carver - recover office documents from raw memory and disk dumps
#[derive(Parser, Debug, Clone)]
#[command(name = "dump-carver")]
#[command(version)]
#[command(about = "Recover office documents from raw memory and disk dumps", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Debug-level logging for the carving engine
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan a dump for signatures and extract fragment windows in parallel
    Scan {
        /// Dump file to scan
        #[arg(value_name = "DUMP")]
        dump: PathBuf,

        /// Output directory for fragment_part{N}.bin files
        #[arg(short = 'o', long = "output", default_value = "fragments")]
        output: PathBuf,
    },

    /// Carve unique, valid documents out of a dump or fragment file
    Recover {
        /// Dump or fragment file to carve
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Output directory for recovered_{N}.docx files
        #[arg(short = 'o', long = "output", default_value = "recovered_docs")]
        output: PathBuf,
    },

    /// Print a JSON triage report for recovered artifacts
    Analyze {
        /// .docx, .enc or .bin files
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,
    },

    /// Extract embedded images from a document or a directory of documents
    Media {
        /// A .docx file or a directory containing them
        #[arg(value_name = "DOCX_OR_DIR")]
        input: PathBuf,

        /// Output directory for images
        #[arg(short = 'o', long = "output", default_value = "recovered_images")]
        output: PathBuf,
    },
}

/// Engine options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Container marker as hex bytes
    #[arg(long = "marker", default_value = "504b0304", global = true)]
    pub marker: String,

    /// Scanner read block size in KB
    #[arg(long = "block-size", default_value = "1024", global = true)]
    pub block_size: u64,

    /// Bytes copied per signature into fragment files, in KB
    #[arg(long = "window-size", default_value = "20480", global = true)]
    pub window_size: u64,

    /// Maximum candidate window in KB
    #[arg(long = "max-candidate", default_value = "800", global = true)]
    pub max_candidate: u64,

    /// Stop after N recovered documents
    #[arg(long = "cap", default_value = "20", global = true)]
    pub cap: usize,

    /// Share of available cores used by fragment workers
    #[arg(long = "worker-fraction", default_value = "0.7", global = true)]
    pub worker_fraction: f64,

    /// Explicit fragment worker count (overrides --worker-fraction)
    #[arg(long = "workers", global = true)]
    pub workers: Option<usize>,

    /// Entropy (bits/byte) above which an opaque file is reported encrypted
    #[arg(long = "entropy-threshold", default_value = "5.0", global = true)]
    pub entropy_threshold: f64,
}

impl EngineArgs {
    /// Validate the arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.block_size == 0 {
            return Err("block-size must be greater than 0".to_string());
        }

        if self.window_size == 0 {
            return Err("window-size must be greater than 0".to_string());
        }

        if self.max_candidate == 0 {
            return Err("max-candidate must be greater than 0".to_string());
        }

        if self.cap == 0 {
            return Err("cap must be greater than 0".to_string());
        }

        self.marker_bytes().map(|_| ())
    }

    /// Decoded marker
    pub fn marker_bytes(&self) -> Result<Vec<u8>, String> {
        let marker = hex::decode(self.marker.trim())
            .map_err(|e| format!("marker '{}' is not valid hex: {}", self.marker, e))?;
        if marker.is_empty() {
            return Err("marker must not be empty".to_string());
        }
        Ok(marker)
    }

    /// Get block size in bytes, `None` on overflow
    pub fn block_size_bytes(&self) -> Option<u64> {
        self.block_size.checked_mul(1024)
    }

    /// Get fragment window in bytes, `None` on overflow
    pub fn window_size_bytes(&self) -> Option<u64> {
        self.window_size.checked_mul(1024)
    }

    /// Get maximum candidate size in bytes, `None` on overflow
    pub fn max_candidate_bytes(&self) -> Option<u64> {
        self.max_candidate.checked_mul(1024)
    }

    /// Build and check the engine configuration
    pub fn to_config(&self) -> Result<CarveConfig, String> {
        self.validate()?;

        let read_block_size = self
            .block_size_bytes()
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| format!("block-size {} KB is too large", self.block_size))?;
        let fragment_window = self
            .window_size_bytes()
            .ok_or_else(|| format!("window-size {} KB is too large", self.window_size))?;
        let max_candidate_size = self
            .max_candidate_bytes()
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| format!("max-candidate {} KB is too large", self.max_candidate))?;

        let config = CarveConfig {
            marker: self.marker_bytes()?,
            read_block_size,
            fragment_window,
            max_candidate_size,
            recovery_cap: self.cap,
            worker_fraction: self.worker_fraction,
            workers: self.workers,
            entropy_threshold: self.entropy_threshold,
        };
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults_match_engine_defaults() {
        let cli = parse(&["dump-carver", "scan", "memory.dmp"]);
        let config = cli.engine.to_config().unwrap();
        let defaults = CarveConfig::default();

        assert_eq!(config.marker, defaults.marker);
        assert_eq!(config.read_block_size, defaults.read_block_size);
        assert_eq!(config.fragment_window, defaults.fragment_window);
        assert_eq!(config.max_candidate_size, defaults.max_candidate_size);
        assert_eq!(config.recovery_cap, defaults.recovery_cap);
        assert_eq!(config.workers, None);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_subcommands() {
        let cli = parse(&["dump-carver", "recover", "frag.bin", "-o", "docs"]);
        assert!(matches!(
            cli.command,
            Command::Recover { ref source, ref output }
                if source == &PathBuf::from("frag.bin") && output == &PathBuf::from("docs")
        ));

        let cli = parse(&["dump-carver", "analyze", "a.docx", "b.enc"]);
        assert!(matches!(cli.command, Command::Analyze { ref files } if files.len() == 2));

        assert!(Cli::try_parse_from(["dump-carver", "analyze"]).is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = parse(&[
            "dump-carver",
            "recover",
            "dump.bin",
            "--cap",
            "5",
            "--max-candidate",
            "64",
            "--marker",
            "CAFEBABE",
            "-v",
        ]);
        let config = cli.engine.to_config().unwrap();
        assert_eq!(config.recovery_cap, 5);
        assert_eq!(config.max_candidate_size, 64 * 1024);
        assert_eq!(config.marker, vec![0xCA, 0xFE, 0xBA, 0xBE]);
        assert!(cli.verbose);
    }

    #[test]
    fn test_invalid_marker() {
        let cli = parse(&["dump-carver", "scan", "d", "--marker", "xyz"]);
        assert!(cli.engine.validate().is_err());

        let cli = parse(&["dump-carver", "scan", "d", "--marker", "504b03"]);
        assert_eq!(cli.engine.marker_bytes().unwrap(), b"PK\x03");

        let cli = parse(&["dump-carver", "scan", "d", "--marker", "504"]);
        assert!(cli.engine.to_config().is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cli = parse(&["dump-carver", "scan", "d", "--cap", "0"]);
        assert!(cli.engine.validate().is_err());

        let cli = parse(&["dump-carver", "scan", "d", "--worker-fraction", "1.5"]);
        assert!(cli.engine.to_config().is_err());

        let cli = parse(&["dump-carver", "scan", "d", "--workers", "0"]);
        assert!(cli.engine.to_config().is_err());
    }

    #[test]
    fn test_byte_conversions() {
        let cli = parse(&["dump-carver", "scan", "d", "--block-size", "4", "--window-size", "8"]);
        assert_eq!(cli.engine.block_size_bytes(), Some(4 * 1024));
        assert_eq!(cli.engine.window_size_bytes(), Some(8 * 1024));
    }

    #[test]
    fn test_oversized_values_rejected() {
        let max = u64::MAX.to_string();
        for option in ["--block-size", "--window-size", "--max-candidate"] {
            let cli = parse(&["dump-carver", "scan", "d", option, max.as_str()]);
            let err = cli.engine.to_config().unwrap_err();
            assert!(err.contains("too large"), "{option}: {err}");
        }
        let cli = parse(&["dump-carver", "scan", "d", "--window-size", max.as_str()]);
        assert_eq!(cli.engine.window_size_bytes(), None);
    }
}
