//! Trellis Configuration Management
//!
//! Loads the engine options file. Every option has a default, so a missing
//! or partial file still yields a usable configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use trellis_core::{Result, TrellisError};

/// Default location of the options file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/engine.txt";

/// Complete engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // ========== Script loading ==========
    /// Folder scanned for scripts (from "scripts_folder" option)
    pub scripts_folder: PathBuf,
    /// Script file extension without the dot (from "script_extension" option)
    pub script_extension: String,
    /// File names starting with this prefix are skipped (from "disabled_prefix" option)
    pub disabled_prefix: String,

    // ========== Runtime ==========
    /// Length of one host tick in milliseconds (from "tick_millis" option)
    pub tick_millis: u64,
    /// How long an asynchronous event waits for the main thread (from "sync_timeout_ms" option)
    pub sync_timeout_ms: u64,

    // ========== Diagnostics ==========
    /// Log verbosity (from "verbosity" option)
    pub verbosity: Verbosity,
    /// Warn about lists joined only by commas (from "warn_missing_and" option)
    pub warn_missing_and: bool,
    /// Format of the load report (from "report_format" option)
    pub report_format: ReportFormat,
}

/// Log verbosity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Low,
    Normal,
    High,
    VeryHigh,
    Debug,
}

impl Verbosity {
    /// Parse a verbosity name, e.g. "very high"
    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('_', " ").as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "very high" | "veryhigh" => Some(Self::VeryHigh),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    /// Default `tracing` filter directive for this verbosity
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Self::Low => "warn",
            Self::Normal => "info",
            Self::High => "info,trellis_scripting=debug",
            Self::VeryHigh => "debug",
            Self::Debug => "trace",
        }
    }
}

/// Load report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scripts_folder: PathBuf::from("scripts"),
            script_extension: "sk".into(),
            disabled_prefix: "-".into(),
            tick_millis: 50,
            sync_timeout_ms: 5000,
            verbosity: Verbosity::Normal,
            warn_missing_and: true,
            report_format: ReportFormat::Text,
        }
    }
}

impl EngineConfig {
    /// Load configuration from an options file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TrellisError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Load configuration from the default path
    pub fn load_default() -> Result<Self> {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }

    /// Parse options file content
    ///
    /// Unknown keys are logged and ignored; malformed values keep their
    /// default.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse key=value
            let Some(eq_pos) = line.find('=') else {
                return Err(TrellisError::Config(format!(
                    "line {}: expected 'key = value', found '{}'",
                    index + 1,
                    line
                )));
            };
            let key = line[..eq_pos].trim();
            let value = line[eq_pos + 1..].trim();

            config.parse_option(key, value);
        }

        Ok(config)
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        match key.to_lowercase().as_str() {
            "scripts_folder" => self.scripts_folder = PathBuf::from(value),
            "script_extension" => {
                self.script_extension = value.trim_start_matches('.').to_string();
            }
            "disabled_prefix" => self.disabled_prefix = value.into(),
            "tick_millis" => {
                self.tick_millis = value.parse().ok().filter(|&ms| ms > 0).unwrap_or(50);
            }
            "sync_timeout_ms" => {
                self.sync_timeout_ms = value.parse().unwrap_or(5000);
            }
            "verbosity" => {
                self.verbosity = Verbosity::from_name(value).unwrap_or(Verbosity::Normal);
            }
            "warn_missing_and" => {
                self.warn_missing_and = value.parse().unwrap_or(true);
            }
            "report_format" => {
                self.report_format = match value.to_lowercase().as_str() {
                    "json" => ReportFormat::Json,
                    _ => ReportFormat::Text,
                };
            }
            _ => {
                tracing::debug!("Unknown config option: {} = {}", key, value);
            }
        }
    }

    /// Length of one tick
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    /// Maximum wait for a main-thread handoff
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    /// Display configuration summary
    pub fn display(&self) {
        tracing::info!("Engine configuration:");
        tracing::info!("  Scripts: {} (*.{}, disabled prefix '{}')",
            self.scripts_folder.display(), self.script_extension, self.disabled_prefix);
        tracing::info!("  Tick: {} ms", self.tick_millis);
        tracing::info!("  Sync timeout: {} ms", self.sync_timeout_ms);
        tracing::info!("  Verbosity: {:?}", self.verbosity);
        tracing::info!("  Warn on lists without and/or: {}", self.warn_missing_and);
        tracing::info!("  Report format: {:?}", self.report_format);
    }
}
