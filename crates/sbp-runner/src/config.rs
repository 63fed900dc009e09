//! Runner configuration: YAML file plus command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use sbp_bridge::RelayConfig;
use sbp_protocol::{
    max_value_length, CommandType, DEFAULT_HW_VERSION, DEFAULT_PERIOD_MS, MAX_FREQUENCY,
    MAX_PERIOD_MS, MIN_PERIOD_MS,
};
use sbp_radio::{frequency_from_id, BROADCAST_ID};

use crate::error::{RunnerError, RunnerResult};
use crate::radio::UdpRadioConfig;
use crate::scheduler::SchedulerConfig;

/// Firmware build variant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Stream the board's own sensors over serial.
    #[default]
    LocalSensors,
    /// Relay the active remote's readings over serial.
    RadioBridge,
    /// Send readings over the radio; no serial host.
    RadioRemote,
}

/// Complete runner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub role: Role,

    /// This device's identity (the board serial number on hardware).
    pub local_id: u32,

    /// Telemetry period until the host sets one.
    pub period_ms: u32,

    /// Starting radio channel. Remotes default to the channel derived from
    /// their id.
    pub radio_frequency: Option<u8>,

    pub hw_version: u32,
    pub sw_version: String,

    /// File backing the write-once configuration word; memory if unset.
    pub persist_path: Option<PathBuf>,

    /// Seed for the synthetic sensors.
    pub sensor_seed: u64,

    /// Let the synthetic button A of a bridge cycle the active remote.
    pub switch_button: bool,

    pub radio: UdpRadioConfig,
    pub scheduler: SchedulerConfig,
    pub relay: RelayConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            role: Role::default(),
            local_id: 1,
            period_ms: DEFAULT_PERIOD_MS,
            radio_frequency: None,
            hw_version: DEFAULT_HW_VERSION,
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
            persist_path: None,
            sensor_seed: 0,
            switch_button: false,
            radio: UdpRadioConfig::default(),
            scheduler: SchedulerConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load a YAML config file.
    pub fn load(path: &Path) -> RunnerResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text, path)
    }

    /// Parse YAML text; `path` is only used in error messages.
    pub fn from_yaml(text: &str, path: &Path) -> RunnerResult<Self> {
        serde_yaml::from_str(text).map_err(|source| RunnerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> RunnerResult<()> {
        if !(MIN_PERIOD_MS..=MAX_PERIOD_MS).contains(&self.period_ms) {
            return Err(RunnerError::InvalidConfig(format!(
                "period_ms {} outside {MIN_PERIOD_MS}..={MAX_PERIOD_MS}",
                self.period_ms
            )));
        }
        if let Some(frequency) = self.radio_frequency {
            if frequency >= MAX_FREQUENCY {
                return Err(RunnerError::InvalidConfig(format!(
                    "radio_frequency {frequency} must be below {MAX_FREQUENCY}"
                )));
            }
        }
        let max_version = max_value_length(CommandType::SoftwareVersion);
        if self.sw_version.len() > max_version {
            return Err(RunnerError::InvalidConfig(format!(
                "sw_version is longer than {max_version} bytes"
            )));
        }
        if self
            .sw_version
            .contains(|c: char| matches!(c, '[' | ']' | '\r' | '\n'))
        {
            return Err(RunnerError::InvalidConfig(
                "sw_version cannot contain brackets or line breaks".to_string(),
            ));
        }
        if self.role == Role::RadioRemote && self.local_id == BROADCAST_ID {
            return Err(RunnerError::InvalidConfig(
                "a remote cannot use the broadcast id".to_string(),
            ));
        }
        Ok(())
    }

    /// Channel to tune to at startup.
    pub fn initial_frequency(&self) -> u8 {
        match (self.radio_frequency, self.role) {
            (Some(frequency), _) => frequency,
            (None, Role::RadioRemote) => frequency_from_id(self.local_id),
            (None, _) => 0,
        }
    }
}

/// Command line of the `sbp` binary.
#[derive(Parser, Debug)]
#[command(name = "sbp", version, about = "Serial bridge protocol device")]
pub struct Cli {
    /// YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Role to run
    #[arg(long, value_enum)]
    pub role: Option<Role>,

    /// Device identity
    #[arg(long)]
    pub local_id: Option<u32>,

    /// Initial telemetry period in milliseconds
    #[arg(long)]
    pub period_ms: Option<u32>,

    /// Initial radio channel
    #[arg(long)]
    pub frequency: Option<u8>,

    /// File backing the configuration word
    #[arg(long)]
    pub persist: Option<PathBuf>,

    /// First UDP port of the radio channel range
    #[arg(long)]
    pub base_port: Option<u16>,

    /// Synthetic sensor seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log filter when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Load the config file, if any, and apply command-line overrides.
    pub fn resolve(&self) -> RunnerResult<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::load(path)?,
            None => RunnerConfig::default(),
        };

        if let Some(role) = self.role {
            config.role = role;
        }
        if let Some(local_id) = self.local_id {
            config.local_id = local_id;
        }
        if let Some(period_ms) = self.period_ms {
            config.period_ms = period_ms;
        }
        if let Some(frequency) = self.frequency {
            config.radio_frequency = Some(frequency);
        }
        if let Some(path) = &self.persist {
            config.persist_path = Some(path.clone());
        }
        if let Some(base_port) = self.base_port {
            config.radio.base_port = base_port;
        }
        if let Some(seed) = self.seed {
            config.sensor_seed = seed;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "role: radio-bridge\nlocal_id: 4242\nscheduler:\n  safety_buffer_ms: 4\n";
        let config = RunnerConfig::from_yaml(yaml, Path::new("test.yaml")).unwrap();
        assert_eq!(config.role, Role::RadioBridge);
        assert_eq!(config.local_id, 4242);
        assert_eq!(config.period_ms, DEFAULT_PERIOD_MS);
        assert_eq!(config.scheduler.safety_buffer_ms, 4);
        assert_eq!(config.scheduler.idle_sleep_us, 1_000);
        assert_eq!(config.relay, RelayConfig::default());
    }

    #[test]
    fn test_bad_yaml_reports_path() {
        let err = RunnerConfig::from_yaml("role: [", Path::new("broken.yaml")).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_validate() {
        let mut config = RunnerConfig::default();
        assert!(config.validate().is_ok());

        config.period_ms = 5;
        assert!(config.validate().is_err());

        config.period_ms = 20;
        config.radio_frequency = Some(83);
        assert!(config.validate().is_err());

        config.radio_frequency = None;
        config.role = Role::RadioRemote;
        config.local_id = BROADCAST_ID;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_sw_version() {
        let mut config = RunnerConfig {
            sw_version: "v".repeat(109),
            ..RunnerConfig::default()
        };
        assert!(config.validate().is_ok());

        config.sw_version.push('v');
        assert!(config.validate().is_err());

        config.sw_version = "1.0]".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_initial_frequency() {
        let mut config = RunnerConfig {
            role: Role::RadioRemote,
            local_id: 85,
            ..RunnerConfig::default()
        };
        assert_eq!(config.initial_frequency(), 2);
        config.radio_frequency = Some(9);
        assert_eq!(config.initial_frequency(), 9);
        config.role = Role::LocalSensors;
        config.radio_frequency = None;
        assert_eq!(config.initial_frequency(), 0);
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sbp.yaml");
        fs::write(&path, "role: radio-remote\nlocal_id: 10\nperiod_ms: 50\n").unwrap();

        let cli = Cli::parse_from([
            "sbp",
            "--config",
            path.to_str().unwrap(),
            "--local-id",
            "11",
            "--base-port",
            "5000",
        ]);
        let config = cli.resolve().unwrap();
        assert_eq!(config.role, Role::RadioRemote);
        assert_eq!(config.local_id, 11);
        assert_eq!(config.period_ms, 50);
        assert_eq!(config.radio.base_port, 5000);
    }
}
