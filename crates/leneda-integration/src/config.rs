// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz


//! Application configuration: config entries and polling settings

use crate::errors::{IntegrationError, IntegrationResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Home Assistant add-on options
pub const OPTIONS_PATH: &str = "/data/options.json";

/// Default refresh period of every entry
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 3600;

fn default_scan_interval_secs() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One configured Leneda account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConfig {
    /// Explicit entry id. Falls back to the energy id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    pub api_token: String,
    pub energy_id: String,
    /// Comma-separated metering point codes
    #[serde(default)]
    pub metering_points: String,
}

impl EntryConfig {
    pub fn new(
        api_token: impl Into<String>,
        energy_id: impl Into<String>,
        metering_points: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: None,
            api_token: api_token.into(),
            energy_id: energy_id.into(),
            metering_points: metering_points.into(),
        }
    }

    pub fn id(&self) -> &str {
        self.entry_id.as_deref().unwrap_or(&self.energy_id)
    }

    /// Metering point codes, trimmed, empties dropped
    pub fn metering_points(&self) -> Vec<String> {
        parse_metering_points(&self.metering_points)
    }
}

/// Split a comma-separated list of metering point codes
pub fn parse_metering_points(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// How often each entry refreshes its readings (seconds)
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// API base URL override, mainly for testing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Kept last so TOML output has its scalars ahead of the tables
    #[serde(default)]
    pub entries: Vec<EntryConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            base_url: None,
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load from the add-on options, `config.toml` or `config.json`, in that
    /// order, falling back to defaults. Environment overrides apply on top.
    pub fn load() -> IntegrationResult<Self> {
        let source = Self::find_config_file();
        let mut config = match &source {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;

        match source {
            Some(path) => info!("✅ Loaded configuration from {}", path.display()),
            None => warn!("No configuration file found, using defaults with environment overrides"),
        }
        Ok(config)
    }

    /// First existing file of the `load` search order
    pub fn find_config_file() -> Option<PathBuf> {
        first_existing([OPTIONS_PATH, "config.toml", "config.json"].map(Path::new))
    }

    /// Parse a single file; `.toml` is read as TOML, anything else as JSON
    pub fn load_from(path: impl AsRef<Path>) -> IntegrationResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        if is_toml(path) {
            Ok(toml::from_str(&content)?)
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    /// Write to `path`, as TOML for `.toml` and JSON otherwise
    pub fn save_to(&self, path: impl AsRef<Path>) -> IntegrationResult<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        info!("💾 Saved configuration to {}", path.display());
        Ok(())
    }

    /// Add `entry`, or replace the one with the same id. Returns true on replace.
    pub fn upsert_entry(&mut self, entry: EntryConfig) -> bool {
        match self.entries.iter_mut().find(|e| e.id() == entry.id()) {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.entries.push(entry);
                false
            }
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overrides from `LENEDA_*` variables
    ///
    /// Token, energy id and metering points together describe one entry,
    /// which replaces any configured entry with the same id.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secs) = lookup("LENEDA_SCAN_INTERVAL_SECS")
            && let Ok(secs) = secs.trim().parse::<u64>()
        {
            self.scan_interval_secs = secs;
        }
        if let Some(url) = lookup("LENEDA_BASE_URL")
            && !url.trim().is_empty()
        {
            self.base_url = Some(url.trim().to_string());
        }

        let token = lookup("LENEDA_API_TOKEN").filter(|v| !v.trim().is_empty());
        let energy_id = lookup("LENEDA_ENERGY_ID").filter(|v| !v.trim().is_empty());
        let points = lookup("LENEDA_METERING_POINTS").filter(|v| !v.trim().is_empty());

        if let (Some(token), Some(energy_id), Some(points)) = (token, energy_id, points) {
            self.upsert_entry(EntryConfig::new(token, energy_id.trim(), points));
        }
    }

    pub fn validate(&self) -> IntegrationResult<()> {
        if self.scan_interval_secs == 0 {
            return Err(IntegrationError::Validation(
                "scan_interval_secs must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.api_token.trim().is_empty() {
                return Err(IntegrationError::Validation(format!(
                    "Entry {idx} has an empty api_token"
                )));
            }
            if entry.energy_id.trim().is_empty() {
                return Err(IntegrationError::Validation(format!(
                    "Entry {idx} has an empty energy_id"
                )));
            }
            if entry.metering_points().is_empty() {
                return Err(IntegrationError::Validation(format!(
                    "Entry '{}' has no metering points",
                    entry.id()
                )));
            }
            if !seen.insert(entry.id()) {
                return Err(IntegrationError::Validation(format!(
                    "Duplicate entry id '{}'",
                    entry.id()
                )));
            }
        }

        Ok(())
    }

    /// `validate`, plus at least one entry; a host with nothing to refresh
    /// has no reason to run
    pub fn validate_for_run(&self) -> IntegrationResult<()> {
        self.validate()?;
        if self.entries.is_empty() {
            return Err(IntegrationError::Validation(
                "No config entries configured. Add one with `leneda setup` or set \
                 LENEDA_API_TOKEN, LENEDA_ENERGY_ID and LENEDA_METERING_POINTS"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn first_existing<'a>(candidates: impl IntoIterator<Item = &'a Path>) -> Option<PathBuf> {
    candidates
        .into_iter()
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}
