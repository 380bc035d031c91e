//! Configuration at ~/.config/epacta/config.toml
//!
//! Lists the calendar sources to ingest and the tuning knobs of expansion
//! and reconciliation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_FUTURE_MONTHS, DEFAULT_MAX_OCCURRENCES, DEFAULT_PAST_MONTHS,
};
use crate::error::{EpactaError, EpactaResult};
use crate::expand::{ExpandLimits, FeedExpander};
use crate::store::JsonFileStore;
use crate::sync::SyncReconciler;

static DEFAULT_DATA_DIR: &str = "~/.local/share/epacta";

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_occurrences() -> usize {
    DEFAULT_MAX_OCCURRENCES
}

fn default_past_months() -> u32 {
    DEFAULT_PAST_MONTHS
}

fn default_future_months() -> u32 {
    DEFAULT_FUTURE_MONTHS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpactaConfig {
    /// Where the event cache lives.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_occurrences")]
    pub max_occurrences: usize,

    #[serde(default = "default_past_months")]
    pub past_months: u32,

    #[serde(default = "default_future_months")]
    pub future_months: u32,

    #[serde(default)]
    pub calendars: Vec<CalendarSource>,
}

/// One upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarSource {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Path of the downloaded .ics file.
    pub source: PathBuf,

    /// Descriptions follow the Epacta convention.
    #[serde(default)]
    pub epacta: bool,
}

impl CalendarSource {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn source_path(&self) -> PathBuf {
        expand_tilde(&self.source)
    }

    pub fn expander(&self, limits: ExpandLimits) -> FeedExpander {
        FeedExpander::new(&self.id, self.epacta).with_limits(limits)
    }
}

impl EpactaConfig {
    pub fn config_path() -> EpactaResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| EpactaError::Config("Could not determine config directory".into()))?
            .join("epacta");

        Ok(config_dir.join("config.toml"))
    }

    pub fn load_default() -> EpactaResult<Self> {
        Self::load(&Self::config_path()?)
    }

    pub fn load(path: &Path) -> EpactaResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EpactaError::Config(format!("Could not read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> EpactaResult<Self> {
        let config: EpactaConfig =
            toml::from_str(content).map_err(|e| EpactaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> EpactaResult<()> {
        if self.batch_size == 0 {
            return Err(EpactaError::Config("batch_size must be at least 1".into()));
        }
        if self.max_occurrences == 0 {
            return Err(EpactaError::Config("max_occurrences must be at least 1".into()));
        }

        let mut seen = HashSet::new();
        for calendar in &self.calendars {
            if calendar.id.trim().is_empty() {
                return Err(EpactaError::Config("calendar id must not be empty".into()));
            }
            if !seen.insert(calendar.id.as_str()) {
                return Err(EpactaError::Config(format!(
                    "calendar '{}' is configured twice",
                    calendar.id
                )));
            }
        }

        Ok(())
    }

    pub fn calendar(&self, id: &str) -> Option<&CalendarSource> {
        self.calendars.iter().find(|c| c.id == id)
    }

    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.data_dir)
    }

    pub fn store(&self) -> JsonFileStore {
        JsonFileStore::new(self.data_dir())
    }

    pub fn expand_limits(&self) -> ExpandLimits {
        ExpandLimits {
            past_months: self.past_months,
            future_months: self.future_months,
            max_occurrences: self.max_occurrences,
        }
    }

    pub fn reconciler(&self) -> SyncReconciler {
        SyncReconciler::new(self.batch_size)
    }

    /// Create a starter config file with every option commented out.
    pub fn create_default_config(path: &Path) -> EpactaResult<()> {
        let contents = format!(
            "\
# epacta configuration

# Where the event cache lives:
# data_dir = \"{DEFAULT_DATA_DIR}\"

# Rows per store write, recurrence cap and window (months before/after now):
# batch_size = {DEFAULT_BATCH_SIZE}
# max_occurrences = {DEFAULT_MAX_OCCURRENCES}
# past_months = {DEFAULT_PAST_MONTHS}
# future_months = {DEFAULT_FUTURE_MONTHS}

# [[calendars]]
# id = \"parroquia\"
# name = \"Parroquia\"
# source = \"~/feeds/parroquia.ics\"
# epacta = true
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EpactaError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| EpactaError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply() {
        let config = EpactaConfig::from_toml(
            r#"
[[calendars]]
id = "parroquia"
source = "/tmp/parroquia.ics"
epacta = true

[[calendars]]
id = "eventos"
name = "Eventos"
source = "/tmp/eventos.ics"
"#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 100);
        assert_eq!(config.expand_limits(), ExpandLimits::default());
        assert_eq!(config.reconciler().batch_size(), 100);

        let parroquia = config.calendar("parroquia").unwrap();
        assert!(parroquia.epacta);
        assert_eq!(parroquia.display_name(), "parroquia");

        let eventos = config.calendar("eventos").unwrap();
        assert!(!eventos.epacta);
        assert_eq!(eventos.display_name(), "Eventos");
        assert!(config.calendar("missing").is_none());
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        assert!(EpactaConfig::from_toml("batch_size = 0").is_err());
        assert!(EpactaConfig::from_toml("calendars = 3").is_err());
        assert!(EpactaConfig::from_toml(
            r#"
[[calendars]]
id = "a"
source = "a.ics"

[[calendars]]
id = "a"
source = "b.ics"
"#
        )
        .is_err());
    }

    #[test]
    fn test_default_config_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epacta/config.toml");

        EpactaConfig::create_default_config(&path).unwrap();
        let config = EpactaConfig::load(&path).unwrap();

        assert!(config.calendars.is_empty());
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn test_tilde_is_expanded() {
        let config = EpactaConfig::from_toml("data_dir = \"/srv/epacta\"").unwrap();
        assert_eq!(config.data_dir(), PathBuf::from("/srv/epacta"));

        let expanded = expand_tilde(Path::new("~/feeds/a.ics"));
        assert!(!expanded.to_string_lossy().starts_with('~') || dirs::home_dir().is_none());
    }
}
