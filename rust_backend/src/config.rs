//! Run configuration.
//!
//! A run is described by a TOML file; every value has a default so a file
//! only needs the entries that differ. Command-line flags override the file.
//!
//! ```toml
//! [run]
//! runid = "18AC99"
//! qrunid = "Q1"
//! start = "2018-01-15T00:00:00"
//! stop = "2018-02-15T00:00:00"
//!
//! [selection]
//! classes = ["CLASSICAL", "RESONANT"]
//! min_uncertainty_arcsec = 0.1
//!
//! [scheduler]
//! fill_policy = "fill-to-budget"
//!
//! [repository]
//! type = "json"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use qtty::{Arcseconds, Degrees, Hours, Seconds};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::RepositorySettings;
use crate::models::{ModifiedJulianDate, ObserverSite, OrbitClass, Period, ProgramTokens};
use crate::parsing::recon_table::DEFAULT_MIN_UNCERTAINTY_ARCSEC;
use crate::parsing::SelectionCriteria;
use crate::services::ephemeris_track::DEFAULT_STEP_MINUTES;
use crate::services::scheduler::{
    GroupFillPolicy, SchedulerConfig, DEFAULT_DURATION_BUDGET_SEC, DEFAULT_REPEAT_COUNT,
    DEFAULT_SEPARATION_RADIUS_DEG,
};
use crate::services::visibility::MINIMUM_UP_TIME_HOURS;

pub const DEFAULT_CONFIG_FILE: &str = "recon.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub selection: SelectionSettings,
    #[serde(default)]
    pub site: SiteSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub track: TrackSettings,
    #[serde(default)]
    pub repository: RepositorySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default = "default_runid")]
    pub runid: String,
    #[serde(default = "default_qrunid")]
    pub qrunid: String,
    /// Planning starts with the night at or after this instant (UTC).
    #[serde(default)]
    pub start: Option<String>,
    /// End of the event window; events must fall between `start` and `stop`.
    #[serde(default)]
    pub stop: Option<String>,
    #[serde(default)]
    pub candidates: Option<PathBuf>,
    #[serde(default)]
    pub ephemeris: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSettings {
    #[serde(default = "default_classes")]
    pub classes: Vec<String>,
    #[serde(default = "default_min_uncertainty")]
    pub min_uncertainty_arcsec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default = "default_site_name")]
    pub name: String,
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    #[serde(default = "default_elevation")]
    pub elevation_m: f64,
    #[serde(default = "default_dark_horizon")]
    pub dark_horizon: f64,
    #[serde(default = "default_observable_horizon")]
    pub observable_horizon: f64,
    #[serde(default = "default_minimum_window")]
    pub minimum_window_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_separation_radius")]
    pub separation_radius_deg: f64,
    #[serde(default = "default_duration_budget")]
    pub duration_budget_sec: f64,
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
    #[serde(default)]
    pub fill_policy: GroupFillPolicy,
    #[serde(default)]
    pub block_overhead_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSettings {
    #[serde(default = "default_step_minutes")]
    pub step_minutes: f64,
}

fn default_runid() -> String {
    "18AC99".to_string()
}

fn default_qrunid() -> String {
    "Q1".to_string()
}

fn default_classes() -> Vec<String> {
    OrbitClass::DEFAULT_SELECTION
        .iter()
        .map(|class| class.label().to_string())
        .collect()
}

fn default_min_uncertainty() -> f64 {
    DEFAULT_MIN_UNCERTAINTY_ARCSEC
}

fn default_site_name() -> String {
    ObserverSite::cfht().name
}

fn default_latitude() -> f64 {
    ObserverSite::cfht().latitude.value()
}

fn default_longitude() -> f64 {
    ObserverSite::cfht().longitude.value()
}

fn default_elevation() -> f64 {
    ObserverSite::cfht().elevation_m
}

fn default_dark_horizon() -> f64 {
    ObserverSite::cfht().dark_horizon.value()
}

fn default_observable_horizon() -> f64 {
    ObserverSite::cfht().observable_horizon.value()
}

fn default_minimum_window() -> f64 {
    MINIMUM_UP_TIME_HOURS
}

fn default_separation_radius() -> f64 {
    DEFAULT_SEPARATION_RADIUS_DEG
}

fn default_duration_budget() -> f64 {
    DEFAULT_DURATION_BUDGET_SEC
}

/// Extra copies per group accepted from a run configuration.
pub const REPEAT_COUNT_RANGE: std::ops::RangeInclusive<u32> = 2..=3;

fn default_repeat_count() -> u32 {
    DEFAULT_REPEAT_COUNT
}

fn default_step_minutes() -> f64 {
    DEFAULT_STEP_MINUTES
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            runid: default_runid(),
            qrunid: default_qrunid(),
            start: None,
            stop: None,
            candidates: None,
            ephemeris: None,
        }
    }
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            classes: default_classes(),
            min_uncertainty_arcsec: default_min_uncertainty(),
        }
    }
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            latitude: default_latitude(),
            longitude: default_longitude(),
            elevation_m: default_elevation(),
            dark_horizon: default_dark_horizon(),
            observable_horizon: default_observable_horizon(),
            minimum_window_hours: default_minimum_window(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            separation_radius_deg: default_separation_radius(),
            duration_budget_sec: default_duration_budget(),
            repeat_count: default_repeat_count(),
            fill_policy: GroupFillPolicy::default(),
            block_overhead_sec: 0.0,
        }
    }
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            step_minutes: default_step_minutes(),
        }
    }
}

fn parse_instant(field: &str, text: &str) -> Result<ModifiedJulianDate, ConfigError> {
    ModifiedJulianDate::parse_utc(text)
        .ok_or_else(|| ConfigError::Invalid(format!("{}: cannot parse time '{}'", field, text)))
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `recon.toml` from the working directory, or the defaults when
    /// there is none.
    pub fn from_default_location() -> Result<Self, ConfigError> {
        let path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check every value that the typed accessors would refuse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.runid.trim().is_empty() || self.run.qrunid.trim().is_empty() {
            return Err(ConfigError::Invalid("runid and qrunid must not be empty".to_string()));
        }
        self.site()?;
        self.selection_criteria()?;
        self.start_time()?;
        self.event_window()?;
        let scheduler = &self.scheduler;
        if !REPEAT_COUNT_RANGE.contains(&scheduler.repeat_count) {
            return Err(ConfigError::Invalid(format!(
                "scheduler.repeat_count must be within {}..={}, got {}",
                REPEAT_COUNT_RANGE.start(),
                REPEAT_COUNT_RANGE.end(),
                scheduler.repeat_count
            )));
        }
        if !(scheduler.duration_budget_sec > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "scheduler.duration_budget_sec must be positive, got {}",
                scheduler.duration_budget_sec
            )));
        }
        if !(scheduler.separation_radius_deg >= 0.0 && scheduler.separation_radius_deg <= 180.0) {
            return Err(ConfigError::Invalid(format!(
                "scheduler.separation_radius_deg must be within 0..180, got {}",
                scheduler.separation_radius_deg
            )));
        }
        if !(scheduler.block_overhead_sec >= 0.0) {
            return Err(ConfigError::Invalid(
                "scheduler.block_overhead_sec must not be negative".to_string(),
            ));
        }
        if !(self.track.step_minutes > 0.0) {
            return Err(ConfigError::Invalid(
                "track.step_minutes must be positive".to_string(),
            ));
        }
        if !(self.site.minimum_window_hours >= 0.0) {
            return Err(ConfigError::Invalid(
                "site.minimum_window_hours must not be negative".to_string(),
            ));
        }
        self.repository
            .repository_type()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    pub fn tokens(&self) -> ProgramTokens {
        ProgramTokens::new(self.run.runid.clone(), self.run.qrunid.clone())
    }

    pub fn start_time(&self) -> Result<Option<ModifiedJulianDate>, ConfigError> {
        self.run
            .start
            .as_deref()
            .map(|text| parse_instant("run.start", text))
            .transpose()
    }

    /// `start .. stop` when both are set.
    pub fn event_window(&self) -> Result<Option<Period>, ConfigError> {
        let stop = match self.run.stop.as_deref() {
            Some(text) => parse_instant("run.stop", text)?,
            None => return Ok(None),
        };
        let Some(start) = self.start_time()? else {
            return Ok(None);
        };
        Period::try_new(start, stop)
            .map(Some)
            .ok_or_else(|| ConfigError::Invalid("run.stop precedes run.start".to_string()))
    }

    pub fn site(&self) -> Result<ObserverSite, ConfigError> {
        let site = &self.site;
        Ok(ObserverSite::new(
            site.name.clone(),
            Degrees::new(site.latitude),
            Degrees::new(site.longitude),
            site.elevation_m,
        )
        .map_err(ConfigError::Invalid)?
        .with_horizons(
            Degrees::new(site.dark_horizon),
            Degrees::new(site.observable_horizon),
        ))
    }

    pub fn minimum_window(&self) -> Hours {
        Hours::new(self.site.minimum_window_hours)
    }

    pub fn selection_criteria(&self) -> Result<SelectionCriteria, ConfigError> {
        let classes = self
            .selection
            .classes
            .iter()
            .map(|label| label.parse::<OrbitClass>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(ConfigError::Invalid)?;
        Ok(SelectionCriteria {
            classes,
            min_uncertainty: Arcseconds::new(self.selection.min_uncertainty_arcsec),
            event_window: self.event_window()?,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let scheduler = &self.scheduler;
        SchedulerConfig {
            separation_radius: Degrees::new(scheduler.separation_radius_deg),
            duration_budget: Seconds::new(scheduler.duration_budget_sec),
            repeat_count: scheduler.repeat_count,
            fill_policy: scheduler.fill_policy,
            block_overhead: Seconds::new(scheduler.block_overhead_sec),
        }
    }

    pub fn track_step(&self) -> Seconds {
        Seconds::new(self.track.step_minutes * 60.0)
    }
}
