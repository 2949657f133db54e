//! Application-level configuration loading, including the runtime team
//! colors set and the sequence rule defaults applied to new games.

use std::time::Duration;
use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::game::{DefenderLock, DefenderLockMode, WinRule, WrongScanPenalty};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "OUTPOST_BACK_CONFIG_PATH";
/// Fallback color returned when the colors set is exhausted.
const DEFAULT_COLOR: &str = "#FFFFFF";
/// Period of the standings broadcast and win-condition ticker.
const DEFAULT_STANDINGS_TICK_MS: u64 = 1_000;
/// Number of scans kept in the in-memory feed.
const DEFAULT_RECENT_SCANS_CAP: usize = 50;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    colors: Vec<String>,
    standings_tick_ms: u64,
    /// Number of scans kept in the in-memory feed.
    pub recent_scans_cap: usize,
    sequence: SequenceDefaults,
}

#[derive(Debug, Clone)]
/// Defaults filled into sequence game rules when a creation payload leaves
/// the corresponding knob out.
pub struct SequenceDefaults {
    /// Seconds allowed between consecutive required stations. `None`
    /// disables the windows.
    pub time_window_sec: Option<u32>,
    /// Penalty applied on an out-of-order scan.
    pub wrong_scan_penalty: WrongScanPenalty,
    /// Cooldown armed on a completed station.
    pub defender_lock: DefenderLock,
    /// How the session winner is decided.
    pub win_rule: WinRule,
    /// Hard cap on the session duration in seconds.
    pub max_duration_sec: u64,
}

impl Default for SequenceDefaults {
    fn default() -> Self {
        Self {
            time_window_sec: Some(60),
            wrong_scan_penalty: WrongScanPenalty::ResetToZero,
            defender_lock: DefenderLock {
                mode: DefenderLockMode::LockCurrent,
                cooldown_sec: 15,
            },
            win_rule: WinRule::FirstToFinish,
            max_duration_sec: 600,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        colors = app_config.colors.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Return the first color of the colors set that is not already listed in `used`.
    ///
    /// When every colors set entry is already taken we fall back to
    /// [`DEFAULT_COLOR`] so callers always receive a value.
    pub fn first_unused_color(&self, used: &[String]) -> String {
        self.colors
            .iter()
            .find(|candidate| {
                used.iter()
                    .all(|existing| !existing.eq_ignore_ascii_case(candidate))
            })
            .cloned()
            .unwrap_or_else(|| DEFAULT_COLOR.to_owned())
    }

    /// Period of the standings broadcast and win-condition ticker.
    pub fn standings_tick(&self) -> Duration {
        Duration::from_millis(self.standings_tick_ms)
    }

    /// Sequence rule defaults for game creation.
    pub fn sequence_defaults(&self) -> &SequenceDefaults {
        &self.sequence
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            colors: default_colors(),
            standings_tick_ms: DEFAULT_STANDINGS_TICK_MS,
            recent_scans_cap: DEFAULT_RECENT_SCANS_CAP,
            sequence: SequenceDefaults::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    colors: Option<Vec<String>>,
    standings_tick_ms: Option<u64>,
    recent_scans_cap: Option<usize>,
    sequence: Option<RawSequenceDefaults>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of the sequence defaults block.
struct RawSequenceDefaults {
    /// Zero disables the time windows.
    time_window_sec: Option<u32>,
    wrong_scan_penalty: Option<WrongScanPenalty>,
    defender_lock: Option<DefenderLock>,
    win_rule: Option<WinRule>,
    max_duration_sec: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let sequence = value
            .sequence
            .map(|raw| {
                let base = SequenceDefaults::default();
                SequenceDefaults {
                    time_window_sec: match raw.time_window_sec {
                        Some(0) => None,
                        Some(seconds) => Some(seconds),
                        None => base.time_window_sec,
                    },
                    wrong_scan_penalty: raw.wrong_scan_penalty.unwrap_or(base.wrong_scan_penalty),
                    defender_lock: raw.defender_lock.unwrap_or(base.defender_lock),
                    win_rule: raw.win_rule.unwrap_or(base.win_rule),
                    max_duration_sec: raw.max_duration_sec.unwrap_or(base.max_duration_sec),
                }
            })
            .unwrap_or_default();

        Self {
            colors: value.colors.unwrap_or(defaults.colors),
            standings_tick_ms: value.standings_tick_ms.unwrap_or(defaults.standings_tick_ms),
            recent_scans_cap: value.recent_scans_cap.unwrap_or(defaults.recent_scans_cap),
            sequence,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in colors set shipped with the binary.
fn default_colors() -> Vec<String> {
    [
        "#E6194B", "#3CB44B", "#FFE119", "#4363D8", "#F58231", "#911EB4", "#46F0F0", "#F032E6",
        "#BCF60C", "#FABEBE", "#008080", "#E6BEFF", "#9A6324", "#FFFAC8", "#800000", "#AAFFC3",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}
