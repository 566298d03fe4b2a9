use log::{info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use crate::game::judgment::{Tier, TierTable};

const CONFIG_PATH: &str = "tapline.ini";

// --- Minimal INI reader ---
#[derive(Debug, Default)]
pub struct SimpleIni {
    sections: HashMap<String, HashMap<String, String>>,
}

impl SimpleIni {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        self.sections.clear();

        let mut current_section: Option<String> = None;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            // Section header: [SectionName]
            if line.starts_with('[') && line.ends_with(']') && line.len() >= 2 {
                let name = &line[1..line.len() - 1];
                let section = name.trim().to_string();
                current_section = Some(section.clone());
                self.sections.entry(section).or_default();
                continue;
            }

            // Key/value pair: key=value
            if let Some(eq_idx) = line.find('=') {
                let (key_raw, value_raw) = line.split_at(eq_idx);
                let key = key_raw.trim();
                if key.is_empty() {
                    continue;
                }
                // Skip '=' and trim whitespace from the value.
                let value = value_raw[1..].trim().to_string();
                let section = current_section.clone().unwrap_or_default();
                self.sections
                    .entry(section)
                    .or_default()
                    .insert(key.to_string(), value);
            }
        }

        Ok(())
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section).and_then(|s| s.get(key)).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayMode {
    Realistic,
    Perfect,
}

impl AutoplayMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Realistic => "realistic",
            Self::Perfect => "perfect",
        }
    }
}

impl FromStr for AutoplayMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "realistic" => Ok(Self::Realistic),
            "perfect" => Ok(Self::Perfect),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }

    const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub lanes: usize,
    pub tier_table: TierTable,
    /// Unjudged notes older than this are swept as misses.
    pub late_miss_ms: f64,
    /// Travel duration from spawn to the hit line; a rendering hint only.
    pub drop_ms: f64,
    pub pre_roll_ms: f64,
    /// Restart automatically when a run completes.
    pub loop_runs: bool,
    pub autoplay: bool,
    pub autoplay_mode: AutoplayMode,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lanes: 12,
            tier_table: TierTable::default(),
            late_miss_ms: 50.0,
            drop_ms: 2000.0,
            pre_roll_ms: 3000.0,
            loop_runs: false,
            autoplay: true,
            autoplay_mode: AutoplayMode::Realistic,
            log_level: LogLevel::Info,
        }
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

fn parse_list<T: FromStr>(raw: &str) -> Option<Vec<T>> {
    raw.split(',')
        .map(|part| part.trim().parse::<T>().ok())
        .collect()
}

/// Builds the tier table from the comma-separated config lists. Thresholds
/// and scores must pair up; names and colors fall back to the stock table or
/// generated labels when absent. Any violation rejects the whole table.
fn tier_table_from_ini(conf: &SimpleIni) -> Option<TierTable> {
    let thresholds_raw = conf.get("Gameplay", "TierThresholdsMs")?;
    let scores_raw = conf.get("Gameplay", "TierScores")?;

    let thresholds: Vec<f64> = parse_list(&thresholds_raw)?;
    let scores: Vec<i64> = parse_list(&scores_raw)?;
    if thresholds.len() != scores.len() {
        warn!(
            "TierThresholdsMs has {} entries but TierScores has {}; ignoring both",
            thresholds.len(),
            scores.len()
        );
        return None;
    }

    let names: Vec<String> = conf
        .get("Gameplay", "TierNames")
        .and_then(|raw| parse_list(&raw))
        .filter(|v: &Vec<String>| v.len() == thresholds.len())
        .unwrap_or_else(|| (0..thresholds.len()).map(|i| format!("Tier{}", i + 1)).collect());
    let colors: Vec<String> = conf
        .get("Gameplay", "TierColors")
        .and_then(|raw| parse_list(&raw))
        .filter(|v: &Vec<String>| v.len() == thresholds.len())
        .unwrap_or_else(|| vec![String::from("#ffffff"); thresholds.len()]);

    let tiers = names
        .into_iter()
        .zip(thresholds)
        .zip(scores)
        .zip(colors)
        .map(|(((name, threshold_ms), score), color)| Tier { name, threshold_ms, score, color })
        .collect();

    match TierTable::new(tiers) {
        Ok(table) => Some(table),
        Err(e) => {
            warn!("rejecting configured tier table: {e}");
            None
        }
    }
}

fn create_default_config_file() -> Result<(), std::io::Error> {
    info!("'{CONFIG_PATH}' not found, creating with default values.");
    let default = Config::default();
    let tiers = default.tier_table.tiers();

    let names = tiers.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(",");
    let thresholds = tiers.iter().map(|t| t.threshold_ms.to_string()).collect::<Vec<_>>().join(",");
    let scores = tiers.iter().map(|t| t.score.to_string()).collect::<Vec<_>>().join(",");
    let colors = tiers.iter().map(|t| t.color.as_str()).collect::<Vec<_>>().join(",");

    let mut content = String::new();
    content.push_str("[Log]\n");
    content.push_str(&format!("Level={}\n\n", default.log_level.as_str()));
    content.push_str("[Gameplay]\n");
    content.push_str(&format!("Lanes={}\n", default.lanes));
    content.push_str(&format!("TierNames={names}\n"));
    content.push_str(&format!("TierThresholdsMs={thresholds}\n"));
    content.push_str(&format!("TierScores={scores}\n"));
    content.push_str(&format!("TierColors={colors}\n"));
    content.push_str(&format!("LateMissMs={}\n", default.late_miss_ms));
    content.push_str(&format!("DropMs={}\n", default.drop_ms));
    content.push_str(&format!("PreRollMs={}\n", default.pre_roll_ms));
    content.push_str(&format!("Loop={}\n\n", u8::from(default.loop_runs)));
    content.push_str("[Autoplay]\n");
    content.push_str(&format!("Enabled={}\n", u8::from(default.autoplay)));
    content.push_str(&format!("Mode={}\n", default.autoplay_mode.as_str()));

    std::fs::write(CONFIG_PATH, content)
}

pub fn load() {
    if !std::path::Path::new(CONFIG_PATH).exists()
        && let Err(e) = create_default_config_file()
    {
        warn!("Failed to create default config file: {e}");
    }

    let mut conf = SimpleIni::new();
    match conf.load(CONFIG_PATH) {
        Ok(()) => {
            // Populate the global Config from the file, using default values
            // for any missing or rejected keys.
            let mut cfg = CONFIG.lock().unwrap();
            let default = Config::default();

            cfg.log_level = conf
                .get("Log", "Level")
                .and_then(|v| LogLevel::from_str(&v).ok())
                .unwrap_or(default.log_level);
            cfg.lanes = conf
                .get("Gameplay", "Lanes")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(default.lanes);
            cfg.tier_table = tier_table_from_ini(&conf).unwrap_or(default.tier_table);
            cfg.late_miss_ms = conf
                .get("Gameplay", "LateMissMs")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(default.late_miss_ms);
            cfg.drop_ms = conf
                .get("Gameplay", "DropMs")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(default.drop_ms);
            cfg.pre_roll_ms = conf
                .get("Gameplay", "PreRollMs")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(default.pre_roll_ms);
            cfg.loop_runs = conf
                .get("Gameplay", "Loop")
                .and_then(|v| v.parse::<u8>().ok())
                .map_or(default.loop_runs, |v| v != 0);
            cfg.autoplay = conf
                .get("Autoplay", "Enabled")
                .and_then(|v| v.parse::<u8>().ok())
                .map_or(default.autoplay, |v| v != 0);
            cfg.autoplay_mode = conf
                .get("Autoplay", "Mode")
                .and_then(|v| AutoplayMode::from_str(&v).ok())
                .unwrap_or(default.autoplay_mode);
        }
        Err(e) => {
            warn!("Could not load '{CONFIG_PATH}', using defaults: {e}");
        }
    }
}

pub fn get() -> Config {
    CONFIG.lock().unwrap().clone()
}
