use crate::core::clock::DEFAULT_TIMER_HZ;
use crate::game::chart::Difficulty;
use log::{LevelFilter, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

const CONFIG_PATH: &str = "funkin.ini";

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
        self.parse(&content);
        Ok(())
    }

    pub fn parse(&mut self, content: &str) {
        self.sections.clear();

        let mut current_section: Option<String> = None;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            // Section header: [SectionName]
            if line.starts_with('[') && line.ends_with(']') && line.len() >= 2 {
                let section = line[1..line.len() - 1].trim().to_string();
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
                let value = value_raw[1..].trim().to_string();
                let section = current_section.clone().unwrap_or_default();
                self.sections
                    .entry(section)
                    .or_default()
                    .insert(key.to_string(), value);
            }
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section).and_then(|s| s.get(key)).cloned()
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
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: LogLevel,
    /// Frame clock interrupt rate.
    pub timer_hz: u32,
    pub audio_latency_ms: u32,
    /// How far past the last drive report the song clock may run on its own.
    pub extrapolation_window_ms: u32,
    /// 0 = seed from the wall clock.
    pub random_seed: u32,
    pub difficulty: Difficulty,
    /// Pace frames against the timer thread instead of running flat out.
    pub realtime: bool,
    pub song: String,
    pub track: u8,
    pub package_path: String,
    /// Source chart compiled into the package when it is stale. Empty = none.
    pub chart_path: String,
    /// Scripted input. Empty = autoplay.
    pub replay_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            timer_hz: DEFAULT_TIMER_HZ,
            audio_latency_ms: 25,
            extrapolation_window_ms: 1500,
            random_seed: 0,
            difficulty: Difficulty::Hard,
            realtime: false,
            song: "bopeebo".to_string(),
            track: 5,
            package_path: "data/funkin.pak".to_string(),
            chart_path: "demos/bopeebo.json".to_string(),
            replay_path: String::new(),
        }
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

#[inline(always)]
fn parse_bool(v: &str) -> Option<bool> {
    let v = v.trim();
    if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("on") {
        Some(true)
    } else if v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("no") || v.eq_ignore_ascii_case("off") {
        Some(false)
    } else {
        v.parse::<u8>().ok().map(|n| n != 0)
    }
}

fn default_config_text() -> String {
    let default = Config::default();
    let mut content = String::new();

    // [Options] section - keys in alphabetical order
    content.push_str("[Options]\n");
    content.push_str(&format!("AudioLatencyMs={}\n", default.audio_latency_ms));
    content.push_str(&format!("Difficulty={}\n", default.difficulty));
    content.push_str(&format!(
        "ExtrapolationWindowMs={}\n",
        default.extrapolation_window_ms
    ));
    content.push_str(&format!("LogLevel={}\n", default.log_level.as_str()));
    content.push_str(&format!("RandomSeed={}\n", default.random_seed));
    content.push_str(&format!(
        "Realtime={}\n",
        if default.realtime { "1" } else { "0" }
    ));
    content.push_str(&format!("Song={}\n", default.song));
    content.push_str(&format!("TimerHz={}\n", default.timer_hz));
    content.push_str(&format!("Track={}\n", default.track));
    content.push('\n');

    content.push_str("[Paths]\n");
    content.push_str(&format!("Chart={}\n", default.chart_path));
    content.push_str(&format!("Package={}\n", default.package_path));
    content.push_str(&format!("Replay={}\n", default.replay_path));
    content
}

fn create_default_config_file() -> Result<(), std::io::Error> {
    info!("'{CONFIG_PATH}' not found, creating with default values.");
    std::fs::write(CONFIG_PATH, default_config_text())
}

/// Builds a config from parsed INI data, using defaults for missing or
/// malformed keys.
fn from_ini(conf: &SimpleIni) -> Config {
    let default = Config::default();
    Config {
        log_level: conf
            .get("Options", "LogLevel")
            .and_then(|v| LogLevel::from_str(&v).ok())
            .unwrap_or(default.log_level),
        timer_hz: conf
            .get("Options", "TimerHz")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|hz| *hz > 0)
            .unwrap_or(default.timer_hz),
        audio_latency_ms: conf
            .get("Options", "AudioLatencyMs")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default.audio_latency_ms),
        extrapolation_window_ms: conf
            .get("Options", "ExtrapolationWindowMs")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default.extrapolation_window_ms),
        random_seed: conf
            .get("Options", "RandomSeed")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default.random_seed),
        difficulty: conf
            .get("Options", "Difficulty")
            .and_then(|v| Difficulty::from_str(&v).ok())
            .unwrap_or(default.difficulty),
        realtime: conf
            .get("Options", "Realtime")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(default.realtime),
        song: conf
            .get("Options", "Song")
            .filter(|v| !v.is_empty())
            .unwrap_or(default.song),
        track: conf
            .get("Options", "Track")
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(default.track),
        package_path: conf
            .get("Paths", "Package")
            .filter(|v| !v.is_empty())
            .unwrap_or(default.package_path),
        chart_path: conf.get("Paths", "Chart").unwrap_or(default.chart_path),
        replay_path: conf.get("Paths", "Replay").unwrap_or(default.replay_path),
    }
}

pub fn load() {
    if !Path::new(CONFIG_PATH).exists()
        && let Err(e) = create_default_config_file()
    {
        warn!("Failed to create default config file: {e}");
    }

    let mut conf = SimpleIni::new();
    match conf.load(CONFIG_PATH) {
        Ok(()) => {
            let loaded = from_ini(&conf);
            info!(
                "Configuration loaded from '{CONFIG_PATH}' (song {}, {} at {} Hz).",
                loaded.song, loaded.difficulty, loaded.timer_hz
            );
            *CONFIG.lock().unwrap() = loaded;
        }
        Err(e) => {
            warn!("Failed to load '{CONFIG_PATH}': {e}. Using default values.");
        }
    }
}

pub fn get() -> Config {
    CONFIG.lock().unwrap().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_parses_back_to_defaults() {
        let mut ini = SimpleIni::new();
        ini.parse(&default_config_text());
        assert_eq!(from_ini(&ini), Config::default());
    }

    #[test]
    fn bad_values_fall_back_per_key() {
        let mut ini = SimpleIni::new();
        ini.parse(
            "; comment\n[Options]\nTimerHz=0\nLogLevel=debug\nDifficulty=nightmare\nRealtime=yes\n\
             RandomSeed=abc\n[Paths]\nReplay = runs/one.json\n",
        );
        let cfg = from_ini(&ini);
        let default = Config::default();
        assert_eq!(cfg.timer_hz, default.timer_hz, "zero rate is rejected");
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.difficulty, default.difficulty);
        assert!(cfg.realtime);
        assert_eq!(cfg.random_seed, default.random_seed);
        assert_eq!(cfg.replay_path, "runs/one.json");
    }
}
