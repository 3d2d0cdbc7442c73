use crate::game::gameplay::{DEFAULT_LEAD_TIME_MS, SessionConfig};
use crate::game::judgment::{JudgeWindows, ScoreTable};
use configparser::ini::Ini;
use log::{info, warn};
use once_cell::sync::Lazy;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub const CONFIG_INI_PATH: &str = "keysync.ini";

pub const DEFAULT_TICK_RATE_HZ: u32 = 120;
pub const DEFAULT_RESUME_DELAY_MS: u64 = 3000;
pub const DEFAULT_LEVELS_DIR: &str = "Assets/Levels";

const JUDGEMENT: &str = "Judgement";
const SCORING: &str = "Scoring";
const GAMEPLAY: &str = "Gameplay";
const PATHS: &str = "Paths";

// Ordered tightest-first; shared by both tables.
const TIER_KEYS: [&str; 5] = ["PlusPerfect", "Perfect", "Great", "Good", "Miss"];

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub windows: JudgeWindows,
    pub scoring: ScoreTable,
    pub lead_time_ms: i64,
    pub tick_rate_hz: u32,
    pub auto_play: bool,
    /// Countdown between "resume" and the clock actually running again.
    pub resume_delay_ms: u64,
    pub levels_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            windows: JudgeWindows::default(),
            scoring: ScoreTable::default(),
            lead_time_ms: DEFAULT_LEAD_TIME_MS,
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            auto_play: false,
            resume_delay_ms: DEFAULT_RESUME_DELAY_MS,
            levels_dir: PathBuf::from(DEFAULT_LEVELS_DIR),
        }
    }
}

impl Config {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            windows: self.windows,
            scoring: self.scoring,
            lead_time_ms: self.lead_time_ms,
            auto_play: self.auto_play,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }

    fn to_ini(&self) -> Ini {
        let mut conf = Ini::new();
        let windows = [
            self.windows.plus_perfect,
            self.windows.perfect,
            self.windows.great,
            self.windows.good,
            self.windows.miss,
        ];
        let points = [
            self.scoring.plus_perfect,
            self.scoring.perfect,
            self.scoring.great,
            self.scoring.good,
            self.scoring.miss,
        ];
        for ((key, window), score) in TIER_KEYS.iter().zip(windows).zip(points) {
            conf.set(JUDGEMENT, &format!("{}Ms", key), Some(window.to_string()));
            conf.set(SCORING, key, Some(score.to_string()));
        }
        conf.set(GAMEPLAY, "LeadTimeMs", Some(self.lead_time_ms.to_string()));
        conf.set(GAMEPLAY, "TickRateHz", Some(self.tick_rate_hz.to_string()));
        conf.set(GAMEPLAY, "AutoPlay", Some(if self.auto_play { "1" } else { "0" }.to_string()));
        conf.set(GAMEPLAY, "ResumeDelayMs", Some(self.resume_delay_ms.to_string()));
        conf.set(PATHS, "LevelsDir", Some(self.levels_dir.display().to_string()));
        conf
    }
}

static CONFIG: Lazy<Mutex<Config>> = Lazy::new(|| Mutex::new(Config::default()));

fn read_int(conf: &Ini, section: &str, key: &str, default: i64) -> i64 {
    match conf.getint(section, key) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            warn!("Invalid value for [{}] {}: {}. Using {}.", section, key, e, default);
            default
        }
    }
}

fn read_bool(conf: &Ini, section: &str, key: &str, default: bool) -> bool {
    conf.get(section, key)
        .and_then(|v| v.trim().parse::<u8>().ok())
        .map_or(default, |v| v != 0)
}

/// Builds a config from parsed INI contents, keeping defaults for anything
/// missing or unusable.
pub fn from_ini(conf: &Ini) -> Config {
    let default = Config::default();
    let default_ini = default.to_ini();

    let tier_values = |section: &str, suffix: &str| -> [i64; 5] {
        TIER_KEYS.map(|key| {
            let name = format!("{}{}", key, suffix);
            let fallback = default_ini
                .getint(section, &name)
                .ok()
                .flatten()
                .unwrap_or_default();
            read_int(conf, section, &name, fallback)
        })
    };

    let [w1, w2, w3, w4, w_miss] = tier_values(JUDGEMENT, "Ms");
    let mut windows = JudgeWindows {
        plus_perfect: w1,
        perfect: w2,
        great: w3,
        good: w4,
        miss: w_miss,
    };
    if !windows.is_valid() {
        warn!(
            "Judge windows {:?} are not strictly increasing; using defaults.",
            windows
        );
        windows = default.windows;
    }

    let [s1, s2, s3, s4, s5] = tier_values(SCORING, "");
    let scoring = ScoreTable {
        plus_perfect: s1,
        perfect: s2,
        great: s3,
        good: s4,
        miss: s5,
    };

    let mut lead_time_ms = read_int(conf, GAMEPLAY, "LeadTimeMs", default.lead_time_ms);
    if lead_time_ms < 0 {
        warn!("LeadTimeMs {} is negative; using {}.", lead_time_ms, default.lead_time_ms);
        lead_time_ms = default.lead_time_ms;
    }

    let tick_rate_hz = match u32::try_from(read_int(conf, GAMEPLAY, "TickRateHz", default.tick_rate_hz.into())) {
        Ok(rate) if rate > 0 => rate,
        _ => {
            warn!("TickRateHz must be a positive integer; using {}.", default.tick_rate_hz);
            default.tick_rate_hz
        }
    };

    let resume_delay_ms = u64::try_from(read_int(
        conf,
        GAMEPLAY,
        "ResumeDelayMs",
        default.resume_delay_ms as i64,
    ))
    .unwrap_or(default.resume_delay_ms);

    Config {
        windows,
        scoring,
        lead_time_ms,
        tick_rate_hz,
        auto_play: read_bool(conf, GAMEPLAY, "AutoPlay", default.auto_play),
        resume_delay_ms,
        levels_dir: conf
            .get(PATHS, "LevelsDir")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(default.levels_dir),
    }
}

/// Writes the default config file if it does not exist yet.
fn create_default_file(path: &Path) -> Result<(), std::io::Error> {
    info!("Config file not found, creating defaults in '{}'.", path.display());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Config::default().to_ini().write(path)
}

/// Reads `path` into a config. A missing file is created with defaults; an
/// unreadable one is reported and defaults are used.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        if let Err(e) = create_default_file(path) {
            warn!("Failed to create default config file: {}", e);
            return Config::default();
        }
    }

    let mut conf = Ini::new();
    match conf.load(path) {
        Ok(_) => from_ini(&conf),
        Err(e) => {
            warn!("Failed to load '{}': {}. Using defaults.", path.display(), e);
            Config::default()
        }
    }
}

/// Loads `path` (or the default location) into the process-wide config.
pub fn load(path: Option<&Path>) {
    let config = load_from(path.unwrap_or(Path::new(CONFIG_INI_PATH)));
    *CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = config;
}

/// Returns a copy of the currently loaded config.
pub fn get() -> Config {
    CONFIG.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Config {
        let mut conf = Ini::new();
        conf.read(text.to_string()).unwrap();
        from_ini(&conf)
    }

    #[test]
    fn empty_ini_gives_defaults() {
        assert_eq!(parse(""), Config::default());
    }

    #[test]
    fn reads_every_section() {
        let config = parse(
            "[Judgement]
PlusPerfectMs=10
PerfectMs=30
GreatMs=60
GoodMs=90
MissMs=120

[Scoring]
PlusPerfect=1000
Miss=-50

[Gameplay]
LeadTimeMs=1500
TickRateHz=240
AutoPlay=1
ResumeDelayMs=0

[Paths]
LevelsDir=/srv/levels
",
        );
        assert_eq!(config.windows.perfect, 30);
        assert_eq!(config.windows.miss, 120);
        assert_eq!(config.scoring.plus_perfect, 1000);
        assert_eq!(config.scoring.perfect, ScoreTable::default().perfect);
        assert_eq!(config.scoring.miss, -50);
        assert_eq!(config.lead_time_ms, 1500);
        assert_eq!(config.tick_rate_hz, 240);
        assert!(config.auto_play);
        assert_eq!(config.resume_delay(), Duration::ZERO);
        assert_eq!(config.levels_dir, PathBuf::from("/srv/levels"));
        assert!(config.session_config().auto_play);
    }

    #[test]
    fn unordered_windows_fall_back_to_defaults() {
        let config = parse("[Judgement]\nPerfectMs=500\n");
        assert_eq!(config.windows, JudgeWindows::default());
    }

    #[test]
    fn garbage_values_fall_back() {
        let config = parse("[Gameplay]\nTickRateHz=fast\nLeadTimeMs=-5\n");
        assert_eq!(config.tick_rate_hz, DEFAULT_TICK_RATE_HZ);
        assert_eq!(config.lead_time_ms, DEFAULT_LEAD_TIME_MS);
    }

    #[test]
    fn tick_interval_matches_rate() {
        let config = Config::default();
        let interval = config.tick_interval();
        assert!(interval > Duration::from_micros(8300) && interval < Duration::from_micros(8400));
    }

    #[test]
    fn missing_file_is_created_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("keysync.ini");
        let first = load_from(&path);
        assert!(path.exists());
        assert_eq!(first, Config::default());
        assert_eq!(load_from(&path), Config::default());
    }

    #[test]
    fn global_config_follows_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keysync.ini");
        fs::write(&path, "[Gameplay]\nTickRateHz=60\n").unwrap();
        load(Some(&path));
        assert_eq!(get().tick_rate_hz, 60);
    }
}
