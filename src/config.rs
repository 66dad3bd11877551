use lazy_static::lazy_static;
use log::warn;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;

use crate::error::{PlayerError, Result};
use crate::playback::{Direction, LoopMode};

lazy_static! {
    static ref CONFIG: RwLock<PlayerConfig> = RwLock::new(PlayerConfig::load());
}

const CONFIG_PATHS: [&str; 2] = ["./vdkplay.toml", "./vdkplay_config.toml"];

/// Settings applied to every session created with them.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Direction restored on `open` and `stop`
    pub default_direction: Direction,
    /// Loop mode applied on `open`
    pub default_loop_mode: LoopMode,
    /// Speed multiplier applied on `open`, must be > 0
    pub default_speed: f32,
    /// Drive `update()` from a background thread while playing
    pub background_driven: bool,
    /// Sleep between background ticks
    pub tick_interval: Duration,
    /// Consecutive corrupt packets skipped before the session errors out
    pub max_consecutive_decode_failures: u32,
    /// Upper bound on packets decoded while settling after a seek
    pub max_settle_frames: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_direction: Direction::Forward,
            default_loop_mode: LoopMode::Loop,
            default_speed: 1.0,
            background_driven: false,
            tick_interval: Duration::from_millis(5),
            max_consecutive_decode_failures: 8,
            max_settle_frames: 1000,
        }
    }
}

impl PlayerConfig {
    /// Defaults overridden by the first config file found, then by `VDKPLAY_*` variables.
    ///
    /// Malformed values are logged and skipped.
    pub fn load() -> Self {
        let mut config = PlayerConfig::default();

        for path in &CONFIG_PATHS {
            if let Ok(mut file) = File::open(path) {
                let mut content = String::new();
                if file.read_to_string(&mut content).is_ok() {
                    for (key, value) in parse_lines(&content) {
                        if let Err(e) = config.apply(key, value) {
                            warn!("Ignoring {} in {}: {}", key, path, e);
                        }
                    }
                    break;
                }
            }
        }

        config.apply_env();
        config
    }

    /// Applies `VDKPLAY_*` environment overrides.
    pub fn apply_env(&mut self) {
        let vars = [
            ("VDKPLAY_DIRECTION", "direction"),
            ("VDKPLAY_LOOP_MODE", "loop_mode"),
            ("VDKPLAY_SPEED", "speed"),
            ("VDKPLAY_BACKGROUND", "background"),
            ("VDKPLAY_TICK_MS", "tick_ms"),
            ("VDKPLAY_MAX_DECODE_FAILURES", "max_decode_failures"),
            ("VDKPLAY_MAX_SETTLE_FRAMES", "max_settle_frames"),
        ];
        for (var, key) in vars {
            if let Ok(value) = env::var(var) {
                if let Err(e) = self.apply(key, &value) {
                    warn!("Ignoring {}: {}", var, e);
                }
            }
        }
    }

    /// Sets a single option by its config-file key.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim().trim_matches('"').trim_matches('\'');
        match key {
            "direction" => self.default_direction = value.parse()?,
            "loop_mode" => self.default_loop_mode = value.parse()?,
            "speed" => {
                let speed: f32 = value.parse()?;
                if !speed.is_finite() || speed <= 0.0 {
                    return Err(PlayerError::Config(format!("speed must be > 0, got {}", speed)));
                }
                self.default_speed = speed;
            }
            "background" => self.background_driven = parse_bool(value)?,
            "tick_ms" => self.tick_interval = Duration::from_millis(value.parse()?),
            "max_decode_failures" => self.max_consecutive_decode_failures = value.parse()?,
            "max_settle_frames" => self.max_settle_frames = value.parse()?,
            other => return Err(PlayerError::Config(format!("unknown key '{}'", other))),
        }
        Ok(())
    }

    /// Sets the default direction.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.default_direction = direction;
        self
    }

    /// Sets the default loop mode.
    pub fn with_loop_mode(mut self, mode: LoopMode) -> Self {
        self.default_loop_mode = mode;
        self
    }

    /// Sets the default speed multiplier.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.default_speed = speed;
        self
    }

    /// Enables or disables the background driver.
    pub fn with_background(mut self, enable: bool, tick_interval: Duration) -> Self {
        self.background_driven = enable;
        self.tick_interval = tick_interval;
        self
    }

    /// Sets how many consecutive corrupt packets are skipped.
    pub fn with_max_decode_failures(mut self, max: u32) -> Self {
        self.max_consecutive_decode_failures = max;
        self
    }
}

impl FromStr for PlayerConfig {
    type Err = PlayerError;

    /// Strict parse of `key = value` content on top of the defaults.
    fn from_str(content: &str) -> Result<Self> {
        let mut config = PlayerConfig::default();
        for (key, value) in parse_lines(content) {
            config.apply(key, value)?;
        }
        Ok(config)
    }
}

fn parse_lines(content: &str) -> impl Iterator<Item = (&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(PlayerError::Config(format!("expected boolean, got '{}'", other))),
    }
}

/// Re-reads config files and environment into the global configuration.
pub fn reload() {
    let new_config = PlayerConfig::load();
    if let Ok(mut config) = CONFIG.write() {
        *config = new_config;
    }
}

/// Returns a copy of the global configuration.
pub fn global() -> PlayerConfig {
    match CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# VDKPLAY Configuration
# direction: forward | backward
direction = "forward"
# loop_mode: none | loop | bidi
loop_mode = "loop"
speed = 1.0
background = false
tick_ms = 5
max_decode_failures = 8
max_settle_frames = 1000
"#;
        std::fs::write(path, template)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_config_content() {
        let content = r#"
# comment
direction = "backward"
loop_mode = 'bidi'
speed = 2.5
background = true
tick_ms = 10
"#;
        let config: PlayerConfig = content.parse().unwrap();
        assert_eq!(
            config,
            PlayerConfig {
                default_direction: Direction::Backward,
                default_loop_mode: LoopMode::Bidi,
                default_speed: 2.5,
                background_driven: true,
                tick_interval: Duration::from_millis(10),
                ..PlayerConfig::default()
            }
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!("speed = 0".parse::<PlayerConfig>().is_err());
        assert!("speed = -1".parse::<PlayerConfig>().is_err());
        assert!("loop_mode = sometimes".parse::<PlayerConfig>().is_err());
        assert!("colour = red".parse::<PlayerConfig>().is_err());
        assert!("tick_ms = soon".parse::<PlayerConfig>().is_err());
    }

    #[test]
    fn test_lenient_apply_keeps_previous_value() {
        let mut config = PlayerConfig::default();
        assert!(config.apply("speed", "fast").is_err());
        assert_eq!(config.default_speed, 1.0);
    }

    #[test]
    fn test_template_round_trips() {
        let dir = std::env::temp_dir().join(format!("vdkplay-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("vdkplay.toml");
        let _ = std::fs::remove_file(&path);

        create_default_config_template(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let config: PlayerConfig = content.parse().unwrap();
        assert_eq!(config, PlayerConfig::default());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
