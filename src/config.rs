use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::player::SeekSteps;

/// Configuration for Easy Chapters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External tool locations
    pub tools: ToolsConfig,

    /// Save flow settings
    pub editing: EditingConfig,

    /// Player control settings
    pub playback: PlaybackConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ToolsConfig {
    /// Explicit ffmpeg binary; looked up on PATH when unset
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit ffprobe binary; looked up on PATH when unset
    pub ffprobe_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingConfig {
    /// Suffix appended to the media path for the chapters sidecar
    pub sidecar_suffix: String,

    /// Infix placed before the extension of FFmpeg's temporary output
    pub temp_infix: String,

    /// Directory relative media paths are resolved against
    pub default_media_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Progress refresh interval (milliseconds)
    pub refresh_interval_ms: u64,

    /// Delay before re-pausing after a seek while paused (milliseconds)
    pub settle_delay_ms: u64,

    /// Skip button distances
    pub jump: SeekSteps,

    /// Frame button distances
    pub frame: SeekSteps,

    /// Rate applied with shift
    pub fast_rate: f32,

    /// Rate applied with control
    pub slow_rate: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            sidecar_suffix: "chapters".to_string(),
            temp_infix: "tmp".to_string(),
            default_media_dir: None,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 50,
            settle_delay_ms: 50,
            jump: SeekSteps::jump(),
            frame: SeekSteps::frame(),
            fast_rate: 2.0,
            slow_rate: 0.5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PlaybackConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Config {
    /// Load configuration from the usual locations, then the environment
    pub fn load() -> Result<Self> {
        let mut config_paths = vec![
            PathBuf::from("easy-chapters.toml"),
            PathBuf::from("config/easy-chapters.toml"),
        ];
        if let Some(home) = std::env::var_os("HOME") {
            config_paths.push(PathBuf::from(home).join(".config/easy-chapters/config.toml"));
        }

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path.display());
                        return Ok(config.with_env_overrides());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Cannot parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config.with_env_overrides())
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(ffmpeg) = std::env::var("EASY_CHAPTERS_FFMPEG") {
            self.tools.ffmpeg_path = Some(PathBuf::from(ffmpeg));
        }

        if let Ok(ffprobe) = std::env::var("EASY_CHAPTERS_FFPROBE") {
            self.tools.ffprobe_path = Some(PathBuf::from(ffprobe));
        }

        if let Ok(level) = std::env::var("EASY_CHAPTERS_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(delay) = std::env::var("EASY_CHAPTERS_SETTLE_DELAY_MS") {
            self.playback.settle_delay_ms = delay.parse().unwrap_or(self.playback.settle_delay_ms);
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.editing.sidecar_suffix.trim().is_empty() {
            return Err(anyhow!("sidecar_suffix must not be empty"));
        }

        if self.editing.temp_infix.trim().is_empty() {
            return Err(anyhow!("temp_infix must not be empty"));
        }

        if self.playback.refresh_interval_ms == 0 {
            return Err(anyhow!("refresh_interval_ms must be greater than 0"));
        }

        if self.playback.fast_rate <= 0.0 || self.playback.slow_rate <= 0.0 {
            return Err(anyhow!("playback rates must be positive"));
        }

        for (name, path) in [("ffmpeg_path", &self.tools.ffmpeg_path), ("ffprobe_path", &self.tools.ffprobe_path)] {
            if let Some(path) = path {
                if !path.exists() {
                    return Err(anyhow!("{} does not exist: {}", name, path.display()));
                }
            }
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Resolve a media path given on the command line
    pub fn resolve_media_path(&self, path: &Path) -> PathBuf {
        match &self.editing.default_media_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        let show = |path: &Option<PathBuf>| {
            path.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "auto".to_string())
        };

        format!(
            "Easy Chapters Configuration:\n\
            - ffmpeg: {}\n\
            - ffprobe: {}\n\
            - Sidecar suffix: .{}\n\
            - Temporary infix: .{}\n\
            - Settle delay: {}ms\n\
            - Log level: {}",
            show(&self.tools.ffmpeg_path),
            show(&self.tools.ffprobe_path),
            self.editing.sidecar_suffix,
            self.editing.temp_infix,
            self.playback.settle_delay_ms,
            self.logging.level
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolsConfig::default(),
            editing: EditingConfig::default(),
            playback: PlaybackConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_ffmpeg(mut self, path: PathBuf) -> Self {
        self.config.tools.ffmpeg_path = Some(path);
        self
    }

    pub fn with_ffprobe(mut self, path: PathBuf) -> Self {
        self.config.tools.ffprobe_path = Some(path);
        self
    }

    pub fn with_sidecar_suffix(mut self, suffix: &str) -> Self {
        self.config.editing.sidecar_suffix = suffix.to_string();
        self
    }

    pub fn with_settle_delay_ms(mut self, delay: u64) -> Self {
        self.config.playback.settle_delay_ms = delay;
        self
    }

    pub fn with_log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
