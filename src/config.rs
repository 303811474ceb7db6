//! Configuration file support for segtool.
//!
//! Workspace layout settings and editor preferences are persisted as JSON.
//! Missing keys are filled from defaults, and a file that cannot be read or
//! parsed is replaced by defaults with a warning, so a broken config never
//! stops the tool from starting.

use std::path::{Path, PathBuf};

use segtool_raster::{HistoryConfig, Tint, stroke};
use serde::{Deserialize, Serialize};

use crate::input::KeyBindings;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
            LogLevel::Trace => "Trace",
        }
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Placeholder replaced by the image file stem in mask file names.
pub const BASENAME_PLACEHOLDER: &str = "{basename}";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Where and how workspaces are laid out on disk
    #[serde(default)]
    pub workspace: WorkspaceSettings,

    /// Brush, view and history preferences
    #[serde(default)]
    pub editor: EditorPreferences,

    /// Keyboard shortcuts
    #[serde(default)]
    pub keybindings: KeyBindings,
}

/// Names of the two workspace subdirectories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSubdirs {
    #[serde(default = "default_original_subdir")]
    pub original: String,
    #[serde(default = "default_mask_subdir")]
    pub mask: String,
}

fn default_original_subdir() -> String {
    "OriginalImage".to_string()
}

fn default_mask_subdir() -> String {
    "Mask".to_string()
}

impl Default for WorkspaceSubdirs {
    fn default() -> Self {
        Self {
            original: default_original_subdir(),
            mask: default_mask_subdir(),
        }
    }
}

/// Workspace section of the config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Directory under which new workspaces are created
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Mask file name pattern, `{basename}` is the image file stem
    #[serde(default = "default_naming_pattern")]
    pub naming_pattern: String,

    #[serde(default)]
    pub subdirs: WorkspaceSubdirs,

    /// Replace an existing mask file on save
    #[serde(default = "default_true")]
    pub overwrite_existing: bool,

    /// Append a timestamp when the workspace directory already exists
    #[serde(default = "default_true")]
    pub create_timestamp_on_conflict: bool,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("./workspace")
}

fn default_naming_pattern() -> String {
    format!("{}_mask.png", BASENAME_PLACEHOLDER)
}

fn default_true() -> bool {
    true
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            naming_pattern: default_naming_pattern(),
            subdirs: WorkspaceSubdirs::default(),
            overwrite_existing: true,
            create_timestamp_on_conflict: true,
        }
    }
}

impl WorkspaceSettings {
    /// Mask file name for an image with the given file stem.
    pub fn mask_file_name(&self, stem: &str) -> String {
        self.naming_pattern.replace(BASENAME_PLACEHOLDER, stem)
    }

    /// Replace settings that would produce an unusable layout.
    fn sanitize(&mut self) {
        if !self.naming_pattern.contains(BASENAME_PLACEHOLDER) {
            log::warn!(
                "Mask naming pattern {:?} has no {} placeholder, using default",
                self.naming_pattern,
                BASENAME_PLACEHOLDER
            );
            self.naming_pattern = default_naming_pattern();
        }
        if self.subdirs.original.trim().is_empty() {
            self.subdirs.original = default_original_subdir();
        }
        if self.subdirs.mask.trim().is_empty() {
            self.subdirs.mask = default_mask_subdir();
        }
        if self.subdirs.original == self.subdirs.mask {
            log::warn!(
                "Original and mask subdirectories are both {:?}, using defaults",
                self.subdirs.mask
            );
            self.subdirs = WorkspaceSubdirs::default();
        }
    }
}

/// Editor preferences section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorPreferences {
    /// Brush radius in image pixels
    #[serde(default = "default_brush_radius")]
    pub brush_radius: f32,

    /// Initial zoom in percent
    #[serde(default = "default_zoom_percent")]
    pub zoom_percent: u32,

    /// RGB color of the mask overlay
    #[serde(default = "default_tint_color")]
    pub tint_color: [u8; 3],

    /// Opacity of the mask overlay
    #[serde(default = "default_tint_alpha")]
    pub tint_alpha: u8,

    /// Maximum number of undo steps
    #[serde(default = "default_history_max_entries")]
    pub history_max_entries: usize,

    /// Memory budget for undo history in MiB
    #[serde(default = "default_history_max_megabytes")]
    pub history_max_megabytes: usize,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_brush_radius() -> f32 {
    stroke::DEFAULT_RADIUS
}

fn default_zoom_percent() -> u32 {
    100
}

fn default_tint_color() -> [u8; 3] {
    Tint::default().color
}

fn default_tint_alpha() -> u8 {
    Tint::default().alpha
}

fn default_history_max_entries() -> usize {
    HistoryConfig::default().max_entries
}

fn default_history_max_megabytes() -> usize {
    HistoryConfig::default().max_bytes / (1024 * 1024)
}

impl Default for EditorPreferences {
    fn default() -> Self {
        Self {
            brush_radius: default_brush_radius(),
            zoom_percent: default_zoom_percent(),
            tint_color: default_tint_color(),
            tint_alpha: default_tint_alpha(),
            history_max_entries: default_history_max_entries(),
            history_max_megabytes: default_history_max_megabytes(),
            log_level: LogLevel::default(),
        }
    }
}

impl EditorPreferences {
    pub fn tint(&self) -> Tint {
        Tint::new(self.tint_color, self.tint_alpha)
    }

    pub fn history(&self) -> HistoryConfig {
        HistoryConfig {
            max_entries: self.history_max_entries.max(1),
            max_bytes: self.history_max_megabytes.saturating_mul(1024 * 1024),
        }
    }

    fn sanitize(&mut self) {
        self.brush_radius = stroke::clamp_radius(self.brush_radius);
    }
}

impl AppConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            workspace: WorkspaceSettings::default(),
            editor: EditorPreferences::default(),
            keybindings: KeyBindings::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        config.workspace.sanitize();
        config.editor.sanitize();
        Ok(config)
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "workspace_config.json"
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("segtool").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("segtool")
                    .join(Self::default_filename())
            })
        }
    }

    /// Read and parse a config file.
    pub fn read_from(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the active configuration and where it is persisted.
///
/// Components receive settings from the store instead of reading files
/// themselves.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    config: AppConfig,
}

impl ConfigStore {
    /// A store that is never written to disk.
    pub fn in_memory(config: AppConfig) -> Self {
        Self { path: None, config }
    }

    /// Load the config at `path`, falling back to defaults.
    ///
    /// A missing file is not an error. Unreadable or invalid files are
    /// reported with a warning.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = if path.exists() {
            match AppConfig::read_from(&path) {
                Ok(config) => {
                    log::info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    log::warn!("Failed to load config file {:?}: {}", path, e);
                    AppConfig::default()
                }
            }
        } else {
            log::debug!("No config file found at {:?}", path);
            AppConfig::default()
        };
        Self {
            path: Some(path),
            config,
        }
    }

    /// Load from [`AppConfig::default_path`], or use defaults in memory when
    /// no config directory can be determined.
    pub fn load_default() -> Self {
        match AppConfig::default_path() {
            Some(path) => Self::load(path),
            None => {
                log::warn!("Could not determine config directory, using defaults");
                Self::in_memory(AppConfig::default())
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self) -> &AppConfig {
        &self.config
    }

    pub fn set(&mut self, mut config: AppConfig) {
        config.workspace.sanitize();
        config.editor.sanitize();
        self.config = config;
    }

    /// Persist the current config.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.path.as_deref().ok_or(ConfigError::NoPath)?;
        self.config.write_to(path)
    }
}

/// Errors that can occur when loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The store has no file to write to
    #[error("Configuration has no file path")]
    NoPath,
}
