use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::assets;

pub const APP_CONFIG_DIR: &str = "Mascot";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const DEFAULT_CHARACTER: &str = "Character.png";
pub const DEFAULT_BACKGROUND_COLOR: &str = "#FFFFFF";
pub const DEFAULT_BORDER_COLOR: &str = "#000000";
pub const DEFAULT_TEXT_COLOR: &str = "#000000";
pub const DEFAULT_SCREEN_MARGIN: i32 = 20;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("user configuration directory is not available")]
    NoConfigDir,
    #[error("failed to write settings to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Screen corner used for startup placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl Corner {
    /// Name stored in the settings file and shown in the editor.
    pub fn label(self) -> &'static str {
        match self {
            Corner::TopLeft => "左上",
            Corner::TopRight => "右上",
            Corner::BottomLeft => "左下",
            Corner::BottomRight => "右下",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "左上" | "top-left" | "topleft" => Some(Corner::TopLeft),
            "右上" | "top-right" | "topright" => Some(Corner::TopRight),
            "左下" | "bottom-left" | "bottomleft" => Some(Corner::BottomLeft),
            "右下" | "bottom-right" | "bottomright" => Some(Corner::BottomRight),
            _ => None,
        }
    }
}

impl From<String> for Corner {
    fn from(value: String) -> Self {
        Corner::parse(&value).unwrap_or_else(|| {
            warn!(
                value = value.as_str(),
                "unknown startup position; using bottom-right"
            );
            Corner::default()
        })
    }
}

impl From<Corner> for String {
    fn from(value: Corner) -> Self {
        value.label().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::opaque(0xFF, 0xFF, 0xFF);
    pub const BLACK: Rgba = Rgba::opaque(0x00, 0x00, 0x00);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    /// Parses `#RRGGBB` or `#AARRGGBB`; the `#` is optional.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return None;
        }
        let channel = |index: usize| u8::from_str_radix(&hex[index..index + 2], 16).ok();

        match hex.len() {
            6 => Some(Rgba::opaque(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Rgba {
                a: channel(0)?,
                r: channel(2)?,
                g: channel(4)?,
                b: channel(6)?,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 0xFF {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "#{:02X}{:02X}{:02X}{:02X}",
                self.a, self.r, self.g, self.b
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    pub character_image_file_name: String,
    pub available_characters: Vec<String>,
    pub speech_bubble_background_color: String,
    pub speech_bubble_border_color: String,
    pub speech_bubble_text_color: String,
    #[serde(rename = "StartupPosition")]
    pub startup_corner: Corner,
    pub screen_margin: i32,
    pub has_changes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            character_image_file_name: DEFAULT_CHARACTER.to_string(),
            available_characters: vec![DEFAULT_CHARACTER.to_string()],
            speech_bubble_background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            speech_bubble_border_color: DEFAULT_BORDER_COLOR.to_string(),
            speech_bubble_text_color: DEFAULT_TEXT_COLOR.to_string(),
            startup_corner: Corner::default(),
            screen_margin: DEFAULT_SCREEN_MARGIN,
            has_changes: false,
        }
    }
}

impl Settings {
    pub fn background_color(&self) -> Rgba {
        Rgba::parse_hex(&self.speech_bubble_background_color).unwrap_or(Rgba::WHITE)
    }

    pub fn border_color(&self) -> Rgba {
        Rgba::parse_hex(&self.speech_bubble_border_color).unwrap_or(Rgba::BLACK)
    }

    pub fn text_color(&self) -> Rgba {
        Rgba::parse_hex(&self.speech_bubble_text_color).unwrap_or(Rgba::BLACK)
    }

    pub fn margin(&self) -> u32 {
        self.screen_margin.max(0) as u32
    }
}

fn normalize_loaded_settings(mut settings: Settings) -> Settings {
    if settings.character_image_file_name.trim().is_empty() {
        settings.character_image_file_name = DEFAULT_CHARACTER.to_string();
    }
    if settings.available_characters.is_empty() {
        settings.available_characters = vec![DEFAULT_CHARACTER.to_string()];
    }
    if settings.screen_margin < 0 {
        warn!(
            margin = settings.screen_margin,
            "loaded screen margin is negative; resetting to 0"
        );
        settings.screen_margin = 0;
    }
    for (role, value) in [
        ("background", &settings.speech_bubble_background_color),
        ("border", &settings.speech_bubble_border_color),
        ("text", &settings.speech_bubble_text_color),
    ] {
        if Rgba::parse_hex(value).is_none() {
            warn!(
                role,
                value = value.as_str(),
                "invalid bubble color; default will be used"
            );
        }
    }
    settings.has_changes = false;
    settings
}

/// Returns `<config dir>/Mascot/settings.json` for the current user.
pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_CONFIG_DIR).join(SETTINGS_FILE_NAME))
        .ok_or(SettingsError::NoConfigDir)
}

/// Persisted user settings. Created explicitly and handed to whoever needs it.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    resources_dir: PathBuf,
    current: Settings,
}

impl SettingsStore {
    /// Loads settings from `path`. Missing or malformed files yield defaults.
    pub fn open(path: impl Into<PathBuf>, resources_dir: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = read_settings(&path);
        Self {
            path,
            resources_dir: resources_dir.into(),
            current,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn resources_dir(&self) -> &Path {
        &self.resources_dir
    }

    pub fn current(&self) -> &Settings {
        &self.current
    }

    pub fn save(&mut self, settings: Settings) -> Result<(), SettingsError> {
        write_settings(&self.path, &settings)?;
        info!(path = %self.path.display(), "settings saved");
        self.current = settings;
        Ok(())
    }

    pub fn scan_available_characters(&self) -> Vec<String> {
        assets::scan_characters(&self.resources_dir)
    }

    /// Working copy for the settings editor.
    pub fn begin_edit(&self) -> Settings {
        let mut draft = self.current.clone();
        draft.available_characters = self.scan_available_characters();
        if !draft
            .available_characters
            .contains(&draft.character_image_file_name)
        {
            if let Some(first) = draft.available_characters.first() {
                draft.character_image_file_name = first.clone();
            }
        }
        draft.has_changes = false;
        draft
    }

    /// Saves an edited draft and makes it current.
    pub fn commit(&mut self, draft: Settings) -> Result<Settings, SettingsError> {
        let mut settings = normalize_loaded_settings(draft);
        settings.has_changes = false;
        self.save(settings.clone())?;
        Ok(settings)
    }
}

fn read_settings(path: &Path) -> Settings {
    if !path.exists() {
        info!(path = %path.display(), "no settings file; using defaults");
        return Settings::default();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), "failed to read settings; using defaults: {err}");
            return Settings::default();
        }
    };

    match serde_json::from_str::<Settings>(&content) {
        Ok(settings) => {
            info!(path = %path.display(), "settings loaded");
            normalize_loaded_settings(settings)
        }
        Err(err) => {
            warn!(path = %path.display(), "malformed settings file; using defaults: {err}");
            Settings::default()
        }
    }
}

fn write_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let io_error = |source: std::io::Error| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let serialized = serde_json::to_string_pretty(settings)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, serialized).map_err(io_error)?;
    fs::rename(&staging, path).map_err(io_error)
}
