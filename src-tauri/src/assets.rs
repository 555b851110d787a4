use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::geometry::{Size, initial_size_for_image};
use crate::settings::DEFAULT_CHARACTER;

pub const RESOURCES_DIR_NAME: &str = "Resources";

/// `<current dir>/Resources`, where character images are looked up.
pub fn default_resources_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(RESOURCES_DIR_NAME)
}

/// Lists the PNG character images in `resources_dir`, sorted by file name.
/// Never empty: falls back to the default character.
pub fn scan_characters(resources_dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(resources_dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(
                dir = %resources_dir.display(),
                "failed to scan character images: {err}"
            );
            return vec![DEFAULT_CHARACTER.to_string()];
        }
    };

    let mut characters = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_png_extension(path))
        .filter_map(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .collect::<Vec<_>>();
    characters.sort();

    if characters.is_empty() {
        characters.push(DEFAULT_CHARACTER.to_string());
    }
    characters
}

fn has_png_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

/// A character image and what the window needs to know about it.
#[derive(Debug, Clone)]
pub struct CharacterAsset {
    pub path: PathBuf,
    pub dimensions: Option<(u32, u32)>,
}

impl CharacterAsset {
    /// Looks up `file_name` under `resources_dir`. A missing or unreadable
    /// image is logged and leaves `dimensions` empty.
    pub fn locate(resources_dir: &Path, file_name: &str) -> Self {
        let path = resources_dir.join(file_name);
        if !path.is_file() {
            warn!(path = %path.display(), "character image not found; using no-image layout");
            return Self {
                path,
                dimensions: None,
            };
        }

        match image::image_dimensions(&path) {
            Ok((width, height)) => {
                info!(path = %path.display(), width, height, "character image loaded");
                Self {
                    path,
                    dimensions: Some((width, height)),
                }
            }
            Err(err) => {
                warn!(path = %path.display(), "failed to read character image: {err}");
                Self {
                    path,
                    dimensions: None,
                }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.dimensions.is_some()
    }

    pub fn initial_window_size(&self) -> Size {
        initial_size_for_image(self.dimensions)
    }
}
