use serde::Serialize;
use tracing::debug;

use crate::geometry::{BUBBLE_AREA_HEIGHT, GeometryController, SIZE_RESTORE_TOLERANCE};
use crate::settings::{Rgba, Settings};
use crate::utils::preview_for_log;

pub const BUBBLE_HEIGHT: f64 = BUBBLE_AREA_HEIGHT;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechBubbleState {
    pub visible: bool,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleStyle {
    pub background: Rgba,
    pub border: Rgba,
    pub text: Rgba,
}

impl BubbleStyle {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            background: settings.background_color(),
            border: settings.border_color(),
            text: settings.text_color(),
        }
    }
}

impl Default for BubbleStyle {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Bubble visibility and text. Every transition also fixes up the layout it
/// is paired with, so callers never observe a half-applied state.
#[derive(Debug, Default)]
pub struct SpeechState {
    bubble: SpeechBubbleState,
}

impl SpeechState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bubble(&self) -> &SpeechBubbleState {
        &self.bubble
    }

    pub fn is_visible(&self) -> bool {
        self.bubble.visible
    }

    pub fn text(&self) -> &str {
        &self.bubble.text
    }

    /// Shows `text`, replacing whatever the bubble held before.
    pub fn show(&mut self, text: impl Into<String>, geometry: &mut GeometryController) {
        self.bubble.text = text.into();
        self.bubble.visible = true;
        geometry.grow_for_bubble(BUBBLE_HEIGHT);
        debug!(text = %preview_for_log(&self.bubble.text, 40), "bubble shown");
    }

    pub fn dismiss(&mut self, geometry: &mut GeometryController) {
        if self.bubble.visible {
            debug!("bubble dismissed");
        }
        self.bubble.visible = false;
        self.bubble.text.clear();
        geometry.restore_initial_size(SIZE_RESTORE_TOLERANCE);
    }
}

/// Speech state borrowed together with the geometry it drives.
pub struct SpeechSurface<'a> {
    speech: &'a mut SpeechState,
    geometry: &'a mut GeometryController,
}

impl<'a> SpeechSurface<'a> {
    pub fn new(speech: &'a mut SpeechState, geometry: &'a mut GeometryController) -> Self {
        Self { speech, geometry }
    }

    pub fn show(&mut self, text: impl Into<String>) {
        self.speech.show(text, self.geometry);
    }

    pub fn dismiss(&mut self) {
        self.speech.dismiss(self.geometry);
    }

    pub fn text(&self) -> &str {
        self.speech.text()
    }
}
