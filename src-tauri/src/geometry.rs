use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::settings::Corner;

pub const WINDOW_WIDTH: f64 = 300.0;
pub const BUBBLE_AREA_HEIGHT: f64 = 80.0;
pub const INPUT_AREA_HEIGHT: f64 = 50.0;
pub const SIZE_RESTORE_TOLERANCE: f64 = 3.0;
const FALLBACK_ASPECT_RATIO: f64 = 1.0;

/// Pointer position in screen logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Window position in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn within_tolerance(&self, other: &Size, tolerance: f64) -> bool {
        (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}

/// Usable area of a screen, excluding task bars and docks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkArea {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WorkArea {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        f64::from(self.x) + f64::from(self.width)
    }

    pub fn bottom(&self) -> f64 {
        f64::from(self.y) + f64::from(self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DragState {
    #[default]
    Idle,
    Dragging,
}

#[derive(Debug, Clone, Copy)]
struct DragSession {
    last_pointer: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowGeometry {
    pub position: PixelPoint,
    pub size: Size,
    initial_size: Size,
}

impl WindowGeometry {
    pub fn initial_size(&self) -> Size {
        self.initial_size
    }
}

/// Computes the restore target for a character image of the given pixel
/// dimensions. `None` (missing or unreadable image) falls back to a square.
pub fn initial_size_for_image(dimensions: Option<(u32, u32)>) -> Size {
    let aspect_ratio = match dimensions {
        Some((width, height)) if width > 0 && height > 0 => f64::from(height) / f64::from(width),
        _ => FALLBACK_ASPECT_RATIO,
    };
    Size::new(
        WINDOW_WIDTH,
        WINDOW_WIDTH * aspect_ratio + BUBBLE_AREA_HEIGHT + INPUT_AREA_HEIGHT,
    )
}

/// Owns the window geometry and the drag session.
#[derive(Debug)]
pub struct GeometryController {
    geometry: WindowGeometry,
    image_top_margin: f64,
    drag: Option<DragSession>,
}

impl GeometryController {
    pub fn new(initial_size: Size) -> Self {
        Self {
            geometry: WindowGeometry {
                position: PixelPoint::default(),
                size: initial_size,
                initial_size,
            },
            image_top_margin: 0.0,
            drag: None,
        }
    }

    pub fn geometry(&self) -> &WindowGeometry {
        &self.geometry
    }

    pub fn position(&self) -> PixelPoint {
        self.geometry.position
    }

    pub fn size(&self) -> Size {
        self.geometry.size
    }

    pub fn image_top_margin(&self) -> f64 {
        self.image_top_margin
    }

    pub fn is_resting_layout(&self) -> bool {
        self.image_top_margin == 0.0
    }

    pub fn drag_state(&self) -> DragState {
        if self.drag.is_some() {
            DragState::Dragging
        } else {
            DragState::Idle
        }
    }

    /// Resizes the live window, e.g. when the toolkit reports a size change.
    pub fn set_size(&mut self, size: Size) {
        self.geometry.size = size;
    }

    /// Moves to `Idle` and forgets any half-finished press sequence.
    pub fn reset(&mut self) {
        self.drag = None;
    }

    pub fn begin_drag(&mut self, pointer: Point) {
        self.drag = Some(DragSession {
            last_pointer: pointer,
        });
        debug!(x = pointer.x, y = pointer.y, "drag started");
    }

    /// Applies a pointer move. Returns the new window position while dragging.
    ///
    /// The pointer is in screen coordinates and the delta is taken against
    /// the previous pointer sample, so it does not depend on when the window
    /// move lands. Each axis is truncated toward zero before it is added,
    /// which can drift by up to a pixel per step on fractional-scale displays.
    pub fn update_drag(&mut self, pointer: Point) -> Option<PixelPoint> {
        let session = self.drag.as_mut()?;
        let delta_x = pointer.x - session.last_pointer.x;
        let delta_y = pointer.y - session.last_pointer.y;
        session.last_pointer = pointer;
        self.geometry.position = PixelPoint::new(
            self.geometry.position.x + delta_x as i32,
            self.geometry.position.y + delta_y as i32,
        );
        Some(self.geometry.position)
    }

    pub fn end_drag(&mut self) {
        if self.drag.take().is_some() {
            debug!(
                x = self.geometry.position.x,
                y = self.geometry.position.y,
                "drag finished"
            );
        }
    }

    /// Routes a button release. Only the left button ends a drag.
    pub fn release(&mut self, button: PointerButton) {
        if button == PointerButton::Left {
            self.end_drag();
        }
    }

    /// Places the window at a corner of the work area. Without a screen the
    /// position is left unchanged and `None` is returned.
    pub fn position_at_corner(
        &mut self,
        corner: Corner,
        margin: u32,
        screen: Option<WorkArea>,
    ) -> Option<PixelPoint> {
        let area = screen?;
        let margin = f64::from(margin);
        let size = self.geometry.size;

        let left = f64::from(area.x) + margin;
        let top = f64::from(area.y) + margin;
        let right = area.right() - size.width - margin;
        let bottom = area.bottom() - size.height - margin;

        let (x, y) = match corner {
            Corner::TopLeft => (left, top),
            Corner::TopRight => (right, top),
            Corner::BottomLeft => (left, bottom),
            Corner::BottomRight => (right, bottom),
        };
        self.geometry.position = PixelPoint::new(x as i32, y as i32);
        info!(
            corner = corner.label(),
            x = self.geometry.position.x,
            y = self.geometry.position.y,
            "window placed at startup corner"
        );
        Some(self.geometry.position)
    }

    /// Snaps the size back to the initial size when it drifted further than
    /// `tolerance` on either axis, and puts the image back in its resting
    /// layout. Returns whether the size changed.
    pub fn restore_initial_size(&mut self, tolerance: f64) -> bool {
        self.image_top_margin = 0.0;
        let initial = self.geometry.initial_size;
        if self.geometry.size.within_tolerance(&initial, tolerance) {
            return false;
        }

        debug!(
            width = self.geometry.size.width,
            height = self.geometry.size.height,
            "restoring initial window size"
        );
        self.geometry.size = initial;
        true
    }

    /// Pushes the character image down so the bubble overlays the top of the
    /// window. The window size is untouched.
    pub fn grow_for_bubble(&mut self, bubble_height: f64) {
        self.image_top_margin = bubble_height;
    }
}
