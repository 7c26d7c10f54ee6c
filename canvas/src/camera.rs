//! Pan/zoom view state and screen/board coordinate conversions.

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

use crate::consts::{GRID_SIZE, ZOOM_MAX, ZOOM_MIN, ZOOM_STEP};

/// A point in either screen or board space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Bounds and step for zooming.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self { min: ZOOM_MIN, max: ZOOM_MAX, step: ZOOM_STEP }
    }
}

impl ZoomLimits {
    /// Clamp a zoom factor into `[min, max]`.
    #[must_use]
    pub fn clamp(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min, self.max)
    }
}

/// Per-board camera and grid settings. Persisted with the board row.
///
/// `x` / `y` are the pan offset in screen pixels; `zoom` is a scale factor
/// (1.0 = no zoom). The serialized shape is `{x, y, zoom, showGrid, snapToGrid}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
    #[serde(default = "default_show_grid")]
    pub show_grid: bool,
    #[serde(default)]
    pub snap_to_grid: bool,
}

fn default_show_grid() -> bool {
    true
}

impl Default for ViewState {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, zoom: 1.0, show_grid: true, snap_to_grid: false }
    }
}

impl ViewState {
    /// Convert a screen-space point to board coordinates.
    #[must_use]
    pub fn screen_to_board(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.x) / self.zoom,
            y: (screen.y - self.y) / self.zoom,
        }
    }

    /// Convert a board-space point to screen coordinates.
    #[must_use]
    pub fn board_to_screen(&self, board: Point) -> Point {
        Point {
            x: board.x * self.zoom + self.x,
            y: board.y * self.zoom + self.y,
        }
    }

    /// Convert a screen-space distance to a board-space distance.
    #[must_use]
    pub fn screen_dist_to_board(&self, screen_dist: f64) -> f64 {
        screen_dist / self.zoom
    }

    /// Shift the pan offset by a raw screen delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Multiply zoom by one step, clamped to the limits.
    pub fn zoom_in(&mut self, limits: &ZoomLimits) {
        self.zoom = limits.clamp(self.zoom * limits.step);
    }

    /// Divide zoom by one step, clamped to the limits.
    pub fn zoom_out(&mut self, limits: &ZoomLimits) {
        self.zoom = limits.clamp(self.zoom / limits.step);
    }

    /// Round a board-space point to the grid when snap-to-grid is on.
    #[must_use]
    pub fn snap(&self, pt: Point) -> Point {
        if !self.snap_to_grid {
            return pt;
        }
        Point {
            x: (pt.x / GRID_SIZE).round() * GRID_SIZE,
            y: (pt.y / GRID_SIZE).round() * GRID_SIZE,
        }
    }
}
