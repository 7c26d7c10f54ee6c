//! Shared numeric constants for the canvas crate.

// ── Camera ──────────────────────────────────────────────────────

/// Smallest zoom factor the camera accepts.
pub const ZOOM_MIN: f64 = 0.1;

/// Largest zoom factor the camera accepts.
pub const ZOOM_MAX: f64 = 5.0;

/// Multiplier applied by one zoom-in step (divisor for zoom-out).
pub const ZOOM_STEP: f64 = 1.2;

/// Grid pitch in board units, used by the dot grid and snap-to-grid.
pub const GRID_SIZE: f64 = 24.0;

// ── Notes ───────────────────────────────────────────────────────

/// Fallback width for cards and stickies with no explicit or measured size.
pub const NOTE_DEFAULT_WIDTH: f64 = 320.0;

/// Fallback height for cards and stickies with no explicit or measured size.
pub const NOTE_DEFAULT_HEIGHT: f64 = 200.0;

/// Fallback width for borderless text notes.
pub const TEXT_DEFAULT_WIDTH: f64 = 200.0;

/// Fallback height for borderless text notes.
pub const TEXT_DEFAULT_HEIGHT: f64 = 50.0;

/// Minimum width a note can be resized to.
pub const NOTE_MIN_WIDTH: f64 = 200.0;

/// Minimum height a note can be resized to.
pub const NOTE_MIN_HEIGHT: f64 = 150.0;

/// Offset applied to both axes when duplicating a note.
pub const DUPLICATE_OFFSET: f64 = 20.0;

/// Side length of the bottom-right resize grip, in board units.
pub const RESIZE_GRIP_SIZE: f64 = 16.0;

/// Body text of a freshly placed text note.
pub const TEXT_PLACEHOLDER: &str = "Type here...";

// ── Connectors and strokes ──────────────────────────────────────

/// Default connector color.
pub const DEFAULT_CONNECTOR_COLOR: &str = "#6b7280";

/// Default connector stroke width.
pub const DEFAULT_CONNECTOR_WIDTH: f64 = 2.0;

/// Default pen color.
pub const DEFAULT_STROKE_COLOR: &str = "#ef4444";

/// Default pen width.
pub const DEFAULT_STROKE_WIDTH: f64 = 3.0;

// ── Hit-testing ─────────────────────────────────────────────────

/// Screen-space hit slop in pixels for handles and thin geometry.
pub const HANDLE_RADIUS_PX: f64 = 8.0;

/// Horizontal control-point offset for curved connectors, in board units.
pub const CURVE_CONTROL_OFFSET: f64 = 50.0;

/// Number of segments used to approximate a curved connector when hit-testing.
pub const CURVE_SAMPLES: usize = 24;

// ── History ─────────────────────────────────────────────────────

/// Default number of undo steps retained before the oldest is evicted.
pub const HISTORY_DEPTH: usize = 50;
