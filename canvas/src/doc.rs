//! Document model: notes, connectors, strokes, categories, and the in-memory store.
//!
//! This module defines the entity types that describe what is on the board
//! (`Note`, `Connector`, `Stroke`, `Category`), sparse-update types for
//! field-level edits (`NotePatch`, `ConnectorPatch`), the whole-board value
//! used by history (`BoardSnapshot`), and the runtime store that owns all
//! live entities (`DocStore`).
//!
//! Z-order is the position of a note in `DocStore::notes`; later notes draw
//! on top. Connectors and strokes keep insertion order.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::camera::{Point, ViewState};
use crate::consts::{
    DEFAULT_CONNECTOR_COLOR, DEFAULT_CONNECTOR_WIDTH, DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH,
    NOTE_DEFAULT_HEIGHT, NOTE_DEFAULT_WIDTH, TEXT_DEFAULT_HEIGHT, TEXT_DEFAULT_WIDTH,
};

/// Unique identifier for a note.
pub type NoteId = Uuid;
/// Unique identifier for a connector.
pub type ConnectorId = Uuid;
/// Unique identifier for a freehand stroke.
pub type StrokeId = Uuid;
/// Unique identifier for a board.
pub type BoardId = Uuid;
/// Unique identifier for a user.
pub type UserId = Uuid;

// =============================================================================
// NOTE
// =============================================================================

/// Visual treatment of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    /// Bordered card with a colored header strip.
    #[default]
    Card,
    /// Fully colored sticky note.
    Sticky,
    /// Borderless, transparent text.
    Text,
}

/// Color tag of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteColor {
    #[default]
    Blue,
    Green,
    Yellow,
    Purple,
    Gray,
}

/// A movable note on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Left edge in board coordinates.
    pub x: f64,
    /// Top edge in board coordinates.
    pub y: f64,
    pub title: String,
    /// Body text.
    pub content: String,
    #[serde(rename = "type")]
    pub kind: NoteKind,
    pub color: NoteColor,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Explicit width; `None` lets the renderer pick a natural size.
    #[serde(default)]
    pub width: Option<f64>,
    /// Explicit height; `None` lets the renderer pick a natural size.
    #[serde(default)]
    pub height: Option<f64>,
    /// Collaborator avatar URLs or initials. Not persisted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collaborators: Vec<String>,
}

impl Note {
    /// A note of the given kind at a board position with a fresh id.
    #[must_use]
    pub fn new(kind: NoteKind, x: f64, y: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            x,
            y,
            title: String::new(),
            content: String::new(),
            kind,
            color: NoteColor::default(),
            tags: Vec::new(),
            image_url: None,
            width: None,
            height: None,
            collaborators: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: NoteColor) -> Self {
        self.color = color;
        self
    }

    /// Whether the note passes the search box and category facet.
    ///
    /// An empty query matches everything; otherwise the query must appear
    /// (case-insensitively) in the title, content, or any tag. An active
    /// category must be one of the note's tags.
    #[must_use]
    pub fn matches_filter(&self, query: &str, active_category: Option<&str>) -> bool {
        let needle = query.to_lowercase();
        let matches_search = needle.is_empty()
            || self.title.to_lowercase().contains(&needle)
            || self.content.to_lowercase().contains(&needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&needle));
        let matches_category = active_category.is_none_or(|cat| self.tags.iter().any(|t| t == cat));
        matches_search && matches_category
    }
}

/// Sparse update for a note. Only present fields are applied and sent.
///
/// Nullable columns use `Option<Option<T>>`: `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<NoteKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<NoteColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<Option<f64>>,
}

impl NotePatch {
    /// Patch that moves a note to an absolute position.
    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Default::default() }
    }

    /// Patch that sets an explicit size.
    #[must_use]
    pub fn size(width: f64, height: f64) -> Self {
        Self { width: Some(Some(width)), height: Some(Some(height)), ..Default::default() }
    }

    /// Patch that replaces title and body text.
    #[must_use]
    pub fn text(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self { title: Some(title.into()), content: Some(content.into()), ..Default::default() }
    }

    /// Patch that recolors a note.
    #[must_use]
    pub fn color(color: NoteColor) -> Self {
        Self { color: Some(color), ..Default::default() }
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the present fields to a note.
    pub fn apply(&self, note: &mut Note) {
        if let Some(x) = self.x {
            note.x = x;
        }
        if let Some(y) = self.y {
            note.y = y;
        }
        if let Some(ref title) = self.title {
            note.title.clone_from(title);
        }
        if let Some(ref content) = self.content {
            note.content.clone_from(content);
        }
        if let Some(kind) = self.kind {
            note.kind = kind;
        }
        if let Some(color) = self.color {
            note.color = color;
        }
        if let Some(ref tags) = self.tags {
            note.tags.clone_from(tags);
        }
        if let Some(ref url) = self.image_url {
            note.image_url.clone_from(url);
        }
        if let Some(w) = self.width {
            note.width = w;
        }
        if let Some(h) = self.height {
            note.height = h;
        }
    }
}

// =============================================================================
// CONNECTOR
// =============================================================================

/// Side of a note a connector attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// Path style of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStyle {
    /// Cubic curve leaving each side horizontally.
    #[default]
    Curve,
    /// Straight segment.
    Straight,
    /// Orthogonal elbow through the horizontal midpoint.
    Step,
}

/// A directed link between two notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub from_id: NoteId,
    pub to_id: NoteId,
    #[serde(default)]
    pub source_handle: Option<Side>,
    #[serde(default)]
    pub target_handle: Option<Side>,
    #[serde(rename = "type", default)]
    pub style: ConnectorStyle,
    pub color: String,
    pub stroke_width: f64,
}

impl Connector {
    /// A default-styled connector between two note sides.
    #[must_use]
    pub fn new(from_id: NoteId, source: Side, to_id: NoteId, target: Side) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_id,
            to_id,
            source_handle: Some(source),
            target_handle: Some(target),
            style: ConnectorStyle::default(),
            color: DEFAULT_CONNECTOR_COLOR.to_owned(),
            stroke_width: DEFAULT_CONNECTOR_WIDTH,
        }
    }

    /// Whether either endpoint is the given note.
    #[must_use]
    pub fn touches(&self, note_id: &NoteId) -> bool {
        self.from_id == *note_id || self.to_id == *note_id
    }
}

/// Sparse update for a connector's presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectorPatch {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub style: Option<ConnectorStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

impl ConnectorPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, conn: &mut Connector) {
        if let Some(style) = self.style {
            conn.style = style;
        }
        if let Some(ref color) = self.color {
            conn.color.clone_from(color);
        }
        if let Some(w) = self.stroke_width {
            conn.stroke_width = w;
        }
    }
}

// =============================================================================
// STROKE / CATEGORY
// =============================================================================

/// A freehand pen stroke. Immutable once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub points: Vec<Point>,
    pub color: String,
    pub stroke_width: f64,
}

impl Stroke {
    /// A default-styled stroke through the given points.
    #[must_use]
    pub fn new(points: Vec<Point>) -> Self {
        Self {
            id: Uuid::new_v4(),
            points,
            color: DEFAULT_STROKE_COLOR.to_owned(),
            stroke_width: DEFAULT_STROKE_WIDTH,
        }
    }
}

/// A tag name with a display color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub color: String,
}

impl Category {
    #[must_use]
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self { name: name.into(), color: color.into() }
    }
}

fn default_categories() -> Vec<Category> {
    vec![
        Category::new("Strategy", "#3b82f6"),
        Category::new("Ideas", "#22c55e"),
        Category::new("Research", "#eab308"),
    ]
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Whole-board entity state. The unit of undo/redo and diffing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub notes: Vec<Note>,
    pub connectors: Vec<Connector>,
    #[serde(default)]
    pub strokes: Vec<Stroke>,
}

/// Width and height of a note in board units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

// =============================================================================
// STORE
// =============================================================================

/// In-memory store of everything on one board.
#[derive(Debug, Clone)]
pub struct DocStore {
    notes: Vec<Note>,
    connectors: Vec<Connector>,
    strokes: Vec<Stroke>,
    categories: Vec<Category>,
    measured: HashMap<NoteId, Size>,
    /// Camera and grid settings.
    pub view: ViewState,
    /// Current search box text.
    pub search_query: String,
    /// Category facet; `None` shows every note.
    pub active_category: Option<String>,
}

impl Default for DocStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocStore {
    /// Create an empty store with the default category vocabulary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            notes: Vec::new(),
            connectors: Vec::new(),
            strokes: Vec::new(),
            categories: default_categories(),
            measured: HashMap::new(),
            view: ViewState::default(),
            search_query: String::new(),
            active_category: None,
        }
    }

    // --- Queries ---

    /// Notes in z-order, bottom first.
    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[must_use]
    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    #[must_use]
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    #[must_use]
    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == *id)
    }

    #[must_use]
    pub fn connector(&self, id: &ConnectorId) -> Option<&Connector> {
        self.connectors.iter().find(|c| c.id == *id)
    }

    #[must_use]
    pub fn stroke(&self, id: &StrokeId) -> Option<&Stroke> {
        self.strokes.iter().find(|s| s.id == *id)
    }

    /// Whether any entity kind holds this id.
    #[must_use]
    pub fn contains(&self, id: &Uuid) -> bool {
        self.note(id).is_some() || self.connector(id).is_some() || self.stroke(id).is_some()
    }

    /// True when the board holds no notes, connectors, or strokes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.connectors.is_empty() && self.strokes.is_empty()
    }

    /// Size used for hit-testing: explicit, then measured, then a per-kind fallback.
    #[must_use]
    pub fn note_size(&self, note: &Note) -> Size {
        let measured = self.measured.get(&note.id);
        let (fallback_w, fallback_h) = match note.kind {
            NoteKind::Text => (TEXT_DEFAULT_WIDTH, TEXT_DEFAULT_HEIGHT),
            NoteKind::Card | NoteKind::Sticky => (NOTE_DEFAULT_WIDTH, NOTE_DEFAULT_HEIGHT),
        };
        Size {
            width: note.width.or(measured.map(|s| s.width)).unwrap_or(fallback_w),
            height: note.height.or(measured.map(|s| s.height)).unwrap_or(fallback_h),
        }
    }

    /// Whether a note passes the current search and category filter.
    #[must_use]
    pub fn note_matches_filter(&self, note: &Note) -> bool {
        note.matches_filter(&self.search_query, self.active_category.as_deref())
    }

    // --- Notes ---

    /// Append a note on top. Returns false if the id is already present.
    pub fn push_note(&mut self, note: Note) -> bool {
        if self.note(&note.id).is_some() {
            return false;
        }
        self.notes.push(note);
        true
    }

    /// Apply a partial update. Returns false if the note doesn't exist.
    pub fn apply_note_patch(&mut self, id: &NoteId, patch: &NotePatch) -> bool {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == *id) else {
            return false;
        };
        patch.apply(note);
        true
    }

    /// Mutable access for field merges from the change feed.
    pub(crate) fn note_mut(&mut self, id: &NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id == *id)
    }

    /// Shift a set of notes by a board-space delta. Unknown ids are skipped.
    pub fn translate_notes(&mut self, ids: &[NoteId], dx: f64, dy: f64) {
        for note in self.notes.iter_mut().filter(|n| ids.contains(&n.id)) {
            note.x += dx;
            note.y += dy;
        }
    }

    /// Remove a note and every connector touching it.
    pub fn remove_note(&mut self, id: &NoteId) -> Option<(Note, Vec<Connector>)> {
        let idx = self.notes.iter().position(|n| n.id == *id)?;
        let note = self.notes.remove(idx);
        let orphans = self.remove_connectors_touching(id);
        self.measured.remove(id);
        Some((note, orphans))
    }

    /// Move a note to the top of the z-order. Returns false if nothing changed.
    pub fn raise_note(&mut self, id: &NoteId) -> bool {
        let Some(idx) = self.notes.iter().position(|n| n.id == *id) else {
            return false;
        };
        if idx + 1 == self.notes.len() {
            return false;
        }
        let note = self.notes.remove(idx);
        self.notes.push(note);
        true
    }

    /// Move a note to the bottom of the z-order. Returns false if nothing changed.
    pub fn lower_note(&mut self, id: &NoteId) -> bool {
        let Some(idx) = self.notes.iter().position(|n| n.id == *id) else {
            return false;
        };
        if idx == 0 {
            return false;
        }
        let note = self.notes.remove(idx);
        self.notes.insert(0, note);
        true
    }

    /// Record the renderer's natural size for a note. Not persisted.
    pub fn set_measured_size(&mut self, id: NoteId, size: Size) {
        self.measured.insert(id, size);
    }

    // --- Connectors ---

    /// Append a connector. Rejects duplicates, self-loops, and missing endpoints.
    pub fn push_connector(&mut self, conn: Connector) -> bool {
        if conn.from_id == conn.to_id
            || self.note(&conn.from_id).is_none()
            || self.note(&conn.to_id).is_none()
            || self.connector(&conn.id).is_some()
        {
            return false;
        }
        self.connectors.push(conn);
        true
    }

    pub fn apply_connector_patch(&mut self, id: &ConnectorId, patch: &ConnectorPatch) -> bool {
        let Some(conn) = self.connectors.iter_mut().find(|c| c.id == *id) else {
            return false;
        };
        patch.apply(conn);
        true
    }

    pub fn remove_connector(&mut self, id: &ConnectorId) -> Option<Connector> {
        let idx = self.connectors.iter().position(|c| c.id == *id)?;
        Some(self.connectors.remove(idx))
    }

    /// Remove and return every connector with an endpoint on `note_id`.
    pub fn remove_connectors_touching(&mut self, note_id: &NoteId) -> Vec<Connector> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.connectors).into_iter().partition(|c| c.touches(note_id));
        self.connectors = kept;
        removed
    }

    /// Mutable access for field merges from the change feed.
    pub(crate) fn connector_mut(&mut self, id: &ConnectorId) -> Option<&mut Connector> {
        self.connectors.iter_mut().find(|c| c.id == *id)
    }

    // --- Strokes ---

    /// Append a stroke. Rejects empty strokes and duplicate ids.
    pub fn push_stroke(&mut self, stroke: Stroke) -> bool {
        if stroke.points.is_empty() || self.stroke(&stroke.id).is_some() {
            return false;
        }
        self.strokes.push(stroke);
        true
    }

    pub fn remove_stroke(&mut self, id: &StrokeId) -> Option<Stroke> {
        let idx = self.strokes.iter().position(|s| s.id == *id)?;
        Some(self.strokes.remove(idx))
    }

    pub(crate) fn stroke_mut(&mut self, id: &StrokeId) -> Option<&mut Stroke> {
        self.strokes.iter_mut().find(|s| s.id == *id)
    }

    // --- Categories ---

    /// Add a category. Returns false if the name is taken.
    pub fn add_category(&mut self, category: Category) -> bool {
        if self.categories.iter().any(|c| c.name == category.name) {
            return false;
        }
        self.categories.push(category);
        true
    }

    /// Remove a category by name. Notes keep the tag text.
    pub fn remove_category(&mut self, name: &str) -> bool {
        let before = self.categories.len();
        self.categories.retain(|c| c.name != name);
        self.categories.len() != before
    }

    pub fn set_category_color(&mut self, name: &str, color: impl Into<String>) -> bool {
        let Some(cat) = self.categories.iter_mut().find(|c| c.name == name) else {
            return false;
        };
        cat.color = color.into();
        true
    }

    // --- Snapshots ---

    /// Copy of the entity state.
    #[must_use]
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            notes: self.notes.clone(),
            connectors: self.connectors.clone(),
            strokes: self.strokes.clone(),
        }
    }

    /// Replace all entities with a snapshot. Measured sizes of vanished notes are dropped.
    pub fn restore(&mut self, snapshot: BoardSnapshot) {
        let live: HashSet<NoteId> = snapshot.notes.iter().map(|n| n.id).collect();
        self.measured.retain(|id, _| live.contains(id));
        self.notes = snapshot.notes;
        self.connectors = snapshot.connectors;
        self.strokes = snapshot.strokes;
    }
}
