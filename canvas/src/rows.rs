//! Wire rows for the remote store and the operations and events that carry them.
//!
//! Rows are the persisted shape of each entity: column names in snake_case,
//! the discriminant column named `type`, and every row tagged with its
//! `board_id`. Field-level updates travel as [`Fields`], a JSON object keyed
//! by column name.

#[cfg(test)]
#[path = "rows_test.rs"]
mod rows_test;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::camera::{Point, ViewState};
use crate::doc::{
    BoardId, Connector, ConnectorStyle, Note, NoteColor, NoteKind, Side, Stroke, UserId,
};

/// Column name → value map for partial updates and feed records.
pub type Fields = serde_json::Map<String, Value>;

/// Entity tables under a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Notes,
    Connectors,
    Strokes,
}

impl Table {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Connectors => "connectors",
            Self::Strokes => "strokes",
        }
    }
}

// =============================================================================
// ROWS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRow {
    pub id: Uuid,
    pub board_id: BoardId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
    #[serde(default)]
    pub color: NoteColor,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

impl NoteRow {
    #[must_use]
    pub fn from_note(note: &Note, board_id: BoardId) -> Self {
        Self {
            id: note.id,
            board_id,
            x: note.x,
            y: note.y,
            title: note.title.clone(),
            content: note.content.clone(),
            kind: note.kind,
            color: note.color,
            tags: note.tags.clone(),
            image_url: note.image_url.clone(),
            width: note.width,
            height: note.height,
        }
    }

    #[must_use]
    pub fn into_note(self) -> Note {
        Note {
            id: self.id,
            x: self.x,
            y: self.y,
            title: self.title,
            content: self.content,
            kind: self.kind,
            color: self.color,
            tags: self.tags,
            image_url: self.image_url,
            width: self.width,
            height: self.height,
            collaborators: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorRow {
    pub id: Uuid,
    pub board_id: BoardId,
    pub from_id: Uuid,
    pub to_id: Uuid,
    #[serde(default)]
    pub source_handle: Option<Side>,
    #[serde(default)]
    pub target_handle: Option<Side>,
    #[serde(rename = "type", default)]
    pub style: ConnectorStyle,
    pub color: String,
    pub stroke_width: f64,
}

impl ConnectorRow {
    #[must_use]
    pub fn from_connector(conn: &Connector, board_id: BoardId) -> Self {
        Self {
            id: conn.id,
            board_id,
            from_id: conn.from_id,
            to_id: conn.to_id,
            source_handle: conn.source_handle,
            target_handle: conn.target_handle,
            style: conn.style,
            color: conn.color.clone(),
            stroke_width: conn.stroke_width,
        }
    }

    #[must_use]
    pub fn into_connector(self) -> Connector {
        Connector {
            id: self.id,
            from_id: self.from_id,
            to_id: self.to_id,
            source_handle: self.source_handle,
            target_handle: self.target_handle,
            style: self.style,
            color: self.color,
            stroke_width: self.stroke_width,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeRow {
    pub id: Uuid,
    pub board_id: BoardId,
    pub points: Vec<Point>,
    pub color: String,
    pub stroke_width: f64,
}

impl StrokeRow {
    #[must_use]
    pub fn from_stroke(stroke: &Stroke, board_id: BoardId) -> Self {
        Self {
            id: stroke.id,
            board_id,
            points: stroke.points.clone(),
            color: stroke.color.clone(),
            stroke_width: stroke.stroke_width,
        }
    }

    #[must_use]
    pub fn into_stroke(self) -> Stroke {
        Stroke { id: self.id, points: self.points, color: self.color, stroke_width: self.stroke_width }
    }
}

/// Board metadata row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardRow {
    pub id: BoardId,
    pub owner_id: Option<UserId>,
    pub title: String,
    #[serde(default)]
    pub view_state: ViewState,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
    #[serde(default)]
    pub is_public: bool,
}

impl BoardRow {
    /// A fresh private board with a default view.
    #[must_use]
    pub fn new(owner_id: Option<UserId>, title: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: title.into(),
            view_state: ViewState::default(),
            last_modified: now_ms,
            is_public: false,
        }
    }

    /// Whether `viewer` may write to this board.
    #[must_use]
    pub fn is_editable_by(&self, viewer: Option<UserId>) -> bool {
        match self.owner_id {
            None => true,
            Some(owner) => viewer == Some(owner),
        }
    }
}

/// Any entity row.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Note(NoteRow),
    Connector(ConnectorRow),
    Stroke(StrokeRow),
}

impl Row {
    #[must_use]
    pub fn table(&self) -> Table {
        match self {
            Self::Note(_) => Table::Notes,
            Self::Connector(_) => Table::Connectors,
            Self::Stroke(_) => Table::Strokes,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::Note(r) => r.id,
            Self::Connector(r) => r.id,
            Self::Stroke(r) => r.id,
        }
    }

    #[must_use]
    pub fn board_id(&self) -> BoardId {
        match self {
            Self::Note(r) => r.board_id,
            Self::Connector(r) => r.board_id,
            Self::Stroke(r) => r.board_id,
        }
    }

    /// Serialize to a column map.
    ///
    /// # Errors
    ///
    /// Returns the serde error if a value cannot be represented as JSON.
    pub fn to_record(&self) -> Result<Fields, serde_json::Error> {
        match self {
            Self::Note(r) => to_fields(r),
            Self::Connector(r) => to_fields(r),
            Self::Stroke(r) => to_fields(r),
        }
    }

    /// Decode a column map for the given table.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the record is missing columns or holds
    /// wrongly typed values.
    pub fn from_record(table: Table, record: &Fields) -> Result<Self, serde_json::Error> {
        let value = Value::Object(record.clone());
        Ok(match table {
            Table::Notes => Self::Note(serde_json::from_value(value)?),
            Table::Connectors => Self::Connector(serde_json::from_value(value)?),
            Table::Strokes => Self::Stroke(serde_json::from_value(value)?),
        })
    }
}

/// Serialize a struct into a column map.
///
/// # Errors
///
/// Returns the serde error if `value` does not serialize to a JSON object.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!("expected object, got {other}"))),
    }
}

/// Shallow-merge `incoming` columns over `current`. `id` and `board_id` are never overwritten.
///
/// # Errors
///
/// Returns the serde error when a merged column has the wrong type.
pub fn merge_fields<T>(current: &T, incoming: &Fields) -> Result<T, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let mut merged = to_fields(current)?;
    for (key, value) in incoming {
        if key == "id" || key == "board_id" {
            continue;
        }
        merged.insert(key.clone(), value.clone());
    }
    serde_json::from_value(Value::Object(merged))
}

// =============================================================================
// OPERATIONS AND EVENTS
// =============================================================================

/// A write bound for the remote store.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    /// Upsert a full row.
    Insert(Row),
    /// Set the listed columns on an existing row.
    Update { table: Table, id: Uuid, fields: Fields },
    /// Remove a row. Deleting a missing row succeeds.
    Delete { table: Table, id: Uuid },
}

impl RemoteOp {
    #[must_use]
    pub fn table(&self) -> Table {
        match self {
            Self::Insert(row) => row.table(),
            Self::Update { table, .. } | Self::Delete { table, .. } => *table,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::Insert(row) => row.id(),
            Self::Update { id, .. } | Self::Delete { id, .. } => *id,
        }
    }

    /// Short name for log fields.
    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert(_) => ChangeKind::Insert,
            Self::Update { .. } => ChangeKind::Update,
            Self::Delete { .. } => ChangeKind::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// One change-feed notification.
///
/// `record` holds the new row for inserts and updates and at least
/// `id` / `board_id` for deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: Table,
    pub record: Fields,
}

impl ChangeEvent {
    /// The `id` column, if present and well-formed.
    #[must_use]
    pub fn id(&self) -> Option<Uuid> {
        uuid_field(&self.record, "id")
    }

    /// The `board_id` column, if present and well-formed.
    #[must_use]
    pub fn board_id(&self) -> Option<BoardId> {
        uuid_field(&self.record, "board_id")
    }
}

fn uuid_field(record: &Fields, key: &str) -> Option<Uuid> {
    let raw = record.get(key)?.as_str()?;
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => None,
    }
}
