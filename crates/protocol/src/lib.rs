use serde::{Deserialize, Serialize};

/// Body of `POST /api/replicate`. Both fields are optional on the wire so a
/// missing field can be answered with a 400 instead of a decode rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombineRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item2: Option<String>,
}

impl CombineRequest {
    pub fn new(item1: impl Into<String>, item2: impl Into<String>) -> Self {
        Self {
            item1: Some(item1.into()),
            item2: Some(item2.into()),
        }
    }

    /// Both labels, or `None` when either is missing or empty.
    pub fn items(&self) -> Option<(&str, &str)> {
        let a = self.item1.as_deref().filter(|s| !s.is_empty())?;
        let b = self.item2.as_deref().filter(|s| !s.is_empty())?;
        Some((a, b))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// The object the model is asked to answer with.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedName {
    #[serde(default)]
    pub name: Option<String>,
}

impl GeneratedName {
    /// Parses a raw model response and returns the trimmed, non-empty `name`.
    pub fn parse(raw: &str) -> Option<String> {
        let parsed: GeneratedName = serde_json::from_str(raw.trim()).ok()?;
        parsed
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
    }
}

/// Where a drag starts: a sidebar label (seed or catalog entry) or a tile
/// already on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragSource {
    Sidebar(String),
    Tile(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeginDrag {
    pub source: DragSource,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoveDrag {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EndDrag {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub dropped_on_sidebar: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenDetail {
    pub text: String,
}

pub mod routes {
    pub const COMBINE: &str = "/api/replicate";
    pub const CANVAS: &str = "/api/canvas";
    pub const DRAG_BEGIN: &str = "/api/canvas/drag/begin";
    pub const DRAG_MOVE: &str = "/api/canvas/drag/move";
    pub const DRAG_END: &str = "/api/canvas/drag/end";
    pub const DETAIL_OPEN: &str = "/api/canvas/detail/open";
    pub const DETAIL_CLOSE: &str = "/api/canvas/detail/close";
}
