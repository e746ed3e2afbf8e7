//! Headless core of Topic Fusion: the canvas drag/combine state machine and the
//! resolver that names a combination of two tiles.
//!
//! Nothing here knows about HTTP or the DOM. Callers feed pointer events into a
//! [`Canvas`], run [`combine`] for every [`DropOutcome::Combine`] it reports, and
//! hand the [`Resolution`] back with [`Canvas::apply_combination`].

mod canvas;
mod geometry;
mod resolver;

pub use canvas::{
    Canvas, CanvasError, CatalogEntry, DetailView, DragOrigin, DragSession, DropOutcome,
    PendingCombination, Snapshot, Tile,
};
pub use geometry::{overlaps, Point, TILE_HEIGHT, TILE_WIDTH};
pub use resolver::{combine, topic, NameFuture, Namer, NamingError, Resolution};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Sidebar entries available before anything has been combined.
pub const SEED_CATEGORIES: [&str; 5] = [
    "🏥 Health",
    "💻 Technology",
    "📚 Education",
    "🎨 Art",
    "🧠 Psychology",
];

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

// The counter alone keeps ids unique within the process; the timestamp keeps
// them from repeating across restarts.
fn new_id(prefix: &str) -> String {
    let c = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{c}", now_ms())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(String);

impl TileId {
    pub fn generate() -> Self {
        Self(new_id("tile"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombinationId(String);

impl CombinationId {
    pub fn generate() -> Self {
        Self(new_id("combo"))
    }
}

impl fmt::Display for CombinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
