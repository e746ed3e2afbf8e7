use crate::geometry::{overlaps, Point};
use crate::resolver::Resolution;
use crate::{CombinationId, TileId, SEED_CATEGORIES};
use fusion_protocol::DragSource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub text: String,
    pub position: Point,
}

impl Tile {
    /// A tile with a freshly generated id.
    pub fn new(text: impl Into<String>, position: Point) -> Self {
        Self {
            id: TileId::generate(),
            text: text.into(),
            position,
        }
    }
}

/// A generated name, listed in the sidebar for reuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub text: String,
    pub id: TileId,
    /// Raw collaborator response the name came from; empty for fallback names.
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragOrigin {
    /// A preview tile that is not on the canvas yet.
    Sidebar(Tile),
    /// An existing canvas tile being relocated.
    Canvas(TileId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    origin: DragOrigin,
    offset: Point,
}

impl DragSession {
    pub fn origin(&self) -> &DragOrigin {
        &self.origin
    }

    /// Pointer position minus tile position at drag start.
    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn tile_id(&self) -> &TileId {
        match &self.origin {
            DragOrigin::Sidebar(tile) => &tile.id,
            DragOrigin::Canvas(id) => id,
        }
    }
}

/// Two tiles that were dropped onto each other and are waiting for a name.
/// Neither is on the canvas while the combination is pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCombination {
    pub id: CombinationId,
    pub resting: Tile,
    pub dragged: Tile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropOutcome {
    /// No drag was active.
    Idle,
    /// Released over the sidebar.
    Discarded,
    /// A sidebar tile landed on empty canvas.
    Placed { tile: TileId },
    /// A canvas tile was moved without touching another tile.
    Moved { tile: TileId },
    /// The dragged tile overlaps another one; run the resolver.
    Combine(PendingCombination),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailView {
    pub text: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tiles: Vec<Tile>,
    pub preview: Option<Tile>,
    pub catalog: Vec<CatalogEntry>,
    pub seeds: Vec<String>,
    pub dragging: bool,
    pub pending: usize,
    pub detail: Option<DetailView>,
}

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("no tile with id {0} on the canvas")]
    UnknownTile(TileId),
}

/// In-memory state of one game: the tiles on the canvas, the catalog of
/// generated names, and the pointer-driven drag state machine.
#[derive(Debug, Default)]
pub struct Canvas {
    tiles: Vec<Tile>,
    catalog: Vec<CatalogEntry>,
    drag: Option<DragSession>,
    detail: Option<DetailView>,
    pending: Vec<PendingCombination>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, id: &TileId) -> Option<&Tile> {
        self.tiles.iter().find(|t| &t.id == id)
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn detail(&self) -> Option<&DetailView> {
        self.detail.as_ref()
    }

    pub fn pending(&self) -> &[PendingCombination] {
        &self.pending
    }

    pub fn begin_drag(
        &mut self,
        source: &DragSource,
        pointer: Point,
    ) -> Result<TileId, CanvasError> {
        match source {
            DragSource::Sidebar(label) => Ok(self.begin_sidebar_drag(label, pointer)),
            DragSource::Tile(id) => {
                let id = TileId::from(id.as_str());
                self.begin_tile_drag(&id, pointer)?;
                Ok(id)
            }
        }
    }

    /// Starts dragging a new preview tile for `label`, centred on the pointer.
    /// Any drag already in progress is abandoned.
    pub fn begin_sidebar_drag(&mut self, label: &str, pointer: Point) -> TileId {
        let tile = Tile::new(label, pointer);
        let id = tile.id.clone();
        self.replace_drag(DragSession {
            origin: DragOrigin::Sidebar(tile),
            offset: Point::ZERO,
        });
        id
    }

    /// Starts relocating an existing canvas tile, keeping the grab point
    /// stable under the pointer.
    pub fn begin_tile_drag(&mut self, id: &TileId, pointer: Point) -> Result<(), CanvasError> {
        let tile = self
            .tile(id)
            .ok_or_else(|| CanvasError::UnknownTile(id.clone()))?;
        let offset = pointer - tile.position;
        self.replace_drag(DragSession {
            origin: DragOrigin::Canvas(id.clone()),
            offset,
        });
        Ok(())
    }

    fn replace_drag(&mut self, session: DragSession) {
        if let Some(previous) = self.drag.replace(session) {
            tracing::debug!(tile = %previous.tile_id(), "drag superseded");
        }
    }

    /// Follows the pointer. Returns false when no drag is active.
    pub fn update_drag(&mut self, pointer: Point) -> bool {
        let Some(session) = self.drag.as_mut() else {
            return false;
        };
        let at = pointer - session.offset;
        match &mut session.origin {
            DragOrigin::Sidebar(tile) => tile.position = at,
            DragOrigin::Canvas(id) => {
                if let Some(tile) = self.tiles.iter_mut().find(|t| &t.id == id) {
                    tile.position = at;
                }
            }
        }
        true
    }

    /// Releases the pointer. The drag session is always cleared.
    ///
    /// Dropping over the sidebar discards a preview but leaves a canvas tile
    /// where it was last moved to. On the canvas, the first tile (in insertion
    /// order) overlapping the dragged one is combined with it: both leave the
    /// canvas and a [`PendingCombination`] is returned for the resolver.
    pub fn end_drag(&mut self, pointer: Point, dropped_on_sidebar: bool) -> DropOutcome {
        let Some(session) = self.drag.take() else {
            return DropOutcome::Idle;
        };
        if dropped_on_sidebar {
            return DropOutcome::Discarded;
        }

        let at = pointer - session.offset;
        let from_canvas = matches!(session.origin, DragOrigin::Canvas(_));
        let mut dragged = match session.origin {
            DragOrigin::Sidebar(tile) => tile,
            DragOrigin::Canvas(ref id) => match self.tile(id) {
                Some(tile) => tile.clone(),
                None => {
                    tracing::warn!(tile = %id, "dragged tile left the canvas mid-drag");
                    return DropOutcome::Idle;
                }
            },
        };

        let hit = self
            .tiles
            .iter()
            .position(|t| t.id != dragged.id && overlaps(at, t.position));

        match hit {
            Some(idx) => {
                let resting = self.tiles.remove(idx);
                if from_canvas {
                    self.remove_tile(&dragged.id);
                }
                dragged.position = at;
                let pending = PendingCombination {
                    id: CombinationId::generate(),
                    resting,
                    dragged,
                };
                tracing::debug!(
                    combination = %pending.id,
                    a = %pending.resting.text,
                    b = %pending.dragged.text,
                    "combining"
                );
                self.pending.push(pending.clone());
                DropOutcome::Combine(pending)
            }
            None if from_canvas => DropOutcome::Moved { tile: dragged.id },
            None => {
                dragged.position = at;
                let id = dragged.id.clone();
                self.insert_tile(dragged);
                DropOutcome::Placed { tile: id }
            }
        }
    }

    /// Applies a finished combination: forgets the pending record, removes
    /// whichever inputs are still on the canvas, inserts the new tile and
    /// records its name in the catalog.
    ///
    /// Every step is guarded by id or text presence, so applying the same
    /// result twice changes nothing the second time. Returns whether the new
    /// tile was inserted.
    pub fn apply_combination(
        &mut self,
        combination: &PendingCombination,
        resolution: Resolution,
    ) -> bool {
        self.pending.retain(|p| p.id != combination.id);
        self.remove_tile(&combination.resting.id);
        self.remove_tile(&combination.dragged.id);

        let Resolution { tile, response } = resolution;
        if !self.catalog.iter().any(|e| e.text == tile.text) {
            self.catalog.push(CatalogEntry {
                text: tile.text.clone(),
                id: tile.id.clone(),
                response: response.unwrap_or_default(),
            });
        }
        self.insert_tile(tile)
    }

    /// Shows the detail view for a generated name, reusing the response it
    /// was generated from.
    pub fn open_detail(&mut self, text: &str) -> &DetailView {
        let description = self
            .catalog
            .iter()
            .find(|e| e.text == text)
            .map(|e| e.response.clone())
            .unwrap_or_default();
        self.detail.insert(DetailView {
            text: text.to_string(),
            description,
        })
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    pub fn snapshot(&self) -> Snapshot {
        let preview = match self.drag.as_ref().map(|s| &s.origin) {
            Some(DragOrigin::Sidebar(tile)) => Some(tile.clone()),
            _ => None,
        };
        Snapshot {
            tiles: self.tiles.clone(),
            preview,
            catalog: self.catalog.clone(),
            seeds: SEED_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            dragging: self.drag.is_some(),
            pending: self.pending.len(),
            detail: self.detail.clone(),
        }
    }

    fn insert_tile(&mut self, tile: Tile) -> bool {
        if self.tiles.iter().any(|t| t.id == tile.id) {
            return false;
        }
        self.tiles.push(tile);
        true
    }

    fn remove_tile(&mut self, id: &TileId) -> Option<Tile> {
        let idx = self.tiles.iter().position(|t| &t.id == id)?;
        Some(self.tiles.remove(idx))
    }
}
