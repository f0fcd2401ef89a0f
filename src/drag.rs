//! Drag-and-drop reordering.
//!
//! A `DragSession` tracks one gesture: which card is dragged and which
//! column slot it hovers. The card is never detached from the board while
//! dragging; only `drop` mutates, with a single `Board::move_to`.

use serde::Serialize;

use crate::board::Board;
use crate::error::{Error, Result};
use crate::storage::KeyValueStore;
use crate::task::{Status, Task};

/// Rendered vertical extent of a card in the hovered column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardBounds {
    pub task_id: String,
    pub top: f64,
    pub height: f64,
}

impl CardBounds {
    pub fn new(task_id: impl Into<String>, top: f64, height: f64) -> Self {
        Self {
            task_id: task_id.into(),
            top,
            height,
        }
    }

    pub fn midpoint(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "slot", content = "task_id", rename_all = "snake_case")]
pub enum DropSlot {
    Before(String),
    End,
}

/// Slot for a pointer at `pointer_y` over `siblings` (top to bottom).
///
/// The dragged card itself is skipped; a pointer exactly on a midpoint
/// inserts before that card.
pub fn drop_slot(siblings: &[CardBounds], dragged_id: &str, pointer_y: f64) -> DropSlot {
    siblings
        .iter()
        .filter(|card| card.task_id != dragged_id)
        .find(|card| pointer_y <= card.midpoint())
        .map(|card| DropSlot::Before(card.task_id.clone()))
        .unwrap_or(DropSlot::End)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hover {
    pub status: Status,
    pub slot: DropSlot,
}

#[derive(Debug, Clone)]
pub struct DragSession {
    task_id: String,
    origin: Status,
    hover: Option<Hover>,
}

impl DragSession {
    pub fn start<S: KeyValueStore>(board: &Board<S>, task_id: &str) -> Result<Self> {
        let (origin, _) = board
            .position(task_id)
            .ok_or_else(|| Error::NotFound(task_id.to_string()))?;
        tracing::debug!(task_id, origin = %origin, "drag started");
        Ok(Self {
            task_id: task_id.to_string(),
            origin,
            hover: None,
        })
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn origin(&self) -> &Status {
        &self.origin
    }

    /// Record the pointer over a column.
    pub fn over(&mut self, status: Status, pointer_y: f64, siblings: &[CardBounds]) -> &DropSlot {
        let slot = drop_slot(siblings, &self.task_id, pointer_y);
        &self.hover.insert(Hover { status, slot }).slot
    }

    /// The pointer left `status`; forget the hover if it was there.
    pub fn leave(&mut self, status: &Status) {
        if self.hover.as_ref().is_some_and(|hover| &hover.status == status) {
            self.hover = None;
        }
    }

    /// Current hover, for drawing an insertion marker.
    pub fn preview(&self) -> Option<&Hover> {
        self.hover.as_ref()
    }

    /// Finish the gesture. Without a hovered column, or over a column the
    /// board does not have, this is a no-op.
    pub fn drop<S: KeyValueStore>(self, board: &mut Board<S>) -> Result<Option<Task>> {
        let Some(hover) = self.hover else {
            tracing::debug!(task_id = %self.task_id, "drag ended outside a column");
            return Ok(None);
        };

        let Some(index) = board.column(hover.status.as_str()).map(|column| {
            let others = column.tasks.iter().filter(|task| task.id != self.task_id);
            match &hover.slot {
                DropSlot::Before(target) => others
                    .clone()
                    .position(|task| &task.id == target)
                    .unwrap_or_else(|| others.count()),
                DropSlot::End => others.count(),
            }
        }) else {
            tracing::debug!(task_id = %self.task_id, status = %hover.status, "drop over unknown column");
            return Ok(None);
        };

        board
            .move_to(&self.task_id, hover.status.as_str(), index)
            .map(Some)
    }

    /// Abort the gesture without touching the board.
    pub fn cancel(self) {
        tracing::debug!(task_id = %self.task_id, "drag cancelled");
    }
}
