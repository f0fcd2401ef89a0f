//! Screen geometry for the board: where each column and card lands.
//!
//! The same layout drives drawing and mouse hit-testing, so a drag always
//! resolves against what is on screen.

use ratatui::layout::Rect;

use crate::drag::{CardBounds, DropSlot};
use crate::projection::ColumnView;
use crate::task::Status;

/// Rows per card: title, details, separator.
pub const CARD_HEIGHT: u16 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSlot {
    pub task_id: String,
    /// Position among the column's visible cards
    pub index: usize,
    pub area: Rect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub status: Status,
    pub area: Rect,
    pub inner: Rect,
    /// Visible cards hidden above the viewport
    pub scroll: usize,
    pub cards: Vec<CardSlot>,
}

impl ColumnLayout {
    pub fn contains(&self, x: u16, y: u16) -> bool {
        contains(self.area, x, y)
    }

    pub fn card_at(&self, x: u16, y: u16) -> Option<&CardSlot> {
        self.cards.iter().find(|card| contains(card.area, x, y))
    }

    /// Card extents in the shape the drag engine expects.
    pub fn bounds(&self) -> Vec<CardBounds> {
        self.cards
            .iter()
            .map(|card| {
                CardBounds::new(card.task_id.clone(), card.area.y as f64, CARD_HEIGHT as f64)
            })
            .collect()
    }

    /// Row for an insertion marker, if it falls inside the column frame.
    pub fn marker_row(&self, slot: &DropSlot) -> Option<u16> {
        let row = match slot {
            DropSlot::Before(task_id) => self
                .cards
                .iter()
                .find(|card| &card.task_id == task_id)
                .map(|card| card.area.y.saturating_sub(1))?,
            DropSlot::End => match self.cards.last() {
                Some(card) => card.area.y + CARD_HEIGHT - 1,
                None => self.inner.y,
            },
        };
        (row >= self.area.y && row < self.area.y + self.area.height).then_some(row)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardLayout {
    pub columns: Vec<ColumnLayout>,
}

impl BoardLayout {
    /// Split `area` evenly between columns and stack cards top to bottom.
    ///
    /// `focus` names the selected column and card; that column scrolls so
    /// the card stays visible.
    pub fn compute(area: Rect, views: &[ColumnView], focus: Option<(usize, usize)>) -> Self {
        let count = views.len() as u16;
        if count == 0 || area.width == 0 {
            return Self::default();
        }
        let base = area.width / count;
        let extra = area.width % count;

        let mut x = area.x;
        let columns = views
            .iter()
            .enumerate()
            .map(|(col, view)| {
                let width = base + u16::from((col as u16) < extra);
                let column_area = Rect::new(x, area.y, width, area.height);
                x += width;
                let inner = Rect::new(
                    column_area.x.saturating_add(1),
                    column_area.y.saturating_add(1),
                    column_area.width.saturating_sub(2),
                    column_area.height.saturating_sub(2),
                );

                let capacity = (inner.height / CARD_HEIGHT) as usize;
                let selected = focus
                    .filter(|(focus_col, _)| *focus_col == col)
                    .map(|(_, card)| card);
                let (start, end) = card_window(view.visible.len(), selected, capacity);

                let cards = view.visible[start..end]
                    .iter()
                    .enumerate()
                    .map(|(offset, task)| CardSlot {
                        task_id: task.id.clone(),
                        index: start + offset,
                        area: Rect::new(
                            inner.x,
                            inner.y + offset as u16 * CARD_HEIGHT,
                            inner.width,
                            CARD_HEIGHT,
                        ),
                    })
                    .collect();

                ColumnLayout {
                    status: view.status.clone(),
                    area: column_area,
                    inner,
                    scroll: start,
                    cards,
                }
            })
            .collect();

        Self { columns }
    }

    pub fn column_at(&self, x: u16, y: u16) -> Option<(usize, &ColumnLayout)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, column)| column.contains(x, y))
    }
}

fn contains(area: Rect, x: u16, y: u16) -> bool {
    x >= area.x && x < area.x + area.width && y >= area.y && y < area.y + area.height
}

/// Window of `capacity` cards that keeps `selected` in view.
fn card_window(total: usize, selected: Option<usize>, capacity: usize) -> (usize, usize) {
    if total == 0 || capacity == 0 {
        return (0, 0);
    }
    if total <= capacity {
        return (0, total);
    }
    let selected = selected.unwrap_or(0).min(total - 1);
    let start = (selected + 1).saturating_sub(capacity);
    (start, start + capacity)
}
