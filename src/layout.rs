//! Page layout: one image per physical copy, nine to a page in a 3x3 grid
//!
//! Coordinates are millimetres from the top-left corner of the page.

use crate::deck::DeckEntry;
use crate::error::{ProxyError, Result};

pub const GRID_ROWS: usize = 3;
pub const GRID_COLUMNS: usize = 3;
pub const CARDS_PER_PAGE: usize = GRID_ROWS * GRID_COLUMNS;

pub const CARD_WIDTH_MM: f32 = 63.5;
pub const CARD_HEIGHT_MM: f32 = 88.0;
pub const LEFT_PADDING_MM: f32 = 4.0;
pub const SPACING_MM: f32 = 4.0;

/// One image placed on a page
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub asset_name: String,
    pub page: usize,
    pub row: usize,
    pub column: usize,
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

/// One sheet of up to nine placements, in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub index: usize,
    pub placements: Vec<Placement>,
}

impl Page {
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// Horizontal offset of a grid column
pub fn column_x(column: usize) -> f32 {
    let c = column as f32;
    LEFT_PADDING_MM + SPACING_MM * (c + 1.0) + CARD_WIDTH_MM * c
}

/// Vertical offset of a grid row
pub fn row_y(row: usize) -> f32 {
    let r = row as f32;
    SPACING_MM * (r + 1.0) + CARD_HEIGHT_MM * r
}

/// Repeat each entry's asset `quantity` times, keeping deck order
pub fn expand_copies(deck: &[DeckEntry]) -> Vec<&str> {
    deck.iter()
        .flat_map(|entry| std::iter::repeat(entry.asset_name.as_str()).take(entry.quantity as usize))
        .collect()
}

/// Lay out a single page. More than nine images is an internal error.
pub fn layout_page(index: usize, images: &[&str]) -> Result<Page> {
    if images.len() > CARDS_PER_PAGE {
        return Err(ProxyError::PageOverflow(images.len()));
    }

    let placements = images
        .iter()
        .enumerate()
        .map(|(slot, asset_name)| {
            let row = slot / GRID_COLUMNS;
            let column = slot % GRID_COLUMNS;
            Placement {
                asset_name: asset_name.to_string(),
                page: index,
                row,
                column,
                x_mm: column_x(column),
                y_mm: row_y(row),
                width_mm: CARD_WIDTH_MM,
                height_mm: CARD_HEIGHT_MM,
            }
        })
        .collect();

    Ok(Page { index, placements })
}

/// Lay out the whole deck. The last page may hold fewer than nine images.
pub fn layout(deck: &[DeckEntry]) -> Result<Vec<Page>> {
    expand_copies(deck)
        .chunks(CARDS_PER_PAGE)
        .enumerate()
        .map(|(index, chunk)| layout_page(index, chunk))
        .collect()
}
