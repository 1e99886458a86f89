use serde::{Deserialize, Serialize};

use super::node::ImageId;

/// A data or action cell: `row` is the 0-based data row, `col` the cell
/// position within the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellAddr {
    #[serde(default)]
    pub table: usize,
    pub row: usize,
    pub col: usize,
}

impl CellAddr {
    pub fn new(row: usize, col: usize) -> Self {
        Self { table: 0, row, col }
    }
}

/// What a pointer event landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "on", rename_all = "snake_case")]
pub enum Target {
    Header {
        #[serde(default)]
        table: usize,
        col: usize,
    },
    Cell(CellAddr),
    /// The `nth` control (in document order) inside a cell.
    Control { cell: CellAddr, nth: usize },
    Image { image: ImageId },
}

/// User interaction delivered to a container, one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableEvent {
    Click { target: Target },
    MouseDown { target: Target },
    Focus { cell: CellAddr },
    Blur { cell: CellAddr },
    Input { cell: CellAddr, text: String },
    DragStart { image: ImageId },
    DragOver { cell: CellAddr },
    DragLeave { cell: CellAddr },
    Drop { cell: CellAddr },
    DragEnd,
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    RowAdded { table: usize, row: usize },
    RowDeleted { table: usize, row: usize },
    Rejected { message: String },
    Cancelled,
    /// Default browser behaviour prevented (mousedown on an action cell).
    Suppressed,
    CellEdited { cell: CellAddr },
    Focused { cell: CellAddr },
    Blurred { cell: CellAddr },
    DragStarted { image: ImageId },
    DropAllowed { cell: CellAddr },
    ImageMoved { image: ImageId, to: CellAddr },
    DragEnded { image: ImageId },
    ImagePreview { src: String },
    Ignored,
}
