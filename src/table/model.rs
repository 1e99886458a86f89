use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::node::{is_blank, Attributes, Image, ImageId, Node, Style};

/// Marker on the synthetic Actions header and on each row's action cell.
pub const ACTION_CELL_MARKER: &str = "actions";
pub const ACTIONS_LABEL: &str = "Actions";

/// Key of an uploaded document; one live table set per file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        FileId(s.to_string())
    }
}

impl From<String> for FileId {
    fn from(s: String) -> Self {
        FileId(s)
    }
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Identity of one live table element. A reset or re-stitch produces a new
/// instance; listeners are registered against instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableInstanceId(pub u64);

impl TableInstanceId {
    pub fn next() -> Self {
        TableInstanceId(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Header,
    Data,
    Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn of(index: usize) -> Self {
        if index % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub kind: CellKind,
    pub attrs: Attributes,
    pub style: Style,
    pub editable: bool,
    pub content: Vec<Node>,
}

impl Cell {
    pub fn new(kind: CellKind) -> Self {
        Self {
            kind,
            attrs: Attributes::new(),
            style: Style::default(),
            editable: false,
            content: Vec::new(),
        }
    }

    pub fn with_text(kind: CellKind, text: impl Into<String>) -> Self {
        let mut cell = Self::new(kind);
        cell.content.push(Node::Text(text.into()));
        cell
    }

    pub fn is_action(&self) -> bool {
        self.kind == CellKind::Action
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        self.content.iter().for_each(|n| n.push_text(&mut out));
        out
    }

    pub fn has_image(&self) -> bool {
        self.content.iter().any(Node::has_image)
    }

    /// Empty for filtering purposes: blank text and no image.
    pub fn is_empty(&self) -> bool {
        is_blank(&self.text()) && !self.has_image()
    }

    pub fn images(&self) -> Vec<&Image> {
        let mut found = Vec::new();
        for node in &self.content {
            collect_images(node, &mut found);
        }
        found
    }

    pub fn image_ids(&self) -> Vec<ImageId> {
        self.images().iter().map(|img| img.id).collect()
    }

    pub fn images_mut(&mut self, mut f: impl FnMut(&mut Image)) {
        for node in self.content.iter_mut() {
            node.visit_images_mut(&mut f);
        }
    }

    /// Replace the cell's text in place, keeping embedded images.
    pub fn set_text(&mut self, text: &str) {
        let mut kept: Vec<Node> = Vec::new();
        for node in self.content.drain(..) {
            if let Node::Image(img) = node {
                kept.push(Node::Image(img));
            } else {
                let mut images = Vec::new();
                node.visit_images(&mut |img| images.push(img.clone()));
                kept.extend(images.into_iter().map(Node::Image));
            }
        }
        if !text.is_empty() {
            kept.insert(0, Node::Text(text.to_string()));
        }
        self.content = kept;
    }
}

fn collect_images<'a>(node: &'a Node, out: &mut Vec<&'a Image>) {
    match node {
        Node::Image(img) => out.push(img),
        Node::Element(e) => e.children.iter().for_each(|c| collect_images(c, out)),
        _ => {}
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub attrs: Attributes,
    pub style: Style,
    /// 1-based ordinal among data rows; 0 for the header row.
    pub index: usize,
    pub parity: Parity,
    pub file_id: Option<FileId>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            attrs: Attributes::new(),
            style: Style::default(),
            index: 0,
            parity: Parity::Even,
            file_id: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }

    pub fn action_cell(&self) -> Option<&Cell> {
        self.cells.iter().find(|c| c.is_action())
    }

    pub fn data_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| !c.is_action())
    }

    pub fn texts(&self) -> Vec<String> {
        self.data_cells().map(|c| c.text().trim().to_string()).collect()
    }
}

/// A live, normalized table. The header row always exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub instance: TableInstanceId,
    pub file_id: FileId,
    pub attrs: Attributes,
    pub style: Style,
    pub header: Row,
    pub rows: Vec<Row>,
}

impl Table {
    /// Header labels in order, including the Actions label.
    pub fn header_labels(&self) -> Vec<String> {
        self.header.cells.iter().map(|c| c.text().trim().to_string()).collect()
    }

    /// Header labels without the Actions column.
    pub fn data_labels(&self) -> Vec<String> {
        self.header.data_cells().map(|c| c.text().trim().to_string()).collect()
    }

    /// Header plus data rows, as the user sees it.
    pub fn total_rows(&self) -> usize {
        self.rows.len() + 1
    }

    pub fn image_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .map(|c| c.images().len())
            .sum::<usize>()
            + self.header.cells.iter().map(|c| c.images().len()).sum::<usize>()
    }

    pub fn find_image(&self, id: ImageId) -> Option<(usize, usize)> {
        self.rows.iter().enumerate().find_map(|(r, row)| {
            row.cells
                .iter()
                .position(|c| c.image_ids().contains(&id))
                .map(|col| (r, col))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_text_keeps_images() {
        let mut cell = Cell::with_text(CellKind::Data, "old");
        cell.content.push(Node::Image(Image::new("/img/chair.png")));
        cell.set_text("new");
        assert_eq!(cell.text(), "new");
        assert!(cell.has_image());
    }

    #[test]
    fn test_image_only_cell_is_not_empty() {
        let mut cell = Cell::new(CellKind::Data);
        cell.content.push(Node::Image(Image::new("/img/x.png")));
        assert!(!cell.is_empty());
        assert!(Cell::with_text(CellKind::Data, "  ").is_empty());
    }
}
