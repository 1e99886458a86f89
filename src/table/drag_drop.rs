//! Moving embedded images between cells.
//!
//! At most one drag is tracked. A new drag start replaces whatever was being
//! tracked before, the same way a browser only runs one drag session.

use tracing::{debug, info};

use super::editability::parity_background;
use super::events::{CellAddr, EventOutcome};
use super::model::{Cell, CellKind, Table};
use super::node::{add_class, take_image, Image, ImageId, Node};
use crate::config::Theme;

const DRAGGING_OPACITY: &str = "0.5";

/// Display styling for an embedded image; safe to apply repeatedly.
pub fn style_image(img: &mut Image) {
    img.draggable = true;
    add_class(&mut img.attrs, "cell-image");
    img.style
        .set("max-width", "100px")
        .set("max-height", "100px")
        .set("display", "block")
        .set("margin", "4px auto")
        .set("border-radius", "4px")
        .set("object-fit", "contain")
        .set("cursor", "pointer");
    img.style.remove("opacity");
}

pub fn style_all_images(table: &mut Table) {
    for row in std::iter::once(&mut table.header).chain(table.rows.iter_mut()) {
        for cell in row.cells.iter_mut() {
            cell.images_mut(style_image);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DragState {
    container: String,
    image: ImageId,
    dropped: bool,
}

#[derive(Debug, Default)]
pub struct DragController {
    state: Option<DragState>,
}

fn data_cell_mut<'a>(tables: &'a mut [Table], addr: &CellAddr) -> Option<&'a mut Cell> {
    tables
        .get_mut(addr.table)?
        .rows
        .get_mut(addr.row)?
        .cells
        .get_mut(addr.col)
        .filter(|c| c.kind == CellKind::Data)
}

fn locate(tables: &[Table], image: ImageId) -> Option<(usize, usize, usize)> {
    tables
        .iter()
        .enumerate()
        .find_map(|(t, table)| table.find_image(image).map(|(r, c)| (t, r, c)))
}

fn clear_highlight(tables: &mut [Table], addr: &CellAddr, theme: &Theme) {
    let parity = match tables.get(addr.table).and_then(|t| t.rows.get(addr.row)) {
        Some(row) => row.parity,
        None => return,
    };
    if let Some(cell) = data_cell_mut(tables, addr) {
        cell.style.remove("outline");
        cell.style.set("background-color", parity_background(theme, parity));
    }
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked(&self) -> Option<ImageId> {
        self.state.as_ref().filter(|s| !s.dropped).map(|s| s.image)
    }

    /// Container the current drag started in.
    pub fn source_container(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.container.as_str())
    }

    pub fn drag_start(&mut self, container: &str, tables: &mut [Table], image: ImageId) -> EventOutcome {
        let Some((t, r, c)) = locate(tables, image) else {
            return EventOutcome::Ignored;
        };
        tables[t].rows[r].cells[c].images_mut(|img| {
            if img.id == image {
                img.style.set("opacity", DRAGGING_OPACITY);
            }
        });
        self.state = Some(DragState {
            container: container.to_string(),
            image,
            dropped: false,
        });
        debug!(?image, container, "Drag started");
        EventOutcome::DragStarted { image }
    }

    pub fn drag_over(&self, tables: &mut [Table], addr: &CellAddr, theme: &Theme) -> EventOutcome {
        match data_cell_mut(tables, addr) {
            Some(cell) => {
                cell.style
                    .set("outline", format!("2px dashed {}", theme.focus_outline))
                    .set("background-color", theme.drop_highlight.as_str());
                EventOutcome::DropAllowed { cell: *addr }
            }
            None => EventOutcome::Ignored,
        }
    }

    pub fn drag_leave(&self, tables: &mut [Table], addr: &CellAddr, theme: &Theme) -> EventOutcome {
        clear_highlight(tables, addr, theme);
        EventOutcome::Ignored
    }

    /// Move the tracked image into the target cell. A drop with nothing
    /// tracked, or onto a cell that cannot hold images, changes nothing.
    pub fn drop(&mut self, container: &str, tables: &mut [Table], addr: &CellAddr, theme: &Theme) -> EventOutcome {
        clear_highlight(tables, addr, theme);

        let image = match &self.state {
            Some(state) if !state.dropped && state.container == container => state.image,
            _ => return EventOutcome::Ignored,
        };
        if data_cell_mut(tables, addr).is_none() {
            return EventOutcome::Ignored;
        }
        let Some((t, r, c)) = locate(tables, image) else {
            return EventOutcome::Ignored;
        };
        let Some(moved) = take_image(&mut tables[t].rows[r].cells[c].content, image) else {
            return EventOutcome::Ignored;
        };

        let mut relocated = Image {
            id: moved.id,
            src: moved.src,
            alt: moved.alt,
            attrs: moved.attrs,
            style: moved.style,
            draggable: true,
        };
        style_image(&mut relocated);
        if let Some(target) = data_cell_mut(tables, addr) {
            target.content.push(Node::Image(relocated));
        }

        if let Some(state) = self.state.as_mut() {
            state.dropped = true;
        }
        info!(?image, from_row = r, from_col = c, to_row = addr.row, to_col = addr.col, "Image moved");
        EventOutcome::ImageMoved { image, to: *addr }
    }

    /// Forget a drag whose container is being replaced.
    pub fn abandon(&mut self, container: &str) -> bool {
        if self.source_container() == Some(container) {
            self.state = None;
            return true;
        }
        false
    }

    /// Restore the dragged image whether or not the drop succeeded.
    pub fn drag_end(&mut self, tables: &mut [Table]) -> EventOutcome {
        let Some(state) = self.state.take() else {
            return EventOutcome::Ignored;
        };
        if let Some((t, r, c)) = locate(tables, state.image) {
            tables[t].rows[r].cells[c].images_mut(|img| {
                if img.id == state.image {
                    img.style.remove("opacity");
                }
            });
        }
        EventOutcome::DragEnded { image: state.image }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{FileId, Normalizer};

    fn tables() -> Vec<Table> {
        let theme = Theme::default();
        Normalizer::new(&theme)
            .normalize_fragment(
                "<table><tr><th>Item</th><th>Image</th></tr>\
                 <tr><td>Chair</td><td><img src=\"/chair.png\"></td></tr>\
                 <tr><td>Desk</td><td></td></tr></table>",
                &FileId::from("f1"),
            )
            .unwrap()
            .0
    }

    #[test]
    fn test_drop_moves_image_and_keeps_identity() {
        let theme = Theme::default();
        let mut tables = tables();
        let image = tables[0].rows[0].cells[1].image_ids()[0];
        let mut drag = DragController::new();

        drag.drag_start("stitched", &mut tables, image);
        assert_eq!(drag.tracked(), Some(image));
        let target = CellAddr::new(1, 1);
        assert_eq!(drag.drag_over(&mut tables, &target, &theme), EventOutcome::DropAllowed { cell: target });
        assert_eq!(
            drag.drop("stitched", &mut tables, &target, &theme),
            EventOutcome::ImageMoved { image, to: target }
        );
        assert_eq!(drag.drag_end(&mut tables), EventOutcome::DragEnded { image });

        assert!(!tables[0].rows[0].cells[1].has_image());
        assert_eq!(tables[0].find_image(image), Some((1, 1)));
        assert_eq!(tables[0].image_count(), 1);
        let moved = tables[0].rows[1].cells[1].images()[0];
        assert!(moved.draggable);
        assert_eq!(moved.style.get("opacity"), None);
        assert_eq!(tables[0].rows[1].cells[1].style.get("outline"), None);
    }

    #[test]
    fn test_drop_onto_action_cell_changes_nothing() {
        let theme = Theme::default();
        let mut tables = tables();
        let before = tables.clone();
        let image = tables[0].rows[0].cells[1].image_ids()[0];
        let mut drag = DragController::new();

        drag.drag_start("stitched", &mut tables, image);
        let actions = CellAddr::new(1, 2);
        assert_eq!(drag.drop("stitched", &mut tables, &actions, &theme), EventOutcome::Ignored);
        drag.drag_end(&mut tables);
        assert_eq!(tables, before);
    }

    #[test]
    fn test_drop_from_other_container_is_ignored() {
        let theme = Theme::default();
        let mut tables = tables();
        let image = tables[0].rows[0].cells[1].image_ids()[0];
        let mut drag = DragController::new();

        drag.drag_start("costing", &mut tables, image);
        assert_eq!(drag.drop("stitched", &mut tables, &CellAddr::new(1, 1), &theme), EventOutcome::Ignored);
        assert!(drag.abandon("costing"));
        assert_eq!(drag.tracked(), None);
    }
}
