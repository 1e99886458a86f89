//! Live BOQ table: model, markup round-trip and the interaction controllers.

pub mod node;
pub mod model;
pub mod parser;
pub mod render;
pub mod events;
pub mod editability;
pub mod row_actions;
pub mod drag_drop;
pub mod normalizer;
pub mod snapshot;

pub use drag_drop::DragController;
pub use events::{CellAddr, EventOutcome, TableEvent, Target};
pub use model::{Cell, CellKind, FileId, Parity, Row, Table, TableInstanceId};
pub use node::{Control, ControlRole, Image, ImageId, Node};
pub use normalizer::{NormalizeReport, Normalizer};
pub use row_actions::RowActionListener;
pub use snapshot::{Snapshot, SnapshotStore};
