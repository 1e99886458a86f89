//! The page: named containers holding live tables, plus everything that
//! outlives a single table element.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::BackendClient;
use crate::config::Theme;
use crate::costing::{self, CostingFactors, CostingOutcome, TableData};
use crate::diagnostics::Diagnostic;
use crate::error::{BoqError, BoqResult};
use crate::export;
use crate::log_error;
use crate::prompt::Prompt;
use crate::table::editability;
use crate::table::render::render_tables;
use crate::table::row_actions::cleanup_controls;
use crate::table::{
    CellAddr, DragController, EventOutcome, FileId, ImageId, NormalizeReport, Normalizer, RowActionListener,
    SnapshotStore, Table, TableEvent, TableInstanceId, Target,
};

pub const STITCHED_CONTAINER: &str = "stitched-table";
pub const RESET_CONFIRMATION: &str = "Reset the table to its original state? All edits will be lost.";

/// Identifiers that used to live in page globals.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub current_file: Option<FileId>,
    pub costing_file: Option<FileId>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            current_file: None,
            costing_file: None,
        }
    }
}

/// Row-action listeners, one per live table instance.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    by_container: HashMap<String, Vec<RowActionListener>>,
}

impl ListenerRegistry {
    /// Replace the container's listeners with one per table. Returns how many
    /// were torn down.
    pub fn attach(&mut self, container: &str, tables: &[Table]) -> usize {
        let removed = self.detach(container);
        let listeners = tables.iter().map(|t| RowActionListener::new(t.instance)).collect();
        self.by_container.insert(container.to_string(), listeners);
        removed
    }

    pub fn detach(&mut self, container: &str) -> usize {
        let removed = self.by_container.remove(container).map(|l| l.len()).unwrap_or(0);
        if removed > 0 {
            debug!(container, removed, "Tore down row listeners");
        }
        removed
    }

    pub fn listener(&self, container: &str, instance: TableInstanceId) -> Option<&RowActionListener> {
        self.by_container
            .get(container)?
            .iter()
            .find(|l| l.instance == instance)
    }

    pub fn instances(&self, container: &str) -> Vec<TableInstanceId> {
        self.by_container
            .get(container)
            .map(|l| l.iter().map(|l| l.instance).collect())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.by_container.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Default)]
pub struct Container {
    pub tables: Vec<Table>,
    pub file_id: Option<FileId>,
    pub diagnostic: Option<Diagnostic>,
}

impl Container {
    /// Current markup: the diagnostic, if any, above the tables.
    pub fn html(&self) -> String {
        let mut html = self.diagnostic.as_ref().map(Diagnostic::to_html).unwrap_or_default();
        html.push_str(&render_tables(&self.tables));
        html
    }

    fn cell_error(addr: &CellAddr) -> BoqError {
        BoqError::CellNotFound {
            table: addr.table,
            row: addr.row,
            col: addr.col,
        }
    }
}

fn find_image_src(tables: &[Table], image: ImageId) -> Option<String> {
    tables.iter().find_map(|table| {
        table
            .rows
            .iter()
            .chain(std::iter::once(&table.header))
            .flat_map(|r| r.cells.iter())
            .flat_map(|c| c.images())
            .find(|img| img.id == image)
            .map(|img| img.src.clone())
    })
}

pub struct Workspace {
    theme: Theme,
    containers: BTreeMap<String, Container>,
    snapshots: SnapshotStore,
    drag: DragController,
    listeners: ListenerRegistry,
    pub context: SessionContext,
}

impl Workspace {
    /// A page with the stitched-table container.
    pub fn new(theme: Theme) -> Self {
        Self::with_containers(theme, [STITCHED_CONTAINER])
    }

    pub fn with_containers<'a>(theme: Theme, names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            theme,
            containers: names.into_iter().map(|n| (n.to_string(), Container::default())).collect(),
            snapshots: SnapshotStore::new(),
            drag: DragController::new(),
            listeners: ListenerRegistry::default(),
            context: SessionContext::default(),
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn container(&self, name: &str) -> BoqResult<&Container> {
        self.containers.get(name).ok_or_else(|| BoqError::missing_target(name))
    }

    pub fn tables(&self, container: &str) -> BoqResult<&[Table]> {
        Ok(&self.container(container)?.tables)
    }

    pub fn html(&self, container: &str) -> BoqResult<String> {
        Ok(self.container(container)?.html())
    }

    /// Render a failure into the container. The table already there stays.
    pub fn report_error(&mut self, container: &str, err: &BoqError) {
        log_error!(err, container);
        match self.containers.get_mut(container) {
            Some(c) => c.diagnostic = Some(Diagnostic::from_error(err)),
            None => warn!(container, "No container to show the error in"),
        }
    }

    /// Normalize a stitched fragment, mount it in place of whatever the
    /// container held and capture its pristine snapshot.
    pub fn mount_stitched(&mut self, container: &str, file_id: &FileId, html: &str) -> BoqResult<NormalizeReport> {
        if !self.containers.contains_key(container) {
            return Err(BoqError::missing_target(container));
        }
        let normalized = Normalizer::new(&self.theme).normalize_fragment(html, file_id);
        let (tables, report) = match normalized {
            Ok(done) => done,
            Err(err) => {
                self.report_error(container, &err);
                return Err(err);
            }
        };

        self.snapshots.capture(file_id, &tables);
        self.install(container, file_id, tables);
        self.context.current_file = Some(file_id.clone());
        Ok(report)
    }

    fn install(&mut self, container: &str, file_id: &FileId, tables: Vec<Table>) {
        if self.drag.abandon(container) {
            debug!(container, "Dropped drag state of replaced table");
        }
        let removed = self.listeners.attach(container, &tables);
        if let Some(c) = self.containers.get_mut(container) {
            c.tables = tables;
            c.file_id = Some(file_id.clone());
            c.diagnostic = None;
        }
        debug!(container, %file_id, replaced_listeners = removed, "Mounted live tables");
    }

    /// Rebuild the container's tables from the pristine snapshot after
    /// confirmation. Returns false if the user declined.
    pub fn reset(&mut self, container: &str, prompt: &mut dyn Prompt) -> BoqResult<bool> {
        let file_id = self
            .container(container)?
            .file_id
            .clone()
            .ok_or_else(|| BoqError::NoSnapshot {
                file_id: String::new(),
            })?;
        if !self.snapshots.contains(&file_id) {
            return Err(BoqError::NoSnapshot {
                file_id: file_id.to_string(),
            });
        }
        if !prompt.confirm(RESET_CONFIRMATION) {
            debug!(%file_id, "Reset cancelled");
            return Ok(false);
        }
        let tables = self.snapshots.restore(&file_id, &Normalizer::new(&self.theme))?;
        self.install(container, &file_id, tables);
        info!(%file_id, "Table reset to pristine snapshot");
        Ok(true)
    }

    /// Remove stray or duplicate row controls in every table of a container.
    pub fn cleanup(&mut self, container: &str) -> BoqResult<usize> {
        let c = self
            .containers
            .get_mut(container)
            .ok_or_else(|| BoqError::missing_target(container))?;
        Ok(c.tables.iter_mut().map(cleanup_controls).sum())
    }

    /// Deliver one user event to a container.
    pub fn dispatch(&mut self, container: &str, event: &TableEvent, prompt: &mut dyn Prompt) -> BoqResult<EventOutcome> {
        if let TableEvent::DragEnd = event {
            let Some(source) = self.drag.source_container().map(str::to_string) else {
                return Ok(EventOutcome::Ignored);
            };
            let tables = match self.containers.get_mut(&source) {
                Some(c) => &mut c.tables,
                None => return Ok(EventOutcome::Ignored),
            };
            return Ok(self.drag.drag_end(tables));
        }

        let c = self
            .containers
            .get_mut(container)
            .ok_or_else(|| BoqError::missing_target(container))?;
        let theme = &self.theme;

        match event {
            TableEvent::Click {
                target: Target::Image { image },
            } => Ok(find_image_src(&c.tables, *image)
                .map(|src| EventOutcome::ImagePreview { src })
                .unwrap_or(EventOutcome::Ignored)),
            TableEvent::Click { target } | TableEvent::MouseDown { target } => {
                let table_pos = match target {
                    Target::Control { cell, .. } => cell.table,
                    Target::Cell(addr) => addr.table,
                    Target::Header { .. } | Target::Image { .. } => return Ok(EventOutcome::Ignored),
                };
                let Some(table) = c.tables.get_mut(table_pos) else {
                    return Ok(EventOutcome::Ignored);
                };
                match self.listeners.listener(container, table.instance) {
                    Some(listener) => listener.handle(table, table_pos, event, theme, prompt),
                    None => {
                        debug!(container, table_pos, "No listener for table instance");
                        Ok(EventOutcome::Ignored)
                    }
                }
            }
            TableEvent::Focus { cell: addr } => {
                let cell = cell_mut(&mut c.tables, addr)?;
                Ok(if editability::focus(cell, theme) {
                    EventOutcome::Focused { cell: *addr }
                } else {
                    EventOutcome::Ignored
                })
            }
            TableEvent::Blur { cell: addr } => {
                let parity = c
                    .tables
                    .get(addr.table)
                    .and_then(|t| t.rows.get(addr.row))
                    .map(|r| r.parity)
                    .ok_or_else(|| Container::cell_error(addr))?;
                let cell = cell_mut(&mut c.tables, addr)?;
                Ok(if editability::blur(cell, theme, parity) {
                    EventOutcome::Blurred { cell: *addr }
                } else {
                    EventOutcome::Ignored
                })
            }
            TableEvent::Input { cell: addr, text } => {
                let cell = cell_mut(&mut c.tables, addr)?;
                Ok(if editability::input(cell, text) {
                    EventOutcome::CellEdited { cell: *addr }
                } else {
                    EventOutcome::Ignored
                })
            }
            TableEvent::DragStart { image } => Ok(self.drag.drag_start(container, &mut c.tables, *image)),
            TableEvent::DragOver { cell } => Ok(self.drag.drag_over(&mut c.tables, cell, theme)),
            TableEvent::DragLeave { cell } => Ok(self.drag.drag_leave(&mut c.tables, cell, theme)),
            TableEvent::Drop { cell } => Ok(self.drag.drop(container, &mut c.tables, cell, theme)),
            TableEvent::DragEnd => Ok(EventOutcome::Ignored),
        }
    }

    /// Tabular value of the container's first table.
    pub fn extract(&self, container: &str) -> BoqResult<TableData> {
        let table = self.container(container)?.tables.first().ok_or(BoqError::NoTable)?;
        Ok(costing::extract(table))
    }

    pub fn export(&self, container: &str, title: &str) -> BoqResult<String> {
        let c = self.container(container)?;
        if c.tables.is_empty() {
            return Err(BoqError::NoTable);
        }
        Ok(export::export_document(&c.tables, title))
    }

    /// Fetch the stitched fragment for a file and mount it. On failure the
    /// container keeps its table and shows a diagnostic.
    pub async fn load_from_backend(
        &mut self,
        client: &BackendClient,
        container: &str,
        file_id: &FileId,
    ) -> BoqResult<NormalizeReport> {
        self.container(container)?;
        match client.stitch_tables(file_id).await {
            Ok(stitched) => self.mount_stitched(container, file_id, &stitched.stitched_html),
            Err(err) => {
                self.report_error(container, &err);
                Err(err)
            }
        }
    }

    /// Extract the container's first table and submit it for costing.
    pub async fn submit_costing(
        &mut self,
        client: &BackendClient,
        container: &str,
        factors: &CostingFactors,
        tax_rate: f64,
    ) -> BoqResult<CostingOutcome> {
        let data = self.extract(container)?;
        let file_id = self
            .container(container)?
            .file_id
            .clone()
            .or_else(|| self.context.current_file.clone())
            .ok_or(BoqError::NoTable)?;
        match costing::submit(client, &file_id, factors, &data, &self.theme, tax_rate).await {
            Ok(outcome) => {
                self.context.costing_file = Some(file_id);
                Ok(outcome)
            }
            Err(err) => {
                self.report_error(container, &err);
                Err(err)
            }
        }
    }
}

fn cell_mut<'a>(tables: &'a mut [Table], addr: &CellAddr) -> BoqResult<&'a mut crate::table::Cell> {
    tables
        .get_mut(addr.table)
        .and_then(|t| t.rows.get_mut(addr.row))
        .and_then(|r| r.cells.get_mut(addr.col))
        .ok_or_else(|| Container::cell_error(addr))
}
