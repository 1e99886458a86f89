// Public module exports for the `boq` binary and integration tests
pub mod backend;
pub mod cli;
pub mod config;
pub mod costing;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod logging;
pub mod prompt;
pub mod session;
pub mod stitch;
pub mod table;

pub use config::{BoqConfig, Theme};
pub use error::{BoqError, BoqResult};
pub use session::{Workspace, STITCHED_CONTAINER};
