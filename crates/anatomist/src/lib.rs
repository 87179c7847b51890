//! # The Anatomist: Bundled Analysis Passes
//!
//! **Role**: Reads source text and proposes jobs for the registry.
//!
//! **Passes**:
//! - [`ReorderPass`]: moves a declaration in front of the earliest
//!   declaration that mentions it.
//! - [`RepairPass`]: removes trailing whitespace, one line per job.
//!
//! **Design**:
//! - Structure comes from a line scanner ([`declarations`]), not a grammar.
//! - Every payload records the checksum of the text it was derived from, so
//!   `execute` refuses to run against anything else.

pub mod declarations;
pub mod path_util;
pub mod reorder;
pub mod repair;
pub mod scan;

pub use declarations::Declaration;
pub use reorder::ReorderPass;
pub use repair::RepairPass;

use registry::AnalysisPass;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum AnatomistError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("{path} is outside the workspace root {root}")]
    OutsideRoot { path: String, root: String },
    #[error("non-UTF-8 path: {0}")]
    NonUtf8(String),
}

/// Which bundled passes a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassSelection {
    pub reorder: bool,
    pub repair: bool,
}

impl Default for PassSelection {
    fn default() -> Self {
        Self {
            reorder: true,
            repair: true,
        }
    }
}

impl PassSelection {
    pub fn passes(&self) -> Vec<Rc<dyn AnalysisPass>> {
        let mut passes: Vec<Rc<dyn AnalysisPass>> = Vec::new();
        if self.reorder {
            passes.push(Rc::new(ReorderPass::new()));
        }
        if self.repair {
            passes.push(Rc::new(RepairPass::new()));
        }
        passes
    }
}
