//! Export jobs: stage sequencing, temporary artifacts and the final output.

/// Temporary artifact bookkeeping.
pub mod artifacts;
mod orchestrator;

pub use artifacts::{ArtifactId, TempArtifactSet};
pub use orchestrator::{ExportOrchestrator, ExportReport, ExportState};
