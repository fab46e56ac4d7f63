//! macrolens-scan library
//!
//! Front end of the food scanner: image intake, the scan state machine, and
//! terminal rendering. The binary in `main.rs` wires these to the command line.

pub mod ingest;
pub mod orchestrator;
pub mod render;

pub use ingest::{ingest_file, IngestedImage};
pub use orchestrator::{Dispatch, ScanError, ScanSession, ScanState};
