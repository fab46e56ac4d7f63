//! Relay API wire types shared by the relay server and the relay client

pub mod types;

pub use types::{AnalyzeRequest, ErrorKind, RelayErrorBody};
