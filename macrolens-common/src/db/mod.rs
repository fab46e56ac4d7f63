//! Local persistence
//!
//! MacroLens keeps everything it persists in a single SQLite `settings`
//! key-value table: the scan history document and the API key.

pub mod init;
pub mod settings;

pub use init::init_database;
pub use settings::{KeyValueStore, MemoryStore, SqliteSettingsStore};
