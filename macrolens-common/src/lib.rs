//! # MacroLens Common Library
//!
//! Shared code for the MacroLens scanner and relay:
//! - Nutrition data model and model-output parsing
//! - Bounded scan history and credential persistence
//! - Settings key-value store (SQLite)
//! - Inference clients (direct and relay)
//! - Relay API wire types
//! - Configuration loading

pub mod api;
pub mod config;
pub mod credential;
pub mod db;
pub mod error;
pub mod history;
pub mod inference;
pub mod nutrition;
pub mod parser;

pub use credential::Credential;
pub use error::{Error, Result};
pub use history::{HistoryEntry, HistoryStore};
pub use nutrition::{Confidence, NutritionRecord};
