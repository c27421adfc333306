//! crestcheck library
//!
//! Validates EVE Online catalog ids (inventory types, regions, ...) against
//! CREST, keeping a local time-bounded cache of what it has already looked up.

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod validator;

pub use catalog::{ErrorKind, FetchError, IndexKey};
pub use config::Settings;
pub use validator::{IdValidationError, Validator};
