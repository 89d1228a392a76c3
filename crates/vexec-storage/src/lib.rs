//! Persistence layer for the Virtual Executive server.
//!
//! [`Store`] owns a single SeaORM connection (SQLite by default) and exposes
//! async CRUD methods per entity. The schema is managed by the `migration`
//! crate and applied on startup.

pub mod auth;
pub mod entities;
pub mod error;
pub mod store;


pub use error::StorageError;
pub use store::{ProgressEntry, Store, TaskFilter, UserSeed};
