use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use serde_json::Value;
use std::path::Path;

use crate::error::StorageError;

pub mod analysis;
pub mod company;
pub mod goal;
pub mod kpi;
pub mod task;
pub mod team;
pub mod user;

pub use task::TaskFilter;
pub use goal::ProgressEntry;
pub use user::UserSeed;

/// Unified access to the application database.
///
/// Every method is `async` and runs on SeaORM. Entity-specific methods live
/// in the submodules of this module.
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    /// Connects to the database and applies pending migrations.
    ///
    /// - `db_url`: full connection URL, e.g. `sqlite:///data/vexec.db?mode=rwc`
    /// - `data_dir`: local data directory, created if missing
    pub async fn new(db_url: &str, data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db = Database::connect(db_url).await?;

        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;

        tracing::info!(db_url = %db_url, "Initialized store");
        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Cheap liveness probe used by the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.db.ping().await?;
        Ok(())
    }
}

pub(crate) fn parse_json(column: &'static str, raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(raw).map_err(|source| StorageError::Json { column, source }.into())
}

/// `null` payloads are stored as an empty object.
pub(crate) fn to_json_text(column: &'static str, value: &Value) -> Result<String> {
    if value.is_null() {
        return Ok("{}".to_owned());
    }
    serde_json::to_string(value).map_err(|source| StorageError::Json { column, source }.into())
}

pub(crate) fn parse_enum<T>(column: &'static str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
{
    raw.parse::<T>().map_err(|_| {
        StorageError::InvalidValue {
            column,
            value: raw.to_owned(),
        }
        .into()
    })
}
