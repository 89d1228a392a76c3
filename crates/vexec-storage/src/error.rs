/// Typed failures raised by [`Store`](crate::Store) methods.
///
/// Store methods return `anyhow::Result`; callers that need to tell these
/// cases apart use `downcast_ref::<StorageError>()`.
///
/// # Examples
///
/// ```rust
/// use vexec_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "company",
///     id: "42".to_string(),
/// };
/// assert!(err.to_string().contains("company"));
/// assert!(err.is_not_found());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A referenced record does not exist.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// A column held a value that does not map onto the domain type.
    #[error("Storage: invalid value '{value}' in column '{column}'")]
    InvalidValue { column: &'static str, value: String },

    /// JSON column failed to (de)serialize.
    #[error("Storage: JSON error in column '{column}': {source}")]
    Json {
        column: &'static str,
        source: serde_json::Error,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn company_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "company",
            id: id.to_owned(),
        }
    }
}
