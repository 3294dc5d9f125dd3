/// All errors that can be returned by an `ArchiveStorage` implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No record of the given kind with the given id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A record of the given kind with the given id (or unique key) already exists.
    #[error("{kind} already exists: {id}")]
    Duplicate { kind: &'static str, id: String },

    /// The write would violate a referential or state constraint.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A backend-specific storage error (I/O, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StorageError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn duplicate(kind: &'static str, id: impl Into<String>) -> Self {
        StorageError::Duplicate {
            kind,
            id: id.into(),
        }
    }
}
