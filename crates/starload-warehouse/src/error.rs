//! Warehouse error types.

/// Errors produced by [`Warehouse`](crate::Warehouse) operations.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("warehouse lock poisoned")]
    LockPoisoned,

    /// A fact referenced a dimension row that does not exist. The
    /// transformer's integrity gate should make this unreachable; hitting
    /// it means a fact batch bypassed validation.
    #[error("unresolved {dimension} key '{natural_id}' for fact '{fact_id}'")]
    UnresolvedKey {
        dimension: &'static str,
        natural_id: String,
        fact_id: String,
    },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, WarehouseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_poisoned_displays() {
        assert_eq!(
            WarehouseError::LockPoisoned.to_string(),
            "warehouse lock poisoned"
        );
    }

    #[test]
    fn unresolved_key_names_fact_and_dimension() {
        let err = WarehouseError::UnresolvedKey {
            dimension: "dim_products",
            natural_id: "P999".into(),
            fact_id: "O1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("dim_products"), "got: {msg}");
        assert!(msg.contains("P999"), "got: {msg}");
        assert!(msg.contains("O1"), "got: {msg}");
    }

    #[test]
    fn io_error_wraps() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = WarehouseError::Io(inner);
        assert!(err.to_string().contains("i/o"));
    }
}
