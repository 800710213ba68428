use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The conditional update kept losing the version race. The retry budget
    /// is generous enough that hitting this means something is wedging the
    /// table, not ordinary contention.
    #[error("aggregate update contention persisted after {attempts} attempts")]
    Contention { attempts: u32 },
}
