use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("name must not be empty")]
    EmptyName,

    #[error("{0} already exists")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("unknown tag id {0}")]
    UnknownTag(u64),

    #[error("unknown category id {0}")]
    UnknownCategory(u64),

    #[error("DB lock poisoned: {0}")]
    Lock(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// True when `err` is SQLite rejecting a row for a UNIQUE or PRIMARY KEY clash.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}
