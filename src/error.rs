use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening or querying the note store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("note store not found at {path} (is Notes installed, or pass --db?)")]
    SourceUnavailable { path: PathBuf },

    #[error("note store could not be opened: {source}")]
    SourceUnreadable {
        #[source]
        source: rusqlite::Error,
    },

    /// Both the primary join query and the simple fallback failed.
    #[error("note query failed: {source}")]
    QueryFailed {
        #[source]
        source: rusqlite::Error,
    },

    #[error("unexpected store schema: missing {missing}")]
    SchemaMismatch { missing: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A note body that survived none of the decode attempts.
///
/// This is not fatal for the export: the caller falls back to the
/// snippet or the encrypted-note marker.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("body is empty")]
    EmptyBody,

    #[error("not decodable as container, document, or note message")]
    Exhausted,
}
