use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving, reading or writing a cache.
///
/// Generated code never surfaces these to the caller: [`FileCache::lookup`]
/// and [`FileCache::store`] log them and fall back to running the function.
/// They are returned as-is by the explicit [`FileCache::get`] and
/// [`FileCache::insert`] API.
///
/// [`FileCache::lookup`]: crate::FileCache::lookup
/// [`FileCache::store`]: crate::FileCache::store
/// [`FileCache::get`]: crate::FileCache::get
/// [`FileCache::insert`]: crate::FileCache::insert
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("invalid path template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("template field `{field}` is not present on the instance")]
    MissingField { field: String },

    #[error("template field `{field}` cannot be rendered into a path: {reason}")]
    UnrenderableField { field: String, reason: String },

    #[error("template instance must serialize to a map of fields, got {found}")]
    NotAStruct { found: &'static str },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encoding error: {0}")]
    Binary(#[from] bincode::Error),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
