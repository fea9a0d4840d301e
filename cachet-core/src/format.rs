use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// On-disk wrapper around a value in the binary format.
///
/// JSON cache files hold the bare value, so any JSON document of the right
/// shape placed at a cache path is read as a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope<T> {
    pub value: T,
}

/// Serialization format of a file cache.
///
/// # Variants
///
/// * `Json` - the bare value, pretty-printed with two-space indentation.
///   File extension `json`.
/// * `Binary` - compact `bincode` encoding of a [`CacheEnvelope`]. File
///   extension `bin`.
///
/// # Examples
///
/// ```
/// use cachet_core::CacheFormat;
///
/// assert_eq!(CacheFormat::Json.extension(), "json");
/// assert_eq!(CacheFormat::Binary.extension(), "bin");
///
/// let bytes = CacheFormat::Json.encode(&vec![1, 2, 3]).unwrap();
/// let back: Vec<i32> = CacheFormat::Json.decode(&bytes).unwrap();
/// assert_eq!(back, vec![1, 2, 3]);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheFormat {
    Json,
    Binary,
}

impl CacheFormat {
    /// File extension used for default cache file names.
    pub const fn extension(&self) -> &'static str {
        match self {
            CacheFormat::Json => "json",
            CacheFormat::Binary => "bin",
        }
    }

    /// Default cache file name for a function: `<function>.<extension>`.
    pub fn file_name_for(&self, function: &str) -> String {
        format!("{}.{}", function, self.extension())
    }

    /// Encodes `value`: bare for `Json`, in a [`CacheEnvelope`] for `Binary`.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            CacheFormat::Json => Ok(serde_json::to_vec_pretty(value)?),
            CacheFormat::Binary => Ok(bincode::serialize(&CacheEnvelope { value })?),
        }
    }

    /// Decodes bytes written by [`CacheFormat::encode`].
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            CacheFormat::Json => Ok(serde_json::from_slice(bytes)?),
            CacheFormat::Binary => {
                let envelope: CacheEnvelope<T> = bincode::deserialize(bytes)?;
                Ok(envelope.value)
            }
        }
    }
}

/// Converts a format name to a `CacheFormat`.
///
/// `"json"` maps to `Json`; `"bin"`, `"binary"` and `"bincode"` map to
/// `Binary`. Matching is case-insensitive and anything else maps to `Json`.
impl From<&str> for CacheFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "bin" | "binary" | "bincode" => CacheFormat::Binary,
            _ => CacheFormat::Json,
        }
    }
}
