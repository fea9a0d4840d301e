use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CacheError, Result};
use crate::{CacheFormat, CacheStats, PathTemplate};

/// A single-slot cache persisted to one file.
///
/// `FileCache` is what the `cache_to_*` and `dynamic_cache_to_*` attribute
/// macros expand to. It holds no value in memory: every lookup reads the
/// file, every store rewrites it. The key is the file path alone, so the
/// arguments of the cached function do not take part in it.
///
/// # Type Parameters
///
/// * `R` - The cached value type. Reading and writing require
///   `Serialize + DeserializeOwned`.
///
/// # Two APIs
///
/// - [`get`](Self::get) / [`insert`](Self::insert) return every failure to
///   the caller.
/// - [`lookup`](Self::lookup) / [`store`](Self::store) log failures at
///   `warn` and carry on, treating an unreadable file as a miss. Generated
///   code uses these so a broken cache never changes what the decorated
///   function returns.
///
/// # Examples
///
/// ```
/// use cachet_core::{CacheFormat, FileCache};
///
/// let dir = tempfile::tempdir().unwrap();
/// let cache = FileCache::<Vec<u32>>::new(dir.path().join("ids.json"), CacheFormat::Json);
///
/// assert_eq!(cache.get().unwrap(), None);
/// cache.insert(&vec![1, 2, 3]).unwrap();
/// assert_eq!(cache.get().unwrap(), Some(vec![1, 2, 3]));
///
/// assert!(cache.invalidate().unwrap());
/// assert_eq!(cache.get().unwrap(), None);
/// ```
pub struct FileCache<R> {
    path: PathBuf,
    format: CacheFormat,
    stats: Option<&'static CacheStats>,
    _marker: PhantomData<fn() -> R>,
}

impl<R> FileCache<R> {
    /// Creates a cache backed by a fixed file path.
    ///
    /// No directory is created until the first [`insert`](Self::insert).
    pub fn new(path: impl Into<PathBuf>, format: CacheFormat) -> Self {
        Self {
            path: path.into(),
            format,
            stats: None,
            _marker: PhantomData,
        }
    }

    /// Creates a cache whose directory is rendered from `instance`.
    ///
    /// The directory is `template` rendered with the serialized fields of
    /// `instance` (see [`PathTemplate::render`]); the cache file is
    /// `file_name` inside it. The directory tree is created here, so it
    /// exists even when the cache file already does.
    ///
    /// # Errors
    ///
    /// Template errors as described on [`PathTemplate`], or
    /// [`CacheError::Io`] when the directory cannot be created.
    pub fn for_instance<T: Serialize + ?Sized>(
        template: &str,
        instance: &T,
        file_name: &str,
        format: CacheFormat,
    ) -> Result<Self> {
        let dir = PathTemplate::parse(template)?.render(instance)?;
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
        }
        Ok(Self::new(dir.join(file_name), format))
    }

    /// Like [`for_instance`](Self::for_instance) but logs a failure and
    /// returns `None`, counting it against `stats`.
    pub fn resolve<T: Serialize + ?Sized>(
        template: &str,
        instance: &T,
        file_name: &str,
        format: CacheFormat,
        stats: &'static CacheStats,
    ) -> Option<Self> {
        match Self::for_instance(template, instance, file_name, format) {
            Ok(cache) => Some(cache.with_stats(stats)),
            Err(err) => {
                log::warn!(
                    "cache `{}` for template `{}` is unavailable, running uncached: {}",
                    file_name,
                    template,
                    err
                );
                #[cfg(feature = "stats")]
                stats.record_failure();
                None
            }
        }
    }

    /// Attaches counters updated by [`lookup`](Self::lookup) and
    /// [`store`](Self::store).
    pub fn with_stats(mut self, stats: &'static CacheStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> CacheFormat {
        self.format
    }

    /// Returns true if the cache file is present.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Deletes the cache file.
    ///
    /// Returns `Ok(true)` if a file was removed and `Ok(false)` if there was
    /// nothing to remove.
    pub fn invalidate(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::debug!("invalidated cache file {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&self.path, e)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    #[cfg(feature = "stats")]
    fn record(&self, f: impl FnOnce(&CacheStats)) {
        if let Some(stats) = self.stats {
            f(stats);
        }
    }

    #[cfg(not(feature = "stats"))]
    fn record(&self, _f: impl FnOnce(&CacheStats)) {}
}

impl<R: Serialize + DeserializeOwned> FileCache<R> {
    /// Reads the cached value.
    ///
    /// Returns `Ok(None)` when the cache file does not exist.
    ///
    /// # Errors
    ///
    /// [`CacheError::Io`] if the file exists but cannot be read, or a decode
    /// error if its contents do not decode as `R` in this format.
    pub fn get(&self) -> Result<Option<R>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(&self.path, e)),
        };
        self.format.decode(&bytes).map(Some)
    }

    /// Writes `value` to the cache file, replacing any previous content.
    ///
    /// Parent directories are created as needed. The value is written to a
    /// sibling `.tmp` file first and renamed into place, so readers never
    /// observe a half-written cache.
    pub fn insert(&self, value: &R) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
            }
        }

        let bytes = self.format.encode(value)?;

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).map_err(|e| CacheError::io(&temp_path, e))?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| CacheError::io(&temp_path, e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| CacheError::io(&self.path, e))?;

        Ok(())
    }

    /// Reads the cached value, logging and swallowing failures.
    pub fn lookup(&self) -> Option<R> {
        self.lookup_inner(false)
    }

    /// Like [`lookup`](Self::lookup), but a stored null (`None`, `()`) counts
    /// as a miss so the caller recomputes it.
    ///
    /// Used by the fixed-path caches.
    pub fn lookup_present(&self) -> Option<R> {
        self.lookup_inner(true)
    }

    fn lookup_inner(&self, skip_null: bool) -> Option<R> {
        match self.get() {
            Ok(Some(value)) if skip_null && is_null(&value) => {
                log::debug!("cache holds null, recomputing: {}", self.path.display());
                self.record(CacheStats::record_miss);
                None
            }
            Ok(Some(value)) => {
                log::debug!("cache hit: {}", self.path.display());
                self.record(CacheStats::record_hit);
                Some(value)
            }
            Ok(None) => {
                log::debug!("cache miss: {}", self.path.display());
                self.record(CacheStats::record_miss);
                None
            }
            Err(err) => {
                log::warn!(
                    "ignoring unreadable cache file {}: {}",
                    self.path.display(),
                    err
                );
                self.record(|s| {
                    s.record_failure();
                    s.record_miss();
                });
                None
            }
        }
    }

    /// Writes `value`, logging and swallowing failures.
    pub fn store(&self, value: &R) {
        match self.insert(value) {
            Ok(()) => self.record(CacheStats::record_store),
            Err(err) => {
                log::warn!(
                    "could not write cache file {}: {}",
                    self.path.display(),
                    err
                );
                self.record(CacheStats::record_failure);
            }
        }
    }

    /// Stores the `Ok` value of `result`; an `Err` leaves the cache untouched.
    pub fn store_result<E>(&self, result: &std::result::Result<R, E>) {
        if let Ok(value) = result {
            self.store(value);
        }
    }
}

fn is_null<R: Serialize>(value: &R) -> bool {
    matches!(serde_json::to_value(value), Ok(serde_json::Value::Null))
}

impl<R> std::fmt::Debug for FileCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("path", &self.path)
            .field("format", &self.format)
            .finish()
    }
}
