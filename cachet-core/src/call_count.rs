use std::num::NonZeroUsize;

use parking_lot::Mutex;

use crate::CacheStats;

struct CallState<R> {
    value: Option<R>,
    remaining: usize,
}

/// An in-memory cache that recomputes its value every `n` calls.
///
/// With `n = 3` the first call computes, the next two return the cached
/// value, the fourth computes again, and so on. With `n = 1` every call
/// computes.
///
/// The cache holds a single value regardless of arguments. When the
/// `#[cache_for_n_calls]` macro is applied to a method, all instances share
/// one cache.
///
/// # Thread Safety
///
/// State is kept behind a `parking_lot::Mutex`. The lock is released while
/// the function runs, so a slow refresh does not block readers of an
/// already cached value and a recursive call does not deadlock. Two threads
/// arriving while no value is cached may both compute; the last one to
/// finish wins.
///
/// # Examples
///
/// ```
/// use cachet_core::CallCountCache;
/// use std::num::NonZeroUsize;
///
/// let cache = CallCountCache::new(NonZeroUsize::new(2).unwrap());
/// let mut runs = 0;
///
/// assert_eq!(cache.get_or_refresh(|| { runs += 1; runs }), 1);
/// assert_eq!(cache.get_or_refresh(|| { runs += 1; runs }), 1);
/// assert_eq!(cache.get_or_refresh(|| { runs += 1; runs }), 2);
/// ```
pub struct CallCountCache<R> {
    every: NonZeroUsize,
    state: Mutex<CallState<R>>,
    stats: Option<&'static CacheStats>,
}

impl<R: Clone> CallCountCache<R> {
    pub fn new(every: NonZeroUsize) -> Self {
        Self {
            every,
            state: Mutex::new(CallState {
                value: None,
                remaining: 0,
            }),
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: &'static CacheStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Refresh period in calls.
    pub fn every(&self) -> NonZeroUsize {
        self.every
    }

    /// Number of upcoming calls that will be served from the cache.
    pub fn calls_until_refresh(&self) -> usize {
        let state = self.state.lock();
        if state.value.is_some() {
            state.remaining
        } else {
            0
        }
    }

    /// Forgets the cached value; the next call computes.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.value = None;
        state.remaining = 0;
    }

    fn cached(&self) -> Option<R> {
        let mut state = self.state.lock();
        if state.remaining == 0 {
            return None;
        }
        let value = state.value.clone()?;
        state.remaining -= 1;
        Some(value)
    }

    fn fill(&self, value: R) {
        let mut state = self.state.lock();
        state.value = Some(value);
        state.remaining = self.every.get() - 1;
    }

    /// Returns the cached value, or runs `f` when a refresh is due.
    pub fn get_or_refresh<F>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if let Some(value) = self.cached() {
            self.record(CacheStats::record_hit);
            return value;
        }
        self.record(CacheStats::record_miss);

        let value = f();
        self.fill(value.clone());
        value
    }

    /// Like [`get_or_refresh`](Self::get_or_refresh) for fallible functions.
    ///
    /// Only `Ok` values are cached. An `Err` is returned to the caller and
    /// clears the cache, so the following call runs `f` again.
    pub fn get_or_refresh_result<E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce() -> Result<R, E>,
    {
        if let Some(value) = self.cached() {
            self.record(CacheStats::record_hit);
            return Ok(value);
        }
        self.record(CacheStats::record_miss);

        match f() {
            Ok(value) => {
                self.fill(value.clone());
                Ok(value)
            }
            Err(err) => {
                self.reset();
                Err(err)
            }
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn every(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_refresh_every_third_call() {
        let cache = CallCountCache::new(every(3));
        let runs = Cell::new(0);
        let compute = || {
            runs.set(runs.get() + 1);
            format!("result_{}", runs.get())
        };

        let results: Vec<String> = (0..7).map(|_| cache.get_or_refresh(compute)).collect();
        assert_eq!(
            results,
            vec![
                "result_1", "result_1", "result_1", "result_2", "result_2", "result_2", "result_3"
            ]
        );
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn test_every_call_with_one() {
        let cache = CallCountCache::new(every(1));
        let mut runs = 0;
        for expected in 1..=4 {
            assert_eq!(
                cache.get_or_refresh(|| {
                    runs += 1;
                    runs
                }),
                expected
            );
        }
        assert_eq!(cache.calls_until_refresh(), 0);
    }

    #[test]
    fn test_calls_until_refresh() {
        let cache = CallCountCache::new(every(3));
        assert_eq!(cache.calls_until_refresh(), 0);
        cache.get_or_refresh(|| 1);
        assert_eq!(cache.calls_until_refresh(), 2);
        cache.get_or_refresh(|| 1);
        assert_eq!(cache.calls_until_refresh(), 1);
        cache.get_or_refresh(|| 1);
        assert_eq!(cache.calls_until_refresh(), 0);
    }

    #[test]
    fn test_reset_forces_refresh() {
        let cache = CallCountCache::new(every(5));
        assert_eq!(cache.get_or_refresh(|| "old"), "old");
        cache.reset();
        assert_eq!(cache.get_or_refresh(|| "new"), "new");
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = CallCountCache::new(every(3));
        let runs = Cell::new(0);

        let r: Result<u32, String> = cache.get_or_refresh_result(|| {
            runs.set(runs.get() + 1);
            Err("unavailable".to_string())
        });
        assert!(r.is_err());

        let r: Result<u32, String> = cache.get_or_refresh_result(|| {
            runs.set(runs.get() + 1);
            Ok(10)
        });
        assert_eq!(r, Ok(10));

        let r: Result<u32, String> = cache.get_or_refresh_result(|| {
            runs.set(runs.get() + 1);
            Ok(20)
        });
        assert_eq!(r, Ok(10));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_recursive_refresh_does_not_deadlock() {
        let cache = CallCountCache::new(every(2));
        let outer = cache.get_or_refresh(|| cache.get_or_refresh(|| 1) + 1);
        assert_eq!(outer, 2);
    }

    #[test]
    fn test_stats_counts_hits_and_misses() {
        static STATS: CacheStats = CacheStats::new();
        let cache = CallCountCache::new(every(2)).with_stats(&STATS);
        for _ in 0..4 {
            cache.get_or_refresh(|| 0u8);
        }
        #[cfg(feature = "stats")]
        {
            assert_eq!(STATS.misses(), 2);
            assert_eq!(STATS.hits(), 2);
        }
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(CallCountCache::new(every(1000)));
        let runs = Arc::new(AtomicUsize::new(0));

        // Prime the cache so every thread below reads the same value
        let first = {
            let runs = Arc::clone(&runs);
            cache.get_or_refresh(move || runs.fetch_add(1, Ordering::SeqCst))
        };

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let runs = Arc::clone(&runs);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let runs = Arc::clone(&runs);
                        cache.get_or_refresh(move || runs.fetch_add(1, Ordering::SeqCst));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(first, 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(cache.calls_until_refresh(), 999 - 400);
    }
}
