//! Cached standard-input reader.
//!
//! Include expansion and re-parses may need the streamed source more
//! than once, but stdin can only be consumed once; the first read is
//! buffered process-wide and replayed on later calls.

use std::io::Read;
use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;

static STDIN_CACHE: Lazy<Mutex<Option<String>>> = Lazy::new(|| Mutex::new(None));

/// Read all of standard input, returning the cached buffer after the
/// first call.
pub fn read_stdin() -> std::io::Result<String> {
    let mut cache = STDIN_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(buffered) = cache.as_ref() {
        return Ok(buffered.clone());
    }
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    *cache = Some(buffer.clone());
    Ok(buffer)
}

/// Drop the cached buffer so the next [`read_stdin`] reads afresh.
/// Intended for tests.
pub fn reset_stdin_cache() {
    let mut cache = STDIN_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    *cache = None;
}

/// Seed the cache without touching the real stream. Intended for tests.
pub fn seed_stdin_cache(text: impl Into<String>) {
    let mut cache = STDIN_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    *cache = Some(text.into());
}
