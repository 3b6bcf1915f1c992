//! Profile photo cache
//!
//! Caches confirmed lookup outcomes only: a photo reference, or the
//! confirmed absence of one. Transport failures are surfaced to the caller
//! and NOT cached, so the next lookup retries instead of pinning a
//! transient error as a permanent "no photo".

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::Result;

/// A confirmed profile photo lookup outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoLookup {
    /// The user has a photo; the Bot API file reference for it
    Found(String),
    /// The lookup confirmed the user has no profile photo
    Absent,
}

/// Per-user profile photo cache, populated lazily on first lookup
///
/// Entries never expire and are never evicted for the life of the process.
#[derive(Debug, Default)]
pub struct ProfilePhotoCache {
    entries: Mutex<HashMap<i64, PhotoLookup>>,
}

impl ProfilePhotoCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached photo reference for `user_id`, fetching on first
    /// lookup
    ///
    /// A cached entry (photo or confirmed absence) short-circuits without
    /// any outbound call. Otherwise `fetch` runs exactly once; its confirmed
    /// outcome is cached and returned.
    ///
    /// # Errors
    ///
    /// Returns the fetch error unchanged. Failed lookups are not cached.
    pub async fn get_or_fetch<F, Fut>(&self, user_id: i64, fetch: F) -> Result<Option<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<String>>>,
    {
        if let Some(cached) = self.lock().get(&user_id).cloned() {
            tracing::debug!(user_id, "serving cached profile photo");
            return Ok(match cached {
                PhotoLookup::Found(file_id) => Some(file_id),
                PhotoLookup::Absent => None,
            });
        }

        match fetch().await? {
            Some(file_id) => {
                self.lock()
                    .insert(user_id, PhotoLookup::Found(file_id.clone()));
                tracing::debug!(user_id, "cached profile photo");
                Ok(Some(file_id))
            }
            None => {
                self.lock().insert(user_id, PhotoLookup::Absent);
                tracing::debug!(user_id, "cached profile photo absence");
                Ok(None)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, PhotoLookup>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
