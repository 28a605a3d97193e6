//! Session-scoped cache of reference collections.
//!
//! Classes, teachers, subjects, rooms and the period grid are fetched at most
//! once per logged-in session, on first use. Each collection lives in a moka
//! cache keyed by a session epoch: login activates a fresh epoch and logout
//! deactivates it, so a collection fetched for one session can never be read
//! under another, even when its fetch finishes after the session ended.
//!
//! `try_get_with` gives the single-flight behaviour: concurrent first callers
//! for a collection share one fetch, and a failed fetch is not stored, so the
//! next call tries again.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::try_join;
use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::domain::{Period, ResourceType, Room, SchoolClass, Subject, Teacher};
use crate::untis::{
    UntisError, UntisSource, convert_classes, convert_period_grid, convert_rooms,
    convert_subjects, convert_teachers, resolve_class_teachers,
};

/// A cached, shared collection.
pub type Collection<T> = Arc<Vec<T>>;

/// Identifies one logged-in session of a client.
type Epoch = u64;

/// Epoch value meaning "no active session".
const NO_SESSION: Epoch = 0;

/// Per-session cache of WebUntis reference collections.
pub struct ResourceCache {
    /// Epoch of the active session, or `NO_SESSION`.
    current: AtomicU64,
    next_epoch: AtomicU64,
    classes: MokaCache<Epoch, Collection<SchoolClass>>,
    teachers: MokaCache<Epoch, Collection<Teacher>>,
    subjects: MokaCache<Epoch, Collection<Subject>>,
    rooms: MokaCache<Epoch, Collection<Room>>,
    periods: MokaCache<Epoch, Collection<Period>>,
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceCache {
    /// Create an inactive cache. Every getter yields an empty collection
    /// until [`activate`](Self::activate) is called.
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(NO_SESSION),
            next_epoch: AtomicU64::new(NO_SESSION + 1),
            classes: MokaCache::builder().build(),
            teachers: MokaCache::builder().build(),
            subjects: MokaCache::builder().build(),
            rooms: MokaCache::builder().build(),
            periods: MokaCache::builder().build(),
        }
    }

    /// Start a new session. Nothing is fetched until first use.
    pub fn activate(&self) -> u64 {
        self.invalidate_all();
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        self.current.store(epoch, Ordering::Release);
        debug!(epoch, "resource cache activated");
        epoch
    }

    /// End the session and drop everything cached for it.
    pub fn clear(&self) {
        let epoch = self.current.swap(NO_SESSION, Ordering::AcqRel);
        self.invalidate_all();
        if epoch != NO_SESSION {
            debug!(epoch, "resource cache cleared");
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.load(Ordering::Acquire) != NO_SESSION
    }

    fn invalidate_all(&self) {
        self.classes.invalidate_all();
        self.teachers.invalidate_all();
        self.subjects.invalidate_all();
        self.rooms.invalidate_all();
        self.periods.invalidate_all();
    }

    /// A view of the cache pinned to the session active right now.
    ///
    /// Everything read through it belongs to that one session. Once the
    /// session ends, the view yields empty collections and never fetches.
    pub fn session(&self) -> CacheSession<'_> {
        CacheSession {
            cache: self,
            epoch: self.current.load(Ordering::Acquire),
        }
    }

    /// School classes, with head teachers resolved against the teacher list.
    pub async fn classes<S: UntisSource>(
        &self,
        source: &S,
    ) -> Result<Collection<SchoolClass>, UntisError> {
        self.session().classes(source).await
    }

    /// Teachers of the school.
    pub async fn teachers<S: UntisSource>(
        &self,
        source: &S,
    ) -> Result<Collection<Teacher>, UntisError> {
        self.session().teachers(source).await
    }

    pub async fn subjects<S: UntisSource>(
        &self,
        source: &S,
    ) -> Result<Collection<Subject>, UntisError> {
        self.session().subjects(source).await
    }

    pub async fn rooms<S: UntisSource>(&self, source: &S) -> Result<Collection<Room>, UntisError> {
        self.session().rooms(source).await
    }

    /// The period grid.
    pub async fn periods<S: UntisSource>(
        &self,
        source: &S,
    ) -> Result<Collection<Period>, UntisError> {
        self.session().periods(source).await
    }
}

/// The cache as seen by one session. See [`ResourceCache::session`].
#[derive(Clone, Copy)]
pub struct CacheSession<'a> {
    cache: &'a ResourceCache,
    epoch: Epoch,
}

impl CacheSession<'_> {
    /// Whether the pinned session is still the active one.
    pub fn is_current(&self) -> bool {
        self.epoch != NO_SESSION && self.cache.current.load(Ordering::Acquire) == self.epoch
    }

    pub async fn classes<S: UntisSource>(
        &self,
        source: &S,
    ) -> Result<Collection<SchoolClass>, UntisError> {
        self.memoized(&self.cache.classes, "classes", async {
            let (rows, teachers) = try_join!(
                source.fetch_resource_list(ResourceType::SchoolClass),
                self.teachers(source),
            )?;
            let classes = convert_classes(rows)?;
            Ok(resolve_class_teachers(classes, &teachers))
        })
        .await
    }

    pub async fn teachers<S: UntisSource>(
        &self,
        source: &S,
    ) -> Result<Collection<Teacher>, UntisError> {
        self.memoized(&self.cache.teachers, "teachers", async {
            convert_teachers(source.fetch_resource_list(ResourceType::Teacher).await?)
        })
        .await
    }

    pub async fn subjects<S: UntisSource>(
        &self,
        source: &S,
    ) -> Result<Collection<Subject>, UntisError> {
        self.memoized(&self.cache.subjects, "subjects", async {
            convert_subjects(source.fetch_resource_list(ResourceType::Subject).await?)
        })
        .await
    }

    pub async fn rooms<S: UntisSource>(&self, source: &S) -> Result<Collection<Room>, UntisError> {
        self.memoized(&self.cache.rooms, "rooms", async {
            convert_rooms(source.fetch_resource_list(ResourceType::Room).await?)
        })
        .await
    }

    pub async fn periods<S: UntisSource>(
        &self,
        source: &S,
    ) -> Result<Collection<Period>, UntisError> {
        self.memoized(&self.cache.periods, "periods", async {
            convert_period_grid(source.fetch_period_grid().await?)
        })
        .await
    }

    /// Return the collection cached for the pinned session, fetching it with
    /// `fetch` if that session has not loaded it yet.
    async fn memoized<T, F>(
        &self,
        cache: &MokaCache<Epoch, Collection<T>>,
        name: &'static str,
        fetch: F,
    ) -> Result<Collection<T>, UntisError>
    where
        T: Send + Sync + 'static,
        F: Future<Output = Result<Vec<T>, UntisError>>,
    {
        let epoch = self.epoch;
        if !self.is_current() {
            return Ok(Arc::default());
        }

        let collection = cache
            .try_get_with(epoch, async {
                debug!(collection = name, epoch, "fetching");
                let items = fetch.await?;
                debug!(collection = name, epoch, count = items.len(), "cached");
                Ok::<_, UntisError>(Arc::new(items))
            })
            .await
            .map_err(Arc::unwrap_or_clone)?;

        // The session ended while fetching; don't keep its data around.
        if !self.is_current() {
            cache.invalidate(&epoch).await;
        }

        Ok(collection)
    }
}
