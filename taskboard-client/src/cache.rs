/// Keyed cache of server reads with mutation-driven invalidation
///
/// The cache mediates every read the presentation layer makes. Reads are
/// identified by a structural `QueryKey`; two reads with the same key share
/// one entry and one in-flight request.
///
/// # Entry lifecycle
///
/// ```text
/// idle → loading → success
///                → error
/// success | error → loading   (invalidation with subscribers, or re-read)
/// ```
///
/// Entries only go back to `loading` when something asks for it: a read of
/// an errored or stale entry, or an invalidation while the entry has
/// subscribers. They never refresh on their own.
///
/// # Ordering
///
/// Every fetch is stamped with a generation number. A response is applied
/// only if its generation is still the entry's latest, so a slow early
/// response can never overwrite a newer one (last issued wins, not last
/// completed).
///
/// # Subscriptions
///
/// `read` returns a `Subscription`. Clones count as extra subscribers and
/// dropping one releases it. An entry with no subscribers is kept for the
/// configured retention so a quick re-subscription is served from memory,
/// then `collect_garbage` evicts it.
///
/// Fetches run on `tokio::spawn`, so `read`, `invalidate` and `mutate`
/// must be called from within a Tokio runtime.
///
/// # Example
///
/// ```no_run
/// use taskboard_client::cache::{QueryKey, ResourceCache};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = ResourceCache::new(Duration::from_secs(300));
/// let key = QueryKey::new("greeting");
///
/// let mut sub = cache.read(key.clone(), || async { Ok::<_, taskboard_client::error::ClientError>("hello".to_string()) });
/// let value = sub.settled().await?;
/// assert_eq!(value.as_str(), "hello");
///
/// // A write that affects the key
/// cache.mutate(async { Ok::<_, taskboard_client::error::ClientError>(()) }, &[key]).await?;
/// # Ok(())
/// # }
/// ```

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{ClientError, ClientResult};

/// One component of a cache key
///
/// `Null` stands for an absent optional parameter, so `("tasks", 1, null)`
/// and `("tasks", 1, "null")` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
    Null,
    Int(i64),
    Text(String),
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        KeySegment::Text(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        KeySegment::Text(value)
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        KeySegment::Int(value)
    }
}

impl<T: Into<KeySegment>> From<Option<T>> for KeySegment {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(KeySegment::Null)
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Null => write!(f, "null"),
            KeySegment::Int(n) => write!(f, "{}", n),
            KeySegment::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Structural cache key: resource name followed by every parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    /// Key for a resource with no parameters
    pub fn new(resource: &str) -> Self {
        QueryKey(vec![KeySegment::from(resource)])
    }

    /// Appends a parameter
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    /// Resource name (first segment)
    pub fn resource(&self) -> Option<&str> {
        match self.0.first() {
            Some(KeySegment::Text(name)) => Some(name),
            _ => None,
        }
    }

    /// Checks if `prefix` matches the leading segments of this key
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", segment)?;
        }
        write!(f, ")")
    }
}

/// Entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

impl EntryStatus {
    /// Checks if the entry has a result (success or error)
    pub fn is_settled(&self) -> bool {
        matches!(self, EntryStatus::Success | EntryStatus::Error)
    }
}

type CacheValue = Arc<dyn Any + Send + Sync>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, ClientResult<CacheValue>> + Send + Sync>;

/// Untyped entry state broadcast to subscribers
#[derive(Clone)]
struct EntryState {
    status: EntryStatus,
    value: Option<CacheValue>,
    error: Option<ClientError>,
    stale: bool,
}

impl EntryState {
    fn idle() -> Self {
        Self {
            status: EntryStatus::Idle,
            value: None,
            error: None,
            stale: false,
        }
    }
}

/// Typed view of an entry at one point in time
#[derive(Debug)]
pub struct EntrySnapshot<T> {
    pub status: EntryStatus,

    /// Latest successful value; kept while a refetch is loading or failed
    pub value: Option<Arc<T>>,

    /// Error of the latest fetch, if it failed
    pub error: Option<ClientError>,

    /// Set by invalidation, cleared when a new fetch starts
    pub is_stale: bool,
}

impl<T> EntrySnapshot<T> {
    pub fn is_loading(&self) -> bool {
        self.status == EntryStatus::Loading
    }

    pub fn data(&self) -> Option<&T> {
        self.value.as_deref()
    }
}

impl<T> Clone for EntrySnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            value: self.value.clone(),
            error: self.error.clone(),
            is_stale: self.is_stale,
        }
    }
}

struct Entry {
    /// Unique per entry; distinguishes a re-created entry from an evicted one
    id: u64,
    fetcher: Fetcher,
    state: watch::Sender<EntryState>,
    subscribers: usize,
    /// Generation of the latest issued fetch
    generation: u64,
    released_at: Option<Instant>,
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    retain: Duration,
    counter: AtomicU64,
}

impl Inner {
    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Shared cache handle
///
/// Cloning yields another handle to the same cache.
#[derive(Clone)]
pub struct ResourceCache {
    inner: Arc<Inner>,
}

/// Non-owning cache handle
///
/// Used by callbacks stored inside objects the cache itself keeps alive.
#[derive(Clone)]
pub struct WeakResourceCache {
    inner: Weak<Inner>,
}

impl WeakResourceCache {
    pub fn upgrade(&self) -> Option<ResourceCache> {
        self.inner.upgrade().map(|inner| ResourceCache { inner })
    }
}

impl ResourceCache {
    /// Creates a cache that keeps unsubscribed entries for `retain`
    pub fn new(retain: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                retain,
                counter: AtomicU64::new(0),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakResourceCache {
        WeakResourceCache {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribes to `key`, fetching with `fetcher` if needed
    ///
    /// An existing entry that is loading, or succeeded and is not stale, is
    /// shared as is. Anything else (new, errored, stale) starts a fetch.
    /// The most recent `fetcher` is kept for later refetches.
    pub fn read<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || {
            let fut = fetcher();
            async move { fut.await.map(|value| Arc::new(value) as CacheValue) }.boxed()
        });

        self.collect_garbage();

        let mut entries = self.inner.entries.lock();
        let entry = entries.entry(key.clone()).or_insert_with(|| {
            let (state, _) = watch::channel(EntryState::idle());
            Entry {
                id: self.inner.next_id(),
                fetcher: fetcher.clone(),
                state,
                subscribers: 0,
                generation: 0,
                released_at: None,
            }
        });

        entry.fetcher = fetcher;
        entry.subscribers += 1;
        entry.released_at = None;

        let needs_fetch = {
            let state = entry.state.borrow();
            match state.status {
                EntryStatus::Idle | EntryStatus::Error => true,
                EntryStatus::Success => state.stale,
                EntryStatus::Loading => false,
            }
        };

        if needs_fetch {
            start_fetch(&self.inner, &key, entry);
        } else {
            tracing::trace!(%key, "cache hit");
        }

        Subscription {
            cache: self.clone(),
            key,
            entry_id: entry.id,
            rx: entry.state.subscribe(),
            _marker: PhantomData,
        }
    }

    /// Runs a write, then invalidates every entry under `invalidates`
    ///
    /// Nothing is invalidated if the write fails.
    pub async fn mutate<T, Fut>(&self, write: Fut, invalidates: &[QueryKey]) -> ClientResult<T>
    where
        Fut: Future<Output = ClientResult<T>>,
    {
        let value = write.await?;
        self.invalidate(invalidates);
        Ok(value)
    }

    /// Marks entries under any of `prefixes` stale
    ///
    /// Entries with subscribers refetch immediately; the rest refetch on
    /// their next read.
    pub fn invalidate(&self, prefixes: &[QueryKey]) {
        let mut entries = self.inner.entries.lock();

        for (key, entry) in entries.iter_mut() {
            if !prefixes.iter().any(|prefix| key.starts_with(prefix)) {
                continue;
            }

            if entry.subscribers > 0 {
                tracing::debug!(%key, "invalidated, refetching");
                start_fetch(&self.inner, key, entry);
            } else {
                tracing::debug!(%key, "invalidated, no subscribers");
                entry.state.send_modify(|state| state.stale = true);
            }
        }
    }

    /// Drops every entry under any of `prefixes`
    ///
    /// Subscribers of removed entries see the channel close; their pending
    /// `settled` calls return `Cancelled`.
    pub fn remove_matching(&self, prefixes: &[QueryKey]) {
        let removed: Vec<Entry> = {
            let mut entries = self.inner.entries.lock();
            let keys: Vec<QueryKey> = entries
                .keys()
                .filter(|key| prefixes.iter().any(|prefix| key.starts_with(prefix)))
                .cloned()
                .collect();
            keys.iter().filter_map(|key| entries.remove(key)).collect()
        };

        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "removed cache entries");
        }
    }

    /// Drops every entry (logout)
    pub fn clear(&self) {
        let removed: Vec<Entry> = self.inner.entries.lock().drain().map(|(_, e)| e).collect();
        for entry in &removed {
            entry.state.send_replace(EntryState::idle());
        }
        tracing::debug!(count = removed.len(), "cache cleared");
    }

    /// Drops every entry, failing reads still in flight with `error`
    ///
    /// Used when the session ends underneath pending reads: their
    /// subscribers settle with `error` rather than `Cancelled`. Settled
    /// entries keep their last state.
    pub fn expire_all(&self, error: ClientError) {
        let removed: Vec<Entry> = self.inner.entries.lock().drain().map(|(_, e)| e).collect();
        for entry in &removed {
            entry.state.send_modify(|state| {
                if !state.status.is_settled() {
                    state.status = EntryStatus::Error;
                    state.error = Some(error.clone());
                }
            });
        }
        tracing::debug!(count = removed.len(), %error, "cache expired");
    }

    /// Evicts unsubscribed entries older than the retention period
    pub fn collect_garbage(&self) {
        let now = Instant::now();
        let retain = self.inner.retain;

        self.inner.entries.lock().retain(|key, entry| {
            let expired = entry.subscribers == 0
                && entry
                    .released_at
                    .map(|at| now.duration_since(at) >= retain)
                    .unwrap_or(false);
            if expired {
                tracing::trace!(%key, "evicting cache entry");
            }
            !expired
        });
    }

    /// Checks if an entry exists for `key`
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.entries.lock().contains_key(key)
    }

    /// Number of live subscriptions to `key`
    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.inner
            .entries
            .lock()
            .get(key)
            .map(|entry| entry.subscribers)
            .unwrap_or(0)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn attach(&self, key: &QueryKey, entry_id: u64) {
        if let Some(entry) = self.inner.entries.lock().get_mut(key) {
            if entry.id == entry_id {
                entry.subscribers += 1;
                entry.released_at = None;
            }
        }
    }

    fn release(&self, key: &QueryKey, entry_id: u64) {
        let mut entries = self.inner.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.id != entry_id {
            return;
        }

        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers == 0 {
            if self.inner.retain.is_zero() {
                entries.remove(key);
            } else {
                entry.released_at = Some(Instant::now());
            }
        }
    }
}

impl fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("entries", &self.len())
            .field("retain", &self.inner.retain)
            .finish()
    }
}

/// Issues a fetch for `entry` and applies its result when it completes
fn start_fetch(inner: &Arc<Inner>, key: &QueryKey, entry: &mut Entry) {
    let generation = inner.next_id();
    entry.generation = generation;
    entry.state.send_modify(|state| {
        state.status = EntryStatus::Loading;
        state.stale = false;
    });

    let fut = (entry.fetcher)();
    let weak = Arc::downgrade(inner);
    let key = key.clone();

    tracing::debug!(%key, generation, "fetch issued");

    tokio::spawn(async move {
        let result = fut.await;
        if let Some(inner) = weak.upgrade() {
            apply(&inner, &key, generation, result);
        }
    });
}

/// Applies a fetch result if it is still the entry's latest
fn apply(inner: &Inner, key: &QueryKey, generation: u64, result: ClientResult<CacheValue>) {
    let entries = inner.entries.lock();
    let Some(entry) = entries.get(key) else {
        tracing::debug!(%key, generation, "entry gone, dropping response");
        return;
    };
    if entry.generation != generation {
        tracing::debug!(%key, generation, latest = entry.generation, "superseded response ignored");
        return;
    }

    entry.state.send_modify(|state| match result {
        Ok(value) => {
            state.status = EntryStatus::Success;
            state.value = Some(value);
            state.error = None;
        }
        Err(error) => {
            tracing::debug!(%key, %error, "fetch failed");
            state.status = EntryStatus::Error;
            state.error = Some(error);
        }
    });
}

/// Live handle to a cache entry
///
/// Holds the entry's subscriber count up while alive.
pub struct Subscription<T> {
    cache: ResourceCache,
    key: QueryKey,
    entry_id: u64,
    rx: watch::Receiver<EntryState>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Current state of the entry
    pub fn snapshot(&self) -> EntrySnapshot<T> {
        typed(&self.rx.borrow())
    }

    /// Checks if the entry is still in the cache
    pub fn is_live(&self) -> bool {
        self.rx.has_changed().is_ok()
    }

    /// Waits for the next state change
    ///
    /// Returns `false` once the entry has been removed from the cache.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Waits until the entry has a result and returns it
    ///
    /// Returns `Cancelled` if the entry was removed without a result.
    pub async fn settled(&mut self) -> ClientResult<Arc<T>> {
        let result = self
            .rx
            .wait_for(|state| state.status.is_settled())
            .await
            .map(|state| state.clone());

        // A removed entry may have been settled on its way out
        let state = match result {
            Ok(state) => state,
            Err(_) => self.rx.borrow().clone(),
        };
        if !state.status.is_settled() {
            return Err(ClientError::Cancelled);
        }

        let snapshot: EntrySnapshot<T> = typed(&state);
        match (snapshot.status, snapshot.value, snapshot.error) {
            (EntryStatus::Error, _, Some(error)) => Err(error),
            (_, Some(value), _) => Ok(value),
            _ => Err(ClientError::Decode(format!(
                "cache entry {} holds a value of another type",
                self.key
            ))),
        }
    }
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        self.cache.attach(&self.key, self.entry_id);
        Self {
            cache: self.cache.clone(),
            key: self.key.clone(),
            entry_id: self.entry_id,
            rx: self.rx.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cache.release(&self.key, self.entry_id);
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("status", &self.rx.borrow().status)
            .finish()
    }
}

fn typed<T: Send + Sync + 'static>(state: &EntryState) -> EntrySnapshot<T> {
    EntrySnapshot {
        status: state.status,
        value: state
            .value
            .as_ref()
            .and_then(|value| value.clone().downcast::<T>().ok()),
        error: state.error.clone(),
        is_stale: state.stale,
    }
}
