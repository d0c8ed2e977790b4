//! Coordinator state

use std::sync::Arc;

use crate::cache::CacheEntry;
use crate::error::BuildCacheError;

/// What a waiting caller receives
///
/// Every caller waiting on the same build receives clones of the same `Arc`s.
pub type BuildOutcome = Result<Arc<CacheEntry>, Arc<BuildCacheError>>;

/// One-shot receiver of a build outcome
pub(crate) type Callback = Box<dyn FnOnce(BuildOutcome) + Send>;

/// Lifecycle of a coordinator's build
///
/// `Idle -> Running -> (Cached | Fresh)`, then in watch mode
/// `Running -> Fresh` for every rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildState {
    /// Nothing delivered yet, or the last build failed
    #[default]
    Idle,
    /// A build is in flight; new requests wait for it
    Running,
    /// The last delivered result came from the persisted cache
    Cached,
    /// The last delivered result came from a completed build
    Fresh,
}

/// What `request` decided while holding the lock
pub(crate) enum Decision {
    /// Deliver this result now
    Deliver(Arc<CacheEntry>),
    /// Deliver this result now and start the watcher in the background
    DeliverAndWatch(Arc<CacheEntry>),
    /// Queued behind a build that is already running or awaited
    Wait,
    /// Queued; a one-off build must be started
    Build,
    /// Queued; the watcher must be started and will produce the result
    Watch,
    /// The cache could not be opened
    Fail(Arc<BuildCacheError>),
}
