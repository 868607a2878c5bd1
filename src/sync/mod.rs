//! Synchronization core: collection caches, optimistic mutations, refresh
//! scheduling and the filter/paginate projection used by the screens.

pub mod collection;
pub mod mutation;
pub mod notify;
pub mod projection;
pub mod scheduler;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use collection::{CollectionCache, RefreshOutcome};
pub use mutation::{MutationCoordinator, MutationHandle, MutationOutcome};
pub use notify::{Notification, Notifier};
pub use projection::{project, FilterState, Page, SharedFilter, StatusFilter, DEFAULT_PAGE_SIZE};
pub use scheduler::RefreshScheduler;
pub use session::{ScreenSession, SessionView};
pub use state::{CacheSnapshot, Intent, IntentKind};
