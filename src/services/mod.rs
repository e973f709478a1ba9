// Services module

pub mod coalescing;
pub mod direct_store;
pub mod local_cache;
pub mod notion;
pub mod pool;
pub mod reconciler;
pub mod store;
pub mod sync_locks;

pub use coalescing::{CoalescingService, ServiceState};
pub use direct_store::PgDirectStore;
pub use local_cache::PgCache;
pub use notion::NotionService;
pub use pool::ConnectionPool;
pub use reconciler::Reconciler;
pub use store::{CacheStore, DirectStore, RemoteStore};
