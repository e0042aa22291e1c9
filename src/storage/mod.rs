// ============================================================================
// Storage - Order persistence over a key-value backend
// ============================================================================
//
// - backend:        the command set a backend must provide
// - redis_backend:  Redis implementation (production)
// - memory:         in-process implementation (tests, local development)
// - keyspace:       record/index key derivation
// - order_store:    the order store built on top
//
// ============================================================================

mod backend;
mod error;
mod keyspace;
mod memory;
mod order_store;
mod redis_backend;

pub use backend::{Batch, BatchOp, KeyValueBackend, OpKind, ScanPage};
pub use error::{BackendError, StoreError};
pub use keyspace::{Keyspace, DEFAULT_INDEX_KEY, DEFAULT_KEY_PREFIX};
pub use memory::MemoryBackend;
pub use order_store::{FindAllPage, FindResult, OrderStore, DEFAULT_PAGE_SIZE};
pub use redis_backend::RedisBackend;
