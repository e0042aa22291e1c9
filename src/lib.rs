//! Order persistence on a key-value store.
//!
//! Orders are stored as JSON documents, one record per order, with a set of
//! record keys as a secondary index for paginated listing. [`OrderStore`]
//! keeps records and index consistent; [`OrderCommandHandler`] layers the
//! pending → shipped → completed lifecycle on top.

pub mod config;
pub mod domain;
pub mod health;
pub mod metrics;
pub mod storage;
pub mod utils;

pub use config::StoreConfig;
pub use domain::order::{
    CommandError, CustomerId, LineItem, Order, OrderCommandHandler, OrderError, OrderStatus,
    StatusTransition,
};
pub use storage::{FindAllPage, FindResult, KeyValueBackend, OrderStore, StoreError};
