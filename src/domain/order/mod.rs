// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (CustomerId, ItemId, LineItem, OrderStatus)
// - Aggregate (Order and its canonical encoding)
// - Lifecycle (StatusTransition and the pending → shipped → completed rules)
// - Errors (OrderError, MalformedRecord)
// - Command Handler (OrderCommandHandler)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;
pub mod lifecycle;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
pub use lifecycle::*;
pub use command_handler::*;
