// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Order aggregate, its value objects, lifecycle rules and the command
// handler that drives the store. Persistence lives in crate::storage.
//
// ============================================================================

pub mod order;
