//! Value objects describing rows and query shape.
//!
//! # Responsibility
//! - Carry payloads, projections, ordering and predicates from callers to the
//!   delegated operations unchanged.
//!
//! # Invariants
//! - Nothing here touches a connection.

pub mod field;
pub mod options;
pub mod query;
pub mod record;
