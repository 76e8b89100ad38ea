//! # Data-Sharing Attributes
//!
//! Everything that decides whether a variable referenced inside a region is
//! shared with the enclosing context or gets its own copy:
//!
//! - [`resolver`]: read-only resolution of a variable against the region
//!   stack (predetermined rules, explicit clauses, `default` modes and task
//!   promotion)
//! - [`clauses`]: registration of explicit clause items with conflict and
//!   legality checks
//! - [`implicit`]: synthesis of implicit clause lists for variables that are
//!   referenced but never listed

pub mod clauses;
pub mod implicit;
pub mod resolver;

pub use clauses::ClauseProcessor;
pub use implicit::{referenced_variables, ImplicitAttributeInferencer, ImplicitClauses};
pub use resolver::{loop_counter_accepts, AttrOrigin, AttributeResolver, Resolution, ResolvedAttr};
