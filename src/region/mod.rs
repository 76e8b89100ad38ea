//! # Region Scope Stack
//!
//! Strictly nested stack of [`RegionDescriptor`]s, one per region being
//! analyzed. Each frame records the region's directive, its `default` mode,
//! explicit and synthesized per-variable attributes, locally declared
//! variables and loop counters.
//!
//! ```text
//! frames[0]      outermost region
//! frames[1]
//!   ...
//! frames[d - 1]  innermost visible region   <- resolution starts here
//! frames[d..]    hidden by ParentView guards
//! ```
//!
//! Parent-relative questions ("is this variable private in the enclosing
//! parallel region?") are answered through [`RegionScopeStack::suppress_innermost`],
//! which hides the innermost frame for the lifetime of the returned guard.

pub mod descriptor;
pub mod stack;

pub use descriptor::{
    AttrModifier, DefaultmapTable, DsaKind, EntryInsert, PrivateCopyId, RegionDescriptor,
    RegionFlags, VariableAttributeEntry,
};
pub use stack::{ParentView, RegionScopeStack};
