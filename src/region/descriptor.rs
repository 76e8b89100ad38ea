//! Region descriptors and per-variable attribute entries.

use crate::ast::{
    DeclId, DefaultSharing, DefaultmapBehavior, DirectiveKind, MapType, ReductionOp,
    SourceLocation, VarCategory,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Data-sharing attribute kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DsaKind {
    Shared,
    Private,
    Firstprivate,
    Lastprivate,
    Reduction,
    Linear,
    Threadprivate,
    Mapped,
}

impl DsaKind {
    /// Every thread or task works on its own copy
    pub fn is_privatizing(self) -> bool {
        matches!(
            self,
            DsaKind::Private
                | DsaKind::Firstprivate
                | DsaKind::Lastprivate
                | DsaKind::Reduction
                | DsaKind::Linear
        )
    }
}

impl fmt::Display for DsaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DsaKind::Shared => "shared",
            DsaKind::Private => "private",
            DsaKind::Firstprivate => "firstprivate",
            DsaKind::Lastprivate => "lastprivate",
            DsaKind::Reduction => "reduction",
            DsaKind::Linear => "linear",
            DsaKind::Threadprivate => "threadprivate",
            DsaKind::Mapped => "mapped",
        };
        write!(f, "{}", s)
    }
}

/// Extra data carried by an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AttrModifier {
    #[default]
    None,
    /// Reduction operator
    Reduction(ReductionOp),
    /// Linear step; `None` when the step is not a constant
    LinearStep(Option<i128>),
    /// Map type
    Map(MapType),
    /// `lastprivate(conditional:)`
    Conditional,
}

/// Placeholder standing for the private copy created for a list item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrivateCopyId(pub u32);

/// Attribute of one variable in one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableAttributeEntry {
    /// Attribute kind
    pub kind: DsaKind,
    /// Operator, step or map type
    pub modifier: AttrModifier,
    /// Private copy, for privatizing kinds
    pub private_copy: Option<PrivateCopyId>,
    /// Attribute applies to the pointed-to storage (array section on a pointer)
    pub applies_to_pointee: bool,
    /// Also listed as firstprivate
    pub merged_firstprivate: bool,
    /// Where the attribute was given
    pub location: SourceLocation,
    /// Synthesized by implicit inference
    pub implicit: bool,
}

impl VariableAttributeEntry {
    /// Entry with no modifier
    pub fn new(kind: DsaKind, location: SourceLocation) -> Self {
        VariableAttributeEntry {
            kind,
            modifier: AttrModifier::None,
            private_copy: None,
            applies_to_pointee: false,
            merged_firstprivate: false,
            location,
            implicit: false,
        }
    }

    /// Sets the modifier
    pub fn with_modifier(mut self, modifier: AttrModifier) -> Self {
        self.modifier = modifier;
        self
    }

    /// Marks the entry as synthesized
    pub fn implicit(mut self) -> Self {
        self.implicit = true;
        self
    }
}

/// Outcome of recording an explicit entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryInsert {
    /// New entry recorded
    Inserted,
    /// firstprivate and lastprivate combined into one entry
    Merged,
    /// Same attribute given twice where that is harmless
    Duplicate,
    /// Existing entry has an incompatible kind; nothing changed
    Conflict(VariableAttributeEntry),
}

/// Implicit-mapping behavior per variable category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DefaultmapTable {
    /// Scalars
    pub scalar: DefaultmapBehavior,
    /// Pointers
    pub pointer: DefaultmapBehavior,
    /// Aggregates
    pub aggregate: DefaultmapBehavior,
}

impl DefaultmapTable {
    /// Behavior for a category
    pub fn get(&self, category: VarCategory) -> DefaultmapBehavior {
        match category {
            VarCategory::Scalar => self.scalar,
            VarCategory::Pointer => self.pointer,
            VarCategory::Aggregate => self.aggregate,
        }
    }

    /// Sets one category, or all of them
    pub fn set(&mut self, behavior: DefaultmapBehavior, category: Option<VarCategory>) {
        match category {
            Some(VarCategory::Scalar) => self.scalar = behavior,
            Some(VarCategory::Pointer) => self.pointer = behavior,
            Some(VarCategory::Aggregate) => self.aggregate = behavior,
            None => {
                self.scalar = behavior;
                self.pointer = behavior;
                self.aggregate = behavior;
            }
        }
    }
}

/// Region-level flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionFlags {
    /// `ordered` clause present
    pub ordered: bool,
    /// `nowait` clause present
    pub nowait: bool,
    /// `untied` clause present
    pub untied: bool,
    /// A `cancel` directive targets this region
    pub cancel_present: bool,
    /// `order(concurrent)` clause present
    pub order_concurrent: bool,
}

/// One frame of the region stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    /// Directive kind
    pub kind: DirectiveKind,
    /// Construct name
    pub name: Option<String>,
    /// Directive location
    pub location: SourceLocation,
    /// `default` clause mode
    pub default_sharing: DefaultSharing,
    /// `defaultmap` behaviors
    pub defaultmap: DefaultmapTable,
    /// Flags
    pub flags: RegionFlags,
    /// Loops associated through collapse/ordered
    pub associated_loops: usize,
    /// Argument of `ordered(n)`
    pub ordered_param: Option<usize>,
    /// Region sits in an uninstantiated generic context
    pub dependent: bool,
    entries: BTreeMap<DeclId, VariableAttributeEntry>,
    rejected: BTreeSet<DeclId>,
    locals: BTreeSet<DeclId>,
    loop_control: BTreeMap<DeclId, DsaKind>,
}

impl RegionDescriptor {
    /// Fresh frame with unspecified default
    pub fn new(kind: DirectiveKind, name: Option<String>, location: SourceLocation) -> Self {
        RegionDescriptor {
            kind,
            name,
            location,
            default_sharing: DefaultSharing::Unspecified,
            defaultmap: DefaultmapTable::default(),
            flags: RegionFlags::default(),
            associated_loops: 0,
            ordered_param: None,
            dependent: false,
            entries: BTreeMap::new(),
            rejected: BTreeSet::new(),
            locals: BTreeSet::new(),
            loop_control: BTreeMap::new(),
        }
    }

    /// Entry recorded for `var`
    pub fn entry(&self, var: DeclId) -> Option<&VariableAttributeEntry> {
        self.entries.get(&var)
    }

    /// Mutable entry recorded for `var`
    pub fn entry_mut(&mut self, var: DeclId) -> Option<&mut VariableAttributeEntry> {
        self.entries.get_mut(&var)
    }

    /// All entries in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (DeclId, &VariableAttributeEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Records an explicit clause entry.
    ///
    /// firstprivate and lastprivate on the same variable combine into one
    /// lastprivate entry with `merged_firstprivate` set; a repeated `shared` is
    /// accepted; any other pair conflicts and leaves the first entry in place.
    pub fn insert_explicit(&mut self, var: DeclId, entry: VariableAttributeEntry) -> EntryInsert {
        let Some(existing) = self.entries.get_mut(&var) else {
            self.rejected.remove(&var);
            self.entries.insert(var, entry);
            return EntryInsert::Inserted;
        };
        if existing.implicit {
            *existing = entry;
            return EntryInsert::Inserted;
        }
        match (existing.kind, entry.kind) {
            (DsaKind::Firstprivate, DsaKind::Lastprivate) => {
                let copy = existing.private_copy;
                *existing = entry;
                existing.merged_firstprivate = true;
                existing.private_copy = copy.or(existing.private_copy);
                EntryInsert::Merged
            }
            (DsaKind::Lastprivate, DsaKind::Firstprivate) if !existing.merged_firstprivate => {
                existing.merged_firstprivate = true;
                EntryInsert::Merged
            }
            (DsaKind::Shared, DsaKind::Shared) => EntryInsert::Duplicate,
            _ => EntryInsert::Conflict(existing.clone()),
        }
    }

    /// Records a synthesized entry unless the variable already has one
    pub fn insert_implicit(&mut self, var: DeclId, entry: VariableAttributeEntry) -> bool {
        if self.entries.contains_key(&var) || self.rejected.contains(&var) {
            return false;
        }
        self.entries.insert(var, entry.implicit());
        true
    }

    /// Marks an invalid list item; ignored when a valid entry exists
    pub fn reject(&mut self, var: DeclId) {
        if !self.entries.contains_key(&var) {
            self.rejected.insert(var);
        }
    }

    /// Whether `var` was rejected in this region
    pub fn is_rejected(&self, var: DeclId) -> bool {
        self.rejected.contains(&var)
    }

    /// Declares an automatic variable inside this region
    pub fn declare_local(&mut self, var: DeclId) {
        self.locals.insert(var);
    }

    /// Whether `var` is declared inside this region
    pub fn is_local(&self, var: DeclId) -> bool {
        self.locals.contains(&var)
    }

    /// Registers a loop counter with its predetermined kind.
    ///
    /// A counter declared in the loop header stops being a plain local.
    pub fn register_loop_control(&mut self, var: DeclId, kind: DsaKind) {
        self.locals.remove(&var);
        self.loop_control.insert(var, kind);
    }

    /// Predetermined kind of a loop counter of this region
    pub fn loop_control(&self, var: DeclId) -> Option<DsaKind> {
        self.loop_control.get(&var).copied()
    }

    /// Loop counters of this region
    pub fn loop_controls(&self) -> impl Iterator<Item = (DeclId, DsaKind)> + '_ {
        self.loop_control.iter().map(|(k, v)| (*k, *v))
    }

    /// Variables listed in a reduction clause of this region
    pub fn is_reduction_item(&self, var: DeclId) -> bool {
        self.entries
            .get(&var)
            .map(|e| e.kind == DsaKind::Reduction)
            .unwrap_or(false)
    }
}
