//! Clauses attached to directives.

use super::decl::DeclId;
use super::expr::Expr;
use super::ty::VarCategory;
use super::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mode selected by the `default` clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DefaultSharing {
    /// No `default` clause
    #[default]
    Unspecified,
    /// `default(none)`
    None,
    /// `default(shared)`
    Shared,
    /// `default(private)`
    Private,
    /// `default(firstprivate)`
    Firstprivate,
}

/// Reduction operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReductionOp {
    /// `+`
    Add,
    /// `-` (combines like `+`)
    Sub,
    /// `*`
    Mul,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&&`
    LogicalAnd,
    /// `||`
    LogicalOr,
    /// `min`
    Min,
    /// `max`
    Max,
}

/// Map types of the `map` clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MapType {
    /// `map(to: ...)`
    To,
    /// `map(from: ...)`
    From,
    /// `map(tofrom: ...)`
    Tofrom,
    /// `map(alloc: ...)`
    Alloc,
    /// `map(release: ...)`
    Release,
    /// `map(delete: ...)`
    Delete,
    /// `map(present: ...)`
    Present,
}

/// Implicit-behavior selector of the `defaultmap` clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DefaultmapBehavior {
    /// No `defaultmap` for the category
    #[default]
    Default,
    /// `alloc`
    Alloc,
    /// `to`
    To,
    /// `from`
    From,
    /// `tofrom`
    Tofrom,
    /// `firstprivate`
    Firstprivate,
    /// `none`: every referenced variable must be listed explicitly
    None,
    /// `present`
    Present,
}

impl DefaultmapBehavior {
    /// Map type used for implicit maps, when this behavior maps at all
    pub fn map_type(self) -> Option<MapType> {
        match self {
            DefaultmapBehavior::Alloc => Some(MapType::Alloc),
            DefaultmapBehavior::To => Some(MapType::To),
            DefaultmapBehavior::From => Some(MapType::From),
            DefaultmapBehavior::Tofrom => Some(MapType::Tofrom),
            DefaultmapBehavior::Present => Some(MapType::Present),
            _ => None,
        }
    }
}

/// `order` clause kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// `order(concurrent)`
    Concurrent,
}

/// A variable listed in a clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseItem {
    /// Listed variable
    pub decl: DeclId,
    /// Location of the list item
    pub location: SourceLocation,
    /// Listed as an array section (`p[lo:len]`) rather than the whole variable
    #[serde(default)]
    pub section: bool,
}

impl ClauseItem {
    /// Whole-variable list item
    pub fn new(decl: DeclId, location: SourceLocation) -> Self {
        ClauseItem {
            decl,
            location,
            section: false,
        }
    }
}

/// Clause kinds with their arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClauseKind {
    // Data-sharing
    /// `private(list)`
    Private,
    /// `firstprivate(list)`
    Firstprivate,
    /// `lastprivate([conditional:] list)`
    Lastprivate {
        /// `conditional` modifier
        conditional: bool,
    },
    /// `shared(list)`
    Shared,
    /// `reduction(op: list)`
    Reduction(ReductionOp),
    /// `task_reduction(op: list)`
    TaskReduction(ReductionOp),
    /// `in_reduction(op: list)`
    InReduction(ReductionOp),
    /// `linear(list[: step])`
    Linear {
        /// Step expression (defaults to 1)
        step: Option<Expr>,
    },
    /// `copyin(list)`
    Copyin,
    /// `copyprivate(list)`
    Copyprivate,

    // Mapping
    /// `map(type: list)`
    Map(MapType),
    /// `is_device_ptr(list)`
    IsDevicePtr,

    // Defaults
    /// `default(mode)`
    Default(DefaultSharing),
    /// `defaultmap(behavior[: category])`
    Defaultmap {
        /// Implicit behavior
        behavior: DefaultmapBehavior,
        /// Category; all categories when absent
        category: Option<VarCategory>,
    },

    // Loop association and scheduling
    /// `collapse(n)`
    Collapse(Expr),
    /// `ordered[(n)]`
    Ordered(Option<Expr>),
    /// `order(concurrent)`
    Order(OrderKind),

    // Flags
    /// `nowait`
    Nowait,
    /// `untied`
    Untied,
    /// `simd` (on `ordered`)
    Simd,
    /// `threads` (on `ordered`)
    Threads,
    /// `mergeable`
    Mergeable,

    // Expressions evaluated outside the region
    /// `if(expr)`
    If(Expr),
    /// `num_threads(expr)`
    NumThreads(Expr),
    /// `final(expr)`
    Final(Expr),
}

/// Payload-free clause tag used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClauseTag {
    /// `private`
    Private,
    /// `firstprivate`
    Firstprivate,
    /// `lastprivate`
    Lastprivate,
    /// `shared`
    Shared,
    /// `reduction`
    Reduction,
    /// `task_reduction`
    TaskReduction,
    /// `in_reduction`
    InReduction,
    /// `linear`
    Linear,
    /// `copyin`
    Copyin,
    /// `copyprivate`
    Copyprivate,
    /// `map`
    Map,
    /// `is_device_ptr`
    IsDevicePtr,
    /// `default`
    Default,
    /// `defaultmap`
    Defaultmap,
    /// `collapse`
    Collapse,
    /// `ordered`
    Ordered,
    /// `order`
    Order,
    /// `nowait`
    Nowait,
    /// `untied`
    Untied,
    /// `simd`
    Simd,
    /// `threads`
    Threads,
    /// `mergeable`
    Mergeable,
    /// `if`
    If,
    /// `num_threads`
    NumThreads,
    /// `final`
    Final,
}

impl fmt::Display for ClauseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClauseTag::Private => "private",
            ClauseTag::Firstprivate => "firstprivate",
            ClauseTag::Lastprivate => "lastprivate",
            ClauseTag::Shared => "shared",
            ClauseTag::Reduction => "reduction",
            ClauseTag::TaskReduction => "task_reduction",
            ClauseTag::InReduction => "in_reduction",
            ClauseTag::Linear => "linear",
            ClauseTag::Copyin => "copyin",
            ClauseTag::Copyprivate => "copyprivate",
            ClauseTag::Map => "map",
            ClauseTag::IsDevicePtr => "is_device_ptr",
            ClauseTag::Default => "default",
            ClauseTag::Defaultmap => "defaultmap",
            ClauseTag::Collapse => "collapse",
            ClauseTag::Ordered => "ordered",
            ClauseTag::Order => "order",
            ClauseTag::Nowait => "nowait",
            ClauseTag::Untied => "untied",
            ClauseTag::Simd => "simd",
            ClauseTag::Threads => "threads",
            ClauseTag::Mergeable => "mergeable",
            ClauseTag::If => "if",
            ClauseTag::NumThreads => "num_threads",
            ClauseTag::Final => "final",
        };
        write!(f, "{}", name)
    }
}

impl ClauseKind {
    /// Payload-free tag
    pub fn tag(&self) -> ClauseTag {
        match self {
            ClauseKind::Private => ClauseTag::Private,
            ClauseKind::Firstprivate => ClauseTag::Firstprivate,
            ClauseKind::Lastprivate { .. } => ClauseTag::Lastprivate,
            ClauseKind::Shared => ClauseTag::Shared,
            ClauseKind::Reduction(_) => ClauseTag::Reduction,
            ClauseKind::TaskReduction(_) => ClauseTag::TaskReduction,
            ClauseKind::InReduction(_) => ClauseTag::InReduction,
            ClauseKind::Linear { .. } => ClauseTag::Linear,
            ClauseKind::Copyin => ClauseTag::Copyin,
            ClauseKind::Copyprivate => ClauseTag::Copyprivate,
            ClauseKind::Map(_) => ClauseTag::Map,
            ClauseKind::IsDevicePtr => ClauseTag::IsDevicePtr,
            ClauseKind::Default(_) => ClauseTag::Default,
            ClauseKind::Defaultmap { .. } => ClauseTag::Defaultmap,
            ClauseKind::Collapse(_) => ClauseTag::Collapse,
            ClauseKind::Ordered(_) => ClauseTag::Ordered,
            ClauseKind::Order(_) => ClauseTag::Order,
            ClauseKind::Nowait => ClauseTag::Nowait,
            ClauseKind::Untied => ClauseTag::Untied,
            ClauseKind::Simd => ClauseTag::Simd,
            ClauseKind::Threads => ClauseTag::Threads,
            ClauseKind::Mergeable => ClauseTag::Mergeable,
            ClauseKind::If(_) => ClauseTag::If,
            ClauseKind::NumThreads(_) => ClauseTag::NumThreads,
            ClauseKind::Final(_) => ClauseTag::Final,
        }
    }

    /// Clauses whose list items need the value from outside the region
    pub fn reads_original(&self) -> bool {
        !matches!(self, ClauseKind::Private)
    }
}

/// A clause with its list items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    /// Kind and arguments
    pub kind: ClauseKind,
    /// Variable list (empty for non-list clauses)
    pub items: Vec<ClauseItem>,
    /// Clause location
    pub location: SourceLocation,
}

impl Clause {
    /// Creates a clause
    pub fn new(kind: ClauseKind, items: Vec<ClauseItem>, location: SourceLocation) -> Self {
        Clause {
            kind,
            items,
            location,
        }
    }
}
