//! Type facts the analysis inspects.
//!
//! Only the properties that influence data-sharing and loop analysis are
//! modelled: integer width and signedness, const qualification, mutable
//! members, pointer/aggregate classification and iterator capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-width integer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntType {
    /// Width in bits (8, 16, 32, 64)
    pub bits: u16,
    /// Two's complement signed
    pub signed: bool,
}

impl IntType {
    /// Signed integer of the given width
    pub const fn signed(bits: u16) -> Self {
        IntType { bits, signed: true }
    }

    /// Unsigned integer of the given width
    pub const fn unsigned(bits: u16) -> Self {
        IntType {
            bits,
            signed: false,
        }
    }

    /// Smallest representable value
    pub fn min_value(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.bits - 1))
        } else {
            0
        }
    }

    /// Largest representable value
    pub fn max_value(&self) -> i128 {
        if self.signed {
            (1i128 << (self.bits - 1)) - 1
        } else {
            (1i128 << self.bits) - 1
        }
    }

    /// Whether `value` is representable in this type
    pub fn contains(&self, value: i128) -> bool {
        value >= self.min_value() && value <= self.max_value()
    }

    /// The same width, one bit wider, always signed.
    ///
    /// Used to check that subtracting or adding two values of this type cannot
    /// overflow before the result is narrowed again.
    pub fn widened(&self) -> IntType {
        IntType::signed(self.bits + 1)
    }
}

impl fmt::Display for IntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.signed { "i" } else { "u" }, self.bits)
    }
}

/// Shape of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TyKind {
    /// Integer scalar
    Int(IntType),
    /// Boolean scalar
    Bool,
    /// Floating point scalar
    Float {
        /// Width in bits
        bits: u16,
    },
    /// Raw pointer
    Pointer(Box<Ty>),
    /// Array with optional constant length
    Array {
        /// Element type
        element: Box<Ty>,
        /// Number of elements, when known
        len: Option<u64>,
    },
    /// Struct/class type
    Record {
        /// Type name
        name: String,
        /// Declares at least one `mutable` member
        has_mutable_fields: bool,
    },
    /// Class iterator usable as a loop counter
    Iterator {
        /// Supports constant-time `+`, `-` and difference
        random_access: bool,
    },
    /// No value
    Void,
}

/// Mapping/defaultmap variable category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VarCategory {
    /// Arithmetic and boolean values
    Scalar,
    /// Pointers
    Pointer,
    /// Arrays, records and anything else
    Aggregate,
}

/// Type of a declaration or expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ty {
    /// Underlying shape
    pub kind: TyKind,
    /// `const` qualified
    pub is_const: bool,
}

impl Ty {
    /// Unqualified type of the given shape
    pub fn new(kind: TyKind) -> Self {
        Ty {
            kind,
            is_const: false,
        }
    }

    /// Integer type
    pub fn int(bits: u16, signed: bool) -> Self {
        Ty::new(TyKind::Int(IntType { bits, signed }))
    }

    /// `int`
    pub fn i32() -> Self {
        Ty::int(32, true)
    }

    /// `long`
    pub fn i64() -> Self {
        Ty::int(64, true)
    }

    /// `unsigned`
    pub fn u32() -> Self {
        Ty::int(32, false)
    }

    /// `unsigned long`
    pub fn u64() -> Self {
        Ty::int(64, false)
    }

    /// `bool`
    pub fn bool() -> Self {
        Ty::new(TyKind::Bool)
    }

    /// `double`
    pub fn f64() -> Self {
        Ty::new(TyKind::Float { bits: 64 })
    }

    /// `void`
    pub fn void() -> Self {
        Ty::new(TyKind::Void)
    }

    /// Pointer to `self`
    pub fn pointer_to(self) -> Self {
        Ty::new(TyKind::Pointer(Box::new(self)))
    }

    /// Array of `len` elements of `self`
    pub fn array_of(self, len: Option<u64>) -> Self {
        Ty::new(TyKind::Array {
            element: Box::new(self),
            len,
        })
    }

    /// Named record
    pub fn record(name: impl Into<String>, has_mutable_fields: bool) -> Self {
        Ty::new(TyKind::Record {
            name: name.into(),
            has_mutable_fields,
        })
    }

    /// Class iterator
    pub fn iterator(random_access: bool) -> Self {
        Ty::new(TyKind::Iterator { random_access })
    }

    /// Const-qualified copy
    pub fn as_const(mut self) -> Self {
        self.is_const = true;
        self
    }

    /// Integer type, if any
    pub fn int_type(&self) -> Option<IntType> {
        match &self.kind {
            TyKind::Int(it) => Some(*it),
            _ => None,
        }
    }

    /// Integer types
    pub fn is_integer(&self) -> bool {
        matches!(self.kind, TyKind::Int(_))
    }

    /// Raw pointers
    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TyKind::Pointer(_))
    }

    /// Class iterators
    pub fn is_iterator(&self) -> bool {
        matches!(self.kind, TyKind::Iterator { .. })
    }

    /// Supports constant-time distance computation
    pub fn has_random_access(&self) -> bool {
        match self.kind {
            TyKind::Int(_) | TyKind::Pointer(_) => true,
            TyKind::Iterator { random_access } => random_access,
            _ => false,
        }
    }

    /// Types accepted as a loop counter
    pub fn is_valid_counter(&self) -> bool {
        matches!(
            self.kind,
            TyKind::Int(_) | TyKind::Pointer(_) | TyKind::Iterator { .. }
        )
    }

    /// Integer type used for counter arithmetic.
    ///
    /// Integers use themselves; pointers and iterators use their signed
    /// 64-bit difference type.
    pub fn counter_int_type(&self) -> Option<IntType> {
        match &self.kind {
            TyKind::Int(it) => Some(*it),
            TyKind::Pointer(_) | TyKind::Iterator { .. } => Some(IntType::signed(64)),
            _ => None,
        }
    }

    /// Const qualified with no mutable member
    pub fn is_const_not_mutable(&self) -> bool {
        if !self.is_const {
            return false;
        }
        match &self.kind {
            TyKind::Record {
                has_mutable_fields, ..
            } => !has_mutable_fields,
            TyKind::Array { element, .. } => !element.has_mutable_fields(),
            _ => true,
        }
    }

    fn has_mutable_fields(&self) -> bool {
        match &self.kind {
            TyKind::Record {
                has_mutable_fields, ..
            } => *has_mutable_fields,
            TyKind::Array { element, .. } => element.has_mutable_fields(),
            _ => false,
        }
    }

    /// Category used by defaultmap and implicit mapping
    pub fn category(&self) -> VarCategory {
        match self.kind {
            TyKind::Int(_) | TyKind::Bool | TyKind::Float { .. } => VarCategory::Scalar,
            TyKind::Pointer(_) => VarCategory::Pointer,
            _ => VarCategory::Aggregate,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const {
            write!(f, "const ")?;
        }
        match &self.kind {
            TyKind::Int(it) => write!(f, "{}", it),
            TyKind::Bool => write!(f, "bool"),
            TyKind::Float { bits } => write!(f, "f{}", bits),
            TyKind::Pointer(inner) => write!(f, "*{}", inner),
            TyKind::Array { element, len } => match len {
                Some(n) => write!(f, "[{}; {}]", element, n),
                None => write!(f, "[{}]", element),
            },
            TyKind::Record { name, .. } => write!(f, "{}", name),
            TyKind::Iterator { random_access } => {
                if *random_access {
                    write!(f, "random_access_iterator")
                } else {
                    write!(f, "forward_iterator")
                }
            }
            TyKind::Void => write!(f, "void"),
        }
    }
}
