//! Variable declarations and the declaration table.

use super::ty::Ty;
use super::SourceLocation;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclId(pub u32);

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Storage duration as written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    /// Block-scope variable without `static`/`extern`
    Automatic,
    /// `static`
    Static,
    /// `extern`
    Extern,
    /// `thread_local`
    ThreadLocal,
}

/// Kind of scope the declaration lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclScope {
    /// Translation-unit scope
    File,
    /// Namespace scope
    Namespace,
    /// Function parameter or function-body scope
    Function,
    /// Nested block scope
    Block,
    /// Non-static data member accessed through `this`
    Member,
}

/// A variable declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    /// Identity
    pub id: DeclId,
    /// Source name
    pub name: String,
    /// Declared type
    pub ty: Ty,
    /// Storage class
    pub storage: StorageClass,
    /// Enclosing scope kind
    pub scope: DeclScope,
    /// Set on analysis-internal capture placeholders; names the declaration
    /// the placeholder mirrors
    pub capture_of: Option<DeclId>,
    /// Named in a `threadprivate` directive
    pub threadprivate: bool,
    /// Named in a `declare target` directive
    pub declare_target: bool,
    /// Created by the analysis (private counters, induction variables)
    pub synthesized: bool,
    /// Declaration site
    pub location: SourceLocation,
}

impl VarDecl {
    /// Declared at file or namespace scope
    pub fn is_file_scope(&self) -> bool {
        matches!(self.scope, DeclScope::File | DeclScope::Namespace)
    }

    /// Static storage duration (globals, `static` and `extern` locals)
    pub fn has_static_storage(&self) -> bool {
        self.is_file_scope()
            || matches!(
                self.storage,
                StorageClass::Static | StorageClass::Extern | StorageClass::ThreadLocal
            )
    }

    /// Automatic storage duration
    pub fn is_automatic(&self) -> bool {
        !self.has_static_storage() && !self.is_data_member()
    }

    /// Non-static data member
    pub fn is_data_member(&self) -> bool {
        self.scope == DeclScope::Member
    }
}

/// Arena of declarations indexed by [`DeclId`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeclTable {
    decls: Vec<VarDecl>,
}

impl DeclTable {
    /// Creates an empty table
    pub fn new() -> Self {
        DeclTable { decls: Vec::new() }
    }

    /// Adds a declaration and returns its identity
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        ty: Ty,
        storage: StorageClass,
        scope: DeclScope,
        location: SourceLocation,
    ) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(VarDecl {
            id,
            name: name.into(),
            ty,
            storage,
            scope,
            capture_of: None,
            threadprivate: false,
            declare_target: false,
            synthesized: false,
            location,
        });
        id
    }

    /// Adds a capture placeholder mirroring `of`
    pub fn capture(&mut self, of: DeclId) -> Result<DeclId> {
        let original = self.decl(of)?.clone();
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(VarDecl {
            id,
            capture_of: Some(of),
            synthesized: true,
            ..original
        });
        Ok(id)
    }

    /// Adds an analysis-internal automatic variable
    pub fn synthesize(&mut self, name: impl Into<String>, ty: Ty, location: SourceLocation) -> DeclId {
        let id = self.declare(name, ty, StorageClass::Automatic, DeclScope::Block, location);
        self.decls[id.0 as usize].synthesized = true;
        id
    }

    /// Looks up a declaration
    pub fn get(&self, id: DeclId) -> Option<&VarDecl> {
        self.decls.get(id.0 as usize)
    }

    /// Looks up a declaration, failing on unknown ids
    pub fn decl(&self, id: DeclId) -> Result<&VarDecl> {
        self.get(id).ok_or(Error::UnknownDeclaration { id: id.0 })
    }

    /// Mutable lookup
    pub fn get_mut(&mut self, id: DeclId) -> Option<&mut VarDecl> {
        self.decls.get_mut(id.0 as usize)
    }

    /// Maps capture placeholders back to the declaration they mirror
    pub fn canonical(&self, id: DeclId) -> DeclId {
        let mut current = id;
        // Placeholders only point at earlier entries, so the chain terminates.
        while let Some(of) = self.get(current).and_then(|d| d.capture_of) {
            if of >= current {
                break;
            }
            current = of;
        }
        current
    }

    /// Number of declarations
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    /// No declarations
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// All declarations in id order
    pub fn iter(&self) -> impl Iterator<Item = &VarDecl> {
        self.decls.iter()
    }

    /// Finds the first declaration with the given name
    pub fn find(&self, name: &str) -> Option<DeclId> {
        self.decls.iter().find(|d| d.name == name).map(|d| d.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    #[test]
    fn test_declare_and_lookup() {
        let mut table = DeclTable::new();
        let x = table.declare("x", Ty::i32(), StorageClass::Automatic, DeclScope::Function, loc());
        assert_eq!(table.get(x).unwrap().name, "x");
        assert!(table.get(x).unwrap().is_automatic());
        assert!(table.decl(DeclId(99)).is_err());
    }

    #[test]
    fn test_storage_classification() {
        let mut table = DeclTable::new();
        let g = table.declare("g", Ty::i32(), StorageClass::Automatic, DeclScope::File, loc());
        let s = table.declare("s", Ty::i32(), StorageClass::Static, DeclScope::Block, loc());
        let m = table.declare("m", Ty::i32(), StorageClass::Automatic, DeclScope::Member, loc());

        assert!(table.get(g).unwrap().is_file_scope());
        assert!(table.get(g).unwrap().has_static_storage());
        assert!(!table.get(s).unwrap().is_file_scope());
        assert!(table.get(s).unwrap().has_static_storage());
        assert!(table.get(m).unwrap().is_data_member());
        assert!(!table.get(m).unwrap().is_automatic());
    }

    #[test]
    fn test_capture_canonicalization() {
        let mut table = DeclTable::new();
        let x = table.declare("x", Ty::i32(), StorageClass::Automatic, DeclScope::Function, loc());
        let cap = table.capture(x).unwrap();
        let cap2 = table.capture(cap).unwrap();

        assert_ne!(cap, x);
        assert_eq!(table.canonical(cap), x);
        assert_eq!(table.canonical(cap2), x);
        assert_eq!(table.canonical(x), x);
    }

    #[test]
    fn test_synthesized_flag() {
        let mut table = DeclTable::new();
        let iv = table.synthesize(".iv", Ty::u64(), loc());
        assert!(table.get(iv).unwrap().synthesized);
        assert!(table.get(iv).unwrap().is_automatic());
    }
}
