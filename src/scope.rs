//! Lexical scopes.
//!
//! Each file owns a [`ScopeArena`]. Scope 0 is the file's slice of the
//! package block, scope 1 the file block (imports), and every other scope a
//! block opened by the parser. Scopes never move once opened; nodes refer to
//! them by [`ScopeId`].
//!
//! Declarations made while parsing are journaled so a backtracking parser can
//! roll them back to a [`ScopeMark`]. Package-level names from every file of
//! a package are merged into a [`PackageScope`] once all files are parsed.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::cst::{
    ExprId, FieldId, FuncDeclId, ImportSpecId, SimpleStmtId, SwitchClauseId, Symbol,
    TypeParamDeclId, TypeSpecId, ValueSpecId,
};
use crate::error::FileId;
use crate::token::Tok;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The file's part of the package block.
    pub const PACKAGE: ScopeId = ScopeId(0);
    /// Imports of the file.
    pub const FILE: ScopeId = ScopeId(1);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Package,
    File,
    Func,
    Block,
}

/// What a name was declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclRef {
    Import(ImportSpecId),
    /// Constant: value spec and name index within it.
    Const(ValueSpecId, u32),
    Var(ValueSpecId, u32),
    /// Type definition or alias.
    Type(TypeSpecId),
    TypeParam(TypeParamDeclId, u32),
    Func(FuncDeclId),
    /// Parameter or named result: field and name index.
    Param(FieldId, u32),
    Recv(FuncDeclId),
    /// Receiver type parameter `P` in `func (l *List[P])`.
    RecvTypeParam(FuncDeclId, u32),
    ShortVar(SimpleStmtId, u32),
    /// Range variable: the ranged-over expression and the variable's position.
    Range(ExprId, u32),
    /// Implicit per-clause variable of `switch x := y.(type)`: the guard's
    /// subject and the clause.
    TypeSwitch(ExprId, SwitchClauseId),
    /// Variable of `case x := <-ch:`: the receive operand and position.
    CommRecv(ExprId, u32),
}

impl DeclRef {
    pub const fn describe(self) -> &'static str {
        match self {
            DeclRef::Import(_) => "import",
            DeclRef::Const(..) => "constant",
            DeclRef::Type(_) => "type",
            DeclRef::TypeParam(..) | DeclRef::RecvTypeParam(..) => "type parameter",
            DeclRef::Func(_) => "function",
            DeclRef::Var(..)
            | DeclRef::Param(..)
            | DeclRef::Recv(_)
            | DeclRef::ShortVar(..)
            | DeclRef::Range(..)
            | DeclRef::TypeSwitch(..)
            | DeclRef::CommRecv(..) => "variable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub decl: DeclRef,
    /// The declaring identifier.
    pub name: Tok,
    /// First token from which the name is in scope.
    pub visible_from: Tok,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    names: HashMap<Symbol, Binding>,
}

impl Scope {
    fn new(parent: Option<ScopeId>, kind: ScopeKind) -> Self {
        Self {
            parent,
            kind,
            names: HashMap::new(),
        }
    }

    pub fn get(&self, sym: Symbol) -> Option<&Binding> {
        self.names.get(&sym)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Binding)> {
        self.names.iter().map(|(s, b)| (*s, b))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Journal {
    Declared(ScopeId, Symbol),
    Opened,
}

/// Position in the declaration journal to roll back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeMark(usize);

/// Result of a lookup in a file's scope chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Declared in a block or file scope of this file.
    Local(ScopeId, Binding),
    /// Not found below the package block: consult the merged package scope
    /// and then the universe.
    Outer,
}

#[derive(Debug, Clone)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
    journal: Vec<Journal>,
    blank: Option<Symbol>,
}

impl ScopeArena {
    /// `blank` is the file's symbol for `_`, which is never recorded.
    pub fn new(blank: Option<Symbol>) -> Self {
        Self {
            scopes: vec![
                Scope::new(None, ScopeKind::Package),
                Scope::new(Some(ScopeId::PACKAGE), ScopeKind::File),
            ],
            journal: Vec::new(),
            blank,
        }
    }

    #[inline]
    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn ids(&self) -> impl Iterator<Item = ScopeId> {
        (0..self.scopes.len() as u32).map(ScopeId)
    }

    pub fn open(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(Some(parent), kind));
        self.journal.push(Journal::Opened);
        id
    }

    /// Declares `sym` in `scope`. If the scope already has a live binding for
    /// the name, that binding is returned and nothing is inserted.
    pub fn declare(&mut self, scope: ScopeId, sym: Symbol, binding: Binding) -> Option<Binding> {
        if Some(sym) == self.blank {
            return None;
        }
        let names = &mut self.scopes[scope.index()].names;
        if let Some(existing) = names.get(&sym) {
            return Some(*existing);
        }
        names.insert(sym, binding);
        self.journal.push(Journal::Declared(scope, sym));
        None
    }

    /// Resolves `sym` as seen from token `from` inside `scope`.
    ///
    /// Block and file bindings count only once visible; a binding that is
    /// not visible yet lets the search continue outward, which is how
    /// `x := x` reaches the outer `x`.
    pub fn lookup(&self, scope: ScopeId, sym: Symbol, from: Tok) -> Lookup {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let s = &self.scopes[id.index()];
            if s.kind == ScopeKind::Package {
                return Lookup::Outer;
            }
            if let Some(b) = s.names.get(&sym) {
                if b.visible_from <= from {
                    return Lookup::Local(id, *b);
                }
            }
            cur = s.parent;
        }
        Lookup::Outer
    }

    /// Innermost enclosing scope of `kind` (inclusive).
    pub fn enclosing(&self, scope: ScopeId, kind: ScopeKind) -> Option<ScopeId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if self.scopes[id.index()].kind == kind {
                return Some(id);
            }
            cur = self.scopes[id.index()].parent;
        }
        None
    }

    #[inline]
    pub fn mark(&self) -> ScopeMark {
        ScopeMark(self.journal.len())
    }

    /// Undoes every declaration and scope opened after `mark`.
    pub fn rollback(&mut self, mark: ScopeMark) {
        while self.journal.len() > mark.0 {
            match self.journal.pop() {
                Some(Journal::Declared(scope, sym)) => {
                    self.scopes[scope.index()].names.remove(&sym);
                }
                Some(Journal::Opened) => {
                    self.scopes.pop();
                }
                None => break,
            }
        }
    }

    /// Drops the journal once parsing is over; marks taken earlier become
    /// meaningless.
    pub fn seal(&mut self) {
        self.journal = Vec::new();
    }
}

/// A package-level name with the file it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageBinding {
    pub file: FileId,
    pub binding: Binding,
}

/// Package block merged from every file's scope 0.
#[derive(Debug, Clone, Default)]
pub struct PackageScope {
    names: IndexMap<Arc<str>, PackageBinding>,
}

impl PackageScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a name; on conflict the first declaration is kept and returned.
    pub fn insert(&mut self, name: &str, pb: PackageBinding) -> Option<PackageBinding> {
        if name == "_" || (name == "init" && matches!(pb.binding.decl, DeclRef::Func(_))) {
            return None;
        }
        if let Some(existing) = self.names.get(name) {
            return Some(*existing);
        }
        self.names.insert(name.into(), pb);
        None
    }

    pub fn get(&self, name: &str) -> Option<&PackageBinding> {
        self.names.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageBinding)> {
        self.names.iter().map(|(k, v)| (&**k, v))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cst::Id;

    fn var(i: u32, at: u32) -> Binding {
        Binding {
            decl: DeclRef::Var(Id::from_raw(i), 0),
            name: Tok(at),
            visible_from: Tok(at + 1),
        }
    }

    #[test]
    fn declare_keeps_first_binding() {
        let mut s = ScopeArena::new(None);
        let b = s.open(ScopeId::FILE, ScopeKind::Block);
        let x = Symbol::from_raw(7);
        assert_eq!(s.declare(b, x, var(0, 3)), None);
        assert_eq!(s.declare(b, x, var(1, 9)), Some(var(0, 3)));
        assert_eq!(s.get(b).get(x), Some(&var(0, 3)));
    }

    #[test]
    fn blank_is_never_recorded() {
        let blank = Symbol::from_raw(0);
        let mut s = ScopeArena::new(Some(blank));
        assert_eq!(s.declare(ScopeId::PACKAGE, blank, var(0, 1)), None);
        assert_eq!(s.declare(ScopeId::PACKAGE, blank, var(0, 2)), None);
        assert!(s.get(ScopeId::PACKAGE).is_empty());
    }

    #[test]
    fn lookup_respects_visibility() {
        let mut s = ScopeArena::new(None);
        let outer = s.open(ScopeId::FILE, ScopeKind::Func);
        let inner = s.open(outer, ScopeKind::Block);
        let x = Symbol::from_raw(1);
        s.declare(outer, x, var(0, 2));
        s.declare(inner, x, var(1, 10));

        // Before the inner declaration finishes, the outer x is found.
        assert_eq!(s.lookup(inner, x, Tok(10)), Lookup::Local(outer, var(0, 2)));
        assert_eq!(s.lookup(inner, x, Tok(11)), Lookup::Local(inner, var(1, 10)));
        assert_eq!(s.lookup(inner, x, Tok(1)), Lookup::Outer);
    }

    #[test]
    fn rollback_undoes_declarations_and_scopes() {
        let mut s = ScopeArena::new(None);
        let x = Symbol::from_raw(1);
        let mark = s.mark();
        let b = s.open(ScopeId::FILE, ScopeKind::Block);
        s.declare(b, x, var(0, 2));
        s.declare(ScopeId::FILE, x, var(0, 2));
        s.rollback(mark);
        assert_eq!(s.len(), 2);
        assert!(s.get(ScopeId::FILE).is_empty());
    }

    #[test]
    fn package_scope_reports_conflicts() {
        let mut p = PackageScope::new();
        let a = PackageBinding {
            file: FileId(0),
            binding: var(0, 1),
        };
        let b = PackageBinding {
            file: FileId(1),
            binding: var(1, 1),
        };
        assert_eq!(p.insert("x", a), None);
        assert_eq!(p.insert("x", b), Some(a));
        assert_eq!(p.get("x").map(|pb| pb.file), Some(FileId(0)));
    }
}
