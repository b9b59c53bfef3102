//! Concrete syntax tree for Go source files.
//!
//! Nodes live in typed arenas ([`SpannedArena`]) inside a [`CstArena`] and are
//! referenced by [`Id<T>`]; lists live in the central [`ExtraData`] buffers
//! and are referenced by [`ListRef<T>`]. Every node refers to its tokens by
//! [`Tok`] index, so the exact source text (separators included) is always
//! recoverable through the file's token table.
//!
//! Nodes that resolve names later carry the [`ScopeId`] that was current when
//! they were parsed: identifier operands, named types, blocks and the
//! implicit blocks of `if`/`for`/`switch`/`select` and case clauses.
//!
//! `#[derive(WalkCst)]` generates the `crate::walk::Walk` impls.

use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};
use std::collections::HashMap;
use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher, RandomState};

use cst_derive::WalkCst;
use smallvec::SmallVec;

use crate::error::Span;
use crate::scope::ScopeId;
use crate::token::Tok;

// =============================================================================
// Ids and list references
// =============================================================================

#[repr(transparent)]
pub struct Id<T> {
    raw: u32,
    _marker: PhantomData<fn() -> T>,
}

// Written by hand: derives would require the same traits of `T`.
impl<T> Copy for Id<T> {}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.raw)
    }
}

impl<T> Id<T> {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn to_usize(&self) -> usize {
        self.raw as usize
    }

    #[inline]
    pub const fn raw(&self) -> u32 {
        self.raw
    }
}

/// Typed reference into one of the [`ExtraData`] buffers.
pub struct ListRef<T> {
    start: u32,
    len: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Copy for ListRef<T> {}

impl<T> Clone for ListRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for ListRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.len == other.len
    }
}

impl<T> Eq for ListRef<T> {}

impl<T> Hash for ListRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.start.hash(state);
        self.len.hash(state);
    }
}

impl<T> fmt::Debug for ListRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListRef({}..{})", self.start, self.start + self.len)
    }
}

impl<T> Default for ListRef<T> {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl<T> ListRef<T> {
    pub const EMPTY: Self = Self {
        start: 0,
        len: 0,
        _marker: PhantomData,
    };

    #[inline]
    pub const fn new(start: u32, len: u32) -> Self {
        Self {
            start,
            len,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub const fn start(&self) -> u32 {
        self.start
    }

    #[inline]
    pub const fn end(&self) -> u32 {
        self.start + self.len
    }
}

// =============================================================================
// Symbols
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Symbol(u32);

impl Symbol {
    #[inline]
    pub const fn from_raw(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// One occurrence of an identifier: interned name plus the token it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentName {
    pub sym: Symbol,
    pub tok: Tok,
}

#[derive(Default)]
struct U64IdentityHasher(u64);

impl Hasher for U64IdentityHasher {
    fn write(&mut self, bytes: &[u8]) {
        // Only ever fed precomputed u64 hashes; fold anything else.
        for &b in bytes {
            self.0 = self.0.rotate_left(8) ^ b as u64;
        }
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.0 = i;
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }
}

type U64IdentityBuild = BuildHasherDefault<U64IdentityHasher>;

/// Per-file string interner; symbols are stable for the file's lifetime.
#[derive(Debug, Default, Clone)]
pub struct Interner {
    strings: Vec<Box<str>>,
    buckets: HashMap<u64, SmallVec<[Symbol; 1]>, U64IdentityBuild>,
    state: RandomState,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    fn hash_str(&self, s: &str) -> u64 {
        self.state.hash_one(s)
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        let h = self.hash_str(s);
        let entry = self.buckets.entry(h).or_default();
        for &sym in entry.iter() {
            if &*self.strings[sym.0 as usize] == s {
                return sym;
            }
        }
        let sym = Symbol(self.strings.len() as u32);
        self.strings.push(s.into());
        entry.push(sym);
        sym
    }

    /// Symbol for `s` if it was ever interned.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        let h = self.hash_str(s);
        self.buckets
            .get(&h)?
            .iter()
            .copied()
            .find(|sym| &*self.strings[sym.0 as usize] == s)
    }

    #[inline]
    pub fn resolve(&self, sym: Symbol) -> &str {
        self.strings.get(sym.0 as usize).map_or("", |s| s)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

// =============================================================================
// Arenas
// =============================================================================

/// Nodes plus their byte spans, stored side by side.
#[derive(Debug, Clone)]
pub struct SpannedArena<T> {
    data: Vec<T>,
    spans: Vec<Span>,
}

impl<T> Default for SpannedArena<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            spans: Vec::new(),
        }
    }
}

impl<T> SpannedArena<T> {
    #[inline]
    pub fn alloc(&mut self, node: T, span: Span) -> Id<T> {
        let id = Id::from_raw(self.data.len() as u32);
        self.data.push(node);
        self.spans.push(span);
        id
    }

    #[inline]
    pub fn get(&self, id: Id<T>) -> &T {
        &self.data[id.to_usize()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: Id<T>) -> &mut T {
        &mut self.data[id.to_usize()]
    }

    #[inline]
    pub fn span(&self, id: Id<T>) -> Span {
        self.spans[id.to_usize()]
    }

    /// Widens a node's span once its trailing children are known.
    #[inline]
    pub fn set_span(&mut self, id: Id<T>, span: Span) {
        self.spans[id.to_usize()] = span;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Id the next `alloc` will return.
    #[inline]
    pub fn next_id(&self) -> Id<T> {
        Id::from_raw(self.data.len() as u32)
    }

    pub fn ids(&self) -> impl Iterator<Item = Id<T>> + '_ {
        (0..self.data.len() as u32).map(Id::from_raw)
    }
}

impl<T> Index<Id<T>> for SpannedArena<T> {
    type Output = T;
    fn index(&self, id: Id<T>) -> &T {
        self.get(id)
    }
}

impl<T> IndexMut<Id<T>> for SpannedArena<T> {
    fn index_mut(&mut self, id: Id<T>) -> &mut T {
        self.get_mut(id)
    }
}

pub type DeclId = Id<GenDecl>;
pub type FuncDeclId = Id<FuncDecl>;
pub type ImportSpecId = Id<ImportSpec>;
pub type ValueSpecId = Id<ValueSpec>;
pub type TypeSpecId = Id<TypeSpec>;
pub type StmtId = Id<Stmt>;
pub type SimpleStmtId = Id<SimpleStmt>;
pub type ExprId = Id<Expr>;
pub type TypeExprId = Id<TypeExpr>;
pub type FieldId = Id<Field>;
pub type SignatureId = Id<Signature>;
pub type SwitchClauseId = Id<SwitchClause>;
pub type CommClauseId = Id<CommClause>;
pub type TypeParamsId = Id<TypeParams>;
pub type TypeParamDeclId = Id<TypeParamDecl>;

/// Central list buffers that [`ListRef`]s point into.
#[derive(Debug, Default, Clone)]
pub struct ExtraData {
    pub ident_names: Vec<IdentName>,
    pub exprs: Vec<ExprId>,
    pub stmts: Vec<StmtId>,
    pub types: Vec<TypeExprId>,
    pub fields: Vec<FieldId>,
    pub specs: Vec<Spec>,
    pub keyed_elems: Vec<KeyedElement>,
    pub top_decls: Vec<TopLevelDecl>,
    pub switch_clause_ids: Vec<SwitchClauseId>,
    pub comm_clause_ids: Vec<CommClauseId>,
    pub type_case_elems: Vec<TypeCaseElem>,
    pub type_terms: Vec<TypeTerm>,
    pub interface_elems: Vec<InterfaceElem>,
    pub type_param_decl_ids: Vec<TypeParamDeclId>,
    pub expr_or_types: Vec<ExprOrType>,
}

#[derive(Debug, Default, Clone)]
pub struct CstArena {
    pub decls: SpannedArena<GenDecl>,
    pub funcs: SpannedArena<FuncDecl>,
    pub import_specs: SpannedArena<ImportSpec>,
    pub value_specs: SpannedArena<ValueSpec>,
    pub type_specs: SpannedArena<TypeSpec>,
    pub stmts: SpannedArena<Stmt>,
    pub simple_stmts: SpannedArena<SimpleStmt>,
    pub exprs: SpannedArena<Expr>,
    pub types: SpannedArena<TypeExpr>,
    pub signatures: SpannedArena<Signature>,
    pub fields: SpannedArena<Field>,
    pub switch_clauses: SpannedArena<SwitchClause>,
    pub comm_clauses: SpannedArena<CommClause>,
    pub type_params: SpannedArena<TypeParams>,
    pub type_param_decls: SpannedArena<TypeParamDecl>,
    pub extras: ExtraData,
}

macro_rules! list_accessors {
    ($($t:ty => $buf:ident, $build:ident, $get:ident;)*) => {
        impl CstArena {
            $(
                pub fn $build(&mut self, items: impl IntoIterator<Item = $t>) -> ListRef<$t> {
                    Self::push_list(&mut self.extras.$buf, items)
                }

                #[inline]
                pub fn $get(&self, r: ListRef<$t>) -> &[$t] {
                    &self.extras.$buf[r.start() as usize..r.end() as usize]
                }
            )*
        }
    };
}

impl CstArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_list<T>(buf: &mut Vec<T>, items: impl IntoIterator<Item = T>) -> ListRef<T> {
        let start = buf.len();
        buf.extend(items);
        ListRef::new(start as u32, (buf.len() - start) as u32)
    }
}

list_accessors! {
    IdentName => ident_names, list_ident_names, ident_names;
    ExprId => exprs, list_exprs, exprs_list;
    StmtId => stmts, list_stmts, stmts_list;
    TypeExprId => types, list_types, types_list;
    FieldId => fields, list_fields, fields_list;
    Spec => specs, list_specs, specs_list;
    KeyedElement => keyed_elems, list_keyed_elems, keyed_elems_list;
    TopLevelDecl => top_decls, list_top_decls, top_decls;
    SwitchClauseId => switch_clause_ids, list_switch_clause_ids, switch_clause_ids;
    CommClauseId => comm_clause_ids, list_comm_clause_ids, comm_clause_ids;
    TypeCaseElem => type_case_elems, list_type_cases, type_case_elems;
    TypeTerm => type_terms, list_type_terms, type_terms;
    InterfaceElem => interface_elems, list_interface_elems, interface_elems;
    TypeParamDeclId => type_param_decl_ids, list_type_param_decl_ids, type_param_decl_ids;
    ExprOrType => expr_or_types, list_expr_or_types, expr_or_types;
}

// =============================================================================
// Source file and declarations
// =============================================================================

/// `SourceFile = PackageClause ";" { ImportDecl ";" } { TopLevelDecl ";" }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct SourceFile {
    pub package_tok: Tok,
    pub name: IdentName,
    /// Import declarations come first in this list.
    pub decls: ListRef<TopLevelDecl>,
    pub eof: Tok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum TopLevelDecl {
    Decl(DeclId),
    Func(FuncDeclId),
}

/// `import`, `const`, `type` or `var` declaration, grouped or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct GenDecl {
    pub kw: Tok,
    pub kind: GenDeclKind,
    pub l_paren: Option<Tok>,
    pub specs: ListRef<Spec>,
    pub r_paren: Option<Tok>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GenDeclKind {
    Import,
    Const,
    Type,
    Var,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum Spec {
    Import(ImportSpecId),
    Value(ValueSpecId),
    Type(TypeSpecId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct ImportSpec {
    pub name: Option<ImportName>,
    /// String literal token.
    pub path: Tok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum ImportName {
    Dot(Tok),
    Blank(Tok),
    Name(IdentName),
}

/// Constant or variable spec.
///
/// Constant specs inside a group without an initializer repeat the nearest
/// preceding spec's type and expressions; `inherit` points at that spec and
/// `iota` is the value spec's position in its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct ValueSpec {
    pub is_const: bool,
    pub names: ListRef<IdentName>,
    pub typ: Option<TypeExprId>,
    pub values: ListRef<ExprId>,
    pub iota: u32,
    #[walk(skip)]
    pub inherit: Option<ValueSpecId>,
}

/// `TypeSpec = AliasDecl | TypeDef`
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct TypeSpec {
    pub name: IdentName,
    pub type_params: Option<TypeParamsId>,
    /// `=` of an alias declaration.
    pub assign: Option<Tok>,
    pub typ: TypeExprId,
    /// Scope type parameters were declared in.
    pub scope: ScopeId,
}

impl TypeSpec {
    #[inline]
    pub fn is_alias(&self) -> bool {
        self.assign.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct FuncDecl {
    pub func_tok: Tok,
    pub recv: Option<Receiver>,
    pub name: IdentName,
    pub type_params: Option<TypeParamsId>,
    pub sig: SignatureId,
    pub body: Option<Block>,
    /// Function scope: receiver, type parameters, parameters and results.
    pub scope: ScopeId,
}

/// `(r *T[P, Q])`
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct Receiver {
    pub l_paren: Tok,
    pub name: Option<IdentName>,
    pub star: Option<Tok>,
    pub base: IdentName,
    pub type_params: ListRef<IdentName>,
    pub r_paren: Tok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct TypeParams {
    pub l_brack: Tok,
    pub params: ListRef<TypeParamDeclId>,
    pub r_brack: Tok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct TypeParamDecl {
    pub names: ListRef<IdentName>,
    pub constraint: TypeExprId,
}

// =============================================================================
// Signatures and fields
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct Signature {
    pub params: FieldList,
    pub results: Option<Results>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum Results {
    Params(FieldList),
    Type(TypeExprId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct FieldList {
    pub open: Tok,
    pub fields: ListRef<FieldId>,
    pub close: Tok,
}

/// Parameter, result or struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct Field {
    pub names: ListRef<IdentName>,
    pub ellipsis: Option<Tok>,
    pub typ: TypeExprId,
    pub tag: Option<Tok>,
    pub embedded: bool,
}

// =============================================================================
// Statements
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum SimpleStmt {
    Empty(Tok),
    Expr(ExprId),
    Send {
        chan: ExprId,
        arrow: Tok,
        value: ExprId,
    },
    IncDec {
        target: ExprId,
        op: IncDecOp,
        op_tok: Tok,
    },
    Assign {
        lhs: ListRef<ExprId>,
        op: AssignOp,
        op_tok: Tok,
        rhs: ListRef<ExprId>,
    },
    ShortVarDecl {
        names: ListRef<IdentName>,
        op_tok: Tok,
        values: ListRef<ExprId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum Stmt {
    Simple(SimpleStmtId),
    Decl(DeclId),
    Labeled {
        label: IdentName,
        colon: Tok,
        body: StmtId,
    },
    Go {
        go_tok: Tok,
        call: ExprId,
    },
    Defer {
        defer_tok: Tok,
        call: ExprId,
    },
    Return {
        return_tok: Tok,
        results: ListRef<ExprId>,
    },
    Branch(BranchStmt),
    Block(Block),
    If {
        if_tok: Tok,
        scope: ScopeId,
        init: Option<SimpleStmtId>,
        cond: ExprId,
        then_block: Block,
        else_stmt: Option<StmtId>,
    },
    For {
        for_tok: Tok,
        scope: ScopeId,
        kind: ForKind,
        body: Block,
    },
    Switch {
        switch_tok: Tok,
        scope: ScopeId,
        init: Option<SimpleStmtId>,
        tag: Option<ExprId>,
        l_brace: Tok,
        clauses: ListRef<SwitchClauseId>,
        r_brace: Tok,
    },
    TypeSwitch {
        switch_tok: Tok,
        scope: ScopeId,
        init: Option<SimpleStmtId>,
        guard: TypeSwitchGuard,
        l_brace: Tok,
        clauses: ListRef<SwitchClauseId>,
        r_brace: Tok,
    },
    Select {
        select_tok: Tok,
        l_brace: Tok,
        clauses: ListRef<CommClauseId>,
        r_brace: Tok,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum ForKind {
    Infinite,
    Cond(ExprId),
    Clause {
        init: Option<SimpleStmtId>,
        cond: Option<ExprId>,
        post: Option<SimpleStmtId>,
    },
    Range {
        lhs: Option<RangeLhs>,
        range_tok: Tok,
        range_expr: ExprId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum RangeLhs {
    Define {
        names: ListRef<IdentName>,
        op_tok: Tok,
    },
    Assign {
        exprs: ListRef<ExprId>,
        op_tok: Tok,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum SwitchClause {
    /// `case x, y:` or `default:` (empty `items`, `default` set).
    ExprCase {
        case_tok: Tok,
        scope: ScopeId,
        is_default: bool,
        items: ListRef<ExprId>,
        colon: Tok,
        stmts: ListRef<StmtId>,
    },
    TypeCase {
        case_tok: Tok,
        scope: ScopeId,
        is_default: bool,
        items: ListRef<TypeCaseElem>,
        colon: Tok,
        stmts: ListRef<StmtId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum CommClause {
    Case {
        case_tok: Tok,
        scope: ScopeId,
        comm: CommStmt,
        colon: Tok,
        stmts: ListRef<StmtId>,
    },
    Default {
        default_tok: Tok,
        scope: ScopeId,
        colon: Tok,
        stmts: ListRef<StmtId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum CommStmt {
    Send {
        chan: ExprId,
        arrow: Tok,
        value: ExprId,
    },
    /// `<-ch`, `x := <-ch`, `x, ok = <-ch`
    Recv {
        lhs: Option<RangeLhs>,
        recv: ExprId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum BranchStmt {
    Break {
        tok: Tok,
        label: Option<IdentName>,
    },
    Continue {
        tok: Tok,
        label: Option<IdentName>,
    },
    Goto {
        tok: Tok,
        label: IdentName,
    },
    Fallthrough {
        tok: Tok,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub l_brace: Tok,
    pub scope: ScopeId,
    pub stmts: ListRef<StmtId>,
    pub r_brace: Tok,
}

/// `[ x := ] PrimaryExpr "." "(" "type" ")"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct TypeSwitchGuard {
    pub bind: Option<IdentName>,
    pub subject: ExprId,
    pub type_tok: Tok,
}

// =============================================================================
// Expressions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct LiteralValue {
    pub l_brace: Tok,
    pub elements: ListRef<KeyedElement>,
    pub r_brace: Tok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct KeyedElement {
    pub key: Option<Element>,
    pub value: Element,
}

/// Key or element of a composite literal. A bare identifier key is parsed
/// as an expression; the checker decides whether it names a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum Element {
    Expr(ExprId),
    Literal(LiteralValue),
}

/// Bracketed item that is either an index expression or a type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum ExprOrType {
    Expr(ExprId),
    Type(TypeExprId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum Expr {
    Ident {
        name: IdentName,
        scope: ScopeId,
    },
    BasicLit {
        kind: BasicLitKind,
        tok: Tok,
    },
    FuncLit {
        func_tok: Tok,
        sig: SignatureId,
        body: Block,
    },
    CompositeLit {
        typ: TypeExprId,
        lit: LiteralValue,
    },
    /// A type in operand position: conversion callee, method expression
    /// receiver, or a builtin's type argument.
    Type(TypeExprId),
    /// `a[x]` or `F[T]`: which one depends on what `a`/`F` denotes.
    IndexOrInstantiate {
        base: ExprId,
        l_brack: Tok,
        args: ListRef<ExprOrType>,
        r_brack: Tok,
    },
    Paren {
        l_paren: Tok,
        inner: ExprId,
        r_paren: Tok,
    },
    Selector {
        base: ExprId,
        dot: Tok,
        sel: IdentName,
    },
    Slice {
        base: ExprId,
        l_brack: Tok,
        lo: Option<ExprId>,
        hi: Option<ExprId>,
        max: Option<ExprId>,
        r_brack: Tok,
    },
    /// `x.(T)`; `typ` is `None` only for a type switch guard's `x.(type)`.
    TypeAssert {
        base: ExprId,
        l_paren: Tok,
        typ: Option<TypeExprId>,
        r_paren: Tok,
    },
    Call {
        callee: ExprId,
        l_paren: Tok,
        args: ListRef<ExprOrType>,
        ellipsis: Option<Tok>,
        r_paren: Tok,
    },
    Unary {
        op: UnaryOp,
        op_tok: Tok,
        operand: ExprId,
    },
    Binary {
        left: ExprId,
        op: BinaryOp,
        op_tok: Tok,
        right: ExprId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BasicLitKind {
    Int,
    Float,
    Imag,
    Rune,
    String,
}

// =============================================================================
// Type expressions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum TypeExpr {
    /// `Name`, `pkg.Name`, `Name[A, B]`
    Named {
        pkg: Option<IdentName>,
        name: IdentName,
        args: ListRef<TypeExprId>,
        scope: ScopeId,
    },
    Pointer {
        star: Tok,
        elem: TypeExprId,
    },
    Array {
        l_brack: Tok,
        len: ArrayLen,
        elem: TypeExprId,
    },
    Slice {
        l_brack: Tok,
        elem: TypeExprId,
    },
    Map {
        map_tok: Tok,
        key: TypeExprId,
        value: TypeExprId,
    },
    Chan {
        dir: ChanDir,
        chan_tok: Tok,
        elem: TypeExprId,
    },
    Struct {
        struct_tok: Tok,
        fields: ListRef<FieldId>,
    },
    Interface {
        interface_tok: Tok,
        elems: ListRef<InterfaceElem>,
    },
    Func {
        func_tok: Tok,
        sig: SignatureId,
    },
    Paren {
        l_paren: Tok,
        inner: TypeExprId,
    },
    /// Constraint union `~int | string`; a single `~T` term is a union of one.
    Union {
        terms: ListRef<TypeTerm>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum ArrayLen {
    Expr(ExprId),
    /// `[...]T` in a composite literal.
    Ellipsis(Tok),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum TypeCaseElem {
    Type(TypeExprId),
    Nil(Tok),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub struct TypeTerm {
    pub tilde: Option<Tok>,
    pub typ: TypeExprId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, WalkCst)]
pub enum InterfaceElem {
    Method { name: IdentName, sig: SignatureId },
    /// Embedded interface or a type-set element.
    Embed(TypeExprId),
}

// =============================================================================
// Operators
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Add,
    Sub,
    Not,
    Xor,
    Deref,
    Addr,
    Recv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    LAnd,
    LOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// Go operator precedence (5 binds tightest).
    pub const fn precedence(self) -> u8 {
        use BinaryOp::*;
        match self {
            Mul | Div | Mod | Shl | Shr | And | AndNot => 5,
            Add | Sub | Or | Xor => 4,
            Eq | Ne | Lt | Le | Gt | Ge => 3,
            LAnd => 2,
            LOr => 1,
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub const fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    pub const fn as_str(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            And => "&",
            Or => "|",
            Xor => "^",
            Shl => "<<",
            Shr => ">>",
            AndNot => "&^",
            LAnd => "&&",
            LOr => "||",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    /// `x op= y`
    Op(BinaryOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncDecOp {
    Inc,
    Dec,
}

/// Arena and root of one successfully parsed file.
#[derive(Debug, Clone)]
pub struct Cst {
    pub arena: CstArena,
    pub root: SourceFile,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashSet};

    #[test]
    fn handles_compare_without_bounds_on_the_node() {
        struct Opaque;
        let ids: HashSet<Id<Opaque>> = [Id::from_raw(1), Id::from_raw(1), Id::from_raw(2)].into_iter().collect();
        assert_eq!(ids.len(), 2);
        let ordered: BTreeSet<Id<Opaque>> = [Id::from_raw(3), Id::from_raw(1)].into_iter().collect();
        assert_eq!(ordered.iter().map(Id::raw).collect::<Vec<_>>(), [1, 3]);
        let lists: HashSet<ListRef<Opaque>> = [ListRef::new(0, 2), ListRef::new(0, 2), ListRef::new(2, 1)].into_iter().collect();
        assert_eq!(lists.len(), 2);
        assert_eq!(format!("{:?}", ListRef::<Opaque>::new(2, 3)), "ListRef(2..5)");
    }

    #[test]
    fn interner_dedups() {
        let mut i = Interner::new();
        let a = i.intern("foo");
        let b = i.intern("bar");
        assert_ne!(a, b);
        assert_eq!(i.intern("foo"), a);
        assert_eq!(i.resolve(b), "bar");
        assert_eq!(i.get("bar"), Some(b));
        assert_eq!(i.get("baz"), None);
    }

    #[test]
    fn lists_are_contiguous_slices() {
        let mut a = CstArena::new();
        let n = |s: u32| IdentName {
            sym: Symbol::from_raw(s),
            tok: Tok(s),
        };
        let first = a.list_ident_names([n(1), n(2)]);
        let second = a.list_ident_names([n(3)]);
        assert_eq!(a.ident_names(first).len(), 2);
        assert_eq!(a.ident_names(second)[0].tok, Tok(3));
        assert!(a.ident_names(ListRef::EMPTY).is_empty());
    }
}
