//! Semantic types.
//!
//! [`Type`] is a cheap-to-clone handle: composite forms share their parts
//! through `Arc`. Defined types are [`Named`] values with interior
//! mutability so the checker can hand out a handle before the underlying
//! type is known; that is what makes `type List struct { next *List }`
//! resolvable without infinite recursion.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cst::ChanDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,

    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub const fn name(self) -> &'static str {
        use BasicKind::*;
        match self {
            Bool => "bool",
            Int => "int",
            Int8 => "int8",
            Int16 => "int16",
            Int32 => "int32",
            Int64 => "int64",
            Uint => "uint",
            Uint8 => "uint8",
            Uint16 => "uint16",
            Uint32 => "uint32",
            Uint64 => "uint64",
            Uintptr => "uintptr",
            Float32 => "float32",
            Float64 => "float64",
            Complex64 => "complex64",
            Complex128 => "complex128",
            String => "string",
            UnsafePointer => "unsafe.Pointer",
            UntypedBool => "untyped bool",
            UntypedInt => "untyped int",
            UntypedRune => "untyped rune",
            UntypedFloat => "untyped float",
            UntypedComplex => "untyped complex",
            UntypedString => "untyped string",
            UntypedNil => "untyped nil",
        }
    }

    pub const fn is_untyped(self) -> bool {
        (self as u8) >= (BasicKind::UntypedBool as u8)
    }

    pub const fn is_boolean(self) -> bool {
        matches!(self, BasicKind::Bool | BasicKind::UntypedBool)
    }

    pub const fn is_integer(self) -> bool {
        use BasicKind::*;
        matches!(
            self,
            Int | Int8
                | Int16
                | Int32
                | Int64
                | Uint
                | Uint8
                | Uint16
                | Uint32
                | Uint64
                | Uintptr
                | UntypedInt
                | UntypedRune
        )
    }

    pub const fn is_unsigned(self) -> bool {
        use BasicKind::*;
        matches!(self, Uint | Uint8 | Uint16 | Uint32 | Uint64 | Uintptr)
    }

    pub const fn is_float(self) -> bool {
        matches!(
            self,
            BasicKind::Float32 | BasicKind::Float64 | BasicKind::UntypedFloat
        )
    }

    pub const fn is_complex(self) -> bool {
        matches!(
            self,
            BasicKind::Complex64 | BasicKind::Complex128 | BasicKind::UntypedComplex
        )
    }

    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    pub const fn is_string(self) -> bool {
        matches!(self, BasicKind::String | BasicKind::UntypedString)
    }

    pub const fn is_ordered(self) -> bool {
        self.is_integer() || self.is_float() || self.is_string()
    }

    /// Whether values of this kind can be constants.
    pub const fn is_const_type(self) -> bool {
        self.is_boolean() || self.is_numeric() || self.is_string()
    }

    /// Rank among untyped numeric kinds: int < rune < float < complex.
    pub const fn untyped_rank(self) -> Option<u8> {
        match self {
            BasicKind::UntypedInt => Some(0),
            BasicKind::UntypedRune => Some(1),
            BasicKind::UntypedFloat => Some(2),
            BasicKind::UntypedComplex => Some(3),
            _ => None,
        }
    }

    /// Type an untyped constant takes when nothing else decides it.
    pub const fn default_kind(self) -> BasicKind {
        match self {
            BasicKind::UntypedBool => BasicKind::Bool,
            BasicKind::UntypedInt => BasicKind::Int,
            BasicKind::UntypedRune => BasicKind::Int32,
            BasicKind::UntypedFloat => BasicKind::Float64,
            BasicKind::UntypedComplex => BasicKind::Complex128,
            BasicKind::UntypedString => BasicKind::String,
            k => k,
        }
    }

    /// Size in bytes for a target with `word`-byte pointers.
    pub const fn size(self, word: u64) -> Option<u64> {
        use BasicKind::*;
        Some(match self {
            Bool | Int8 | Uint8 => 1,
            Int16 | Uint16 => 2,
            Int32 | Uint32 | Float32 => 4,
            Int64 | Uint64 | Float64 | Complex64 => 8,
            Complex128 => 16,
            Int | Uint | Uintptr | UnsafePointer => word,
            String => 2 * word,
            _ => return None,
        })
    }

    pub const fn align(self, word: u64) -> Option<u64> {
        match self {
            BasicKind::Complex64 => Some(4),
            BasicKind::Complex128 => Some(8),
            BasicKind::String => Some(word),
            // 64-bit integers are word-aligned on 32-bit targets.
            BasicKind::Int64 | BasicKind::Uint64 | BasicKind::Float64 => {
                Some(if word < 8 { word } else { 8 })
            }
            k => k.size(word),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Type {
    /// Sentinel for anything that failed to check; silences follow-up errors.
    Invalid,
    Basic(BasicKind),
    Array(Arc<Type>, u64),
    Slice(Arc<Type>),
    Pointer(Arc<Type>),
    Map(Arc<Type>, Arc<Type>),
    Chan(ChanDir, Arc<Type>),
    Signature(Arc<Signature>),
    Interface(Arc<Interface>),
    Struct(Arc<Struct>),
    Named(Arc<Named>),
    /// Multiple values: call results, `v, ok` forms.
    Tuple(Arc<[Type]>),
    TypeParam(Arc<TypeParam>),
}

#[derive(Debug, Clone)]
#[derive(Default)]
pub struct Signature {
    /// Non-empty for generic functions that have not been instantiated.
    pub type_params: Vec<Arc<TypeParam>>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    /// Last parameter is `...T`; its type is stored as `[]T`.
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<Arc<str>>,
    pub typ: Type,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: Arc<str>,
    pub typ: Type,
    pub embedded: bool,
    pub tag: Option<Arc<str>>,
}

#[derive(Debug, Clone, Default)]
pub struct Struct {
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: Arc<str>,
    pub sig: Arc<Signature>,
    /// Declared on `*T` rather than `T`.
    pub pointer_recv: bool,
}

#[derive(Debug, Clone)]
pub struct Term {
    pub tilde: bool,
    pub typ: Type,
}

#[derive(Debug, Clone, Default)]
pub struct Interface {
    pub methods: Vec<Method>,
    pub embeds: Vec<Type>,
    /// Type-set union, if the interface restricts its types.
    pub terms: Vec<Term>,
    /// The predeclared `comparable`.
    pub comparable: bool,
}

impl Interface {
    /// Method set including embedded interfaces, shallow-deduplicated by name.
    pub fn all_methods(&self) -> Vec<Method> {
        let mut out: Vec<Method> = self.methods.clone();
        let mut stack: Vec<Type> = self.embeds.clone();
        let mut guard = 0;
        while let Some(t) = stack.pop() {
            guard += 1;
            if guard > 64 {
                break;
            }
            if let Type::Interface(i) = t.underlying() {
                for m in &i.methods {
                    if !out.iter().any(|o| o.name == m.name) {
                        out.push(m.clone());
                    }
                }
                stack.extend(i.embeds.iter().cloned());
            }
        }
        out
    }

    pub fn is_constraint_only(&self) -> bool {
        self.comparable || !self.terms.is_empty()
    }
}

#[derive(Debug)]
pub struct TypeParam {
    pub id: u64,
    pub name: Arc<str>,
    pub index: u32,
    pub constraint: RwLock<Type>,
}

/// Resolution state of a defined type.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedState {
    Unresolved = 0,
    Resolving = 1,
    Resolved = 2,
}

static NEXT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn fresh_type_id() -> u64 {
    NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
pub struct Named {
    pub id: u64,
    pub name: Arc<str>,
    /// Package name used for display; empty for predeclared types.
    pub pkg: Arc<str>,
    /// Type arguments of an instantiation.
    pub targs: Vec<Type>,
    origin: Option<Arc<Named>>,
    state: AtomicU8,
    underlying: RwLock<Type>,
    methods: RwLock<Vec<Method>>,
    type_params: RwLock<Vec<Arc<TypeParam>>>,
}

impl Named {
    pub fn new(name: impl Into<Arc<str>>, pkg: impl Into<Arc<str>>) -> Arc<Named> {
        Arc::new(Named {
            id: fresh_type_id(),
            name: name.into(),
            pkg: pkg.into(),
            targs: Vec::new(),
            origin: None,
            state: AtomicU8::new(NamedState::Unresolved as u8),
            underlying: RwLock::new(Type::Invalid),
            methods: RwLock::new(Vec::new()),
            type_params: RwLock::new(Vec::new()),
        })
    }

    /// An already-resolved defined type, e.g. the predeclared `error`.
    pub fn resolved(name: &str, pkg: &str, underlying: Type) -> Arc<Named> {
        let n = Named::new(name, pkg);
        n.set_underlying(underlying);
        n
    }

    /// Instantiates a generic type. The underlying type and method set are
    /// derived from `origin` on demand, so the origin may still be resolving.
    pub fn instantiate(origin: &Arc<Named>, targs: Vec<Type>) -> Arc<Named> {
        Arc::new(Named {
            id: fresh_type_id(),
            name: origin.name.clone(),
            pkg: origin.pkg.clone(),
            targs,
            origin: Some(origin.clone()),
            state: AtomicU8::new(NamedState::Unresolved as u8),
            underlying: RwLock::new(Type::Invalid),
            methods: RwLock::new(Vec::new()),
            type_params: RwLock::new(Vec::new()),
        })
    }

    /// The generic type this is an instance of.
    pub fn origin(&self) -> Option<&Arc<Named>> {
        self.origin.as_ref()
    }

    fn targ_map(&self, origin: &Named) -> Vec<(u64, Type)> {
        origin
            .type_params()
            .iter()
            .zip(&self.targs)
            .map(|(tp, t)| (tp.id, t.clone()))
            .collect()
    }

    pub fn state(&self) -> NamedState {
        match self.state.load(Ordering::Acquire) {
            0 => NamedState::Unresolved,
            1 => NamedState::Resolving,
            _ => NamedState::Resolved,
        }
    }

    /// Moves `Unresolved -> Resolving`; false if someone else got there first.
    pub fn begin_resolve(&self) -> bool {
        self.state
            .compare_exchange(
                NamedState::Unresolved as u8,
                NamedState::Resolving as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn set_underlying(&self, t: Type) {
        *self.underlying.write() = t;
        self.state.store(NamedState::Resolved as u8, Ordering::Release);
    }

    pub fn underlying(&self) -> Type {
        if let Some(origin) = &self.origin {
            if self.state() != NamedState::Resolved {
                if origin.state() != NamedState::Resolved {
                    return Type::Invalid;
                }
                let u = subst(&origin.underlying(), &self.targ_map(origin));
                self.set_underlying(u.clone());
                return u;
            }
        }
        self.underlying.read().clone()
    }

    pub fn methods(&self) -> Vec<Method> {
        match &self.origin {
            Some(origin) => {
                let map = self.targ_map(origin);
                origin
                    .methods()
                    .into_iter()
                    .map(|m| Method {
                        sig: Arc::new(subst_sig(&m.sig, &map)),
                        ..m
                    })
                    .collect()
            }
            None => self.methods.read().clone(),
        }
    }

    pub fn method(&self, name: &str) -> Option<Method> {
        self.methods().into_iter().find(|m| &*m.name == name)
    }

    pub fn add_method(&self, m: Method) {
        let mut ms = self.methods.write();
        if !ms.iter().any(|o| o.name == m.name) {
            ms.push(m);
        }
    }

    pub fn set_type_params(&self, tps: Vec<Arc<TypeParam>>) {
        *self.type_params.write() = tps;
    }

    pub fn type_params(&self) -> Vec<Arc<TypeParam>> {
        self.type_params.read().clone()
    }

    /// Drops the underlying type and methods so that `Arc` cycles through
    /// self-referential types are released.
    pub(crate) fn clear(&self) {
        *self.underlying.write() = Type::Invalid;
        self.methods.write().clear();
        for tp in self.type_params.write().drain(..) {
            *tp.constraint.write() = Type::Invalid;
        }
    }
}

impl Type {
    pub const fn basic(k: BasicKind) -> Type {
        Type::Basic(k)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    pub fn pointer(elem: Type) -> Type {
        Type::Pointer(Arc::new(elem))
    }

    pub fn slice(elem: Type) -> Type {
        Type::Slice(Arc::new(elem))
    }

    pub fn tuple(items: Vec<Type>) -> Type {
        Type::Tuple(items.into())
    }

    /// Follows defined types to the type they are defined over.
    pub fn underlying(&self) -> Type {
        let mut t = self.clone();
        for _ in 0..64 {
            match t {
                Type::Named(n) => t = n.underlying(),
                other => return other,
            }
        }
        Type::Invalid
    }

    /// On-demand structural view used by the checker: the underlying type,
    /// with type parameters replaced by the core type of their constraint
    /// when it has one.
    pub fn resolve(&self) -> Type {
        match self.underlying() {
            Type::TypeParam(tp) => {
                let c = tp.constraint.read().underlying();
                match c {
                    Type::Interface(i) if i.terms.len() == 1 => i.terms[0].typ.underlying(),
                    _ => Type::TypeParam(tp),
                }
            }
            t => t,
        }
    }

    pub fn basic_kind(&self) -> Option<BasicKind> {
        match self.underlying() {
            Type::Basic(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, Type::Basic(k) if k.is_untyped())
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Type::Named(_) | Type::TypeParam(_))
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.underlying(), Type::Interface(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Type::Basic(BasicKind::UntypedNil))
    }

    /// Types whose zero value is `nil`.
    pub fn is_nillable(&self) -> bool {
        matches!(
            self.underlying(),
            Type::Pointer(_)
                | Type::Slice(_)
                | Type::Map(..)
                | Type::Chan(..)
                | Type::Signature(_)
                | Type::Interface(_)
                | Type::Basic(BasicKind::UnsafePointer)
        )
    }

    pub fn is_comparable(&self) -> bool {
        match self.underlying() {
            Type::Basic(k) => k != BasicKind::UntypedNil,
            Type::Pointer(_) | Type::Chan(..) | Type::Interface(_) => true,
            Type::Struct(s) => s.fields.iter().all(|f| f.typ.is_comparable()),
            Type::Array(e, _) => e.is_comparable(),
            Type::TypeParam(_) => true,
            _ => false,
        }
    }

    pub fn size(&self, word: u64) -> Option<u64> {
        match self {
            Type::Invalid | Type::TypeParam(_) => None,
            Type::Basic(k) => k.size(word),
            Type::Pointer(_) | Type::Map(..) | Type::Chan(..) | Type::Signature(_) => Some(word),
            Type::Slice(_) => Some(3 * word),
            Type::Interface(_) => Some(2 * word),
            Type::Array(e, n) => e.size(word)?.checked_mul(*n),
            Type::Struct(s) => struct_layout(s.fields.iter().map(|f| &f.typ), word).map(|l| l.0),
            Type::Tuple(ts) => struct_layout(ts.iter(), word).map(|l| l.0),
            Type::Named(n) => n.underlying().size(word),
        }
    }

    pub fn align(&self, word: u64) -> Option<u64> {
        match self {
            Type::Invalid | Type::TypeParam(_) => None,
            Type::Basic(k) => k.align(word),
            Type::Pointer(_)
            | Type::Map(..)
            | Type::Chan(..)
            | Type::Signature(_)
            | Type::Slice(_)
            | Type::Interface(_) => Some(word),
            Type::Array(e, _) => e.align(word),
            Type::Struct(s) => struct_layout(s.fields.iter().map(|f| &f.typ), word).map(|l| l.1),
            Type::Tuple(ts) => struct_layout(ts.iter(), word).map(|l| l.1),
            Type::Named(n) => n.underlying().align(word),
        }
    }

    /// Byte offsets of a struct's fields.
    pub fn field_offsets(&self, word: u64) -> Option<Vec<u64>> {
        let Type::Struct(s) = self.underlying() else {
            return None;
        };
        let mut offs = Vec::with_capacity(s.fields.len());
        let mut off = 0u64;
        for f in &s.fields {
            let a = f.typ.align(word)?.max(1);
            off = off.div_ceil(a) * a;
            offs.push(off);
            off += f.typ.size(word)?;
        }
        Some(offs)
    }
}

/// (size, align) of fields laid out in order with natural alignment.
fn struct_layout<'t>(fields: impl Iterator<Item = &'t Type>, word: u64) -> Option<(u64, u64)> {
    let mut off = 0u64;
    let mut max_align = 1u64;
    for t in fields {
        let a = t.align(word)?.max(1);
        max_align = max_align.max(a);
        off = off.div_ceil(a) * a;
        off = off.checked_add(t.size(word)?)?;
    }
    Some((off.div_ceil(max_align) * max_align, max_align))
}

/// Type identity.
pub fn identical(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Invalid, _) | (_, Type::Invalid) => false,
        (Type::Basic(x), Type::Basic(y)) => x == y,
        (Type::Named(x), Type::Named(y)) => {
            if x.id == y.id {
                return true;
            }
            // Two instantiations of the same generic type with identical arguments.
            !x.targs.is_empty()
                && x.name == y.name
                && x.pkg == y.pkg
                && x.targs.len() == y.targs.len()
                && x.targs.iter().zip(&y.targs).all(|(p, q)| identical(p, q))
        }
        (Type::TypeParam(x), Type::TypeParam(y)) => x.id == y.id,
        (Type::Array(e1, n1), Type::Array(e2, n2)) => n1 == n2 && identical(e1, e2),
        (Type::Slice(e1), Type::Slice(e2)) | (Type::Pointer(e1), Type::Pointer(e2)) => identical(e1, e2),
        (Type::Map(k1, v1), Type::Map(k2, v2)) => identical(k1, k2) && identical(v1, v2),
        (Type::Chan(d1, e1), Type::Chan(d2, e2)) => d1 == d2 && identical(e1, e2),
        (Type::Signature(s1), Type::Signature(s2)) => identical_sig(s1, s2),
        (Type::Struct(s1), Type::Struct(s2)) => {
            s1.fields.len() == s2.fields.len()
                && s1.fields.iter().zip(&s2.fields).all(|(f, g)| {
                    f.name == g.name && f.embedded == g.embedded && identical(&f.typ, &g.typ)
                })
        }
        (Type::Interface(i1), Type::Interface(i2)) => {
            if i1.comparable != i2.comparable || i1.terms.len() != i2.terms.len() {
                return false;
            }
            let m1 = i1.all_methods();
            let m2 = i2.all_methods();
            m1.len() == m2.len()
                && m1.iter().all(|m| {
                    m2.iter()
                        .any(|n| n.name == m.name && identical_sig(&m.sig, &n.sig))
                })
        }
        (Type::Tuple(t1), Type::Tuple(t2)) => {
            t1.len() == t2.len() && t1.iter().zip(t2.iter()).all(|(x, y)| identical(x, y))
        }
        _ => false,
    }
}

pub fn identical_sig(a: &Signature, b: &Signature) -> bool {
    a.variadic == b.variadic
        && a.params.len() == b.params.len()
        && a.results.len() == b.results.len()
        && a.params.iter().zip(&b.params).all(|(p, q)| identical(&p.typ, &q.typ))
        && a.results.iter().zip(&b.results).all(|(p, q)| identical(&p.typ, &q.typ))
}

/// Replaces type parameters (by id) with the given arguments.
pub fn subst(t: &Type, map: &[(u64, Type)]) -> Type {
    if map.is_empty() {
        return t.clone();
    }
    let s = |x: &Type| subst(x, map);
    match t {
        Type::TypeParam(tp) => map
            .iter()
            .find(|(id, _)| *id == tp.id)
            .map_or_else(|| t.clone(), |(_, r)| r.clone()),
        Type::Array(e, n) => Type::Array(Arc::new(s(e)), *n),
        Type::Slice(e) => Type::slice(s(e)),
        Type::Pointer(e) => Type::pointer(s(e)),
        Type::Map(k, v) => Type::Map(Arc::new(s(k)), Arc::new(s(v))),
        Type::Chan(d, e) => Type::Chan(*d, Arc::new(s(e))),
        Type::Signature(sig) => Type::Signature(Arc::new(subst_sig(sig, map))),
        Type::Struct(st) => Type::Struct(Arc::new(Struct {
            fields: st
                .fields
                .iter()
                .map(|f| Field {
                    typ: s(&f.typ),
                    ..f.clone()
                })
                .collect(),
        })),
        Type::Tuple(ts) => Type::tuple(ts.iter().map(s).collect()),
        Type::Interface(i) => Type::Interface(Arc::new(Interface {
            methods: i
                .methods
                .iter()
                .map(|m| Method {
                    sig: Arc::new(subst_sig(&m.sig, map)),
                    ..m.clone()
                })
                .collect(),
            embeds: i.embeds.iter().map(s).collect(),
            terms: i
                .terms
                .iter()
                .map(|term| Term {
                    tilde: term.tilde,
                    typ: s(&term.typ),
                })
                .collect(),
            comparable: i.comparable,
        })),
        Type::Named(n) => match n.origin() {
            Some(origin) => Type::Named(Named::instantiate(origin, n.targs.iter().map(s).collect())),
            None => t.clone(),
        },
        Type::Basic(_) | Type::Invalid => t.clone(),
    }
}

pub fn subst_sig(sig: &Signature, map: &[(u64, Type)]) -> Signature {
    Signature {
        type_params: sig.type_params.clone(),
        params: sig
            .params
            .iter()
            .map(|p| Param {
                name: p.name.clone(),
                typ: subst(&p.typ, map),
            })
            .collect(),
        results: sig
            .results
            .iter()
            .map(|p| Param {
                name: p.name.clone(),
                typ: subst(&p.typ, map),
            })
            .collect(),
        variadic: sig.variadic,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Invalid => f.write_str("invalid type"),
            Type::Basic(k) => f.write_str(k.name()),
            Type::Array(e, n) => write!(f, "[{n}]{e}"),
            Type::Slice(e) => write!(f, "[]{e}"),
            Type::Pointer(e) => write!(f, "*{e}"),
            Type::Map(k, v) => write!(f, "map[{k}]{v}"),
            Type::Chan(ChanDir::Both, e) => write!(f, "chan {e}"),
            Type::Chan(ChanDir::Send, e) => write!(f, "chan<- {e}"),
            Type::Chan(ChanDir::Recv, e) => write!(f, "<-chan {e}"),
            Type::Signature(s) => {
                f.write_str("func")?;
                fmt_sig(f, s)
            }
            Type::Struct(s) => {
                f.write_str("struct{")?;
                for (i, fl) in s.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    if fl.embedded {
                        write!(f, "{}", fl.typ)?;
                    } else {
                        write!(f, "{} {}", fl.name, fl.typ)?;
                    }
                }
                f.write_str("}")
            }
            Type::Interface(i) => {
                if i.comparable {
                    return f.write_str("comparable");
                }
                if i.methods.is_empty() && i.embeds.is_empty() && i.terms.is_empty() {
                    return f.write_str("interface{}");
                }
                f.write_str("interface{")?;
                let mut first = true;
                let mut sep = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
                    if !std::mem::take(&mut first) {
                        f.write_str("; ")?;
                    }
                    Ok(())
                };
                for m in &i.methods {
                    sep(f)?;
                    f.write_str(&m.name)?;
                    fmt_sig(f, &m.sig)?;
                }
                for e in &i.embeds {
                    sep(f)?;
                    write!(f, "{e}")?;
                }
                if !i.terms.is_empty() {
                    sep(f)?;
                    for (n, t) in i.terms.iter().enumerate() {
                        if n > 0 {
                            f.write_str(" | ")?;
                        }
                        if t.tilde {
                            f.write_str("~")?;
                        }
                        write!(f, "{}", t.typ)?;
                    }
                }
                f.write_str("}")
            }
            Type::Named(n) => {
                if !n.pkg.is_empty() {
                    write!(f, "{}.", n.pkg)?;
                }
                f.write_str(&n.name)?;
                if !n.targs.is_empty() {
                    f.write_str("[")?;
                    for (i, t) in n.targs.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{t}")?;
                    }
                    f.write_str("]")?;
                }
                Ok(())
            }
            Type::Tuple(ts) => {
                f.write_str("(")?;
                for (i, t) in ts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{t}")?;
                }
                f.write_str(")")
            }
            Type::TypeParam(tp) => f.write_str(&tp.name),
        }
    }
}

fn fmt_sig(f: &mut fmt::Formatter<'_>, s: &Signature) -> fmt::Result {
    f.write_str("(")?;
    for (i, p) in s.params.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        match (&p.typ, s.variadic && i + 1 == s.params.len()) {
            (Type::Slice(e), true) => write!(f, "...{e}")?,
            (t, _) => write!(f, "{t}")?,
        }
    }
    f.write_str(")")?;
    match s.results.len() {
        0 => Ok(()),
        1 => write!(f, " {}", s.results[0].typ),
        _ => {
            f.write_str(" (")?;
            for (i, r) in s.results.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", r.typ)?;
            }
            f.write_str(")")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::Basic(BasicKind::Int)
    }

    #[test]
    fn sizes_follow_word_size() {
        assert_eq!(int().size(8), Some(8));
        assert_eq!(int().size(4), Some(4));
        assert_eq!(Type::Basic(BasicKind::String).size(8), Some(16));
        assert_eq!(Type::slice(int()).size(4), Some(12));
        assert_eq!(Type::Basic(BasicKind::Int64).align(4), Some(4));
    }

    #[test]
    fn struct_layout_pads_fields() {
        let s = Type::Struct(Arc::new(Struct {
            fields: vec![
                Field {
                    name: "a".into(),
                    typ: Type::Basic(BasicKind::Bool),
                    embedded: false,
                    tag: None,
                },
                Field {
                    name: "b".into(),
                    typ: Type::Basic(BasicKind::Int64),
                    embedded: false,
                    tag: None,
                },
                Field {
                    name: "c".into(),
                    typ: Type::Basic(BasicKind::Int16),
                    embedded: false,
                    tag: None,
                },
            ],
        }));
        assert_eq!(s.size(8), Some(24));
        assert_eq!(s.align(8), Some(8));
        assert_eq!(s.field_offsets(8), Some(vec![0, 8, 16]));
    }

    #[test]
    fn display_uses_go_syntax() {
        let m = Type::Map(Arc::new(Type::Basic(BasicKind::String)), Arc::new(Type::slice(int())));
        assert_eq!(m.to_string(), "map[string][]int");
        let sig = Type::Signature(Arc::new(Signature {
            type_params: Vec::new(),
            params: vec![Param {
                name: None,
                typ: Type::slice(int()),
            }],
            results: vec![
                Param {
                    name: None,
                    typ: int(),
                },
                Param {
                    name: None,
                    typ: Type::Basic(BasicKind::Bool),
                },
            ],
            variadic: true,
        }));
        assert_eq!(sig.to_string(), "func(...int) (int, bool)");
        assert_eq!(
            Type::Chan(ChanDir::Recv, Arc::new(int())).to_string(),
            "<-chan int"
        );
    }

    #[test]
    fn named_identity_is_by_declaration() {
        let a = Named::resolved("T", "p", int());
        let b = Named::resolved("T", "p", int());
        let ta = Type::Named(a.clone());
        assert!(identical(&ta, &Type::Named(a)));
        assert!(!identical(&ta, &Type::Named(b)));
        assert!(identical(&Type::slice(int()), &Type::slice(int())));
        assert!(!identical(&Type::Invalid, &Type::Invalid));
    }
}
