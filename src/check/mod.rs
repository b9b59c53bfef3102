//! Type and constant checking.
//!
//! The checker works on one package at a time: the parsed files of the
//! package plus the already-checked packages it imports. Declarations are
//! resolved lazily and memoized, so package-level order does not matter and
//! each declaration is computed once. Re-entering a declaration that is still
//! being computed is how cycles are found.
//!
//! Only the parts of the language needed by the front end are checked; what
//! is not understood degrades to [`Type::Invalid`], which silences follow-up
//! errors instead of producing false positives.

mod builtin;
mod call;
mod composite;
mod decl;
mod expr;
mod resolve;
mod select;
mod stmt;
mod typexpr;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::constant::Value;
use crate::cst::{CstArena, Cst, ExprId, IdentName, ImportSpecId, SimpleStmtId, ValueSpecId};
use crate::error::{Diag, DiagKind, DiagList, FileId, Span};
use crate::parser::ParsedFile;
use crate::scope::{DeclRef, PackageScope};
use crate::token::Tok;
use crate::types::{Named, Signature, Type};
use crate::universe::{self, Builtin, Object};

pub use expr::{Mode, Operand};

#[derive(Debug, Error)]
pub enum CheckAbort {
    #[error("internal checker error: {0}")]
    Internal(String),
}

pub(crate) type CResult<T> = Result<T, CheckAbort>;

#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Import path of the package being checked.
    pub path: Arc<str>,
    /// Pointer size of the target in bytes (4 or 8).
    pub word_size: u64,
}

impl CheckConfig {
    pub fn new(path: impl Into<Arc<str>>, word_size: u64) -> Self {
        Self {
            path: path.into(),
            word_size,
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self::new("main", 8)
    }
}

/// Supplies checked dependencies by import path.
pub trait Importer {
    fn import(&self, path: &str) -> Result<Arc<PackageInfo>, String>;
}

impl<F> Importer for F
where
    F: Fn(&str) -> Result<Arc<PackageInfo>, String>,
{
    fn import(&self, path: &str) -> Result<Arc<PackageInfo>, String> {
        self(path)
    }
}

/// Importer for packages without dependencies.
pub struct NoImports;

impl Importer for NoImports {
    fn import(&self, path: &str) -> Result<Arc<PackageInfo>, String> {
        Err(format!("package {path} is not available"))
    }
}

/// What a name denotes once checked.
#[derive(Debug, Clone)]
pub enum Entity {
    Const { typ: Type, val: Value },
    Var(Type),
    TypeName(Type),
    Func(Type),
    Package(Arc<PackageInfo>),
    Builtin(Builtin),
    Nil,
    Invalid,
}

impl Entity {
    pub fn typ(&self) -> Type {
        match self {
            Entity::Const { typ, .. } | Entity::Var(typ) | Entity::TypeName(typ) | Entity::Func(typ) => {
                typ.clone()
            }
            Entity::Nil => Type::Basic(crate::types::BasicKind::UntypedNil),
            Entity::Package(_) | Entity::Builtin(_) | Entity::Invalid => Type::Invalid,
        }
    }

    pub fn const_value(&self) -> Option<&Value> {
        match self {
            Entity::Const { val, .. } => Some(val),
            _ => None,
        }
    }

    fn from_universe(obj: Object, iota: Option<u32>) -> Option<Entity> {
        Some(match obj {
            Object::Type(t) => Entity::TypeName(t),
            Object::Const(typ, val) => Entity::Const { typ, val },
            Object::Iota => Entity::Const {
                typ: Type::Basic(crate::types::BasicKind::UntypedInt),
                val: Value::int(iota?),
            },
            Object::Nil => Entity::Nil,
            Object::Builtin(b) => Entity::Builtin(b),
        })
    }
}

/// A checked package as seen by its importers.
#[derive(Debug)]
pub struct PackageInfo {
    pub name: Arc<str>,
    pub path: Arc<str>,
    /// Every package-level name, exported or not, in declaration order.
    pub objects: IndexMap<Arc<str>, Entity>,
    named: Vec<Arc<Named>>,
}

impl PackageInfo {
    pub fn lookup(&self, name: &str) -> Option<&Entity> {
        self.objects.get(name)
    }

    /// The pseudo-package `unsafe`.
    pub fn unsafe_package() -> Arc<PackageInfo> {
        static UNSAFE: OnceLock<Arc<PackageInfo>> = OnceLock::new();
        UNSAFE
            .get_or_init(|| {
                let objects = [
                    "Pointer",
                    "Sizeof",
                    "Alignof",
                    "Offsetof",
                    "Add",
                    "Slice",
                    "String",
                    "StringData",
                    "SliceData",
                ]
                .into_iter()
                .filter_map(|n| {
                    let e = Entity::from_universe(universe::lookup_unsafe(n)?, None)?;
                    Some((Arc::<str>::from(n), e))
                })
                .collect();
                Arc::new(PackageInfo {
                    name: "unsafe".into(),
                    path: "unsafe".into(),
                    objects,
                    named: Vec::new(),
                })
            })
            .clone()
    }
}

impl Drop for PackageInfo {
    fn drop(&mut self) {
        // Self-referential types hold `Arc` cycles through their underlying
        // types and methods.
        for n in &self.named {
            n.clear();
        }
    }
}

/// Result of checking one package.
#[derive(Debug)]
pub struct CheckOutput {
    pub info: Arc<PackageInfo>,
    pub diags: DiagList,
    /// Operand of every expression that was evaluated.
    pub types: HashMap<(FileId, ExprId), Operand>,
}

impl CheckOutput {
    pub fn type_of(&self, file: FileId, e: ExprId) -> Option<&Operand> {
        self.types.get(&(file, e))
    }
}

/// Tri-state progress of a memoized declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Unchecked,
    InProgress,
    Done,
}

#[derive(Debug, Clone)]
struct Memo {
    state: CheckState,
    /// While in progress: the handle given out to recursive references.
    entity: Entity,
}

/// Declarations whose names are typed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Group {
    Spec(ValueSpecId),
    Short(SimpleStmtId),
    Range(ExprId),
}

#[derive(Debug, Clone, Copy)]
struct Unit<'a> {
    file: &'a ParsedFile,
    cst: &'a Cst,
}

impl<'a> Unit<'a> {
    fn arena(&self) -> &'a CstArena {
        &self.cst.arena
    }
}

#[derive(Debug, Clone)]
struct ImportEntry {
    spec: ImportSpecId,
    path: Arc<str>,
    local: Option<crate::cst::ImportName>,
    pkg: Option<Arc<PackageInfo>>,
}

struct FuncCtx {
    sig: Arc<Signature>,
}

pub(crate) struct Checker<'a> {
    cfg: &'a CheckConfig,
    importer: &'a dyn Importer,
    units: HashMap<FileId, Unit<'a>>,
    order: Vec<FileId>,
    name: Arc<str>,
    pkg: PackageScope,
    memo: HashMap<(FileId, DeclRef), Memo>,
    groups: HashMap<(FileId, Group), Option<Arc<[Type]>>>,
    exprs: HashMap<(FileId, ExprId, Option<u32>), Operand>,
    imports: HashMap<FileId, Vec<ImportEntry>>,
    used_imports: HashSet<(FileId, ImportSpecId)>,
    /// Method declarations by receiver base type name.
    methods: HashMap<Arc<str>, Vec<(FileId, crate::cst::FuncDeclId)>>,
    methods_done: HashSet<u64>,
    /// Ids of the package-level defined types of this package.
    own_types: HashSet<u64>,
    named: Vec<Arc<Named>>,
    iota: Option<u32>,
    funcs: Vec<FuncCtx>,
    diags: DiagList,
}

/// Checks the files of one package. Files without a syntax tree are skipped;
/// their problems were already reported by the parser.
pub fn check_package(
    files: &[ParsedFile],
    importer: &dyn Importer,
    cfg: &CheckConfig,
) -> Result<CheckOutput, CheckAbort> {
    let mut ck = Checker::new(files, importer, cfg);
    debug!(package = %ck.name, path = %cfg.path, files = ck.order.len(), "checking package");
    ck.collect_package_scope()?;
    ck.resolve_imports()?;
    ck.index_methods()?;
    ck.check_declarations()?;
    ck.check_bodies()?;
    ck.check_references()?;
    let out = ck.finish()?;
    debug!(
        package = %out.info.name,
        diags = out.diags.len(),
        objects = out.info.objects.len(),
        "checked package"
    );
    Ok(out)
}

impl<'a> Checker<'a> {
    fn new(files: &'a [ParsedFile], importer: &'a dyn Importer, cfg: &'a CheckConfig) -> Self {
        let mut units = HashMap::new();
        let mut order = Vec::new();
        for pf in files {
            if let Some(cst) = &pf.cst {
                units.insert(pf.file, Unit { file: pf, cst });
                order.push(pf.file);
            }
        }
        let name: Arc<str> = files
            .iter()
            .find_map(|pf| pf.package_name())
            .unwrap_or("main")
            .into();
        Self {
            cfg,
            importer,
            units,
            order,
            name,
            pkg: PackageScope::new(),
            memo: HashMap::new(),
            groups: HashMap::new(),
            exprs: HashMap::new(),
            imports: HashMap::new(),
            used_imports: HashSet::new(),
            methods: HashMap::new(),
            methods_done: HashSet::new(),
            own_types: HashSet::new(),
            named: Vec::new(),
            iota: None,
            funcs: Vec::new(),
            diags: DiagList::new(),
        }
    }

    fn unit(&self, f: FileId) -> CResult<Unit<'a>> {
        self.units
            .get(&f)
            .copied()
            .ok_or_else(|| CheckAbort::Internal(format!("no syntax tree for file {}", f.0)))
    }

    fn word(&self) -> u64 {
        self.cfg.word_size
    }

    fn report(&mut self, kind: DiagKind, f: FileId, span: Span, msg: impl Into<String>) {
        self.diags.push(Diag::new(kind, f, span, msg));
    }

    fn error(&mut self, f: FileId, span: Span, msg: impl Into<String>) {
        self.report(DiagKind::Type, f, span, msg);
    }

    fn tok_span(&self, f: FileId, t: Tok) -> CResult<Span> {
        Ok(self.unit(f)?.file.tokens.span(t))
    }

    fn expr_span(&self, f: FileId, e: ExprId) -> CResult<Span> {
        Ok(self.unit(f)?.arena().exprs.span(e))
    }

    fn ident_text(&self, f: FileId, n: IdentName) -> CResult<&'a str> {
        Ok(self.unit(f)?.file.ident(n.sym))
    }

    /// Source text of an expression, for messages.
    fn expr_text(&self, f: FileId, e: ExprId) -> CResult<String> {
        let u = self.unit(f)?;
        let sp = u.arena().exprs.span(e);
        Ok(u.file.source.slice(sp.start, sp.end).into_owned())
    }

    fn check_declarations(&mut self) -> CResult<()> {
        use crate::cst::{Spec, TopLevelDecl};
        for f in self.order.clone() {
            let u = self.unit(f)?;
            let a = u.arena();
            for d in a.top_decls(u.cst.root.decls) {
                match *d {
                    TopLevelDecl::Decl(id) => {
                        for spec in a.specs_list(a.decls[id].specs) {
                            match *spec {
                                Spec::Import(_) => {}
                                Spec::Value(v) => {
                                    let vs = a.value_specs[v];
                                    for i in 0..vs.names.len() as u32 {
                                        let decl = if vs.is_const {
                                            DeclRef::Const(v, i)
                                        } else {
                                            DeclRef::Var(v, i)
                                        };
                                        self.object_of(f, decl)?;
                                    }
                                }
                                Spec::Type(t) => {
                                    if let Entity::TypeName(Type::Named(n)) =
                                        self.object_of(f, DeclRef::Type(t))?
                                    {
                                        self.ensure_methods(&n)?;
                                    }
                                }
                            }
                        }
                    }
                    TopLevelDecl::Func(id) => {
                        self.object_of(f, DeclRef::Func(id))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn check_bodies(&mut self) -> CResult<()> {
        use crate::cst::TopLevelDecl;
        for f in self.order.clone() {
            let u = self.unit(f)?;
            let a = u.arena();
            for d in a.top_decls(u.cst.root.decls) {
                let TopLevelDecl::Func(id) = *d else {
                    continue;
                };
                let fd = a.funcs[id];
                let Some(body) = fd.body else {
                    continue;
                };
                if let Entity::Func(Type::Signature(sig)) = self.object_of(f, DeclRef::Func(id))? {
                    self.func_body(f, sig, &body)?;
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> CResult<CheckOutput> {
        let names: Vec<(Arc<str>, FileId, DeclRef)> = self
            .pkg
            .iter()
            .map(|(n, pb)| (Arc::from(n), pb.file, pb.binding.decl))
            .collect();
        let mut objects = IndexMap::with_capacity(names.len());
        for (name, f, decl) in names {
            let e = self.object_of(f, decl)?;
            objects.insert(name, e);
        }
        let types = self
            .exprs
            .drain()
            .map(|((f, e, _), x)| ((f, e), x))
            .collect();
        Ok(CheckOutput {
            info: Arc::new(PackageInfo {
                name: self.name.clone(),
                path: self.cfg.path.clone(),
                objects,
                named: std::mem::take(&mut self.named),
            }),
            diags: std::mem::take(&mut self.diags),
            types,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parser::{parse_file, ParseOptions};
    use crate::source::Source;

    pub(crate) fn parse_pkg(srcs: &[&str]) -> Vec<ParsedFile> {
        srcs.iter()
            .enumerate()
            .map(|(i, s)| {
                parse_file(
                    FileId(i as u32),
                    Source::from_text(format!("f{i}.go"), s),
                    &ParseOptions::default(),
                )
            })
            .collect()
    }

    pub(crate) fn check_srcs(srcs: &[&str]) -> CheckOutput {
        let files = parse_pkg(srcs);
        for f in &files {
            assert!(!f.has_errors(), "parse errors: {:?}", f.diags);
        }
        match check_package(&files, &NoImports, &CheckConfig::default()) {
            Ok(out) => out,
            Err(e) => panic!("check aborted: {e}"),
        }
    }

    pub(crate) fn check(src: &str) -> CheckOutput {
        check_srcs(&[src])
    }

    pub(crate) fn messages(out: &CheckOutput) -> Vec<String> {
        out.diags.iter().map(|d| d.message.clone()).collect()
    }

    pub(crate) fn assert_clean(src: &str) {
        let out = check(src);
        assert!(out.diags.is_empty(), "unexpected diagnostics: {:?}", messages(&out));
    }

    pub(crate) fn assert_error(src: &str, needle: &str) {
        let out = check(src);
        let msgs = messages(&out);
        assert!(
            msgs.iter().any(|m| m.contains(needle)),
            "expected {needle:?} in {msgs:?}"
        );
    }

    pub(crate) fn const_of(out: &CheckOutput, name: &str) -> Value {
        match out.info.lookup(name) {
            Some(Entity::Const { val, .. }) => val.clone(),
            other => panic!("{name} is not a constant: {other:?}"),
        }
    }

    pub(crate) fn type_of(out: &CheckOutput, name: &str) -> String {
        out.info
            .lookup(name)
            .map(|e| e.typ().to_string())
            .unwrap_or_default()
    }

    #[test]
    fn package_level_order_is_irrelevant() {
        let out = check("package p\nconst B = A * 2\nconst A = 21\nvar v = B\n");
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(const_of(&out, "B"), Value::int(42));
        assert_eq!(type_of(&out, "v"), "int");
    }

    #[test]
    fn names_are_shared_across_files() {
        let out = check_srcs(&[
            "package p\nfunc F() T { return T{X: one} }\n",
            "package p\ntype T struct{ X int }\nconst one = 1\n",
        ]);
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(type_of(&out, "F"), "func() p.T");
    }

    #[test]
    fn cross_file_redeclaration() {
        let out = check_srcs(&["package p\nvar X int\n", "package p\nfunc X() {}\n"]);
        let d = out
            .diags
            .of_kind(DiagKind::Declaration)
            .find(|d| d.message.contains("X redeclared"))
            .cloned();
        let Some(d) = d else {
            panic!("no redeclaration reported: {:?}", messages(&out));
        };
        assert_eq!(d.file, FileId(1));
        assert_eq!(d.related.map(|r| r.0), Some(FileId(0)));
    }

    #[test]
    fn unsafe_package_members() {
        let out = check(
            "package p\nimport \"unsafe\"\ntype S struct{ a bool; b int64 }\nconst sz = unsafe.Sizeof(S{})\nconst off = unsafe.Offsetof(S{}.b)\n",
        );
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(const_of(&out, "sz"), Value::int(16));
        assert_eq!(const_of(&out, "off"), Value::int(8));
    }

    #[test]
    fn importer_supplies_dependencies() {
        let dep = check("package dep\nconst Answer = 42\nfunc Hello() string { return \"hi\" }\nvar hidden int\n");
        let info = dep.info.clone();
        let importer = move |path: &str| -> Result<Arc<PackageInfo>, String> {
            if path == "example.com/dep" {
                Ok(info.clone())
            } else {
                Err("not found".into())
            }
        };
        let files = parse_pkg(&[
            "package p\nimport \"example.com/dep\"\nconst X = dep.Answer + 1\nvar s = dep.Hello()\nvar h = dep.hidden\n",
        ]);
        let out = match check_package(&files, &importer, &CheckConfig::new("example.com/p", 8)) {
            Ok(o) => o,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(const_of(&out, "X"), Value::int(43));
        assert_eq!(type_of(&out, "s"), "string");
        assert!(messages(&out)
            .iter()
            .any(|m| m.contains("name hidden not exported by package dep")));
    }

    #[test]
    fn failed_import_is_reported_once() {
        let out = check("package p\nimport \"nowhere/pkg\"\nvar x = pkg.Thing\n");
        let imports: Vec<_> = out.diags.of_kind(DiagKind::Import).collect();
        assert_eq!(imports.len(), 1, "{:?}", messages(&out));
        assert!(!messages(&out).iter().any(|m| m.contains("undefined")));
    }

    #[test]
    fn unused_import() {
        let files = parse_pkg(&["package p\nimport \"unsafe\"\nvar x int\n"]);
        let out = match check_package(&files, &NoImports, &CheckConfig::default()) {
            Ok(o) => o,
            Err(e) => panic!("{e}"),
        };
        assert!(messages(&out)
            .iter()
            .any(|m| m == "\"unsafe\" imported and not used"));
    }
}
