//! Name resolution: the merged package block, imports, and the reference pass
//! that reports undefined and unused names.

use std::sync::Arc;

use super::{CResult, Checker, Entity, ImportEntry, PackageInfo};
use crate::cst::{
    CstArena, Element, Expr, ExprId, IdentName, ImportName, LiteralValue, Spec, TopLevelDecl,
    TypeExpr, TypeExprId,
};
use crate::error::{Diag, DiagKind, FileId};
use crate::literal;
use crate::scope::{DeclRef, Lookup, PackageBinding, ScopeId};
use crate::universe::{self, Object};
use crate::walk::{Visitor, Walk};

/// Where a name leads, before anything is computed for it.
#[derive(Debug, Clone)]
pub(super) enum Resolved {
    Decl(FileId, DeclRef),
    Universe(Object),
    /// Member of a dot-imported package.
    Dot(Arc<PackageInfo>, Entity),
    Unresolved,
}

impl<'a> Checker<'a> {
    /// Merges every file's package-level names and reports conflicts,
    /// including conflicts with a file's imports.
    pub(super) fn collect_package_scope(&mut self) -> CResult<()> {
        for f in self.order.clone() {
            let u = self.unit(f)?;
            let mut names: Vec<_> = u.file.scopes.get(ScopeId::PACKAGE).iter().collect();
            names.sort_by_key(|(_, b)| b.name);
            for (sym, b) in names {
                let name = u.file.ident(sym);
                let pb = PackageBinding {
                    file: f,
                    binding: *b,
                };
                if let Some(prev) = self.pkg.insert(name, pb) {
                    let span = u.file.tokens.span(b.name);
                    let prev_span = self.tok_span(prev.file, prev.binding.name)?;
                    self.diags.push(
                        Diag::new(
                            DiagKind::Declaration,
                            f,
                            span,
                            format!("{name} redeclared in this block"),
                        )
                        .with_related(prev.file, prev_span),
                    );
                }
            }
        }
        for f in self.order.clone() {
            let u = self.unit(f)?;
            let mut names: Vec<_> = u.file.scopes.get(ScopeId::FILE).iter().collect();
            names.sort_by_key(|(_, b)| b.name);
            for (sym, b) in names {
                let name = u.file.ident(sym);
                if let Some(prev) = self.pkg.get(name).copied() {
                    let DeclRef::Import(spec) = b.decl else {
                        continue;
                    };
                    let span = u.arena().import_specs.span(spec);
                    let prev_span = self.tok_span(prev.file, prev.binding.name)?;
                    self.diags.push(
                        Diag::new(
                            DiagKind::Declaration,
                            f,
                            span,
                            format!("{name} already declared through import of package"),
                        )
                        .with_related(prev.file, prev_span),
                    );
                }
            }
        }
        Ok(())
    }

    pub(super) fn resolve_imports(&mut self) -> CResult<()> {
        for f in self.order.clone() {
            let u = self.unit(f)?;
            let a = u.arena();
            let mut entries = Vec::new();
            for d in a.top_decls(u.cst.root.decls) {
                let TopLevelDecl::Decl(id) = *d else {
                    continue;
                };
                for spec in a.specs_list(a.decls[id].specs) {
                    let Spec::Import(spec) = *spec else {
                        continue;
                    };
                    let is = a.import_specs[spec];
                    let raw = u.file.tok_text(is.path);
                    let path = literal::unquote_string(&raw)
                        .ok()
                        .and_then(|b| String::from_utf8(b).ok())
                        .unwrap_or_default();
                    let span = a.import_specs.span(spec);
                    let pkg = if path == "unsafe" {
                        Some(PackageInfo::unsafe_package())
                    } else if path.is_empty() {
                        self.report(DiagKind::Import, f, span, "invalid import path");
                        None
                    } else {
                        match self.importer.import(&path) {
                            Ok(p) => Some(p),
                            Err(why) => {
                                self.report(
                                    DiagKind::Import,
                                    f,
                                    span,
                                    format!("could not import {path} ({why})"),
                                );
                                None
                            }
                        }
                    };
                    entries.push(ImportEntry {
                        spec,
                        path: path.into(),
                        local: is.name,
                        pkg,
                    });
                }
            }
            self.imports.insert(f, entries);
        }
        Ok(())
    }

    /// Groups method declarations by receiver base type name so method sets
    /// can be filled in on demand.
    pub(super) fn index_methods(&mut self) -> CResult<()> {
        for f in self.order.clone() {
            let u = self.unit(f)?;
            let a = u.arena();
            for d in a.top_decls(u.cst.root.decls) {
                let TopLevelDecl::Func(id) = *d else {
                    continue;
                };
                if let Some(r) = a.funcs[id].recv {
                    let base: Arc<str> = u.file.ident(r.base.sym).into();
                    self.methods.entry(base).or_default().push((f, id));
                }
            }
        }
        Ok(())
    }

    fn import_entry(&self, f: FileId, spec: crate::cst::ImportSpecId) -> Option<&ImportEntry> {
        self.imports.get(&f)?.iter().find(|e| e.spec == spec)
    }

    /// Finds what `name` refers to at its position in `scope`, without
    /// computing anything.
    pub(super) fn resolve_name(&self, f: FileId, scope: ScopeId, name: IdentName) -> CResult<Resolved> {
        let u = self.unit(f)?;
        if let Lookup::Local(_, b) = u.file.scopes.lookup(scope, name.sym, name.tok) {
            return Ok(Resolved::Decl(f, b.decl));
        }
        let text = u.file.ident(name.sym);
        if let Some(pb) = self.pkg.get(text) {
            return Ok(Resolved::Decl(pb.file, pb.binding.decl));
        }
        if let Some(obj) = universe::lookup(text) {
            return Ok(Resolved::Universe(obj));
        }
        let Some(entries) = self.imports.get(&f) else {
            return Ok(Resolved::Unresolved);
        };
        // The implied name of an import path is a guess; the package's
        // declared name is authoritative.
        for e in entries {
            if let (None, Some(p)) = (&e.local, &e.pkg) {
                if &*p.name == text {
                    return Ok(Resolved::Decl(f, DeclRef::Import(e.spec)));
                }
            }
        }
        for e in entries {
            if let (Some(ImportName::Dot(_)), Some(p)) = (&e.local, &e.pkg) {
                if let Some(ent) = p.lookup(text) {
                    if is_exported(text) {
                        return Ok(Resolved::Dot(p.clone(), ent.clone()));
                    }
                }
            }
        }
        Ok(Resolved::Unresolved)
    }

    /// Resolves and computes an identifier, reporting it when undefined.
    pub(super) fn lookup(&mut self, f: FileId, scope: ScopeId, name: IdentName) -> CResult<Entity> {
        match self.resolve_name(f, scope, name)? {
            Resolved::Decl(df, decl) => {
                if let DeclRef::Import(spec) = decl {
                    self.used_imports.insert((df, spec));
                }
                self.object_of(df, decl)
            }
            Resolved::Universe(obj) => match Entity::from_universe(obj, self.iota) {
                Some(e) => Ok(e),
                None => {
                    let span = self.tok_span(f, name.tok)?;
                    self.error(f, span, "cannot use iota outside constant declaration");
                    Ok(Entity::Invalid)
                }
            },
            Resolved::Dot(_, e) => Ok(e),
            Resolved::Unresolved => {
                let span = self.tok_span(f, name.tok)?;
                let text = self.ident_text(f, name)?;
                self.report(DiagKind::Declaration, f, span, format!("undefined: {text}"));
                Ok(Entity::Invalid)
            }
        }
    }

    /// If `name` denotes an imported package, returns it (`None` inside when
    /// the import itself failed).
    pub(super) fn package_ref(
        &mut self,
        f: FileId,
        scope: ScopeId,
        name: IdentName,
    ) -> CResult<Option<Option<Arc<PackageInfo>>>> {
        let Resolved::Decl(df, DeclRef::Import(spec)) = self.resolve_name(f, scope, name)? else {
            return Ok(None);
        };
        self.used_imports.insert((df, spec));
        Ok(Some(self.import_entry(df, spec).and_then(|e| e.pkg.clone())))
    }

    /// `pkg.Name`.
    pub(super) fn package_member(
        &mut self,
        f: FileId,
        pkg: &PackageInfo,
        sel: IdentName,
    ) -> CResult<Entity> {
        let name = self.ident_text(f, sel)?;
        let span = self.tok_span(f, sel.tok)?;
        match pkg.lookup(name) {
            Some(_) if !is_exported(name) => {
                self.error(
                    f,
                    span,
                    format!("name {name} not exported by package {}", pkg.name),
                );
                Ok(Entity::Invalid)
            }
            Some(e) => Ok(e.clone()),
            None => {
                self.report(
                    DiagKind::Declaration,
                    f,
                    span,
                    format!("undefined: {}.{name}", pkg.name),
                );
                Ok(Entity::Invalid)
            }
        }
    }

    /// Walks every file reporting identifiers that resolve to nothing, and
    /// imports that nothing refers to.
    pub(super) fn check_references(&mut self) -> CResult<()> {
        for f in self.order.clone() {
            let u = self.unit(f)?;
            let mut refs = Refs {
                ck: self,
                f,
                found: Vec::new(),
                used: Vec::new(),
                abort: None,
            };
            refs.visit_source_file(u.arena(), &u.cst.root);
            let Refs {
                found, used, abort, ..
            } = refs;
            if let Some(abort) = abort {
                return Err(abort);
            }
            self.diags.extend(found);
            for spec in used {
                self.used_imports.insert((f, spec));
            }
        }
        for f in self.order.clone() {
            let entries = self.imports.get(&f).cloned().unwrap_or_default();
            let a = self.unit(f)?.arena();
            for e in entries {
                if e.pkg.is_none()
                    || matches!(e.local, Some(ImportName::Blank(_)))
                    || self.used_imports.contains(&(f, e.spec))
                {
                    continue;
                }
                let span = a.import_specs.span(e.spec);
                let msg = match e.local {
                    Some(ImportName::Name(n)) => {
                        format!("\"{}\" imported as {} and not used", e.path, self.ident_text(f, n)?)
                    }
                    _ => format!("\"{}\" imported and not used", e.path),
                };
                self.report(DiagKind::Declaration, f, span, msg);
            }
        }
        Ok(())
    }
}

pub(super) fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

struct Refs<'c, 'a> {
    ck: &'c Checker<'a>,
    f: FileId,
    found: Vec<Diag>,
    used: Vec<crate::cst::ImportSpecId>,
    abort: Option<super::CheckAbort>,
}

impl Refs<'_, '_> {
    fn resolve(&mut self, scope: ScopeId, name: IdentName, report: bool) {
        let Ok(u) = self.ck.unit(self.f) else {
            return;
        };
        if u.file.ident(name.sym) == "_" {
            return;
        }
        match self.ck.resolve_name(self.f, scope, name) {
            Ok(Resolved::Decl(df, DeclRef::Import(spec))) if df == self.f => self.used.push(spec),
            Ok(Resolved::Dot(p, _)) => {
                if let Some(es) = self.ck.imports.get(&self.f) {
                    self.used.extend(
                        es.iter()
                            .filter(|e| e.pkg.as_ref().is_some_and(|q| Arc::ptr_eq(q, &p)))
                            .map(|e| e.spec),
                    );
                }
            }
            Ok(Resolved::Unresolved) if report => {
                self.found.push(Diag::new(
                    DiagKind::Declaration,
                    self.f,
                    u.file.tokens.span(name.tok),
                    format!("undefined: {}", u.file.ident(name.sym)),
                ));
            }
            Ok(_) => {}
            Err(e) => self.abort = Some(e),
        }
    }

    /// Keys of composite literals may be struct field names, which are not
    /// references.
    fn literal<'a>(&mut self, a: &'a CstArena, lit: &LiteralValue) {
        for el in a.keyed_elems_list(lit.elements) {
            match el.key {
                Some(Element::Expr(k)) => match a.exprs[k] {
                    Expr::Ident { name, scope } => self.resolve(scope, name, false),
                    _ => self.visit_expr(a, k),
                },
                Some(Element::Literal(l)) => self.literal(a, &l),
                None => {}
            }
            match el.value {
                Element::Expr(v) => self.visit_expr(a, v),
                Element::Literal(l) => self.literal(a, &l),
            }
        }
    }
}

impl<'a> Visitor<'a> for Refs<'_, '_> {
    fn visit_expr(&mut self, a: &'a CstArena, id: ExprId) {
        match a.exprs[id] {
            Expr::Ident { name, scope } => self.resolve(scope, name, true),
            Expr::CompositeLit { typ, lit } => {
                self.visit_type(a, typ);
                self.literal(a, &lit);
            }
            e => e.walk(a, self),
        }
    }

    fn visit_type(&mut self, a: &'a CstArena, id: TypeExprId) {
        if let TypeExpr::Named {
            pkg, name, scope, ..
        } = a.types[id]
        {
            self.resolve(scope, pkg.unwrap_or(name), true);
        }
        a.types[id].walk(a, self);
    }
}
